//! Bounded fan-out for independent fetches.
//!
//! Runs one task per input with at most `max_concurrent` in flight, starting
//! the next input as soon as any running task finishes.

use std::future::Future;

use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;

/// Run `task` for every input, at most `max_concurrent` at a time.
///
/// Returns `(input, output)` pairs in completion order. A `max_concurrent` of
/// zero is treated as one.
///
/// # Example
///
/// ```ignore
/// let backlogs = run_bounded(
///     league_ids,
///     |league_id| async move { source.chat_backlog(&league_id, 50).await },
///     8,
/// )
/// .await;
/// ```
pub async fn run_bounded<I, T, F, Fut>(inputs: Vec<I>, task: F, max_concurrent: usize) -> Vec<(I, T)>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = T>,
{
    if inputs.is_empty() {
        return Vec::new();
    }

    let max_concurrent = max_concurrent.max(1);
    debug!(
        "Running {} tasks with max {} concurrent",
        inputs.len(),
        max_concurrent
    );

    let mut outputs = Vec::with_capacity(inputs.len());
    let mut running = FuturesUnordered::new();
    let mut pending = inputs.into_iter();

    let start = |input: I| task(input.clone()).map(move |output| (input, output));

    // Seed initial batch up to max_concurrent
    for input in pending.by_ref().take(max_concurrent) {
        running.push(start(input));
    }

    // Start the next input whenever one finishes
    while let Some(done) = running.next().await {
        outputs.push(done);
        if let Some(next) = pending.next() {
            running.push(start(next));
        }
    }

    outputs
}
