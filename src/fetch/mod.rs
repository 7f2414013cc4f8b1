//! Fetch plumbing shared by prewarm and the read path
//!
//! Every remote read composes the same way: dedupe by cache key, retry
//! transient failures with backoff, then write the result to the cache.

pub mod dedupe;
pub mod parallel;
pub mod retry;

pub use dedupe::Deduplicator;
pub use parallel::run_bounded;
pub use retry::RetryPolicy;
