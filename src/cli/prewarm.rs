//! Prewarm command

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::error::Result;
use crate::output::json::format_json;
use crate::output::table::format_table;
use crate::prewarm::{PrewarmReport, PrewarmStatus, StepOutcome};

#[derive(Tabled)]
struct StepDisplay {
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} ({elapsed})") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Run the prewarm command
pub async fn run(opts: &GlobalOptions, timeout: Option<u64>) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let viewer = ctx.config.viewer(opts.viewer_ref())?;
    let ceiling = timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.prewarm_timeout());

    let progress = (ctx.format == OutputFormat::Table)
        .then(|| spinner(format!("Prewarming cache for {}", viewer)));
    let status = ctx.prewarmer().prewarm_within(&viewer, ceiling).await;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    match status? {
        PrewarmStatus::Completed(report) => print_report(&report, ctx.format, "completed"),
        PrewarmStatus::TimedOut(handle) => {
            // The runtime goes away with this command, so wait for the
            // background run instead of dropping its in-flight writes.
            let progress = match ctx.format {
                OutputFormat::Json => None,
                OutputFormat::Table => {
                    println!(
                        "{} Prewarm still running after {}s ({} fetches in flight); waiting for it to finish",
                        "⚠".yellow(),
                        ceiling.as_secs(),
                        ctx.dedup.in_flight()
                    );
                    Some(spinner("Finishing in-flight fetches".to_string()))
                }
            };
            let report = handle.finish().await;
            if let Some(bar) = progress {
                bar.finish_and_clear();
            }
            print_report(&report?, ctx.format, "completed_after_timeout")
        }
    }
}

fn print_report(report: &PrewarmReport, format: OutputFormat, status: &str) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let steps: serde_json::Map<String, serde_json::Value> = report
                .steps
                .iter()
                .map(|(key, outcome)| (key.clone(), serde_json::json!(outcome.to_string())))
                .collect();
            let json = serde_json::json!({
                "status": status,
                "gameweek": report.gameweek,
                "cached": report.cached(),
                "failed": report.failed(),
                "skipped": report.skipped(),
                "steps": steps,
            });
            println!("{}", format_json(&json)?);
        }
        OutputFormat::Table => {
            let rows: Vec<StepDisplay> = report
                .steps
                .iter()
                .map(|(key, outcome)| StepDisplay {
                    key: key.clone(),
                    status: outcome.to_string(),
                })
                .collect();
            println!("{}", format_table(&rows, "Nothing to prewarm."));
            println!("{}", summary(report));
        }
    }
    Ok(())
}

fn summary(report: &PrewarmReport) -> String {
    let gameweek = report
        .gameweek
        .map(|gw| format!("gameweek {}: ", gw))
        .unwrap_or_default();
    let line = format!(
        "{}{} cached, {} failed, {} skipped",
        gameweek,
        report.cached(),
        report.failed(),
        report.skipped()
    );

    let all_cached = report
        .steps
        .values()
        .all(|o| matches!(o, StepOutcome::Cached));
    if all_cached {
        format!("{} {}", "✓".green(), line)
    } else {
        format!("{} {}", "⚠".yellow(), line)
    }
}
