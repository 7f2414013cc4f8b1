//! Status command implementation

use colored::Colorize;

use crate::cli::GlobalOptions;
use crate::cli::context::open_store;
use crate::config::Config;
use crate::error::Result;
use crate::output::formatters::format_size;

/// Run the status command to display configuration and cache status
pub fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}\n", "matchday Configuration Status".bold());

    let config = match Config::load_at(opts.config_ref()) {
        Ok(config) => config,
        Err(_) => {
            println!("{} Configuration not found", "✗".red());
            println!();
            println!(
                "Run {} to create a configuration file.",
                "matchday init".cyan()
            );
            println!();
            return Ok(());
        }
    };

    let config_path = Config::resolve_path(opts.config_ref())?;
    println!("Config file: {}", config_path.display().to_string().cyan());
    println!();

    match &config.backend {
        Some(backend) => {
            println!("{} Backend: {}", "✓".green(), backend.url);
            if backend.access_token.is_some() {
                println!("{} Access token configured", "✓".green());
            } else {
                println!(
                    "{} No access token (requests use the public API key)",
                    "○".dimmed()
                );
            }
        }
        None => {
            println!("{} Backend not configured", "✗".red());
            println!("  → Run 'matchday init' to configure");
        }
    }

    if let Some(url) = opts.backend_url_ref() {
        println!("{} Backend override: {}", "○".dimmed(), url.cyan());
    }

    match config.viewer(opts.viewer_ref()) {
        Ok(viewer) => println!("{} Viewer: {}", "✓".green(), viewer),
        Err(_) => {
            println!("{} No viewer set", "○".dimmed());
            println!("  → Pass --viewer <USER_ID> or run 'matchday init'");
        }
    }

    let prefs = &config.preferences;
    println!(
        "{} Prewarm: {}s timeout, {} retries from {}ms, {} leagues at once",
        "○".dimmed(),
        prefs.prewarm_timeout_secs,
        prefs.retry_count,
        prefs.retry_base_ms,
        prefs.max_concurrent
    );

    println!();
    if opts.no_cache || !config.cache.enabled {
        println!("{} Cache: in-memory only", "○".dimmed());
    } else {
        let store = open_store(&config.cache, false);
        match store.stats() {
            Ok(stats) => println!(
                "{} Cache: {} fresh / {} expired entries, {} at {}",
                "✓".green(),
                stats.valid_entries,
                stats.expired_entries,
                format_size(stats.total_size_bytes),
                store.location()
            ),
            Err(e) => println!("{} Cache unavailable: {}", "⚠".yellow(), e),
        }
    }
    println!();

    Ok(())
}
