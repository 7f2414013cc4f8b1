//! Cache management commands

use colored::Colorize;

use crate::cache::{CacheStore, Category, key};
use crate::cli::context::{cache_dir, open_durable};
use crate::cli::{GlobalOptions, OutputFormat};
use crate::config::{CacheSettings, Config};
use crate::error::Result;
use crate::output::formatters::{format_size, format_timestamp_ms};

/// Cache settings from the config file; defaults when there is none yet.
fn settings(opts: &GlobalOptions) -> CacheSettings {
    Config::load_at(opts.config_ref())
        .map(|config| config.cache)
        .unwrap_or_default()
}

fn open(opts: &GlobalOptions) -> Result<CacheStore> {
    let medium = open_durable(&settings(opts))?;
    Ok(CacheStore::new(Box::new(medium)))
}

/// Show cache status/statistics
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let store = open(opts)?;
    let stats = store.stats()?;

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "total_entries": stats.total_entries,
                "valid_entries": stats.valid_entries,
                "expired_entries": stats.expired_entries,
                "corrupt_entries": stats.corrupt_entries,
                "total_size_bytes": stats.total_size_bytes,
                "total_size_human": format_size(stats.total_size_bytes),
                "oldest_entry_ms": stats.oldest_entry,
                "newest_entry_ms": stats.newest_entry,
                "path": store.location(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            println!("Cache Status");
            println!("────────────────────────────────────────");
            println!("Location:       {}", store.location());
            println!("Valid entries:  {}", stats.valid_entries);
            println!("Expired:        {}", stats.expired_entries);
            if stats.corrupt_entries > 0 {
                println!("Unreadable:     {}", stats.corrupt_entries);
            }
            println!("Total size:     {}", format_size(stats.total_size_bytes));

            if let Some(oldest) = stats.oldest_entry {
                println!("Oldest entry:   {}", format_timestamp_ms(oldest));
            }
            if let Some(newest) = stats.newest_entry {
                println!("Newest entry:   {}", format_timestamp_ms(newest));
            }
        }
    }

    Ok(())
}

/// Clear all cache entries
pub fn clear(opts: &GlobalOptions) -> Result<()> {
    let removed = open(opts)?.clear()?;
    report_removed(opts.format, removed, "Cache was already empty");
    Ok(())
}

/// Remove entries under a key prefix
pub fn invalidate(opts: &GlobalOptions, prefix: &str) -> Result<()> {
    let tag = prefix.split(':').next().unwrap_or_default();
    if Category::from_tag(tag).is_none() {
        eprintln!(
            "{}",
            format!("'{}' does not start with a known category", prefix).dimmed()
        );
    }

    let removed = open(opts)?.invalidate_prefix(prefix);
    report_removed(
        opts.format,
        removed,
        &format!("No cached entries start with '{}'", prefix),
    );
    Ok(())
}

/// Remove one key
pub fn invalidate_key(opts: &GlobalOptions, key: &str) -> Result<()> {
    open(opts)?.invalidate(key);
    match opts.format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "key": key, "success": true })),
        OutputFormat::Table => println!("Removed {}", key),
    }
    Ok(())
}

/// Remove what a pick change in `league_id` makes stale
pub fn invalidate_league(opts: &GlobalOptions, league_id: &str) -> Result<()> {
    let store = open(opts)?;
    for exact in [
        key::league_picks(league_id),
        key::submissions(league_id),
        key::season_table(league_id),
    ] {
        store.invalidate(&exact);
    }
    let removed = store.invalidate_prefix(&key::key_prefix(Category::LeagueTable, &[league_id]))
        + store.invalidate_prefix(&key::key_prefix(Category::ViewerRank, &[league_id]));

    match opts.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "league": league_id, "gameweek_entries_removed": removed, "success": true })
        ),
        OutputFormat::Table => println!("Invalidated cached tables for league {}", league_id),
    }
    Ok(())
}

/// Drop expired and unreadable entries
pub fn purge(opts: &GlobalOptions) -> Result<()> {
    let removed = open(opts)?.purge_expired()?;
    report_removed(opts.format, removed, "Nothing to purge");
    Ok(())
}

/// Show cache path
pub fn path(opts: &GlobalOptions) -> Result<()> {
    println!("{}", cache_dir(&settings(opts))?.display());
    Ok(())
}

fn report_removed(format: OutputFormat, removed: usize, none_message: &str) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "entries_removed": removed, "success": true })
            );
        }
        OutputFormat::Table if removed > 0 => println!("Removed {} cache entries", removed),
        OutputFormat::Table => println!("{}", none_message),
    }
}
