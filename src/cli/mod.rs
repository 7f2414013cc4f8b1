//! CLI command definitions and handlers

use clap::{Parser, Subcommand};

pub mod args;
pub mod cache;
pub mod context;
pub mod init;
pub mod prewarm;
pub mod standings;
pub mod status;

pub use args::{GlobalOptions, OutputFormat};
pub use context::CommandContext;

/// matchday - cache-first companion for prediction leagues
#[derive(Parser, Debug)]
#[command(name = "matchday")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (table, json)
    #[arg(
        long,
        global = true,
        env = "MATCHDAY_FORMAT",
        default_value = "table",
        hide_env = true
    )]
    pub format: OutputFormat,

    /// Act as this user ID instead of the configured viewer
    #[arg(long, global = true, env = "MATCHDAY_VIEWER", hide_env = true)]
    pub viewer: Option<String>,

    /// Override config file location
    #[arg(long, global = true, env = "MATCHDAY_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "MATCHDAY_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Keep the cache in memory for this run (nothing read from or written to disk)
    #[arg(long, global = true, env = "MATCHDAY_NO_CACHE", hide_env = true)]
    pub no_cache: bool,

    /// Backend URL override (development/testing)
    #[arg(long, global = true, env = "MATCHDAY_BACKEND_URL", hide = true)]
    pub backend_url: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize matchday configuration
    Init,

    /// Show configuration and cache status
    Status,

    /// Display version information
    Version,

    /// Load the viewer's leagues, tables and chat into the cache
    #[command(after_help = "\
Examples:
  matchday prewarm
  matchday prewarm --timeout 30 --viewer 4f1c...")]
    Prewarm {
        /// Seconds to wait before returning (the prewarm keeps running until the process exits)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show a league table: cached copy first, then any update
    Standings {
        /// League ID
        league: String,

        /// Current gameweek table instead of the season table
        #[arg(long, short = 'g')]
        gameweek: bool,
    },

    /// Manage the local cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Status,
    /// Clear all cached data
    Clear,
    /// Print cache directory path
    Path,
    /// Remove cached entries by key prefix, exact key, or league
    #[command(after_help = "\
Examples:
  matchday cache invalidate chat:
  matchday cache invalidate gw-current:amy --exact
  matchday cache invalidate --league <LEAGUE_ID>   # after picks change")]
    Invalidate {
        /// Key prefix (e.g. `chat:` or `season-table:`), or a full key with --exact
        #[arg(required_unless_present = "league")]
        prefix: Option<String>,

        /// Remove exactly this key instead of everything under the prefix
        #[arg(long, requires = "prefix")]
        exact: bool,

        /// Remove the picks, submissions and derived tables of one league
        #[arg(long, conflicts_with = "prefix")]
        league: Option<String>,
    },
    /// Drop expired and unreadable entries
    Purge,
}
