//! Global CLI options shared across all commands

use crate::cli::{Cli, OutputFormat};

/// Global CLI options passed to all command handlers.
///
/// Precedence is CLI flag > environment variable > config file > default.
/// This struct captures the CLI/env layer; config defaults are applied in
/// `CommandContext`.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    /// Output format (table, json)
    pub format: OutputFormat,

    /// Viewer (user ID) override
    pub viewer: Option<String>,

    /// Custom config file path (defaults to ~/.matchday/config.yaml)
    pub config: Option<String>,

    /// Use an in-memory cache for this run only
    pub no_cache: bool,

    /// Backend URL override for development/testing
    pub backend_url: Option<String>,
}

impl GlobalOptions {
    /// Build from the parsed CLI, once in main.rs.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            viewer: cli.viewer.clone(),
            config: cli.config.clone(),
            no_cache: cli.no_cache,
            backend_url: cli.backend_url.clone(),
        }
    }

    pub fn viewer_ref(&self) -> Option<&str> {
        self.viewer.as_deref()
    }

    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn backend_url_ref(&self) -> Option<&str> {
        self.backend_url.as_deref()
    }
}
