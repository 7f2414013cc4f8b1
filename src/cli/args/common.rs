//! Common CLI types shared across commands

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Table format - human-readable tables (default)
    #[default]
    Table,
    /// JSON format - structured for scripts
    Json,
}
