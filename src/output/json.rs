//! JSON output formatting

use chrono::Utc;
use serde::Serialize;

/// Wrapper for JSON output with metadata
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub data: T,
    pub meta: Metadata,
}

/// Metadata included in JSON output
#[derive(Debug, Serialize)]
pub struct Metadata {
    /// When this document was produced (RFC 3339)
    pub timestamp: String,

    /// CLI version
    pub version: String,

    /// Set when `data` came from the local cache: how old it is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_age_ms: Option<u64>,
}

impl<T> JsonOutput<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: Metadata {
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                cached_age_ms: None,
            },
        }
    }

    pub fn cached(data: T, age_ms: u64) -> Self {
        let mut output = Self::new(data);
        output.meta.cached_age_ms = Some(age_ms);
        output
    }
}

/// Format data as pretty-printed JSON
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonOutput::new(data))
}

/// Format a cached value, recording its age in the metadata
pub fn format_json_cached<T: Serialize + ?Sized>(
    data: &T,
    age_ms: u64,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonOutput::cached(data, age_ms))
}
