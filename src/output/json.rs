//! JSON output formatting

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Wrapper for JSON output with metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T> {
    pub data: T,
    pub meta: Metadata,
}

/// Metadata included in JSON output
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// When the output was produced
    pub timestamp: String,

    /// CLI version
    pub version: String,

    /// Whether a list was served from the local cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<bool>,

    /// Whether another page is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

impl<T> JsonOutput<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: Metadata {
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Metadata::default()
            },
        }
    }

    /// Attach paging information for a thread list.
    pub fn with_page(mut self, from_cache: bool, has_more: bool) -> Self {
        self.meta.from_cache = Some(from_cache);
        self.meta.has_more = Some(has_more);
        self
    }
}

/// Format data as pretty-printed JSON
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonOutput::new(data))
}

/// Format one page of a list with its cache and paging flags
pub fn format_page<T: Serialize + ?Sized>(
    data: &T,
    from_cache: bool,
    has_more: bool,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonOutput::new(data).with_page(from_cache, has_more))
}
