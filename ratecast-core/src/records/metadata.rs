//! Record metadata: source attribution and freshness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance attached to every exportable record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub last_updated: DateTime<Utc>,
    pub source: Option<String>,
}

impl Metadata {
    /// Fresh metadata stamped now.
    pub fn now(source: &str) -> Self {
        Self {
            last_updated: Utc::now(),
            source: Some(source.to_string()),
        }
    }

    /// Refresh the `last_updated` stamp after a mutation.
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// RFC 3339 rendering for tabular columns.
    pub fn last_updated_str(&self) -> String {
        self.last_updated.to_rfc3339()
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            source: None,
        }
    }
}
