//! TOML-backed runtime configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Runtime settings. Every field has a default so a partial TOML file
/// (or none at all) yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Retry policy applied to all provider calls.
    pub retry: RetryPolicy,
    /// Sleep a short random interval between provider requests.
    pub courtesy_delay: bool,
    /// Annual risk-free rate used by the Sharpe ratio.
    pub risk_free_rate: f64,
    /// Base directory for JSON and Parquet output.
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            courtesy_delay: true,
            risk_free_rate: 0.0,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Settings(format!("read {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| Error::Settings(format!("parse {}: {e}", path.display())))
    }
}
