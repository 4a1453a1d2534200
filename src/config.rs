//! Engine configuration.
//!
//! ```
//! use minispark::config::{EngineConfig, MetricsFormat};
//!
//! let cfg = EngineConfig::default()
//!     .with_workers(2)
//!     .with_metrics_log("/tmp/run-metrics.log")
//!     .with_metrics_format(MetricsFormat::JsonLines);
//! assert_eq!(cfg.worker_count(), 2);
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Layout of the metrics log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsFormat {
    /// `RDD <id> Part <p> Trans <code> -- creation <s.us>, scheduled <s.us>, execution (usec) <d>`
    #[default]
    Text,
    /// One JSON object per line.
    JsonLines,
}

/// Configuration for the metrics consumer thread and its log file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Where completed-task metrics are written.
    pub log_path: PathBuf,
    pub format: MetricsFormat,
    /// Log every queued metric before the consumer exits. When `false`,
    /// metrics still queued at shutdown are dropped and counted as discarded.
    pub drain_on_shutdown: bool,
    /// Append to an existing log instead of truncating it.
    pub append: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("metrics.log"),
            format: MetricsFormat::Text,
            drain_on_shutdown: true,
            append: false,
        }
    }
}

/// Configuration for an [`Engine`](crate::engine::Engine).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker thread count. `None` reserves one logical core for the metrics
    /// consumer and uses the rest.
    pub workers: Option<usize>,
    pub metrics: MetricsConfig,
}

impl EngineConfig {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    #[must_use]
    pub fn with_metrics_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics.log_path = path.into();
        self
    }

    #[must_use]
    pub fn with_metrics_format(mut self, format: MetricsFormat) -> Self {
        self.metrics.format = format;
        self
    }

    #[must_use]
    pub fn with_drain_on_shutdown(mut self, drain: bool) -> Self {
        self.metrics.drain_on_shutdown = drain;
        self
    }

    #[must_use]
    pub fn with_append(mut self, append: bool) -> Self {
        self.metrics.append = append;
        self
    }

    /// Effective worker count, never less than one.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| num_cpus::get().saturating_sub(1))
            .max(1)
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON for this type.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading engine config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing engine config {}", path.display()))
    }
}
