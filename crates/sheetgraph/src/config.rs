//! Configuration file handling.
//!
//! Configuration lives in a YAML file (`sheetgraph.yaml` by default). Every
//! field is optional; a missing file means all defaults.
//!
//! ```yaml
//! impact-depth: 10
//! query-depth: 5
//! dependency-source-limit: 10
//! visualize-edge-limit: 100
//! query-timeout-ms: 5000
//! notify-timeout-ms: 1000
//! snapshot-dir: snapshots
//! ```

use crate::error::{Error, Result};
use crate::query::{DEFAULT_QUERY_DEPTH, DEFAULT_SOURCE_LIMIT, TranslateOptions};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Default name of the configuration file
pub const CONFIG_FILE_NAME: &str = "sheetgraph.yaml";

/// Default depth bound of the change impact traversal
pub const DEFAULT_IMPACT_DEPTH: usize = crate::propagator::DEFAULT_IMPACT_DEPTH;

/// Default edge cap of the visualization sample
pub const DEFAULT_VISUALIZE_EDGE_LIMIT: usize = 100;

/// Default query traversal budget in milliseconds
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;

/// Default per-subscriber notification send budget in milliseconds
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 1_000;

/// Default directory holding `<spreadsheet-id>.json` snapshots
pub const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";

/// Configuration file structure for sheetgraph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SheetgraphConfig {
    /// Depth bound of the impact traversal run for each change event
    pub impact_depth: usize,

    /// Depth bound of dependency and impact queries
    pub query_depth: usize,

    /// Source cap of the global dependency listing
    pub dependency_source_limit: usize,

    /// Edge cap of the visualization sample
    pub visualize_edge_limit: usize,

    /// Budget of a single query or traversal, in milliseconds
    pub query_timeout_ms: u64,

    /// Budget of a single subscriber send, in milliseconds
    pub notify_timeout_ms: u64,

    /// Directory the JSON snapshot source reads from
    pub snapshot_dir: PathBuf,
}

impl Default for SheetgraphConfig {
    fn default() -> Self {
        Self {
            impact_depth: DEFAULT_IMPACT_DEPTH,
            query_depth: DEFAULT_QUERY_DEPTH,
            dependency_source_limit: DEFAULT_SOURCE_LIMIT,
            visualize_edge_limit: DEFAULT_VISUALIZE_EDGE_LIMIT,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            notify_timeout_ms: DEFAULT_NOTIFY_TIMEOUT_MS,
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
        }
    }
}

impl SheetgraphConfig {
    /// Load and validate configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config` if
    /// it is not valid YAML or fails validation.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Same as [`SheetgraphConfig::load`], except a missing file is not an error.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path).await {
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Save configuration to a file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Reject zero depths, limits and timeouts.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("impact-depth", self.impact_depth as u64),
            ("query-depth", self.query_depth as u64),
            ("dependency-source-limit", self.dependency_source_limit as u64),
            ("visualize-edge-limit", self.visualize_edge_limit as u64),
            ("query-timeout-ms", self.query_timeout_ms),
            ("notify-timeout-ms", self.notify_timeout_ms),
        ];
        if let Some((name, _)) = checks.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Config(format!("{name} must be greater than zero")));
        }
        Ok(())
    }

    /// Translation bounds derived from this configuration.
    pub fn translate_options(&self) -> TranslateOptions {
        TranslateOptions {
            query_depth: self.query_depth,
            source_limit: self.dependency_source_limit,
        }
    }

    /// Query and traversal budget.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Per-subscriber send budget.
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}
