//! Tunables for the gating pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 5000;
pub const DEFAULT_METRICS_FLUSH_THRESHOLD: usize = 100;
pub const DEFAULT_OBSERVER_QUEUE_CAPACITY: usize = 256;

/// Pipeline configuration. Every field has a default so a partial TOML
/// document (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub project_root: PathBuf,
    pub cache_max_entries: usize,
    pub cache_ttl_ms: u64,
    pub metrics_flush_threshold: usize,
    pub observer_queue_capacity: usize,
    pub state_path: PathBuf,
    pub handoff_path: PathBuf,
    pub metrics_path: PathBuf,
    /// Tool names the router denies outright.
    pub blocked_tools: Vec<String>,
    /// Extra globs appended to the built-in safe-file allowlist.
    pub safe_file_globs: Vec<String>,
    /// Extra programs appended to the built-in read-only command allowlist.
    pub read_only_commands: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            metrics_flush_threshold: DEFAULT_METRICS_FLUSH_THRESHOLD,
            observer_queue_capacity: DEFAULT_OBSERVER_QUEUE_CAPACITY,
            state_path: PathBuf::from(".hookgate/workflow-state.json"),
            handoff_path: PathBuf::from(".hookgate/SESSION_HANDOFF.md"),
            metrics_path: PathBuf::from(".hookgate/metrics.jsonl"),
            blocked_tools: Vec::new(),
            safe_file_globs: Vec::new(),
            read_only_commands: Vec::new(),
        }
    }
}

impl GateConfig {
    /// Configuration rooted at `project_root` with default relative paths.
    pub fn for_project(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(document)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn resolved_state_path(&self) -> PathBuf {
        self.resolve(&self.state_path)
    }

    pub fn resolved_handoff_path(&self) -> PathBuf {
        self.resolve(&self.handoff_path)
    }

    pub fn resolved_metrics_path(&self) -> PathBuf {
        self.resolve(&self.metrics_path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
