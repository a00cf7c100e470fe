//! Read-mostly view of the externally owned workflow-state document and the
//! stores it can be loaded from.
//!
//! Only `evidence.read_log`, `evidence.approved_deviations`, and
//! `baseline.files` are interpreted. Everything else in the document is kept
//! verbatim so write-backs never drop fields owned by the workflow engine.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::StateStoreError;

pub type StateDocument = Map<String, Value>;

/// A section that is missing, `null`, or of the wrong shape reads as its
/// default, so one odd field only disables the check that depends on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowState {
    #[serde(default, deserialize_with = "lenient")]
    pub evidence: Evidence,
    #[serde(default, deserialize_with = "lenient")]
    pub baseline: Baseline,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    /// Non-string entries are skipped.
    #[serde(default, deserialize_with = "string_entries")]
    pub read_log: Vec<String>,
    /// Entries that are not deviation objects are skipped.
    #[serde(default, deserialize_with = "deviation_entries")]
    pub approved_deviations: Vec<ApprovedDeviation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedDeviation {
    #[serde(default, deserialize_with = "lenient")]
    pub deviation: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Baseline {
    /// Locked basenames or paths. Accepts either a map keyed by name or a
    /// plain list of names.
    #[serde(default, deserialize_with = "locked_files")]
    pub files: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value).unwrap_or_else(|err| {
        debug!("ignoring malformed workflow state section: {err}");
        T::default()
    }))
}

fn string_entries<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(entries) => entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::String(entry) => Some(entry),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn deviation_entries<'de, D>(deserializer: D) -> Result<Vec<ApprovedDeviation>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(entries) => entries
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn locked_files<'de, D>(deserializer: D) -> Result<BTreeMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(files) => files.into_iter().collect(),
        Value::Array(names) => names
            .into_iter()
            .filter_map(|name| match name {
                Value::String(name) => Some((name, Value::Bool(true))),
                _ => None,
            })
            .collect(),
        _ => BTreeMap::new(),
    })
}

impl WorkflowState {
    pub fn from_document(document: &StateDocument) -> Result<Self, StateStoreError> {
        serde_json::from_value(Value::Object(document.clone())).map_err(StateStoreError::Schema)
    }

    /// Whether any of `candidates` (raw and resolved spellings of one path)
    /// appears in the read log.
    pub fn has_read(&self, candidates: &[&str]) -> bool {
        self.evidence
            .read_log
            .iter()
            .any(|entry| candidates.contains(&entry.as_str()))
    }

    pub fn is_baseline_locked(&self, candidates: &[&str]) -> bool {
        candidates
            .iter()
            .any(|candidate| self.baseline.files.contains_key(*candidate))
    }

    /// Whether an approved deviation covers creating a file named `basename`.
    pub fn approves_creation_of(&self, basename: &str) -> bool {
        self.evidence.approved_deviations.iter().any(|approval| {
            let deviation = approval.deviation.to_lowercase();
            (!basename.is_empty() && approval.deviation.contains(basename))
                || deviation.contains("newfile")
                || approval
                    .reason
                    .to_lowercase()
                    .contains("approved for creation")
        })
    }
}

/// Durable home of the workflow-state document.
pub trait WorkflowStateStore: Send + Sync + Debug {
    /// The raw document, or `None` when no workflow is active.
    fn load_document(&self) -> Result<Option<StateDocument>, StateStoreError>;

    fn store_document(&self, document: &StateDocument) -> Result<(), StateStoreError>;

    fn load(&self) -> Result<Option<WorkflowState>, StateStoreError> {
        self.load_document()?
            .map(|document| WorkflowState::from_document(&document))
            .transpose()
    }
}

/// JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileWorkflowStateStore {
    path: PathBuf,
}

impl FileWorkflowStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkflowStateStore for FileWorkflowStateStore {
    fn load_document(&self) -> Result<Option<StateDocument>, StateStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateStoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let value: Value =
            serde_json::from_str(&contents).map_err(|source| StateStoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        match value {
            Value::Object(document) => Ok(Some(document)),
            _ => Err(StateStoreError::NotAnObject),
        }
    }

    fn store_document(&self, document: &StateDocument) -> Result<(), StateStoreError> {
        let write_err = |source| StateStoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let mut serialized = serde_json::to_string_pretty(document)?;
        serialized.push('\n');

        // Write-then-rename so readers never observe a truncated document.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serialized).map_err(write_err)?;
        fs::rename(&staging, &self.path).map_err(write_err)?;
        Ok(())
    }
}

/// Process-local store, used when the host hands the document over directly.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStateStore {
    document: Mutex<Option<StateDocument>>,
}

impl InMemoryWorkflowStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store. Non-object values leave it empty.
    pub fn with_document(value: Value) -> Self {
        let document = match value {
            Value::Object(document) => Some(document),
            _ => None,
        };
        Self {
            document: Mutex::new(document),
        }
    }

    pub fn snapshot(&self) -> Option<StateDocument> {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl WorkflowStateStore for InMemoryWorkflowStateStore {
    fn load_document(&self) -> Result<Option<StateDocument>, StateStoreError> {
        Ok(self.snapshot())
    }

    fn store_document(&self, document: &StateDocument) -> Result<(), StateStoreError> {
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(document.clone());
        Ok(())
    }
}
