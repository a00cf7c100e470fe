//! Write-back of workflow state and the session handoff note.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::StateStoreError;
use crate::workflow_state::{StateDocument, WorkflowStateStore};

pub const LAST_UPDATED_KEY: &str = "last_updated";
const EVIDENCE_KEY: &str = "evidence";
const READ_LOG_KEY: &str = "read_log";

static HANDOFF_LAST_UPDATED: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?im)^(\s*(?:[-*]\s+)?(?:\*\*)?last updated(?:\*\*)?\s*:\s*(?:\*\*)?\s*).*$").ok()
});

#[derive(Debug, Clone)]
pub struct StatePersistence {
    store: Arc<dyn WorkflowStateStore>,
    handoff_path: PathBuf,
}

impl StatePersistence {
    pub fn new(store: Arc<dyn WorkflowStateStore>, handoff_path: PathBuf) -> Self {
        Self {
            store,
            handoff_path,
        }
    }

    pub fn handoff_path(&self) -> &Path {
        &self.handoff_path
    }

    /// Shallow-merges `partial` into the stored document and writes it back.
    ///
    /// Top-level keys replace their counterparts wholesale, except
    /// `evidence`, whose own keys are merged one level deep. The
    /// `last_updated` timestamp is always bumped.
    pub fn update(&self, partial: Map<String, Value>) -> Result<StateDocument, StateStoreError> {
        let mut document = self.store.load_document()?.unwrap_or_default();
        merge_shallow(&mut document, partial);
        document.insert(
            LAST_UPDATED_KEY.to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        self.store.store_document(&document)?;
        Ok(document)
    }

    /// Records every spelling in `paths` in `evidence.read_log`. Returns
    /// `false` when all were already logged or no workflow is active.
    pub fn add_to_read_log<P: AsRef<str>>(&self, paths: &[P]) -> Result<bool, StateStoreError> {
        let Some(document) = self.store.load_document()? else {
            return Ok(false);
        };

        let mut read_log: Vec<Value> = document
            .get(EVIDENCE_KEY)
            .and_then(|evidence| evidence.get(READ_LOG_KEY))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let before = read_log.len();
        for path in paths {
            let path: &str = path.as_ref();
            if path.is_empty() || read_log.iter().any(|entry| entry.as_str() == Some(path)) {
                continue;
            }
            read_log.push(Value::String(path.to_string()));
        }
        let added = read_log.len() - before;
        if added == 0 {
            return Ok(false);
        }

        let mut evidence = Map::new();
        evidence.insert(READ_LOG_KEY.to_string(), Value::Array(read_log));
        let mut partial = Map::new();
        partial.insert(EVIDENCE_KEY.to_string(), Value::Object(evidence));
        self.update(partial)?;
        debug!(added, "recorded read in workflow evidence");
        Ok(true)
    }

    /// Rewrites the first "Last Updated" line of the handoff note. A missing
    /// note or a note without that line is left alone.
    pub async fn touch_handoff(&self) -> io::Result<bool> {
        let contents = match tokio::fs::read_to_string(&self.handoff_path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };
        let Some(pattern) = HANDOFF_LAST_UPDATED.as_ref() else {
            return Ok(false);
        };
        if !pattern.is_match(&contents) {
            return Ok(false);
        }

        let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let rewritten = pattern.replace(&contents, |caps: &regex::Captures<'_>| {
            format!("{}{stamp}", &caps[1])
        });
        tokio::fs::write(&self.handoff_path, rewritten.as_bytes()).await?;
        Ok(true)
    }
}

fn merge_shallow(document: &mut StateDocument, partial: Map<String, Value>) {
    for (key, value) in partial {
        if key == EVIDENCE_KEY {
            if let (Some(Value::Object(existing)), Value::Object(incoming)) =
                (document.get_mut(&key), &value)
            {
                existing.extend(incoming.clone());
                continue;
            }
        }
        document.insert(key, value);
    }
}
