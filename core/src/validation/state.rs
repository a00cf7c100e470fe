//! Checks that depend on the workflow-state document and the filesystem.

use std::path::{Path, PathBuf};

use hookgate_protocol::{HookEvent, PolicyViolation, Severity, ViolationKind};

use crate::error::GateError;
use crate::fields::{self, FILE_PATH};
use crate::workflow_state::{WorkflowState, WorkflowStateStore};

/// Extensions whose creation needs an approved deviation.
const SIGNIFICANT_EXTENSIONS: &[&str] = &["ts", "js", "py", "sh", "tsx", "jsx"];

#[derive(Debug, Default, Clone)]
pub struct StateValidator;

impl StateValidator {
    pub fn new() -> Self {
        Self
    }

    /// Read-before-write and baseline-lock checks for file mutations.
    /// Events without a target path produce no violations and never touch
    /// the store.
    pub fn check(
        &self,
        event: &HookEvent,
        store: &dyn WorkflowStateStore,
    ) -> Result<Vec<PolicyViolation>, GateError> {
        if !event.intent().is_file_mutation() {
            return Ok(Vec::new());
        }
        let Some(raw_path) = fields::str_field(event, FILE_PATH)? else {
            return Ok(Vec::new());
        };
        let state = store.load()?;
        Ok(self.check_target(event, raw_path, state.as_ref()))
    }

    fn check_target(
        &self,
        event: &HookEvent,
        raw_path: &str,
        state: Option<&WorkflowState>,
    ) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();
        let target = TargetPath::new(raw_path, &event.cwd);

        if target.resolved.exists() {
            if let Some(state) = state {
                if !state.has_read(&target.spellings()) {
                    violations.push(
                        PolicyViolation::new(
                            ViolationKind::ReadBeforeWrite,
                            Severity::Medium,
                            format!("`{raw_path}` is being modified without being read first"),
                        )
                        .with_suggestion("Read the file before editing it"),
                    );
                }
            }
        } else if is_significant(&target.resolved)
            && !state.is_some_and(|state| state.approves_creation_of(&target.basename))
        {
            violations.push(
                PolicyViolation::new(
                    ViolationKind::ReadBeforeWrite,
                    Severity::High,
                    format!("Creating new file `{raw_path}` without an approved deviation"),
                )
                .with_suggestion(format!(
                    "Record an approved deviation (for example `newfile: {}`) before creating it",
                    target.basename
                )),
            );
        }

        if let Some(state) = state {
            let mut candidates = target.spellings();
            candidates.push(&target.basename);
            if state.is_baseline_locked(&candidates) {
                violations.push(
                    PolicyViolation::new(
                        ViolationKind::BaselineLock,
                        Severity::Critical,
                        format!("`{}` is locked by the workflow baseline", target.basename),
                    )
                    .with_suggestion("Baseline files cannot change without unlocking the baseline"),
                );
            }
        }

        violations
    }
}

struct TargetPath<'a> {
    raw: &'a str,
    resolved: PathBuf,
    resolved_display: String,
    basename: String,
}

impl<'a> TargetPath<'a> {
    fn new(raw: &'a str, cwd: &Path) -> Self {
        let path = Path::new(raw);
        let resolved = if path.is_relative() && !cwd.as_os_str().is_empty() {
            cwd.join(path)
        } else {
            path.to_path_buf()
        };
        let basename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            raw,
            resolved_display: resolved.to_string_lossy().into_owned(),
            resolved,
            basename,
        }
    }

    fn spellings(&self) -> Vec<&str> {
        if self.raw == self.resolved_display {
            vec![self.raw]
        } else {
            vec![self.raw, &self.resolved_display]
        }
    }
}

fn is_significant(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SIGNIFICANT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}
