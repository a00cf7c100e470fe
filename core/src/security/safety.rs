use hookgate_protocol::{SafetyIssue, SafetyIssueKind, Severity};

use crate::patterns::{PatternTable, RuleSpec};

#[derive(Debug, Clone, Copy)]
pub struct SafetyClass {
    kind: SafetyIssueKind,
    severity: Severity,
    description: &'static str,
    marker: Option<&'static str>,
}

const fn issue(
    kind: SafetyIssueKind,
    severity: Severity,
    description: &'static str,
    marker: Option<&'static str>,
) -> SafetyClass {
    SafetyClass {
        kind,
        severity,
        description,
        marker,
    }
}

/// Characters that betray text pasted from a lossy or rich-text source.
const COPY_MARKER_RULES: &[RuleSpec<SafetyClass>] = &[
    (
        "replacement_character",
        r"\x{FFFD}",
        issue(
            SafetyIssueKind::CopyMarker,
            Severity::High,
            "Content contains the Unicode replacement character",
            Some("U+FFFD"),
        ),
    ),
    (
        "ideographic_space",
        r"\x{3000}",
        issue(
            SafetyIssueKind::CopyMarker,
            Severity::Medium,
            "Content contains an ideographic space",
            Some("U+3000"),
        ),
    ),
];

const DESTRUCTIVE_RULES: &[RuleSpec<SafetyClass>] = &[
    (
        "root_deletion",
        concat!(
            r"\brm\s+(?:-{1,2}[\w-]+\s+)*(?:-[a-zA-Z]*[rR][a-zA-Z]*|--recursive)\s+",
            r"(?:-{1,2}[\w-]+\s+)*(?:/\*?|~/?)(?:\s|$|[;&|])",
        ),
        issue(
            SafetyIssueKind::DestructiveOperation,
            Severity::Critical,
            "Recursive deletion of the filesystem root or home directory",
            None,
        ),
    ),
    (
        "fork_bomb",
        r":\(\)\s*\{\s*:\s*\|\s*:?\s*&\s*\}\s*;\s*:",
        issue(
            SafetyIssueKind::ResourceExhaustion,
            Severity::Critical,
            "Fork bomb",
            None,
        ),
    ),
    (
        "raw_disk_wipe",
        r"\bdd\b[^;&|]*\bof=/dev/(?:sd[a-z]|hd[a-z]|nvme\d|disk\d|mmcblk\d)|>\s*/dev/sd[a-z]\b",
        issue(
            SafetyIssueKind::DestructiveOperation,
            Severity::Critical,
            "Raw write to a block device",
            None,
        ),
    ),
    (
        "make_filesystem",
        r"\bmkfs(?:\.[a-z0-9]+)?\b",
        issue(
            SafetyIssueKind::DestructiveOperation,
            Severity::Critical,
            "Filesystem creation over an existing device",
            None,
        ),
    ),
    (
        "world_writable_root",
        r"\bchmod\s+(?:-[a-zA-Z]+\s+)*0?777\s+/(?:\s|$|[;&|])",
        issue(
            SafetyIssueKind::UnsafeExecution,
            Severity::High,
            "Filesystem root made world-writable",
            None,
        ),
    ),
];

#[derive(Debug, Clone)]
pub struct SafetyScanner {
    copy_markers: PatternTable<SafetyClass>,
    destructive: PatternTable<SafetyClass>,
}

impl Default for SafetyScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyScanner {
    pub fn new() -> Self {
        Self {
            copy_markers: PatternTable::compile(COPY_MARKER_RULES),
            destructive: PatternTable::compile(DESTRUCTIVE_RULES),
        }
    }

    pub fn scan_written(&self, content: &str) -> Vec<SafetyIssue> {
        collect(&self.copy_markers, content)
    }

    pub fn scan_command(&self, command: &str) -> Vec<SafetyIssue> {
        collect(&self.destructive, command)
    }
}

fn collect(table: &PatternTable<SafetyClass>, text: &str) -> Vec<SafetyIssue> {
    table
        .matches(text)
        .map(|rule| SafetyIssue {
            kind: rule.classification.kind,
            severity: rule.classification.severity,
            description: rule.classification.description.to_string(),
            marker: rule.classification.marker.map(str::to_string),
        })
        .collect()
}
