//! Hook event payload and the decision vocabulary shared by every layer.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display};

/// Lifecycle phase at which the host raised the event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "PascalCase")]
pub enum HookPhase {
    PreToolUse,
    PostToolUse,
    SessionStart,
    Stop,
}

/// A single tool-invocation attempt as reported by the host runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HookEvent {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "tool_name")]
    pub tool_name: String,
    #[serde(default, alias = "tool_input")]
    pub tool_input: Map<String, Value>,
    #[serde(alias = "hook_event_name")]
    pub phase: HookPhase,
    #[serde(default)]
    pub cwd: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "session_id")]
    pub session_id: Option<String>,
}

impl HookEvent {
    pub fn new(tool_name: impl Into<String>, phase: HookPhase) -> Self {
        Self {
            timestamp: Utc::now(),
            tool_name: tool_name.into(),
            tool_input: Map::new(),
            phase,
            cwd: PathBuf::new(),
            session_id: None,
        }
    }

    /// Convenience constructor for the common `PreToolUse` case.
    pub fn pre_tool_use(tool_name: impl Into<String>) -> Self {
        Self::new(tool_name, HookPhase::PreToolUse)
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tool_input.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Raw input value for `key`, if the host supplied one.
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.tool_input.get(key)
    }

    pub fn intent(&self) -> HookIntent {
        HookIntent::from_tool_name(&self.tool_name)
    }
}

/// Coarse classification of what a tool invocation is about to do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HookIntent {
    Read,
    Write,
    Edit,
    Bash,
    Skill,
    Glob,
    Grep,
    Deviation,
    Unknown,
}

impl HookIntent {
    pub fn from_tool_name(tool_name: &str) -> Self {
        match tool_name {
            "Read" => HookIntent::Read,
            "Write" => HookIntent::Write,
            "Edit" | "MultiEdit" => HookIntent::Edit,
            "Bash" => HookIntent::Bash,
            "Skill" => HookIntent::Skill,
            "Glob" => HookIntent::Glob,
            "Grep" => HookIntent::Grep,
            "Deviation" => HookIntent::Deviation,
            _ => HookIntent::Unknown,
        }
    }

    /// Whether the intent mutates a file on disk.
    pub fn is_file_mutation(self) -> bool {
        matches!(self, HookIntent::Write | HookIntent::Edit)
    }
}

/// Verdict rendered for a hook event. Variants are declared in escalation
/// order so the derived `Ord` gives `Allow < Warning < Block`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HookDecision {
    #[default]
    Allow,
    Warning,
    Block,
}

impl HookDecision {
    /// Returns the stricter of the two decisions. Never de-escalates.
    pub fn escalate(self, other: HookDecision) -> HookDecision {
        self.max(other)
    }

    /// `Allow` and `Warning` both let the tool run.
    pub fn permits_execution(self) -> bool {
        !matches!(self, HookDecision::Block)
    }
}

/// Pipeline layers, numbered 1 through 4.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GateLayer {
    Routing,
    Validation,
    Security,
    Observability,
}

impl GateLayer {
    pub fn number(self) -> u8 {
        match self {
            GateLayer::Routing => 1,
            GateLayer::Validation => 2,
            GateLayer::Security => 3,
            GateLayer::Observability => 4,
        }
    }
}
