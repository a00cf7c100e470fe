//! Wire types exchanged between the host agent runtime and the hookgate
//! pipeline.

pub mod findings;
pub mod hooks;
pub mod results;

pub use findings::{
    PolicyViolation, SafetyIssue, SafetyIssueKind, SecurityThreat, Severity, SkillRequirement,
    ThreatCategory, ViolationKind,
};
pub use hooks::{GateLayer, HookDecision, HookEvent, HookIntent, HookPhase};
pub use results::{
    HookMetrics, LayerTimings, RouteResult, SecurityResult, UnifiedHookResult, ValidationResult,
};
