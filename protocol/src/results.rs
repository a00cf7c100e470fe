//! Per-layer results, the composed result handed back to the host, and the
//! metrics record appended to the sink.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::findings::{PolicyViolation, SafetyIssue, SecurityThreat, SkillRequirement};
use crate::hooks::{GateLayer, HookDecision, HookEvent, HookIntent};

/// Layer 1 verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub intent: HookIntent,
    /// `true` when the fast path alone is enough to let the event through.
    pub allow: bool,
    #[serde(default)]
    pub skip_layers: BTreeSet<GateLayer>,
    /// Present only on an explicit denial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Name of the fast-path rule that produced the verdict.
    pub rule: String,
    pub cache_hit: bool,
    pub processing_time_ms: f64,
}

impl RouteResult {
    pub fn skips(&self, layer: GateLayer) -> bool {
        self.skip_layers.contains(&layer)
    }

    /// An explicit denial: not allowed and carrying a reason.
    pub fn is_denied(&self) -> bool {
        !self.allow && self.reason.is_some()
    }
}

/// Layer 2 verdict (policy plus workflow-state checks).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub decision: HookDecision,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<PolicyViolation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skill_requirements: Vec<SkillRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub processing_time_ms: f64,
}

/// Layer 3 verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityResult {
    pub decision: HookDecision,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub threats: Vec<SecurityThreat>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub safety_issues: Vec<SafetyIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub processing_time_ms: f64,
}

/// The only artifact returned to the host for a hook event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedHookResult {
    pub decision: HookDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RouteResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityResult>,
    pub total_time_ms: f64,
    pub fast_path: bool,
    pub cache_hit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Set when an internal fault forced the pipeline to let the event through.
    #[serde(default)]
    pub fail_open: bool,
}

impl UnifiedHookResult {
    /// Result used when the gating infrastructure itself failed.
    pub fn fail_open(diagnostic: impl Into<String>, total_time_ms: f64) -> Self {
        Self {
            decision: HookDecision::Allow,
            routing: None,
            validation: None,
            security: None,
            total_time_ms,
            fast_path: false,
            cache_hit: false,
            reason: Some(diagnostic.into()),
            suggestion: None,
            fail_open: true,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.decision == HookDecision::Block
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerTimings {
    pub routing_ms: Option<f64>,
    pub validation_ms: Option<f64>,
    pub security_ms: Option<f64>,
}

/// Append-only record written to the metrics sink, one per evaluated event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HookMetrics {
    pub timestamp: DateTime<Utc>,
    pub hook_name: String,
    pub decision: HookDecision,
    pub processing_time_ms: f64,
    pub cache_hit: bool,
    pub fast_path: bool,
    pub layer_timings: LayerTimings,
}

impl HookMetrics {
    pub fn from_result(event: &HookEvent, result: &UnifiedHookResult) -> Self {
        Self {
            timestamp: Utc::now(),
            hook_name: format!("{}:{}", event.phase, event.tool_name),
            decision: result.decision,
            processing_time_ms: result.total_time_ms,
            cache_hit: result.cache_hit,
            fast_path: result.fast_path,
            layer_timings: LayerTimings {
                routing_ms: result.routing.as_ref().map(|r| r.processing_time_ms),
                validation_ms: result.validation.as_ref().map(|r| r.processing_time_ms),
                security_ms: result.security.as_ref().map(|r| r.processing_time_ms),
            },
        }
    }
}
