//! Layer 3: injection, credential-leak, and destructive-operation screening.

mod injection;
mod leakage;
mod safety;

use std::time::Instant;

use hookgate_protocol::{
    HookDecision, HookEvent, HookIntent, SafetyIssue, SecurityResult, SecurityThreat, Severity,
    ThreatCategory,
};

pub use injection::InjectionDetector;
pub use leakage::SecretScanner;
pub use safety::SafetyScanner;

use crate::elapsed_ms;
use crate::error::GateError;
use crate::fields::{self, COMMAND, FILE_PATH};

/// Classification attached to a threat rule row.
#[derive(Debug, Clone, Copy)]
pub struct ThreatClass {
    pub category: ThreatCategory,
    pub severity: Severity,
    pub description: &'static str,
}

impl ThreatClass {
    fn to_threat(self, pattern: &str) -> SecurityThreat {
        SecurityThreat {
            category: self.category,
            severity: self.severity,
            description: self.description.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecurityGate {
    injection: InjectionDetector,
    secrets: SecretScanner,
    safety: SafetyScanner,
}

impl SecurityGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inspect(&self, event: &HookEvent) -> Result<SecurityResult, GateError> {
        let started = Instant::now();
        let intent = event.intent();
        let mut threats = Vec::new();
        let mut safety_issues = Vec::new();

        if let Some(command) = fields::str_field(event, COMMAND)? {
            if intent == HookIntent::Bash {
                threats.extend(self.injection.scan_command(command));
                safety_issues.extend(self.safety.scan_command(command));
            }
            threats.extend(self.secrets.scan(command));
        }

        if intent.is_file_mutation() {
            if let Some(written) = fields::written_text(event)? {
                threats.extend(self.injection.scan_written(&written));
                threats.extend(self.secrets.scan(&written));
                safety_issues.extend(self.safety.scan_written(&written));
            }
        }

        if let Some(path) = fields::str_field(event, FILE_PATH)? {
            threats.extend(self.injection.scan_path(path));
        }

        let (decision, reason, suggestion) = decide(&threats, &safety_issues);
        Ok(SecurityResult {
            decision,
            threats,
            safety_issues,
            reason,
            suggestion,
            processing_time_ms: elapsed_ms(started),
        })
    }
}

/// Critical blocks and high warns. The reason comes from the first item at
/// the worst severity, threats ahead of safety issues.
fn decide(
    threats: &[SecurityThreat],
    safety_issues: &[SafetyIssue],
) -> (HookDecision, Option<String>, Option<String>) {
    for (severity, decision) in [
        (Severity::Critical, HookDecision::Block),
        (Severity::High, HookDecision::Warning),
    ] {
        if let Some(threat) = threats.iter().find(|t| t.severity == severity) {
            return (
                decision,
                Some(format!("Security threat: {}", threat.description)),
                Some(threat_suggestion(threat.category).to_string()),
            );
        }
        if let Some(issue) = safety_issues.iter().find(|i| i.severity == severity) {
            return (
                decision,
                Some(format!("Safety issue: {}", issue.description)),
                Some("Rewrite the operation so it is scoped and reversible".to_string()),
            );
        }
    }
    (HookDecision::Allow, None, None)
}

fn threat_suggestion(category: ThreatCategory) -> &'static str {
    match category {
        ThreatCategory::Injection => "Run each command separately without chaining or substitution",
        ThreatCategory::SecretLeakage => {
            "Load credentials from the environment or a secret store instead of inlining them"
        }
        ThreatCategory::PrivilegeEscalation => "Run the command without elevated privileges",
        ThreatCategory::DataExfiltration => "Do not send local files to remote hosts",
    }
}
