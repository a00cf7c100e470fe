//! Layer 2: workflow policy and state validation.

mod policy;
mod state;

use std::time::Instant;

use hookgate_protocol::{HookDecision, HookEvent, PolicyViolation, Severity, ValidationResult};

pub use policy::{PolicyReport, PolicyValidator};
pub use state::StateValidator;

use crate::elapsed_ms;
use crate::error::GateError;
use crate::workflow_state::WorkflowStateStore;

#[derive(Debug, Default)]
pub struct WorkflowValidator {
    policy: PolicyValidator,
    state: StateValidator,
}

impl WorkflowValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs policy checks, then state checks, and derives the layer decision
    /// from the worst violation. The workflow state is loaded only when a
    /// state check needs it.
    pub fn validate(
        &self,
        event: &HookEvent,
        store: &dyn WorkflowStateStore,
    ) -> Result<ValidationResult, GateError> {
        let started = Instant::now();

        let PolicyReport {
            mut violations,
            skill_requirements,
        } = self.policy.check(event);
        violations.extend(self.state.check(event, store)?);

        let (decision, lead) = decide(&violations);
        Ok(ValidationResult {
            decision,
            reason: lead.map(|violation| violation.message.clone()),
            suggestion: lead.and_then(|violation| violation.suggestion.clone()),
            violations,
            skill_requirements,
            processing_time_ms: elapsed_ms(started),
        })
    }
}

/// Critical blocks; high and medium warn; low is informational. The leading
/// violation is the first one at the worst severity present.
fn decide(violations: &[PolicyViolation]) -> (HookDecision, Option<&PolicyViolation>) {
    let Some(worst) = violations.iter().map(|violation| violation.severity).max() else {
        return (HookDecision::Allow, None);
    };
    let decision = match worst {
        Severity::Critical => HookDecision::Block,
        Severity::High | Severity::Medium => HookDecision::Warning,
        Severity::Low => return (HookDecision::Allow, None),
    };
    let lead = violations.iter().find(|violation| violation.severity == worst);
    (decision, lead)
}
