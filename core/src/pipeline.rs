//! The composed four-layer pipeline.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use hookgate_protocol::{
    GateLayer, HookDecision, HookEvent, SecurityResult, UnifiedHookResult, ValidationResult,
};
use tracing::{info, warn};

use crate::config::GateConfig;
use crate::elapsed_ms;
use crate::error::GateError;
use crate::observability::Observer;
use crate::router::{IntentRouter, RouterStats};
use crate::security::SecurityGate;
use crate::validation::WorkflowValidator;
use crate::workflow_state::{FileWorkflowStateStore, WorkflowStateStore};

const DENIED_SUGGESTION: &str = "Use a different tool or ask the user to adjust the hookgate configuration";

/// Owns every layer. Build once per process and share by reference.
#[derive(Debug)]
pub struct HookPipeline {
    config: GateConfig,
    router: IntentRouter,
    validator: WorkflowValidator,
    security: SecurityGate,
    store: Arc<dyn WorkflowStateStore>,
    observer: Observer,
}

impl HookPipeline {
    /// Builds the layers and starts the Layer-4 worker on the current tokio
    /// runtime.
    pub fn new(config: GateConfig, store: Arc<dyn WorkflowStateStore>) -> Self {
        let observer = Observer::spawn(&config, Arc::clone(&store));
        Self {
            router: IntentRouter::new(&config),
            validator: WorkflowValidator::new(),
            security: SecurityGate::new(),
            store,
            observer,
            config,
        }
    }

    /// Pipeline backed by the workflow-state file under the project root.
    pub fn with_file_store(config: GateConfig) -> Self {
        let store = Arc::new(FileWorkflowStateStore::new(config.resolved_state_path()));
        Self::new(config, store)
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Evaluates one event. Never fails: an internal fault (error or panic)
    /// in Layers 1-3 yields `Allow` with `fail_open` set.
    pub fn evaluate(&self, event: &HookEvent) -> UnifiedHookResult {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_layers(event, started)));

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(tool = %event.tool_name, "hook gating failed open: {err}");
                UnifiedHookResult::fail_open(
                    format!("Hook gating failed open: {err}"),
                    elapsed_ms(started),
                )
            }
            Err(payload) => {
                let detail = panic_detail(&*payload);
                warn!(tool = %event.tool_name, "hook gating panicked, failing open: {detail}");
                UnifiedHookResult::fail_open(
                    format!("Hook gating failed open: {detail}"),
                    elapsed_ms(started),
                )
            }
        };

        if result.decision != HookDecision::Allow {
            info!(
                tool = %event.tool_name,
                decision = ?result.decision,
                reason = result.reason.as_deref().unwrap_or_default(),
                "hook event not allowed outright"
            );
        }

        self.observer.dispatch(event, &result);
        result
    }

    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }

    /// Sweeps expired routing verdicts.
    pub fn cleanup_cache(&self) -> usize {
        self.router.cleanup()
    }

    /// Waits for queued observations and writes buffered metrics.
    pub async fn flush_metrics(&self) {
        self.observer.flush().await;
    }

    /// Drains Layer 4 and stops its worker. Later evaluations still return
    /// decisions; their observations are dropped.
    pub async fn shutdown(&self) {
        self.observer.shutdown().await;
    }

    fn run_layers(
        &self,
        event: &HookEvent,
        started: Instant,
    ) -> Result<UnifiedHookResult, GateError> {
        let routing = self.router.route(event)?;
        let mut composed = Composed::default();

        if routing.is_denied() {
            composed.escalate(
                HookDecision::Block,
                routing.reason.clone(),
                Some(DENIED_SUGGESTION.to_string()),
            );
        } else {
            if !routing.skips(GateLayer::Validation) {
                let validation = self.validator.validate(event, self.store.as_ref())?;
                composed.escalate(
                    validation.decision,
                    validation.reason.clone(),
                    validation.suggestion.clone(),
                );
                composed.validation = Some(validation);
            }

            if composed.decision != HookDecision::Block && !routing.skips(GateLayer::Security) {
                let security = self.security.inspect(event)?;
                composed.escalate(
                    security.decision,
                    security.reason.clone(),
                    security.suggestion.clone(),
                );
                composed.security = Some(security);
            }
        }

        let fast_path = composed.validation.is_none() && composed.security.is_none();
        Ok(UnifiedHookResult {
            decision: composed.decision,
            cache_hit: routing.cache_hit,
            routing: Some(routing),
            validation: composed.validation,
            security: composed.security,
            total_time_ms: elapsed_ms(started),
            fast_path,
            reason: composed.reason,
            suggestion: composed.suggestion,
            fail_open: false,
        })
    }
}

/// Running decision while layers execute.
#[derive(Default)]
struct Composed {
    decision: HookDecision,
    reason: Option<String>,
    suggestion: Option<String>,
    validation: Option<ValidationResult>,
    security: Option<SecurityResult>,
}

impl Composed {
    /// Raises the decision; the reason of the first layer to reach the
    /// current level is kept.
    fn escalate(
        &mut self,
        decision: HookDecision,
        reason: Option<String>,
        suggestion: Option<String>,
    ) {
        if decision > self.decision
            || (decision == self.decision && decision != HookDecision::Allow && self.reason.is_none())
        {
            self.decision = self.decision.escalate(decision);
            self.reason = reason;
            self.suggestion = suggestion;
        }
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
