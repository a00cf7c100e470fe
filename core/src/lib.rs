//! Layered gating for agent tool invocations.
//!
//! A [`HookPipeline`] evaluates each [`hookgate_protocol::HookEvent`] through
//! four layers: intent routing with a verdict cache, workflow policy and
//! state validation, security screening, and a background observer that
//! records metrics and workflow evidence.

pub mod cache;
pub mod config;
pub mod error;
pub mod fields;
pub mod observability;
pub mod patterns;
pub mod pipeline;
pub mod router;
pub mod security;
pub mod validation;
pub mod workflow_state;

use std::time::Instant;

pub use config::GateConfig;
pub use error::{ConfigError, GateError, MetricsLogError, StateStoreError};
pub use pipeline::HookPipeline;
pub use router::{IntentRouter, RouterStats};
pub use workflow_state::{
    FileWorkflowStateStore, InMemoryWorkflowStateStore, WorkflowState, WorkflowStateStore,
};

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
