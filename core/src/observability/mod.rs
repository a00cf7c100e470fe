//! Layer 4: metrics, workflow-state write-back, and context hygiene.
//!
//! Everything here runs on a background worker fed by a bounded channel.
//! Nothing in this layer can alter a decision that has already been
//! returned; failures are logged and dropped.

mod context_quality;
mod log_writer;
mod metrics;
mod persistence;

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use hookgate_protocol::{HookDecision, HookEvent, HookIntent, HookMetrics, HookPhase, UnifiedHookResult};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use context_quality::{ContextQualityChecker, ContextQualityReport};
pub use log_writer::MetricsLogWriter;
pub use metrics::MetricsRecorder;
pub use persistence::{LAST_UPDATED_KEY, StatePersistence};

use crate::config::GateConfig;
use crate::fields::{self, FILE_PATH};
use crate::workflow_state::WorkflowStateStore;

/// An evaluated event handed to the worker.
#[derive(Debug)]
struct Observation {
    event: HookEvent,
    result: UnifiedHookResult,
}

#[derive(Debug)]
enum ObserverMessage {
    Observe(Box<Observation>),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the Layer-4 worker.
#[derive(Debug)]
pub struct Observer {
    sender: mpsc::Sender<ObserverMessage>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Observer {
    /// Spawns the worker on the current tokio runtime. Without a runtime the
    /// observer is inert and every dispatch is dropped.
    pub fn spawn(config: &GateConfig, store: Arc<dyn WorkflowStateStore>) -> Self {
        let (sender, receiver) = mpsc::channel(config.observer_queue_capacity.max(1));
        let worker = ObserverWorker {
            metrics: MetricsRecorder::new(
                MetricsLogWriter::new(config.resolved_metrics_path()),
                config.metrics_flush_threshold,
            ),
            persistence: StatePersistence::new(store, config.resolved_handoff_path()),
            quality: ContextQualityChecker::new(),
        };

        let handle = match Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(worker.run(receiver))),
            Err(err) => {
                warn!("hook observer disabled, no tokio runtime: {err}");
                None
            }
        };

        Self {
            sender,
            worker: Mutex::new(handle),
        }
    }

    /// Queues an evaluated event without waiting. A full or closed queue
    /// drops the observation.
    pub fn dispatch(&self, event: &HookEvent, result: &UnifiedHookResult) {
        let message = ObserverMessage::Observe(Box::new(Observation {
            event: event.clone(),
            result: result.clone(),
        }));
        match self.sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(tool = %event.tool_name, "hook observer queue full; dropping observation");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(tool = %event.tool_name, "hook observer stopped; dropping observation");
            }
        }
    }

    /// Waits until everything queued so far is processed and the metrics
    /// buffer is written out.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(ObserverMessage::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Drains the queue, flushes metrics, and stops the worker.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(ObserverMessage::Shutdown(ack)).await.is_ok() {
            let _ = done.await;
        }

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!("hook observer worker ended abnormally: {err}");
            }
        }
    }
}

#[derive(Debug)]
struct ObserverWorker {
    metrics: MetricsRecorder,
    persistence: StatePersistence,
    quality: ContextQualityChecker,
}

impl ObserverWorker {
    async fn run(mut self, mut receiver: mpsc::Receiver<ObserverMessage>) {
        let mut shutdown_acks = Vec::new();
        while let Some(message) = receiver.recv().await {
            match message {
                ObserverMessage::Observe(observation) => self.observe(*observation).await,
                ObserverMessage::Flush(ack) => {
                    self.flush_metrics().await;
                    let _ = ack.send(());
                }
                ObserverMessage::Shutdown(ack) => {
                    shutdown_acks.push(ack);
                    receiver.close();
                }
            }
        }

        self.flush_metrics().await;
        for ack in shutdown_acks {
            let _ = ack.send(());
        }
    }

    async fn observe(&mut self, observation: Observation) {
        let Observation { event, result } = observation;

        if let Err(err) = self
            .metrics
            .record(HookMetrics::from_result(&event, &result))
            .await
        {
            warn!("failed to record hook metrics: {err}");
        }

        let mut state_changed = false;
        if event.intent() == HookIntent::Read && result.decision != HookDecision::Block {
            state_changed = self.record_read(&event).await;
        }

        if result.decision.permits_execution() {
            let report = self.quality.check(&event);
            if !report.is_empty() {
                info!(
                    tool = %event.tool_name,
                    issues = ?report.issues,
                    recommendations = ?report.recommendations,
                    "context quality"
                );
            }
        }

        if state_changed || event.phase == HookPhase::Stop {
            match self.persistence.touch_handoff().await {
                Ok(true) => debug!(path = %self.persistence.handoff_path().display(), "handoff timestamp updated"),
                Ok(false) => {}
                Err(err) => warn!("failed to update session handoff: {err}"),
            }
        }
    }

    async fn record_read(&self, event: &HookEvent) -> bool {
        let Ok(Some(path)) = fields::str_field(event, FILE_PATH) else {
            return false;
        };
        // Raw and cwd-resolved spellings both go into the read log.
        let mut spellings = vec![path.to_string()];
        if Path::new(path).is_relative() && !event.cwd.as_os_str().is_empty() {
            spellings.push(event.cwd.join(path).to_string_lossy().into_owned());
        }
        let persistence = self.persistence.clone();

        match tokio::task::spawn_blocking(move || persistence.add_to_read_log(&spellings)).await {
            Ok(Ok(added)) => added,
            Ok(Err(err)) => {
                warn!("failed to record read in workflow state: {err}");
                false
            }
            Err(err) => {
                warn!("workflow state update task failed: {err}");
                false
            }
        }
    }

    async fn flush_metrics(&mut self) {
        if let Err(err) = self.metrics.flush().await {
            warn!("failed to flush hook metrics: {err}");
        }
    }
}
