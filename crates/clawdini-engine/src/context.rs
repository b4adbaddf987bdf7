//! Shared execution context — what every node executor sees

use crate::scope::StateStore;
use clawdini_core::{NodePayload, RunEvent, SessionKey};
use clawdini_gateway::Gateway;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Concurrent-safe sink for run-scoped events. Shared between a runner and
/// any child runners it spawns.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit an event. Delivery failures mean every subscriber is gone; the
    /// run keeps executing regardless.
    pub fn emit(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}

/// An in-flight gateway chat operation, kept for cancellation.
#[derive(Debug, Clone)]
pub struct ChatHandle {
    pub chat_run_id: String,
    pub session_key: SessionKey,
}

/// One enabled in-edge delivering a completed upstream payload.
#[derive(Debug, Clone)]
pub struct EdgeInput {
    pub edge_id: String,
    pub source: String,
    pub source_name: String,
    pub payload: NodePayload,
}

impl EdgeInput {
    /// Synthetic input used for root nodes fed by the run's global input.
    pub fn global(text: impl Into<String>) -> Self {
        Self {
            edge_id: String::new(),
            source: String::new(),
            source_name: "input".into(),
            payload: NodePayload::from_text(text),
        }
    }
}

/// What an executor hands back to the scheduler. Executors never touch the
/// runner's maps directly; edge-disabling decisions travel here.
#[derive(Debug, Default)]
pub struct ExecOutcome {
    pub payload: NodePayload,
    pub disable_edges: Vec<String>,
}

impl ExecOutcome {
    pub fn payload(payload: NodePayload) -> Self {
        Self {
            payload,
            disable_edges: Vec::new(),
        }
    }
}

/// Per-run context shared by all executors of one runner.
#[derive(Clone)]
pub struct ExecutorContext {
    pub run_id: String,
    pub gateway: Arc<dyn Gateway>,
    pub events: EventSink,
    pub state: Arc<StateStore>,
    /// In-flight chat operations by node id, drained on cancellation.
    pub inflight: Arc<DashMap<String, ChatHandle>>,
    pub cancel: CancellationToken,
}
