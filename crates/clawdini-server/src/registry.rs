//! Run registry & subscription bus
//!
//! Maps run ids to live runners, buffers each run's recent events so a
//! subscriber that attaches late misses nothing, and broadcasts live events
//! to every attached observer. Runs linger for a grace window after their
//! terminal event so late subscribers can still drain the buffer.

use clawdini_core::{Error, Graph, Result, RunEvent};
use clawdini_engine::{EventSink, GraphRunner, RunnerHandle};
use clawdini_gateway::Gateway;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Most recent events kept per run.
const EVENT_BUFFER: usize = 500;
/// How long a terminated run stays subscribable.
const RETAIN_AFTER_TERMINAL: Duration = Duration::from_secs(10);

struct RunState {
    handle: RunnerHandle,
    /// Ring buffer of recent events. The same lock serializes buffer pushes
    /// and subscriber attachment, so a subscriber sees every event exactly
    /// once across replay + live.
    buffer: Mutex<VecDeque<RunEvent>>,
    live_tx: broadcast::Sender<RunEvent>,
}

/// Owns every active run.
pub struct RunRegistry {
    gateway: Arc<dyn Gateway>,
    runs: Arc<DashMap<String, Arc<RunState>>>,
    retention: Duration,
}

impl RunRegistry {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_retention(gateway, RETAIN_AFTER_TERMINAL)
    }

    /// Registry with a custom post-terminal retention window.
    pub fn with_retention(gateway: Arc<dyn Gateway>, retention: Duration) -> Self {
        Self {
            gateway,
            runs: Arc::new(DashMap::new()),
            retention,
        }
    }

    pub fn gateway(&self) -> Arc<dyn Gateway> {
        Arc::clone(&self.gateway)
    }

    pub fn active_runs(&self) -> usize {
        self.runs.len()
    }

    /// Mint a run, start executing asynchronously, and return the run id.
    pub fn start(&self, graph: Graph, input: Option<String>) -> String {
        let (sink, mut rx) = EventSink::channel();
        let runner = GraphRunner::new(Arc::new(graph), Arc::clone(&self.gateway), sink, input);
        let run_id = runner.run_id().to_string();

        let state = Arc::new(RunState {
            handle: runner.handle(),
            buffer: Mutex::new(VecDeque::new()),
            live_tx: broadcast::channel(EVENT_BUFFER).0,
        });
        self.runs.insert(run_id.clone(), Arc::clone(&state));
        info!("run {} registered", run_id);

        tokio::spawn(runner.run());

        // Pump: buffer + broadcast every event; evict after the grace window
        let runs = Arc::clone(&self.runs);
        let pump_run_id = run_id.clone();
        let retention = self.retention;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let terminal = event.is_terminal();
                {
                    let mut buffer = state.buffer.lock().unwrap();
                    buffer.push_back(event.clone());
                    while buffer.len() > EVENT_BUFFER {
                        buffer.pop_front();
                    }
                    let _ = state.live_tx.send(event);
                }
                if terminal {
                    let runs = Arc::clone(&runs);
                    let run_id = pump_run_id.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(retention).await;
                        runs.remove(&run_id);
                        debug!("run {} evicted after grace window", run_id);
                    });
                }
            }
        });

        run_id
    }

    /// Attach an observer: the buffered events so far plus a live receiver.
    /// The buffer snapshot and the subscription are taken under one lock,
    /// so the live stream continues exactly where the snapshot ends.
    pub fn subscribe(
        &self,
        run_id: &str,
    ) -> Result<(Vec<RunEvent>, broadcast::Receiver<RunEvent>)> {
        let state = self
            .runs
            .get(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        let buffer = state.buffer.lock().unwrap();
        let snapshot: Vec<RunEvent> = buffer.iter().cloned().collect();
        let live = state.live_tx.subscribe();
        Ok((snapshot, live))
    }

    /// Cooperatively cancel a run.
    pub async fn cancel(&self, run_id: &str) -> Result<()> {
        let state = self
            .runs
            .get(run_id)
            .map(|s| Arc::clone(&s))
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        info!("run {} cancel requested", run_id);
        state.handle.cancel().await;
        Ok(())
    }
}
