//! Graph runner — level-scheduled execution of one run
//!
//! Levels run sequentially; everything inside a level runs concurrently.
//! The node-output map and disabled-edge set are owned here and written
//! only from the scheduling task — executors return their results instead
//! of writing shared state. Cancellation is cooperative: no new level
//! launches, in-flight chats are aborted server-side, and started nodes
//! are awaited before `runCancelled` goes out.

use crate::context::{ChatHandle, EdgeInput, EventSink, ExecOutcome, ExecutorContext};
use crate::executors;
use crate::levels::compute_levels;
use crate::scope::StateStore;
use clawdini_core::{Graph, NodePayload, RunEvent};
use clawdini_gateway::Gateway;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Grace before `runStarted` so interactive subscribers can attach. The
/// registry's replay buffer makes this redundant but harmless.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeStatus {
    Completed,
    Error,
    Aborted,
}

struct NodeRecord {
    payload: NodePayload,
    status: NodeStatus,
}

/// Cancellation-side view of a running graph, safe to hold while the runner
/// itself is consumed by [`GraphRunner::run`].
#[derive(Clone)]
pub struct RunnerHandle {
    run_id: String,
    cancel: CancellationToken,
    inflight: Arc<DashMap<String, ChatHandle>>,
    gateway: Arc<dyn Gateway>,
}

impl RunnerHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Stop launching new nodes and abort every in-flight chat server-side.
    /// Abort failures are ignored; the chat may already be finished.
    pub async fn cancel(&self) {
        self.cancel.cancel();
        for entry in self.inflight.iter() {
            let handle = entry.value().clone();
            if let Err(e) = self
                .gateway
                .chat_abort(&handle.session_key, Some(&handle.chat_run_id))
                .await
            {
                debug!("chat abort for {} failed (ignored): {}", handle.session_key, e);
            }
        }
    }
}

/// Executes one graph against the gateway, emitting run-scoped events.
pub struct GraphRunner {
    graph: Arc<Graph>,
    ctx: ExecutorContext,
    outputs: HashMap<String, NodeRecord>,
    disabled_edges: HashSet<String>,
    global_input: Option<String>,
    settle: bool,
}

impl GraphRunner {
    /// Top-level runner with a freshly minted run id.
    pub fn new(
        graph: Arc<Graph>,
        gateway: Arc<dyn Gateway>,
        sink: EventSink,
        global_input: Option<String>,
    ) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        Self {
            graph,
            ctx: ExecutorContext {
                run_id,
                gateway,
                events: sink,
                state: Arc::new(StateStore::new()),
                inflight: Arc::new(DashMap::new()),
                cancel: CancellationToken::new(),
            },
            outputs: HashMap::new(),
            disabled_edges: HashSet::new(),
            global_input,
            settle: true,
        }
    }

    /// Child runner for sub-graph fan-out: shares the gateway, the event
    /// sink, and the in-flight table (so cancellation reaches child chats),
    /// but owns a fresh run id, output map, disabled-edge set, and state.
    pub(crate) fn child(
        graph: Arc<Graph>,
        parent: &ExecutorContext,
        global_input: Option<String>,
    ) -> Self {
        Self {
            graph,
            ctx: ExecutorContext {
                run_id: uuid::Uuid::new_v4().to_string(),
                gateway: Arc::clone(&parent.gateway),
                events: parent.events.clone(),
                state: Arc::new(StateStore::new()),
                inflight: Arc::clone(&parent.inflight),
                cancel: parent.cancel.child_token(),
            },
            outputs: HashMap::new(),
            disabled_edges: HashSet::new(),
            global_input,
            settle: false,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.ctx.run_id
    }

    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            run_id: self.ctx.run_id.clone(),
            cancel: self.ctx.cancel.clone(),
            inflight: Arc::clone(&self.ctx.inflight),
            gateway: Arc::clone(&self.ctx.gateway),
        }
    }

    /// Execute to completion, emitting every lifecycle event into the sink.
    pub async fn run(mut self) {
        let run_id = self.ctx.run_id.clone();

        if self.settle {
            tokio::select! {
                _ = tokio::time::sleep(SETTLE_DELAY) => {}
                _ = self.ctx.cancel.cancelled() => {}
            }
        }
        self.ctx.events.emit(RunEvent::RunStarted {
            run_id: run_id.clone(),
        });

        let levels = match compute_levels(&self.graph) {
            Ok(levels) => levels,
            Err(e) => {
                warn!("run {} rejected: {}", run_id, e);
                self.ctx.events.emit(RunEvent::RunError {
                    run_id,
                    error: e.to_string(),
                });
                return;
            }
        };
        info!(
            "run {} scheduled: {} nodes in {} levels",
            run_id,
            self.graph.nodes.len(),
            levels.len()
        );

        for level in levels {
            if self.ctx.cancel.is_cancelled() {
                break;
            }
            self.run_level(level).await;
        }

        if self.ctx.cancel.is_cancelled() {
            info!("run {} cancelled", run_id);
            self.ctx.events.emit(RunEvent::RunCancelled { run_id });
        } else {
            info!("run {} completed", run_id);
            self.ctx.events.emit(RunEvent::RunCompleted { run_id });
        }
    }

    async fn run_level(&mut self, level: Vec<String>) {
        let graph = Arc::clone(&self.graph);
        let ctx = self.ctx.clone();

        // Pre-dispatch pass: cascade halts, gather inputs, announce starts
        let mut dispatch: Vec<(String, Vec<EdgeInput>)> = Vec::new();
        for node_id in level {
            let in_edge_ids: Vec<&str> = graph.in_edges(&node_id).map(|e| e.id.as_str()).collect();
            let all_disabled = !in_edge_ids.is_empty()
                && in_edge_ids
                    .iter()
                    .all(|id| self.disabled_edges.contains(*id));
            if all_disabled {
                self.abort_node(&node_id);
                continue;
            }

            let inputs = self.collect_inputs(&node_id);
            self.ctx.events.emit(RunEvent::node_started(&node_id));
            dispatch.push((node_id, inputs));
        }

        let executions = dispatch.into_iter().map(|(node_id, inputs)| {
            let graph = Arc::clone(&graph);
            let ctx = ctx.clone();
            async move {
                // Scheduling guarantees the node exists
                let result = match graph.node(&node_id) {
                    Some(node) => executors::execute(&ctx, &graph, node, inputs).await,
                    None => Err(clawdini_core::Error::Graph(format!(
                        "node {} vanished from graph",
                        node_id
                    ))),
                };
                (node_id, result)
            }
        });

        for (node_id, result) in futures::future::join_all(executions).await {
            match result {
                Ok(ExecOutcome {
                    payload,
                    disable_edges,
                }) => {
                    self.disabled_edges.extend(disable_edges);
                    self.ctx
                        .events
                        .emit(RunEvent::node_final(&node_id, payload.clone()));
                    self.outputs.insert(
                        node_id,
                        NodeRecord {
                            payload,
                            status: NodeStatus::Completed,
                        },
                    );
                }
                Err(e) => {
                    // One node's failure never aborts siblings or the run
                    warn!("node {} failed: {}", node_id, e);
                    self.ctx
                        .events
                        .emit(RunEvent::node_error(&node_id, e.to_string()));
                    self.outputs.insert(
                        node_id,
                        NodeRecord {
                            payload: NodePayload::default(),
                            status: NodeStatus::Error,
                        },
                    );
                }
            }
        }
    }

    /// Cascading halt: the node never runs, and its out-edges are disabled
    /// so downstream nodes halt the same way.
    fn abort_node(&mut self, node_id: &str) {
        debug!("node {} aborted: all in-edges disabled", node_id);
        self.ctx.events.emit(RunEvent::node_aborted(node_id));
        let out_edges: Vec<String> = self
            .graph
            .out_edges(node_id)
            .map(|e| e.id.clone())
            .collect();
        self.disabled_edges.extend(out_edges);
        self.outputs.insert(
            node_id.to_string(),
            NodeRecord {
                payload: NodePayload::from_text("Halted (Skipped)"),
                status: NodeStatus::Aborted,
            },
        );
    }

    /// Payloads of enabled in-edges whose source completed. Root nodes read
    /// the run's global input instead.
    fn collect_inputs(&self, node_id: &str) -> Vec<EdgeInput> {
        let in_edges: Vec<_> = self.graph.in_edges(node_id).collect();
        if in_edges.is_empty() {
            return match &self.global_input {
                Some(input) => vec![EdgeInput::global(input.clone())],
                None => Vec::new(),
            };
        }

        in_edges
            .into_iter()
            .filter(|e| !self.disabled_edges.contains(&e.id))
            .filter_map(|e| {
                let record = self.outputs.get(&e.source)?;
                if record.status != NodeStatus::Completed {
                    return None;
                }
                Some(EdgeInput {
                    edge_id: e.id.clone(),
                    source: e.source.clone(),
                    source_name: self.graph.node_name(&e.source).to_string(),
                    payload: record.payload.clone(),
                })
            })
            .collect()
    }
}

/// Run a derived sub-graph as a child of `parent`, feeding it one element
/// of the fan-out as global input. Used by the foreach executor.
pub(crate) async fn run_child(
    graph: Arc<Graph>,
    parent: &ExecutorContext,
    global_input: String,
) {
    let child = GraphRunner::child(graph, parent, Some(global_input));
    child.run().await;
}
