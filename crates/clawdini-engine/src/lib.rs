//! Clawdini Engine - node executors and the graph runner

pub mod chat_call;
pub mod context;
pub mod executors;
pub mod levels;
pub mod runner;
pub mod scope;
pub mod subgraph;

pub use context::{ChatHandle, EdgeInput, EventSink, ExecOutcome, ExecutorContext};
pub use levels::compute_levels;
pub use runner::{GraphRunner, RunnerHandle};
pub use scope::StateStore;
pub use subgraph::successors_subgraph;
