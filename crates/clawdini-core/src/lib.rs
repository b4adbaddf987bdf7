//! Clawdini Core - Graph model, wire frames, payloads, and error handling

pub mod error;
pub mod event;
pub mod frame;
pub mod graph;
pub mod payload;
pub mod session;

pub use error::{Error, Result};
pub use event::RunEvent;
pub use frame::{decode, encode, Frame, RpcErrorBody};
pub use graph::{Edge, Graph, Node, NodeKind};
pub use payload::{Decision, DecisionStatus, NodePayload, PayloadMeta};
pub use session::{Purpose, SessionKey};
