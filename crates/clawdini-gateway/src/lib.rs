//! Clawdini Gateway - session protocol client for the remote agent gateway

pub mod auth;
pub mod chat;
pub mod client;
pub mod identity;
pub mod rpc;

pub use auth::ClientInfo;
pub use chat::{ChatEvent, ChatState, DeltaTracker};
pub use client::{ClientState, ConnectOptions, GatewayClient};
pub use identity::DeviceIdentity;
pub use rpc::{AgentInfo, AgentsList, ChatSendOptions, Gateway, ModelInfo, ModelsList};
