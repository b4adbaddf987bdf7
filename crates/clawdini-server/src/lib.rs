//! Clawdini Server - run registry and the HTTP + SSE deployment surface

pub mod http;
pub mod registry;

pub use registry::RunRegistry;
