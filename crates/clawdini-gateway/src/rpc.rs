//! The gateway RPC surface — typed wrappers over correlated requests
//!
//! [`Gateway`] is the seam the execution engine consumes: everything it
//! needs from the remote gateway, expressed as method calls plus one chat
//! event subscription. The live [`GatewayClient`](crate::GatewayClient)
//! implements `request` over the WebSocket; the typed wrappers are default
//! methods so test doubles only script `request` and the chat stream.

use crate::chat::ChatEvent;
use async_trait::async_trait;
use clawdini_core::{Error, Result, SessionKey};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

/// One agent advertised by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub identity: Option<Value>,
}

/// Response shape of `agents.list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentsList {
    #[serde(default)]
    pub default_id: Option<String>,
    #[serde(default)]
    pub main_key: Option<String>,
    #[serde(default)]
    pub agents: Vec<AgentInfo>,
}

/// One model advertised by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provider: String,
}

/// Response shape of `models.list`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsList {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// Options for `chat.send`. The idempotency key makes retried sends return
/// the same chat run id.
#[derive(Debug, Clone)]
pub struct ChatSendOptions {
    pub idempotency_key: String,
    pub timeout_ms: u64,
    pub model_id: Option<String>,
}

impl ChatSendOptions {
    pub fn new() -> Self {
        Self {
            idempotency_key: uuid::Uuid::new_v4().to_string(),
            timeout_ms: 120_000,
            model_id: None,
        }
    }
}

impl Default for ChatSendOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The gateway as seen by the execution engine.
///
/// A `missing scope` rejection means this client was never granted the
/// method; callers surface it and never retry.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Correlated request/response call. Resolves with the response payload
    /// or an [`Error::Rpc`] carrying the server's code and message.
    async fn request(&self, method: &str, params: Value) -> Result<Value>;

    /// Subscribe to the `chat` event stream. Every chat event on the
    /// connection is delivered; consumers filter by session key.
    fn subscribe_chat(&self) -> broadcast::Receiver<ChatEvent>;

    async fn agents_list(&self) -> Result<AgentsList> {
        let payload = self.request("agents.list", json!({})).await?;
        Ok(serde_json::from_value(payload)?)
    }

    async fn models_list(&self) -> Result<ModelsList> {
        let payload = self.request("models.list", json!({})).await?;
        Ok(serde_json::from_value(payload)?)
    }

    async fn sessions_reset(&self, session_key: &SessionKey) -> Result<()> {
        self.request("sessions.reset", json!({ "sessionKey": session_key.as_str() }))
            .await?;
        Ok(())
    }

    /// Patch session settings (e.g. `{"model": "..."}`). `patch` must be an
    /// object; its fields ride alongside the session key.
    async fn sessions_patch(&self, session_key: &SessionKey, patch: Value) -> Result<()> {
        let mut params = json!({ "sessionKey": session_key.as_str() });
        if let (Some(target), Some(fields)) = (params.as_object_mut(), patch.as_object()) {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        self.request("sessions.patch", params).await?;
        Ok(())
    }

    /// Send a message; returns the gateway's chat run id (distinct from the
    /// orchestrator's run id) for later abort.
    async fn chat_send(
        &self,
        session_key: &SessionKey,
        message: &str,
        opts: ChatSendOptions,
    ) -> Result<String> {
        let mut params = json!({
            "sessionKey": session_key.as_str(),
            "message": message,
            "idempotencyKey": opts.idempotency_key,
            "timeoutMs": opts.timeout_ms,
        });
        if let Some(model_id) = &opts.model_id {
            params["modelId"] = json!(model_id);
        }
        let payload = self.request("chat.send", params).await?;
        payload
            .get("runId")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| Error::Protocol("chat.send response missing runId".into()))
    }

    async fn chat_abort(&self, session_key: &SessionKey, chat_run_id: Option<&str>) -> Result<()> {
        let mut params = json!({ "sessionKey": session_key.as_str() });
        if let Some(run_id) = chat_run_id {
            params["runId"] = json!(run_id);
        }
        self.request("chat.abort", params).await?;
        Ok(())
    }
}
