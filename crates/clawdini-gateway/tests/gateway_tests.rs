//! Tests for clawdini-gateway: typed RPC wrappers over a scripted transport

use async_trait::async_trait;
use clawdini_core::{Error, Result, SessionKey};
use clawdini_gateway::{ChatEvent, ChatSendOptions, Gateway};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Records every request and replays canned responses.
struct ScriptedGateway {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    responses: Mutex<Vec<Result<Value>>>,
    chat_tx: broadcast::Sender<ChatEvent>,
}

impl ScriptedGateway {
    fn new(responses: Vec<Result<Value>>) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responses: Mutex::new(responses),
            chat_tx: broadcast::channel(16).0,
        }
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.calls.lock().await.push((method.to_string(), params));
        let mut responses = self.responses.lock().await;
        if responses.is_empty() {
            Ok(Value::Null)
        } else {
            responses.remove(0)
        }
    }

    fn subscribe_chat(&self) -> broadcast::Receiver<ChatEvent> {
        self.chat_tx.subscribe()
    }
}

#[tokio::test]
async fn chat_send_builds_params_and_returns_chat_run_id() {
    let gw = ScriptedGateway::new(vec![Ok(json!({ "runId": "chat-77" }))]);
    let key = SessionKey::for_node("main", clawdini_core::Purpose::Clawdini, "r1", "n1");

    let mut opts = ChatSendOptions::new();
    opts.model_id = Some("claude-sonnet-4".into());
    let run_id = gw.chat_send(&key, "hello", opts.clone()).await.unwrap();
    assert_eq!(run_id, "chat-77");

    let calls = gw.calls.lock().await;
    let (method, params) = &calls[0];
    assert_eq!(method, "chat.send");
    assert_eq!(params["sessionKey"], "agent:main:clawdini:r1:n1");
    assert_eq!(params["message"], "hello");
    assert_eq!(params["modelId"], "claude-sonnet-4");
    assert_eq!(params["idempotencyKey"], opts.idempotency_key.as_str());
}

#[tokio::test]
async fn chat_send_without_run_id_is_protocol_error() {
    let gw = ScriptedGateway::new(vec![Ok(json!({}))]);
    let key = SessionKey::new("k");
    let err = gw.chat_send(&key, "x", ChatSendOptions::new()).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn sessions_patch_merges_fields() {
    let gw = ScriptedGateway::new(vec![Ok(json!({ "ok": true }))]);
    let key = SessionKey::new("sess");
    gw.sessions_patch(&key, json!({ "model": "m-1" })).await.unwrap();

    let calls = gw.calls.lock().await;
    assert_eq!(calls[0].0, "sessions.patch");
    assert_eq!(calls[0].1["sessionKey"], "sess");
    assert_eq!(calls[0].1["model"], "m-1");
}

#[tokio::test]
async fn agents_and_models_lists_parse() {
    let gw = ScriptedGateway::new(vec![
        Ok(json!({
            "defaultId": "main",
            "mainKey": "agent:main:main",
            "agents": [{ "id": "main", "name": "Main" }, { "id": "scout" }],
        })),
        Ok(json!({
            "models": [{ "id": "m1", "name": "Model One", "provider": "acme" }],
        })),
    ]);

    let agents = gw.agents_list().await.unwrap();
    assert_eq!(agents.default_id.as_deref(), Some("main"));
    assert_eq!(agents.agents.len(), 2);
    assert_eq!(agents.agents[1].name, None);

    let models = gw.models_list().await.unwrap();
    assert_eq!(models.models[0].provider, "acme");
}

#[tokio::test]
async fn rpc_rejection_surfaces_code_and_message() {
    let gw = ScriptedGateway::new(vec![Err(Error::rpc("MISSING_SCOPE", "scope 'chat' required"))]);
    let key = SessionKey::new("k");
    let err = gw.sessions_reset(&key).await.unwrap_err();
    match err {
        Error::Rpc { code, message } => {
            assert_eq!(code, "MISSING_SCOPE");
            assert!(message.contains("chat"));
        }
        other => panic!("expected rpc error, got {:?}", other),
    }
}

#[tokio::test]
async fn chat_abort_includes_run_id_when_known() {
    let gw = ScriptedGateway::new(vec![Ok(json!({ "ok": true })), Ok(json!({ "ok": true }))]);
    let key = SessionKey::new("k");

    gw.chat_abort(&key, Some("chat-1")).await.unwrap();
    gw.chat_abort(&key, None).await.unwrap();

    let calls = gw.calls.lock().await;
    assert_eq!(calls[0].1["runId"], "chat-1");
    assert!(calls[1].1.get("runId").is_none());
}
