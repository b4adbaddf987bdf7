//! State node — writes the run-scoped keyed memory

use super::parse_config;
use crate::context::{EdgeInput, ExecOutcome, ExecutorContext};
use clawdini_core::{Node, NodePayload, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StateMode {
    #[default]
    Merge,
    Replace,
    Append,
}

fn default_namespace() -> String {
    "default".into()
}

#[derive(Debug, Deserialize)]
struct StateConfig {
    #[serde(default = "default_namespace")]
    namespace: String,
    #[serde(default)]
    mode: StateMode,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            mode: StateMode::default(),
        }
    }
}

pub(super) fn execute(
    ctx: &ExecutorContext,
    node: &Node,
    inputs: &[EdgeInput],
) -> Result<ExecOutcome> {
    let config: StateConfig = parse_config(node)?;

    let incoming = incoming_value(inputs);
    match config.mode {
        StateMode::Merge => ctx.state.merge(&config.namespace, incoming),
        StateMode::Replace => ctx.state.set(&config.namespace, incoming),
        StateMode::Append => ctx.state.append(&config.namespace, incoming),
    }

    let current = ctx.state.get(&config.namespace).unwrap_or(Value::Null);
    let payload = NodePayload::from_text(format!("State '{}' updated", config.namespace))
        .with_json(current);
    Ok(ExecOutcome::payload(payload))
}

/// Structured input when the producer parsed one, raw text otherwise;
/// multiple upstreams fold into an array.
fn incoming_value(inputs: &[EdgeInput]) -> Value {
    let mut values: Vec<Value> = inputs
        .iter()
        .map(|i| match &i.payload.json {
            Some(json) => json.clone(),
            None => Value::String(i.payload.text.clone()),
        })
        .collect();
    match values.len() {
        0 => Value::Null,
        1 => values.remove(0),
        _ => Value::Array(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EventSink;
    use crate::scope::StateStore;
    use clawdini_core::NodePayload;
    use clawdini_gateway::{ChatEvent, Gateway};
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct NoGateway;

    #[async_trait::async_trait]
    impl Gateway for NoGateway {
        async fn request(&self, _m: &str, _p: Value) -> clawdini_core::Result<Value> {
            unreachable!("state nodes never call the gateway")
        }

        fn subscribe_chat(&self) -> tokio::sync::broadcast::Receiver<ChatEvent> {
            tokio::sync::broadcast::channel(1).1
        }
    }

    fn ctx() -> ExecutorContext {
        ExecutorContext {
            run_id: "r1".into(),
            gateway: Arc::new(NoGateway),
            events: EventSink::channel().0,
            state: Arc::new(StateStore::new()),
            inflight: Arc::new(dashmap::DashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    fn node(config: Value) -> Node {
        serde_json::from_value(json!({ "id": "st", "kind": "state", "config": config })).unwrap()
    }

    fn json_input(value: Value) -> Vec<EdgeInput> {
        vec![EdgeInput {
            edge_id: "e".into(),
            source: "up".into(),
            source_name: "up".into(),
            payload: NodePayload::from_text("").with_json(value),
        }]
    }

    #[test]
    fn merge_accumulates_keys() {
        let ctx = ctx();
        let node = node(json!({ "namespace": "cart", "mode": "merge" }));
        execute(&ctx, &node, &json_input(json!({ "a": 1 }))).unwrap();
        execute(&ctx, &node, &json_input(json!({ "b": 2 }))).unwrap();
        assert_eq!(ctx.state.get("cart"), Some(json!({ "a": 1, "b": 2 })));
    }

    #[test]
    fn replace_overwrites() {
        let ctx = ctx();
        let node = node(json!({ "namespace": "slot", "mode": "replace" }));
        execute(&ctx, &node, &json_input(json!({ "a": 1 }))).unwrap();
        execute(&ctx, &node, &json_input(json!("now a string"))).unwrap();
        assert_eq!(ctx.state.get("slot"), Some(json!("now a string")));
    }

    #[test]
    fn append_collects_inputs() {
        let ctx = ctx();
        let node = node(json!({ "namespace": "log", "mode": "append" }));
        execute(&ctx, &node, &[EdgeInput::global("first")]).unwrap();
        execute(&ctx, &node, &[EdgeInput::global("second")]).unwrap();
        assert_eq!(ctx.state.get("log"), Some(json!(["first", "second"])));
    }

    #[test]
    fn payload_reports_namespace_and_value() {
        let ctx = ctx();
        let node = node(json!({ "namespace": "cart" }));
        let outcome = execute(&ctx, &node, &json_input(json!({ "n": 1 }))).unwrap();
        assert_eq!(outcome.payload.text, "State 'cart' updated");
        assert_eq!(outcome.payload.json, Some(json!({ "n": 1 })));
    }
}
