//! Template node — `{{name.path}}` substitution over upstream outputs

use super::parse_config;
use crate::context::{EdgeInput, ExecOutcome, ExecutorContext};
use crate::scope;
use clawdini_core::{Error, Node, NodePayload, Result};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TemplateFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Default, Deserialize)]
struct TemplateConfig {
    #[serde(default)]
    template: String,
    #[serde(default)]
    format: TemplateFormat,
}

pub(super) fn execute(
    ctx: &ExecutorContext,
    node: &Node,
    inputs: &[EdgeInput],
) -> Result<ExecOutcome> {
    let config: TemplateConfig = parse_config(node)?;

    // Upstreams resolve by label; json when the producer parsed one, text otherwise
    let mut root = serde_json::Map::new();
    for input in inputs {
        let value = match &input.payload.json {
            Some(json) => json.clone(),
            None => Value::String(input.payload.text.clone()),
        };
        root.insert(input.source_name.clone(), value);
    }
    root.insert("state".into(), ctx.state.snapshot());

    let rendered = scope::render(&config.template, &Value::Object(root));

    let payload = match config.format {
        TemplateFormat::Text => NodePayload::from_text(rendered),
        TemplateFormat::Json => {
            let parsed: Value = serde_json::from_str(&rendered).map_err(|e| {
                Error::node(&node.id, format!("rendered template is not valid JSON: {}", e))
            })?;
            NodePayload::from_text(rendered).with_json(parsed)
        }
    };
    Ok(ExecOutcome::payload(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EventSink;
    use crate::scope::StateStore;
    use clawdini_core::NodePayload;
    use clawdini_gateway::{ChatEvent, Gateway};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct NoGateway;

    #[async_trait::async_trait]
    impl Gateway for NoGateway {
        async fn request(
            &self,
            _method: &str,
            _params: Value,
        ) -> clawdini_core::Result<Value> {
            unreachable!("template nodes never call the gateway")
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
        serde_json::from_value(json!({ "id": "t", "kind": "template", "config": config })).unwrap()
    }

    fn upstream(name: &str, payload: NodePayload) -> EdgeInput {
        EdgeInput {
            edge_id: "e".into(),
            source: name.to_lowercase(),
            source_name: name.into(),
            payload,
        }
    }

    #[test]
    fn substitutes_upstreams_and_state() {
        let ctx = ctx();
        ctx.state.set("cart", json!({ "count": 2 }));
        let inputs = vec![
            upstream("Writer", NodePayload::from_text("a draft")),
            upstream(
                "Extractor",
                NodePayload::from_text("{}").with_json(json!({ "total": 9 })),
            ),
        ];
        let outcome = execute(
            &ctx,
            &node(json!({
                "template": "{{Writer}} / {{Extractor.total}} / {{state.cart.count}}",
            })),
            &inputs,
        )
        .unwrap();
        assert_eq!(outcome.payload.text, "a draft / 9 / 2");
    }

    #[test]
    fn json_format_parses_rendered_text() {
        let ctx = ctx();
        let inputs = vec![upstream("N", NodePayload::from_text("5"))];
        let outcome = execute(
            &ctx,
            &node(json!({ "template": "{ \"n\": {{N}} }", "format": "json" })),
            &inputs,
        )
        .unwrap();
        assert_eq!(outcome.payload.json, Some(json!({ "n": 5 })));
    }

    #[test]
    fn json_format_failure_is_fatal() {
        let ctx = ctx();
        let err = execute(
            &ctx,
            &node(json!({ "template": "not json", "format": "json" })),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Node { .. }));
    }
}
