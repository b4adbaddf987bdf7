//! Tests for clawdini-core: frames, graph JSON, payloads, run events

use clawdini_core::*;
use serde_json::json;

// ===========================================================================
// Frame codec
// ===========================================================================

#[test]
fn frame_round_trip_all_shapes() {
    let frames = vec![
        Frame::req("r1", "connect", Some(json!({ "minProtocol": 3 }))),
        Frame::req("r2", "agents.list", None),
        Frame::res_ok("r1", Some(json!({ "type": "hello-ok" }))),
        Frame::res_err("r2", "MISSING_SCOPE", "scope 'chat' required"),
        Frame::event("chat", Some(json!({ "state": "final" }))),
    ];
    for frame in frames {
        let wire = encode(&frame).unwrap();
        assert_eq!(decode(&wire).unwrap(), frame, "round trip failed for {}", wire);
    }
}

#[test]
fn frame_decode_ignores_future_kinds() {
    assert_eq!(decode(r#"{"type":"metrics","cpu":0.3}"#).unwrap(), Frame::Unknown);
}

// ===========================================================================
// Graph JSON from the canvas editor
// ===========================================================================

#[test]
fn graph_parses_full_editor_document() {
    let g: Graph = serde_json::from_value(json!({
        "id": "flow-42",
        "nodes": [
            { "id": "in", "kind": "input", "config": { "prompt": "draft a summary" } },
            { "id": "ag", "kind": "agent", "label": "Writer", "config": { "agentId": "main", "role": "planner" } },
            { "id": "sw", "kind": "switch", "config": { "rules": [
                { "id": "r1", "mode": "regex", "condition": "ok" }
            ] } },
            { "id": "out", "kind": "output" },
        ],
        "edges": [
            { "id": "e1", "source": "in", "target": "ag" },
            { "id": "e2", "source": "ag", "target": "sw" },
            { "id": "e3", "source": "sw", "target": "out", "sourceHandle": "r1" },
        ],
    }))
    .unwrap();

    assert_eq!(g.nodes.len(), 4);
    assert_eq!(g.node("ag").unwrap().kind, NodeKind::Agent);
    assert_eq!(g.node_name("ag"), "Writer");
    assert_eq!(
        g.out_edges("sw").next().unwrap().source_handle.as_deref(),
        Some("r1")
    );
}

// ===========================================================================
// RunEvent wire shapes
// ===========================================================================

#[test]
fn run_event_shapes_are_stable() {
    let final_evt = RunEvent::node_final(
        "n1",
        NodePayload::from_text("done").with_json(json!({ "k": 1 })),
    );
    let v = serde_json::to_value(&final_evt).unwrap();
    assert_eq!(v["type"], "nodeFinal");
    assert_eq!(v["data"]["json"]["k"], 1);

    let err_evt = RunEvent::node_error("n2", "boom");
    let v = serde_json::to_value(&err_evt).unwrap();
    assert_eq!(v, json!({ "type": "nodeError", "nodeId": "n2", "error": "boom" }));

    let cancelled = RunEvent::RunCancelled { run_id: "r9".into() };
    let v = serde_json::to_value(&cancelled).unwrap();
    assert_eq!(v, json!({ "type": "runCancelled", "runId": "r9" }));
}

#[test]
fn run_event_round_trips_through_json() {
    let events = vec![
        RunEvent::Connected { run_id: "r1".into() },
        RunEvent::RunStarted { run_id: "r1".into() },
        RunEvent::node_started("n1"),
        RunEvent::node_delta("n1", "He"),
        RunEvent::thinking("n1", "He…"),
        RunEvent::node_final("n1", NodePayload::from_text("Hello")),
        RunEvent::RunCompleted { run_id: "r1".into() },
    ];
    for evt in events {
        let wire = serde_json::to_string(&evt).unwrap();
        let back: RunEvent = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, evt);
    }
}
