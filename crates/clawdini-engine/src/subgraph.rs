//! Sub-graph extraction for fan-out nodes
//!
//! The derived graph holds the strict transitive successors of a root node —
//! the root itself is excluded — and only the edges with both endpoints in
//! that set. Shared upstreams are not replicated; a child that needs the
//! parent's upstream payload receives it as the child runner's global input.

use clawdini_core::Graph;
use std::collections::HashSet;

/// Build the strict-successor sub-graph of `root`.
pub fn successors_subgraph(graph: &Graph, root: &str) -> Graph {
    let mut members: HashSet<String> = HashSet::new();
    let mut frontier: Vec<String> = graph
        .out_edges(root)
        .map(|e| e.target.clone())
        .filter(|t| graph.contains_node(t))
        .collect();

    while let Some(id) = frontier.pop() {
        if !members.insert(id.clone()) {
            continue;
        }
        for edge in graph.out_edges(&id) {
            if graph.contains_node(&edge.target) && !members.contains(&edge.target) {
                frontier.push(edge.target.clone());
            }
        }
    }

    Graph {
        id: format!("{}-sub-{}", graph.id, root),
        nodes: graph
            .nodes
            .iter()
            .filter(|n| members.contains(&n.id))
            .cloned()
            .collect(),
        edges: graph
            .edges
            .iter()
            .filter(|e| members.contains(&e.source) && members.contains(&e.target))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> Graph {
        serde_json::from_value(json!({
            "id": "g",
            "nodes": nodes.iter().map(|id| json!({ "id": id, "kind": "input" })).collect::<Vec<_>>(),
            "edges": edges.iter().enumerate().map(|(i, (s, t))| json!({
                "id": format!("e{}", i), "source": s, "target": t
            })).collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    #[test]
    fn excludes_root_and_upstreams() {
        let g = graph(
            &["up", "fe", "a", "b"],
            &[("up", "fe"), ("fe", "a"), ("a", "b")],
        );
        let sub = successors_subgraph(&g, "fe");
        let ids: Vec<&str> = sub.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(sub.edges.len(), 1);
        assert_eq!(sub.edges[0].source, "a");
    }

    #[test]
    fn drops_edges_crossing_the_boundary() {
        // "shared" feeds a successor from outside the successor set
        let g = graph(
            &["fe", "a", "shared"],
            &[("fe", "a"), ("shared", "a")],
        );
        let sub = successors_subgraph(&g, "fe");
        assert_eq!(sub.nodes.len(), 1);
        assert!(sub.edges.is_empty());
    }

    #[test]
    fn handles_reconverging_branches() {
        let g = graph(
            &["fe", "a", "b", "join"],
            &[("fe", "a"), ("fe", "b"), ("a", "join"), ("b", "join")],
        );
        let sub = successors_subgraph(&g, "fe");
        assert_eq!(sub.nodes.len(), 3);
        assert_eq!(sub.edges.len(), 2);
    }

    #[test]
    fn leaf_root_yields_empty_graph() {
        let g = graph(&["fe"], &[]);
        let sub = successors_subgraph(&g, "fe");
        assert!(sub.nodes.is_empty());
        assert!(sub.edges.is_empty());
    }
}
