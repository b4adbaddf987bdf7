//! Level scheduling — Kahn-style peeling of the dependency graph
//!
//! Nodes with in-degree zero form level 0; removing them reveals level 1,
//! and so on. Everything inside one level is independent and runs
//! concurrently. Edges to nonexistent nodes are ignored; a cycle leaves
//! nodes with positive in-degree after peeling and fails the run.

use clawdini_core::{Error, Graph, Result};
use std::collections::HashMap;

/// Compute execution levels. Each node appears in exactly one level.
pub fn compute_levels(graph: &Graph) -> Result<Vec<Vec<String>>> {
    let mut in_degree: HashMap<&str, usize> =
        graph.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();

    for edge in &graph.edges {
        if graph.contains_node(&edge.source) {
            if let Some(count) = in_degree.get_mut(edge.target.as_str()) {
                *count += 1;
            }
        }
    }

    let mut levels: Vec<Vec<String>> = Vec::new();
    let mut remaining = graph.nodes.len();

    while remaining > 0 {
        let ready: Vec<String> = graph
            .nodes
            .iter()
            .filter(|n| in_degree.get(n.id.as_str()) == Some(&0))
            .map(|n| n.id.clone())
            .collect();

        if ready.is_empty() {
            return Err(Error::Graph(format!(
                "cycle detected: {} node(s) never become ready",
                remaining
            )));
        }

        for id in &ready {
            in_degree.remove(id.as_str());
            for edge in graph.out_edges(id) {
                if let Some(count) = in_degree.get_mut(edge.target.as_str()) {
                    *count = count.saturating_sub(1);
                }
            }
        }

        remaining -= ready.len();
        levels.push(ready);
    }

    Ok(levels)
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
    fn linear_chain_levels() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        let levels = compute_levels(&g).unwrap();
        assert_eq!(levels, vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn diamond_runs_middle_in_parallel() {
        let g = graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        );
        let levels = compute_levels(&g).unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], vec!["a"]);
        assert_eq!(levels[1], vec!["b", "c"]);
        assert_eq!(levels[2], vec!["d"]);
    }

    #[test]
    fn each_node_in_exactly_one_level() {
        let g = graph(
            &["a", "b", "c", "d", "e"],
            &[("a", "c"), ("b", "c"), ("c", "d"), ("c", "e")],
        );
        let levels = compute_levels(&g).unwrap();
        let mut seen: Vec<&String> = levels.iter().flatten().collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn cycle_is_fatal() {
        let g = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);
        assert!(matches!(compute_levels(&g), Err(Error::Graph(_))));
    }

    #[test]
    fn self_loop_is_fatal() {
        let g = graph(&["a"], &[("a", "a")]);
        assert!(matches!(compute_levels(&g), Err(Error::Graph(_))));
    }

    #[test]
    fn edges_to_missing_nodes_ignored() {
        let g = graph(&["a", "b"], &[("a", "b"), ("ghost", "b"), ("a", "phantom")]);
        let levels = compute_levels(&g).unwrap();
        assert_eq!(levels, vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn empty_graph_has_no_levels() {
        let g = graph(&[], &[]);
        assert!(compute_levels(&g).unwrap().is_empty());
    }
}
