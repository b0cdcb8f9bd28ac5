//! Read-only rendering of a [`crate::graph::Graph`] for documentation and
//! debugging. Pure reflection over the registered node/edge tables — no
//! execution semantics, so it cannot influence a run.

use crate::graph::Graph;
use std::collections::BTreeSet;
use std::fmt::Write;

/// Renders `graph` as Graphviz DOT source.
pub fn to_dot<S>(graph: &Graph<S>) -> String {
    let mut out = String::new();
    writeln!(out, "digraph wfgraph {{").unwrap();
    writeln!(out, "  rankdir=LR;").unwrap();

    let mut ids: BTreeSet<&String> = graph.node_ids().collect();
    if let Some(start) = graph.start() {
        ids.insert(start);
    }

    for id in &ids {
        let shape = if Some(*id) == graph.start() { "doublecircle" } else { "box" };
        writeln!(out, "  \"{id}\" [shape={shape}];").unwrap();
    }
    for id in &ids {
        for (target, label) in graph.edges_from(id) {
            match label {
                Some(l) => writeln!(out, "  \"{id}\" -> \"{target}\" [label=\"{l}\"];").unwrap(),
                None => writeln!(out, "  \"{id}\" -> \"{target}\";").unwrap(),
            }
        }
    }
    writeln!(out, "}}").unwrap();
    out
}

/// Renders `graph` as a Mermaid flowchart definition.
pub fn to_mermaid<S>(graph: &Graph<S>) -> String {
    let mut out = String::new();
    writeln!(out, "flowchart LR").unwrap();

    let mut ids: BTreeSet<&String> = graph.node_ids().collect();
    if let Some(start) = graph.start() {
        ids.insert(start);
    }

    for id in &ids {
        for (target, label) in graph.edges_from(id) {
            match label {
                Some(l) => writeln!(out, "    {id} -->|{l}| {target}").unwrap(),
                None => writeln!(out, "    {id} --> {target}").unwrap(),
            }
        }
    }
    out
}

/// Renders `graph` as an indented ASCII adjacency listing, grouped by
/// source node in registration order. Intended for terminal output, not
/// for parsing.
pub fn to_ascii<S>(graph: &Graph<S>) -> String {
    let mut out = String::new();
    let mut ids: Vec<&String> = graph.node_ids().collect();
    ids.sort();

    for id in ids {
        let marker = if Some(id) == graph.start() { "*" } else { " " };
        writeln!(out, "{marker} {id}").unwrap();
        for (target, label) in graph.edges_from(id) {
            match label {
                Some(l) => writeln!(out, "    -> {target}  [{l}]").unwrap(),
                None => writeln!(out, "    -> {target}").unwrap(),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_result::NodeResult;

    fn sample_graph() -> Graph<i32> {
        let mut g: Graph<i32> = Graph::new();
        g.register_fn("a", |_ctx, s: i32| async move { Ok(NodeResult::new(s)) }).unwrap();
        g.register_fn("b", |_ctx, s: i32| async move { Ok(NodeResult::new(s)) }).unwrap();
        g.connect("a", "b");
        g.set_start("a");
        g
    }

    #[test]
    fn dot_contains_nodes_and_edges() {
        let dot = to_dot(&sample_graph());
        assert!(dot.contains("digraph wfgraph"));
        assert!(dot.contains("\"a\" -> \"b\""));
    }

    #[test]
    fn mermaid_contains_edge() {
        let mermaid = to_mermaid(&sample_graph());
        assert!(mermaid.contains("a --> b"));
    }

    #[test]
    fn ascii_marks_start_node() {
        let ascii = to_ascii(&sample_graph());
        assert!(ascii.contains("* a"));
        assert!(ascii.contains("-> b"));
    }
}
