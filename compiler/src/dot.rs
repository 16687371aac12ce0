// dot.rs — Graphviz export of the composed trigger graph
//
// Deterministic DOT output for inspection and golden tests: nodes in arena
// order, edges in insertion order, one shape/color per node kind.
//
// Preconditions: `composer` holds the finished graph.
// Postconditions: output is byte-identical for identical graphs.
// Failure modes: none.
// Side effects: none.

use std::fmt::Write;

use crate::graph::{Composer, NodeKind};

/// Render the trigger graph as a Graphviz digraph.
pub fn emit_dot(composer: &Composer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph relay {{");
    let _ = writeln!(out, "  rankdir=LR;");
    let _ = writeln!(out, "  node [fontname=\"monospace\", fontsize=10];");

    for node in composer.nodes() {
        let (shape, color) = style(&node.kind);
        let _ = writeln!(
            out,
            "  n{} [label=\"{}\", shape={}, color={}];",
            node.id.0,
            escape(&node.name),
            shape,
            color
        );
    }
    for node in composer.nodes() {
        for &edge in &node.edges {
            let _ = writeln!(out, "  n{} -> n{};", node.id.0, edge.0);
        }
    }
    let _ = writeln!(out, "}}");
    out
}

fn style(kind: &NodeKind) -> (&'static str, &'static str) {
    match kind {
        NodeKind::Action { .. } => ("doubleoctagon", "black"),
        NodeKind::Reaction { .. } => ("box", "blue"),
        NodeKind::Getter { .. } => ("ellipse", "darkgreen"),
        NodeKind::Activation { .. } => ("diamond", "red"),
        NodeKind::PushPort { .. } => ("cds", "gray40"),
        NodeKind::PullPort { .. } => ("invhouse", "gray40"),
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use crate::graph::AccessLevel;
    use crate::id::{ActionId, CompId, FieldId, ReactionId};

    #[test]
    fn renders_nodes_and_edges_in_arena_order() {
        let mut c = Composer::new();
        let i = c.add_instance(None, CompId(0), 0, "main".into());
        let action = c.add_action(
            i,
            ActionId(0),
            None,
            AccessLevel::None,
            AccessLevel::None,
            "main.tick".into(),
            Span::dummy(),
        );
        let port = c.register_push_port(8, i, FieldId(0), "main.out".into(), Span::dummy());
        let r = c.intern_reaction(
            i,
            ReactionId(0),
            None,
            AccessLevel::Read,
            "main.echo".into(),
            Span::dummy(),
        );
        let act = c.add_activation(i, AccessLevel::None, "main.tick.activate#0".into(), Span::dummy());
        c.add_edge(action, act);
        c.add_edge(act, port);
        c.add_edge(port, r);

        let dot = emit_dot(&c);
        assert!(dot.starts_with("digraph relay {"));
        assert!(dot.contains("n0 [label=\"main.tick\", shape=doubleoctagon"));
        assert!(dot.contains("n0 -> n3;"));
        assert!(dot.contains("n3 -> n1;"));
        assert!(dot.contains("n1 -> n2;"));
        // Deterministic: two renders agree byte for byte.
        assert_eq!(dot, emit_dot(&c));
    }

    #[test]
    fn escapes_quotes_in_labels() {
        let mut c = Composer::new();
        let i = c.add_instance(None, CompId(0), 0, "main".into());
        c.register_push_port(8, i, FieldId(0), "main.\"odd\"".into(), Span::dummy());
        let dot = emit_dot(&c);
        assert!(dot.contains("label=\"main.\\\"odd\\\"\""));
    }
}
