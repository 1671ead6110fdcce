use crate::event::{Event, EventKind};
use crate::event_tree::Tree;
use crate::synteny::NO_SEGMENT;
use std::fmt::Write as _;

/// Build the label of a node, underlining duplicated segments and
/// bracketing lost ones.
fn event_label(event: &Event) -> String {
    let (open, close) = match event.kind {
        EventKind::Duplication => ("<u>", "</u>"),
        EventKind::Loss => ("[", "]"),
        _ => ("", ""),
    };

    let (first, second) = event.segment;
    let marked = event.segment != NO_SEGMENT && !open.is_empty();

    let mut label = String::new();

    for (index, gene) in event.synteny.genes().iter().enumerate() {
        if index > 0 {
            label.push(' ');
        }

        if marked && index == first {
            label.push_str(open);
        }

        label.push_str(gene);

        if marked && index + 1 == second {
            label.push_str(close);
        }
    }

    label
}

fn event_attributes(event: &Event) -> String {
    let shape = match event.kind {
        EventKind::None => "shape=\"none\", ",
        EventKind::Loss => "shape=\"none\", fontcolor=\"red\", ",
        EventKind::Duplication => "shape=\"box\", ",
        EventKind::Speciation => "shape=\"oval\", ",
    };

    format!("{}label=<{}>", shape, event_label(event))
}

/// Produce a Graphviz representation of an event tree, suitable for
/// piping into `dot`.
pub fn event_tree_to_graphviz(tree: &Tree<Event>) -> String {
    let mut out = String::from("graph {\n");

    for node in tree.preorder() {
        let _ = writeln!(
            out,
            "    {} [{}];",
            node,
            event_attributes(&tree[node].value)
        );
    }

    for node in tree.preorder() {
        for &child in tree.children(node) {
            let event = &tree[child].value;
            let style = if event.kind == EventKind::Loss && event.synteny.is_empty()
            {
                " [style=dashed]"
            } else {
                ""
            };

            let _ = writeln!(out, "    {} -- {}{};", node, child, style);
        }
    }

    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_tree_from_tagged;
    use crate::nhx;
    use crate::synteny::Synteny;

    fn synteny(s: &str) -> Synteny {
        s.split_whitespace().collect()
    }

    #[test]
    fn labels_mark_segments() {
        let dup = Event {
            kind: EventKind::Duplication,
            synteny: synteny("a b c d"),
            segment: (1, 3),
        };
        assert_eq!(event_label(&dup), "a <u>b c</u> d");

        let loss = Event {
            kind: EventKind::Loss,
            synteny: synteny("a b c"),
            segment: (0, 3),
        };
        assert_eq!(event_label(&loss), "[a b c]");

        let leaf = Event::leaf(synteny("a b"));
        assert_eq!(event_label(&leaf), "a b");
    }

    #[test]
    fn graph_lists_nodes_and_edges() {
        let tree = event_tree_from_tagged(
            &nhx::parse_tree(
                "([&&NHX:event=loss],\"a b\")\"a b\"[&&NHX:event=speciation];",
            )
            .unwrap(),
        )
        .unwrap();

        let dot = event_tree_to_graphviz(&tree);

        assert!(dot.starts_with("graph {\n"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("shape=\"oval\", label=<a b>"));
        assert!(dot.contains("fontcolor=\"red\""));
        // The edge into a fully-lost leaf is dashed
        assert!(dot.contains("[style=dashed];"));
        assert_eq!(dot.matches(" -- ").count(), 2);
    }
}
