use crate::event::{Event, EventKind};
use crate::event_tree::{NodeID, Tree};
use crate::synteny::{Synteny, NO_SEGMENT};

/// Strip a fully-labeled reference tree down to a valid input for the
/// reconciliation engines.
///
/// Internal syntenies are cleared (except at the root, which keeps the
/// ancestral synteny), loss chains are collapsed and every remaining
/// loss becomes a leaf with an empty synteny. The transformation is
/// idempotent.
pub fn erase_tree(tree: &mut Tree<Event>) {
    let root = tree.root();
    erase_below(tree, root, true);
}

fn erase_below(tree: &mut Tree<Event>, node: NodeID, is_root: bool) {
    match tree[node].value.kind {
        EventKind::None => {}

        EventKind::Loss => {
            tree[node].value.synteny = Synteny::new();
            tree[node].value.segment = NO_SEGMENT;

            if !tree.is_leaf(node) {
                // Loss nodes on an edge disappear entirely: their only
                // child takes their place
                let child = tree.child(node, 0);
                tree.erase(node);
                erase_below(tree, child, false);
            }
        }

        EventKind::Duplication | EventKind::Speciation => {
            if !is_root {
                tree[node].value.synteny = Synteny::new();
            }
            tree[node].value.segment = NO_SEGMENT;

            for child in tree.children(node).to_vec() {
                erase_below(tree, child, false);
            }
        }
    }
}
