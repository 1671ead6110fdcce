use crate::errors::{ReconcileError, TreeError};
use crate::event::{Event, EventKind};
use crate::event_tree::{NodeID, Tree};
use crate::synteny::{Synteny, NO_SEGMENT};
use identity_hash::IntMap;

type GeneId = usize;

/// Dense gene-family identifiers for one tree. Identifiers are
/// allocated in lexicographic token order, so that sorting by id and
/// sorting by token agree everywhere.
struct GeneDictionary {
    tokens: Vec<String>,
}

impl GeneDictionary {
    fn from_tree(tree: &Tree<Event>) -> Self {
        let mut tokens: Vec<String> = tree
            .preorder()
            .iter()
            .flat_map(|&n| tree[n].value.synteny.genes().iter().cloned())
            .collect();

        tokens.sort();
        tokens.dedup();

        GeneDictionary { tokens }
    }

    fn id(&self, token: &str) -> GeneId {
        self.tokens
            .binary_search_by(|t| t.as_str().cmp(token))
            .expect("gene family missing from the dictionary")
    }

    fn gene_set(&self, synteny: &Synteny) -> Vec<GeneId> {
        let mut ids: Vec<GeneId> =
            synteny.genes().iter().map(|g| self.id(g)).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn linearize<'a>(
        &self,
        pieces: impl IntoIterator<Item = &'a Vec<GeneId>>,
    ) -> Synteny {
        pieces
            .into_iter()
            .flatten()
            .map(|&id| self.tokens[id].as_str())
            .collect()
    }
}

fn union(a: &[GeneId], b: &[GeneId]) -> Vec<GeneId> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }

    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

fn intersection(a: &[GeneId], b: &[GeneId]) -> Vec<GeneId> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }

    out
}

fn difference(a: &[GeneId], b: &[GeneId]) -> Vec<GeneId> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }

    out.extend_from_slice(&a[i..]);
    out
}

/// Per-node state for the three passes: the set of gene families that
/// must appear in the node's synteny, and whether copying the parent's
/// set down to this node would save losses.
#[derive(Debug, Clone, Default)]
struct NodeInfo {
    genes: Vec<GeneId>,
    should_propagate: bool,
}

/// Initialization pass: compute, bottom-up, the minimal gene set of
/// every node and mark the nodes that should instead inherit their
/// parent's set.
fn initialize(
    tree: &Tree<Event>,
    dictionary: &GeneDictionary,
) -> Result<IntMap<NodeID, NodeInfo>, ReconcileError> {
    let mut info: IntMap<NodeID, NodeInfo> = Default::default();

    for node in tree.postorder() {
        let event = &tree[node].value;

        match tree.number_of_children(node) {
            0 => {
                match event.kind {
                    EventKind::None | EventKind::Loss => {}
                    other => {
                        return Err(TreeError::InvalidLeafEvent(other.to_string()).into())
                    }
                }

                info.insert(
                    node,
                    NodeInfo {
                        genes: dictionary.gene_set(&event.synteny),
                        // Leaves are observations and are never rewritten
                        should_propagate: false,
                    },
                );
            }

            2 => {
                match event.kind {
                    EventKind::Duplication | EventKind::Speciation => {}
                    other => {
                        return Err(
                            TreeError::InvalidInternalEvent(other.to_string()).into()
                        )
                    }
                }

                let left = tree.child(node, 0);
                let right = tree.child(node, 1);

                let left_loss = tree[left].value.kind == EventKind::Loss;
                let right_loss = tree[right].value.kind == EventKind::Loss;

                let info_left = &info[&left];
                let info_right = &info[&right];
                let genes = union(&info_left.genes, &info_right.genes);

                // Cases in which inheriting the parent synteny saves
                // losses: both children already diverge (or propagate
                // themselves), a duplication with a lost or propagating
                // child, or two children that are each lost or
                // propagating
                let should_propagate = ((info_left.genes != genes
                    || info_left.should_propagate)
                    && (info_right.genes != genes || info_right.should_propagate))
                    || (event.kind == EventKind::Duplication
                        && (left_loss
                            || info_left.should_propagate
                            || right_loss
                            || info_right.should_propagate))
                    || ((info_left.should_propagate || left_loss)
                        && (info_right.should_propagate || right_loss));

                info.insert(node, NodeInfo { genes, should_propagate });
            }

            1 => return Err(TreeError::UnaryNode.into()),
            n => return Err(TreeError::Polytomy(n).into()),
        }
    }

    Ok(info)
}

/// Propagation pass: copy parent gene sets down onto every node marked
/// as propagating.
fn propagate(tree: &Tree<Event>, info: &mut IntMap<NodeID, NodeInfo>) {
    for node in tree.preorder() {
        for &child in tree.children(node) {
            if info[&child].should_propagate {
                let genes = info[&node].genes.clone();
                info.get_mut(&child).unwrap().genes = genes;
            }
        }
    }
}

/// Resolution pass: linearize the gene sets into syntenies, insert the
/// required loss nodes and record duplicated segments.
fn resolve(
    tree: &mut Tree<Event>,
    dictionary: &GeneDictionary,
    info: &IntMap<NodeID, NodeInfo>,
) {
    for node in tree.postorder() {
        let genes = &info[&node].genes;

        // A node with no gene family left cannot evolve into anything:
        // its subtree collapses into a full loss
        if genes.is_empty() {
            tree.erase_children(node);
            tree[node].value = Event {
                kind: EventKind::Loss,
                synteny: Synteny::new(),
                segment: NO_SEGMENT,
            };
            continue;
        }

        if tree.number_of_children(node) != 2 {
            continue;
        }

        let left = tree.child(node, 0);
        let right = tree.child(node, 1);
        let genes_left = &info[&left].genes;
        let genes_right = &info[&right].genes;

        let s1 = intersection(genes_left, genes_right);
        let s2 = difference(genes_left, genes_right);
        let s3 = difference(genes, &union(genes_left, genes_right));
        let s4 = difference(genes_right, genes_left);

        let synteny = dictionary.linearize([&s1, &s2, &s3, &s4]);
        let left_target = dictionary.linearize([&s1, &s2]);
        let right_target = dictionary.linearize([&s1, &s4]);

        let kind = tree[node].value.kind;
        let left_loss = tree[left].value.kind == EventKind::Loss;
        let right_loss = tree[right].value.kind == EventKind::Loss;

        tree[node].value.synteny = synteny.clone();
        let mut segmental_left = false;

        if left_target != synteny && !left_loss {
            if kind == EventKind::Duplication {
                // Duplicating only the s1.s2 prefix spares the loss
                // that the left child would otherwise need
                segmental_left = true;
                tree[node].value.segment = (0, s1.len() + s2.len());
            } else {
                let start = s1.len() + s2.len();
                let stop = start + s3.len() + s4.len();
                tree.wrap(
                    left,
                    Event {
                        kind: EventKind::Loss,
                        synteny: synteny.clone(),
                        segment: (start, stop),
                    },
                );
            }
        }

        if kind == EventKind::Duplication && !segmental_left {
            // The left child costs nothing extra, so the duplicated
            // segment is free to cover the right child exactly
            tree[node].value.segment = if left_loss {
                let start = s1.len() + s2.len() + s3.len();
                (start, start + s4.len())
            } else {
                (0, s1.len())
            };
        } else if right_target != synteny && !right_loss {
            let start = s1.len();
            tree.wrap(
                right,
                Event {
                    kind: EventKind::Loss,
                    synteny: synteny.clone(),
                    segment: (start, start + s2.len() + s3.len()),
                },
            );
        }
    }
}

/// Assign a synteny to every internal node of a tree whose gene order
/// is unknown, minimizing duplications and losses. Loss nodes are
/// inserted and duplicated segments recorded along the way; the orders
/// chosen for internal syntenies are consistent across the whole tree.
pub fn unordered_super_reconciliation(
    tree: &mut Tree<Event>,
) -> Result<(), ReconcileError> {
    let dictionary = GeneDictionary::from_tree(tree);

    let mut info = initialize(tree, &dictionary)?;
    propagate(tree, &mut info);
    resolve(tree, &dictionary, &info);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_tree_from_tagged;
    use crate::nhx;

    fn expect_reconciles_to(input: &str, expected: &str) {
        let mut tree =
            event_tree_from_tagged(&nhx::parse_tree(input).unwrap()).unwrap();
        unordered_super_reconciliation(&mut tree).unwrap();

        let expected_tree =
            event_tree_from_tagged(&nhx::parse_tree(expected).unwrap()).unwrap();

        assert_eq!(tree, expected_tree);
    }

    #[test]
    fn propagates_duplications_with_leaf_and_loss_children() {
        expect_reconciles_to(
            r#"(
                (
                    [&&NHX:event=loss],
                    a
                )[&&NHX:event=speciation],
                (
                    b,
                    [&&NHX:event=loss]
                )[&&NHX:event=duplication]
            )"b a"[&&NHX:event=duplication];"#,
            r#"(
                (
                    [&&NHX:event=loss],
                    a
                )a[&&NHX:event=speciation],
                (
                    b,
                    [&&NHX:event=loss]
                )"b a"[&&NHX:event=duplication:segment="0 - 1"]
            )"a b"[&&NHX:event=duplication:segment="0 - 1"];"#,
        );
    }

    #[test]
    fn propagates_nodes_with_propagable_children() {
        expect_reconciles_to(
            r#"(
                (
                    (
                        (
                            [&&NHX:event=loss],
                            b
                        )[&&NHX:event=duplication],
                        (
                            [&&NHX:event=loss],
                            b
                        )[&&NHX:event=duplication]
                    )[&&NHX:event=speciation],
                    (
                        (
                            [&&NHX:event=loss],
                            a
                        )[&&NHX:event=duplication],
                        (
                            [&&NHX:event=loss],
                            a
                        )[&&NHX:event=duplication]
                    )[&&NHX:event=speciation]
                )[&&NHX:event=speciation],
                "a c"
            )"a b c"[&&NHX:event=speciation];"#,
            r#"(
                (
                    (
                        (
                            [&&NHX:event=loss],
                            b
                        )"a c b"[&&NHX:event=duplication:segment="2 - 3"],
                        (
                            [&&NHX:event=loss],
                            b
                        )"a c b"[&&NHX:event=duplication:segment="2 - 3"]
                    )"a b c"[&&NHX:event=speciation],
                    (
                        (
                            [&&NHX:event=loss],
                            a
                        )"b c a"[&&NHX:event=duplication:segment="2 - 3"],
                        (
                            [&&NHX:event=loss],
                            a
                        )"b c a"[&&NHX:event=duplication:segment="2 - 3"]
                    )"a b c"[&&NHX:event=speciation]
                )"a b c"[&&NHX:event=speciation],
                ("a c")"a c b"[&&NHX:event=loss:segment="2 - 3"]
            )"a c b"[&&NHX:event=speciation];"#,
        );
    }

    #[test]
    fn propagates_duplications_with_subtree_and_loss_children() {
        expect_reconciles_to(
            r#"(
                (
                    "a b",
                    (
                        a,
                        [&&NHX:event=loss]
                    )[&&NHX:event=speciation]
                )[&&NHX:event=duplication],
                (
                    (
                        (
                            (
                                b,
                                b
                            )[&&NHX:event=speciation],
                            (
                                b,
                                b
                            )[&&NHX:event=duplication]
                        )[&&NHX:event=speciation],
                        [&&NHX:event=loss]
                    )[&&NHX:event=duplication],
                    [&&NHX:event=loss]
                )[&&NHX:event=speciation]
            )"a b"[&&NHX:event=speciation];"#,
            r#"(
                (
                    "a b",
                    (
                        a,
                        [&&NHX:event=loss]
                    )a[&&NHX:event=speciation]
                )"a b"[&&NHX:event=duplication:segment="0 - 1"],
                (
                    (
                        (
                            (
                                b,
                                b
                            )b[&&NHX:event=speciation],
                            (
                                b,
                                b
                            )b[&&NHX:event=duplication:segment="0 - 1"]
                        )b[&&NHX:event=speciation],
                        [&&NHX:event=loss]
                    )"b a"[&&NHX:event=duplication:segment="0 - 1"],
                    [&&NHX:event=loss]
                )"a b"[&&NHX:event=speciation]
            )"a b"[&&NHX:event=speciation];"#,
        );
    }

    #[test]
    fn propagates_nodes_with_loss_and_propagable_children() {
        expect_reconciles_to(
            r#"(
                (
                    [&&NHX:event=loss],
                    (
                        c,
                        b
                    )[&&NHX:event=duplication]
                )[&&NHX:event=speciation],
                "a b c"
            )"a b c"[&&NHX:event=speciation];"#,
            r#"(
                (
                    [&&NHX:event=loss],
                    (
                        c,
                        (b)"c a b"[&&NHX:event=loss:segment="0 - 2"]
                    )"c a b"[&&NHX:event=duplication:segment="0 - 1"]
                )"a b c"[&&NHX:event=speciation],
                "a b c"
            )"a b c"[&&NHX:event=speciation];"#,
        );
    }

    #[test]
    fn propagates_nodes_with_two_disjoint_children_sets() {
        expect_reconciles_to(
            r#"(
                (
                    (
                        e,
                        "e a"
                    )[&&NHX:event=duplication],
                    b
                )[&&NHX:event=duplication],
                "e b c"
            )"a b c e"[&&NHX:event=duplication];"#,
            r#"(
                (
                    (
                        e,
                        "e a"
                    )"e a"[&&NHX:event=duplication:segment="0 - 1"],
                    (b)"a e c b"[&&NHX:event=loss:segment="0 - 3"]
                )"a e c b"[&&NHX:event=duplication:segment="0 - 2"],
                "e b c"
            )"b c e a"[&&NHX:event=duplication:segment="0 - 3"];"#,
        );
    }

    #[test]
    fn propagates_duplications_with_subtree_and_propagable_children() {
        expect_reconciles_to(
            r#"(
                "a b c",
                (
                    (
                        b,
                        a
                    )[&&NHX:event=duplication],
                    (
                        "b a",
                        "b a"
                    )[&&NHX:event=speciation]
                )[&&NHX:event=duplication]
            )"a b c"[&&NHX:event=speciation];"#,
            r#"(
                "a b c",
                (
                    (
                        b,
                        (a)"b c a"[&&NHX:event=loss:segment="0 - 2"]
                    )"b c a"[&&NHX:event=duplication:segment="0 - 1"],
                    (
                        "b a",
                        "b a"
                    )"a b"[&&NHX:event=speciation]
                )"a b c"[&&NHX:event=duplication:segment="0 - 2"]
            )"a b c"[&&NHX:event=speciation];"#,
        );
    }

    #[test]
    fn does_not_propagate_speciations_with_one_propagable_child() {
        expect_reconciles_to(
            r#"(
                (
                    (
                        [&&NHX:event=loss],
                        (
                            [&&NHX:event=loss],
                            a
                        )[&&NHX:event=speciation]
                    )[&&NHX:event=speciation],
                    (
                        (
                            a,
                            a
                        )[&&NHX:event=duplication],
                        (
                            a,
                            a
                        )[&&NHX:event=speciation]
                    )[&&NHX:event=speciation]
                )[&&NHX:event=speciation],
                "a b c d"
            )"a b c d"[&&NHX:event=duplication];"#,
            r#"(
                (
                    (
                        [&&NHX:event=loss],
                        (
                            [&&NHX:event=loss],
                            a
                        )a[&&NHX:event=speciation]
                    )a[&&NHX:event=speciation],
                    (
                        (
                            a,
                            a
                        )a[&&NHX:event=duplication:segment="0 - 1"],
                        (
                            a,
                            a
                        )a[&&NHX:event=speciation]
                    )a[&&NHX:event=speciation]
                )a[&&NHX:event=speciation],
                "a b c d"
            )"a b c d"[&&NHX:event=duplication:segment="0 - 1"];"#,
        );
    }

    #[test]
    fn parent_gene_sets_contain_child_gene_sets() {
        let input = r#"(
            (
                (e, "e a")[&&NHX:event=duplication],
                b
            )[&&NHX:event=duplication],
            "e b c"
        )"a b c e"[&&NHX:event=duplication];"#;

        let mut tree =
            event_tree_from_tagged(&nhx::parse_tree(input).unwrap()).unwrap();
        unordered_super_reconciliation(&mut tree).unwrap();

        for node in tree.preorder() {
            let collect = |n: NodeID| {
                let mut genes: Vec<_> =
                    tree[n].value.synteny.genes().to_vec();
                genes.sort();
                genes
            };

            if let Some(parent) = tree.parent(node) {
                let child_genes = collect(node);
                let parent_genes = collect(parent);

                assert!(
                    child_genes.iter().all(|g| parent_genes.contains(g)),
                    "genes of {:?} not contained in its parent",
                    tree[node].value.synteny.to_string()
                );
            }
        }
    }

    #[test]
    fn rejects_unary_nodes() {
        let input = "((a)x[&&NHX:event=speciation],b)\"a b\"[&&NHX:event=speciation];";
        let mut tree =
            event_tree_from_tagged(&nhx::parse_tree(input).unwrap()).unwrap();

        assert!(matches!(
            unordered_super_reconciliation(&mut tree),
            Err(ReconcileError::Tree(TreeError::UnaryNode))
        ));
    }
}
