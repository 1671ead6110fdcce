use crate::cost::Cost;
use crate::errors::{ReconcileError, TreeError};
use crate::event::{Event, EventKind};
use crate::event_tree::{NodeID, Tree};
use crate::synteny::{Segment, Synteny, NO_SEGMENT};
use identity_hash::IntMap;
use std::collections::HashMap;

/// Dynamic-programming record for one candidate synteny at one node.
///
/// `cost` is the value of d(v, X): the minimum number of segmental
/// duplications and losses in the subtree rooted at v, given that v is
/// assigned the candidate synteny X. When the record is optimal, the
/// children are assigned the candidates at indices `left` and `right`;
/// at duplication nodes, the `partial_*` flags mark a child obtained
/// through a segmental duplication, whose prefix and suffix losses are
/// free.
#[derive(Debug, Clone)]
struct Candidate {
    cost: Cost,
    left: usize,
    right: usize,
    partial_left: bool,
    partial_right: bool,
}

impl Candidate {
    fn unreachable() -> Self {
        Candidate {
            cost: Cost::PosInf,
            left: 0,
            right: 0,
            partial_left: false,
            partial_right: false,
        }
    }
}

/// All candidate syntenies (the deduplicated ordered subsequences of
/// the ancestral synteny), plus, for each of them, its own subsequences
/// with their precomputed loss distances.
struct CandidateSet {
    syntenies: Vec<Synteny>,
    index: HashMap<Synteny, usize>,
    // (subsequence index, total distance, substring distance)
    subs: Vec<Vec<(usize, Cost, Cost)>>,
}

impl CandidateSet {
    fn new(ancestral: &Synteny) -> Result<Self, ReconcileError> {
        let mut syntenies = Vec::new();
        let mut index = HashMap::new();

        for sub in ancestral.subsequences() {
            if !index.contains_key(&sub) {
                index.insert(sub.clone(), syntenies.len());
                syntenies.push(sub);
            }
        }

        let mut subs = Vec::with_capacity(syntenies.len());

        for synteny in &syntenies {
            let mut entry = Vec::new();

            for sub in synteny.subsequences() {
                let total = synteny.distance_to(&sub, false)?;
                let partial = synteny.distance_to(&sub, true)?;
                entry.push((index[&sub], Cost::from(total), Cost::from(partial)));
            }

            subs.push(entry);
        }

        Ok(CandidateSet { syntenies, index, subs })
    }

    fn len(&self) -> usize {
        self.syntenies.len()
    }
}

/// Best assignment found for one child over the subsequences of a
/// candidate, in both total and substring distance modes.
struct ChildBest {
    total_cost: Cost,
    total: usize,
    partial_cost: Cost,
    partial: usize,
}

fn best_for_child(
    candidates: &CandidateSet,
    x: usize,
    child_table: &[Candidate],
) -> Result<ChildBest, ReconcileError> {
    let mut best = ChildBest {
        total_cost: Cost::PosInf,
        total: 0,
        partial_cost: Cost::PosInf,
        partial: 0,
    };

    for &(y, total_dist, partial_dist) in &candidates.subs[x] {
        let total = total_dist.checked_add(child_table[y].cost)?;
        if total < best.total_cost {
            best.total_cost = total;
            best.total = y;
        }

        let partial = partial_dist.checked_add(child_table[y].cost)?;
        if partial < best.partial_cost {
            best.partial_cost = partial;
            best.partial = y;
        }
    }

    Ok(best)
}

fn fill_tables(
    tree: &Tree<Event>,
    candidates: &CandidateSet,
    ancestral: &Synteny,
) -> Result<IntMap<NodeID, Vec<Candidate>>, ReconcileError> {
    let mut tables: IntMap<NodeID, Vec<Candidate>> = Default::default();

    for node in tree.postorder() {
        let event = &tree[node].value;
        let mut table = Vec::with_capacity(candidates.len());

        match tree.number_of_children(node) {
            0 => {
                match event.kind {
                    EventKind::None | EventKind::Loss => {}
                    other => {
                        return Err(TreeError::InvalidLeafEvent(other.to_string()).into())
                    }
                }

                // The only candidate a leaf accepts is the synteny it
                // was observed with
                for synteny in &candidates.syntenies {
                    let mut info = Candidate::unreachable();
                    if *synteny == event.synteny {
                        info.cost = Cost::from(0i64);
                    }
                    table.push(info);
                }
            }

            2 => {
                let left_table = &tables[&tree.child(node, 0)];
                let right_table = &tables[&tree.child(node, 1)];

                for x in 0..candidates.len() {
                    let left = best_for_child(candidates, x, left_table)?;
                    let right = best_for_child(candidates, x, right_table)?;

                    let info = match event.kind {
                        EventKind::Speciation => {
                            // Both children are full copies; any
                            // difference is paid in segmental losses
                            Candidate {
                                cost: left.total_cost.checked_add(right.total_cost)?,
                                left: left.total,
                                right: right.total,
                                partial_left: false,
                                partial_right: false,
                            }
                        }

                        EventKind::Duplication => {
                            // At most one child may be a segmental
                            // copy; prefer a full duplication, then a
                            // segmental one on the right, then on the
                            // left
                            let one = Cost::from(1i64);
                            let full =
                                left.total_cost.checked_add(right.total_cost)?;
                            let partial_right =
                                left.total_cost.checked_add(right.partial_cost)?;
                            let partial_left =
                                left.partial_cost.checked_add(right.total_cost)?;

                            if full <= partial_right && full <= partial_left {
                                Candidate {
                                    cost: one.checked_add(full)?,
                                    left: left.total,
                                    right: right.total,
                                    partial_left: false,
                                    partial_right: false,
                                }
                            } else if partial_right <= full
                                && partial_right <= partial_left
                            {
                                Candidate {
                                    cost: one.checked_add(partial_right)?,
                                    left: left.total,
                                    right: right.partial,
                                    partial_left: false,
                                    partial_right: true,
                                }
                            } else {
                                Candidate {
                                    cost: one.checked_add(partial_left)?,
                                    left: left.partial,
                                    right: right.total,
                                    partial_left: true,
                                    partial_right: false,
                                }
                            }
                        }

                        other => {
                            return Err(
                                TreeError::InvalidInternalEvent(other.to_string()).into()
                            )
                        }
                    };

                    table.push(info);
                }
            }

            1 => return Err(TreeError::UnaryNode.into()),
            n => return Err(TreeError::Polytomy(n).into()),
        }

        if table.iter().all(|info| info.cost.is_infinite()) {
            return Err(ReconcileError::InconsistentInput {
                ancestral: ancestral.to_string(),
            });
        }

        tables.insert(node, table);
    }

    Ok(tables)
}

/// Interval of `source` spanned by the greedy subsequence matching of
/// `target`, prefix and suffix losses excluded.
fn kept_window(source: &Synteny, target: &Synteny) -> Segment {
    let src = source.genes();
    let tgt = target.genes();

    let mut first = None;
    let mut last = 0;
    let mut i = 0;
    let mut j = 0;

    while i < src.len() && j < tgt.len() {
        if src[i] == tgt[j] {
            first.get_or_insert(i);
            last = i;
            j += 1;
        }
        i += 1;
    }

    match first {
        Some(first) => (first, last + 1),
        None => NO_SEGMENT,
    }
}

/// Reify the losses on the edge from a parent with synteny `base` to
/// `child`, so that each inserted loss node accounts for exactly one
/// lost segment. In substring mode (segmentally duplicated children),
/// prefix and suffix losses are not reified.
fn resolve_losses(
    tree: &mut Tree<Event>,
    base: &Synteny,
    child: NodeID,
    substring: bool,
) -> Result<(), ReconcileError> {
    let child_synteny = tree[child].value.synteny.clone();
    let allowed = usize::from(tree[child].value.kind == EventKind::Loss);

    if base.distance_to(&child_synteny, substring)? > allowed {
        let segment = base.reconcile(&child_synteny, substring, Cost::from(1i64))?[0];

        tree.wrap(
            child,
            Event { kind: EventKind::Loss, synteny: base.clone(), segment },
        );

        let reduced = base.without_segment(segment);
        resolve_losses(tree, &reduced, child, substring)?;
    }

    Ok(())
}

fn propagate(
    tree: &mut Tree<Event>,
    tables: &IntMap<NodeID, Vec<Candidate>>,
    candidates: &CandidateSet,
    node: NodeID,
    assigned: usize,
) -> Result<(), ReconcileError> {
    let synteny = candidates.syntenies[assigned].clone();

    // An internal node assigned an empty synteny has nothing left to
    // evolve: its whole subtree collapses into a full loss
    if synteny.is_empty() && !tree.is_leaf(node) {
        tree.erase_children(node);
        tree[node].value = Event {
            kind: EventKind::Loss,
            synteny: Synteny::new(),
            segment: NO_SEGMENT,
        };
        return Ok(());
    }

    if tree.is_leaf(node) {
        return Ok(());
    }

    let info = tables[&node][assigned].clone();
    let left = tree.child(node, 0);
    let right = tree.child(node, 1);

    tree[left].value.synteny = candidates.syntenies[info.left].clone();
    tree[right].value.synteny = candidates.syntenies[info.right].clone();

    // Children ending up with an empty synteny turn into full losses
    // right away, so that no loss chain is reified above them
    for (child, index) in [(left, info.left), (right, info.right)] {
        if candidates.syntenies[index].is_empty() && !tree.is_leaf(child) {
            tree.erase_children(child);
            tree[child].value = Event {
                kind: EventKind::Loss,
                synteny: Synteny::new(),
                segment: NO_SEGMENT,
            };
        }
    }

    if tree[node].value.kind == EventKind::Duplication {
        tree[node].value.segment = if info.partial_left {
            kept_window(&synteny, &candidates.syntenies[info.left])
        } else if info.partial_right {
            kept_window(&synteny, &candidates.syntenies[info.right])
        } else {
            (0, synteny.len())
        };
    }

    resolve_losses(tree, &synteny, left, info.partial_left)?;
    resolve_losses(tree, &synteny, right, info.partial_right)?;

    propagate(tree, tables, candidates, left, info.left)?;
    propagate(tree, tables, candidates, right, info.right)
}

/// Assign a synteny to every internal node of the tree so that the
/// total number of segmental duplications and losses is minimized,
/// then insert explicit loss nodes along the edges where segments
/// disappear.
///
/// The root must carry the ancestral synteny; internal nodes carry
/// duplication or speciation events and leaves carry the observed
/// syntenies. Returns the optimal cost.
pub fn super_reconciliation(tree: &mut Tree<Event>) -> Result<i64, ReconcileError> {
    let root = tree.root();
    let ancestral = tree[root].value.synteny.clone();

    let candidates = CandidateSet::new(&ancestral)?;
    let tables = fill_tables(tree, &candidates, &ancestral)?;

    // The root keeps the ancestral synteny it came with; the table
    // entry for that synteny drives the rest of the assignment
    let root_index = candidates.index[&ancestral];
    let cost = tables[&root][root_index].cost;

    if cost.is_infinite() {
        return Err(ReconcileError::InconsistentInput {
            ancestral: ancestral.to_string(),
        });
    }

    propagate(tree, &tables, &candidates, root, root_index)?;
    Ok(cost.finite()?)
}
