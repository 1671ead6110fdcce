use crate::event::{Event, EventKind};
use crate::event_tree::{NodeID, Tree};
use crate::synteny::{Segment, Synteny, NO_SEGMENT};
use ordered_float::OrderedFloat;
use rand::Rng;

/// Parameters of the evolution model.
///
/// The probability fields use [`OrderedFloat`] so that a parameter set
/// can serve as a key when the evaluator groups its samples.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimulationParams {
    /// Ancestral synteny from which the simulation evolves.
    pub base: Synteny,

    /// Maximum depth of events on a branch, not counting losses.
    pub depth: u32,

    /// Probability for an internal node to be a duplication.
    pub p_dup: OrderedFloat<f64>,

    /// Parameter of the geometric distribution of the lengths of
    /// segmental duplications.
    pub p_dup_length: OrderedFloat<f64>,

    /// Probability for a loss under each child branch.
    pub p_loss: OrderedFloat<f64>,

    /// Parameter of the geometric distribution of the lengths of
    /// segmental losses.
    pub p_loss_length: OrderedFloat<f64>,

    /// Parameter of the geometric distribution of the number of gene
    /// pairs rearranged from a node to one of its children. A value of
    /// 1 disables rearrangement.
    pub p_rearr: OrderedFloat<f64>,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            base: Synteny::dummy(5),
            depth: 5,
            p_dup: OrderedFloat(0.5),
            p_dup_length: OrderedFloat(0.3),
            p_loss: OrderedFloat(0.2),
            p_loss_length: OrderedFloat(0.7),
            p_rearr: OrderedFloat(1.),
        }
    }
}

/// Number of failures before the first success of a Bernoulli trial of
/// probability `p`, by inverse-transform sampling.
fn geometric<R: Rng + ?Sized>(rng: &mut R, p: f64) -> usize {
    if p >= 1. {
        return 0;
    }

    let p = p.max(1e-9);
    let u: f64 = rng.gen();

    ((1. - u).ln() / (1. - p).ln()) as usize
}

fn random_segment<R: Rng + ?Sized>(
    rng: &mut R,
    length_param: f64,
    extra: usize,
    total: usize,
) -> Segment {
    let length = (geometric(rng, length_param) + extra).clamp(1, total);
    let start = rng.gen_range(0..=total - length);
    (start, start + length)
}

fn rearrange<R: Rng + ?Sized>(
    rng: &mut R,
    params: &SimulationParams,
    mut synteny: Synteny,
) -> Synteny {
    if synteny.len() < 2 {
        return synteny;
    }

    for _ in 0..geometric(rng, params.p_rearr.into_inner()) {
        let i = rng.gen_range(0..synteny.len());
        let j = rng.gen_range(0..synteny.len());
        synteny.swap(i, j);
    }

    synteny
}

fn build<R: Rng + ?Sized>(
    rng: &mut R,
    params: &SimulationParams,
    tree: &mut Tree<Event>,
    node: NodeID,
    synteny: Synteny,
    depth: u32,
) {
    if synteny.is_empty() {
        tree[node].value = Event {
            kind: EventKind::Loss,
            synteny: Synteny::new(),
            segment: NO_SEGMENT,
        };
        return;
    }

    if depth == 0 {
        tree[node].value = Event::leaf(synteny);
        return;
    }

    let kind = if rng.gen::<f64>() < params.p_dup.into_inner() {
        EventKind::Duplication
    } else {
        EventKind::Speciation
    };

    let mut branches = [synteny.clone(), synteny.clone()];
    let mut segment = NO_SEGMENT;

    if kind == EventKind::Duplication {
        // One of the two copies only receives a random segment of the
        // synteny; the other one is complete
        segment = random_segment(
            rng,
            params.p_dup_length.into_inner(),
            0,
            synteny.len(),
        );
        let side = usize::from(rng.gen::<bool>());
        branches[side] = synteny.segment(segment);
    }

    tree[node].value = Event { kind, synteny, segment };

    for branch in branches {
        grow_branch(rng, params, tree, node, branch, depth - 1);
    }
}

/// Grow one child branch under `parent`: optionally apply a segmental
/// loss (reified as an explicit loss node), rearrange gene pairs, then
/// recurse into the remaining synteny.
fn grow_branch<R: Rng + ?Sized>(
    rng: &mut R,
    params: &SimulationParams,
    tree: &mut Tree<Event>,
    parent: NodeID,
    base: Synteny,
    depth: u32,
) {
    let mut attach = parent;
    let mut remaining = base;

    if !remaining.is_empty() && rng.gen::<f64>() < params.p_loss.into_inner() {
        let segment = random_segment(
            rng,
            params.p_loss_length.into_inner(),
            1,
            remaining.len(),
        );

        attach = tree.add_node(
            Event { kind: EventKind::Loss, synteny: remaining.clone(), segment },
            parent,
        );
        remaining = remaining.without_segment(segment);
    }

    let remaining = rearrange(rng, params, remaining);
    let child = tree.add_node(Event::default(), attach);
    build(rng, params, tree, child, remaining, depth);
}

/// Simulate the evolution of a synteny and record the history of the
/// simulated events as a reference tree.
///
/// All randomness comes from the caller-supplied generator, so that a
/// fixed seed reproduces the exact same tree.
pub fn simulate_evolution<R: Rng + ?Sized>(
    rng: &mut R,
    params: &SimulationParams,
) -> Tree<Event> {
    let mut tree = Tree::new(Event::default());
    let root = tree.root();
    build(rng, params, &mut tree, root, params.base.clone(), params.depth);
    tree
}
