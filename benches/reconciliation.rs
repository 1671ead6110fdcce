use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use synrec::erase::erase_tree;
use synrec::event::Event;
use synrec::event_tree::Tree;
use synrec::ordered::super_reconciliation;
use synrec::sim::{simulate_evolution, SimulationParams};
use synrec::synteny::Synteny;
use synrec::unordered::unordered_super_reconciliation;

fn erased_input(seed: u64, base_size: usize, depth: u32) -> Tree<Event> {
    let params = SimulationParams {
        base: Synteny::dummy(base_size),
        depth,
        ..Default::default()
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut tree = simulate_evolution(&mut rng, &params);
    erase_tree(&mut tree);
    tree
}

fn ordered_reconciliation(c: &mut Criterion) {
    for base_size in [4, 6, 8] {
        let input = erased_input(42, base_size, 5);

        c.bench_function(&format!("ordered/base-{}", base_size), |b| {
            b.iter_batched(
                || input.clone(),
                |mut tree| super_reconciliation(&mut tree).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }
}

fn unordered_reconciliation(c: &mut Criterion) {
    for base_size in [6, 10, 20] {
        let input = erased_input(42, base_size, 6);

        c.bench_function(&format!("unordered/base-{}", base_size), |b| {
            b.iter_batched(
                || input.clone(),
                |mut tree| unordered_super_reconciliation(&mut tree).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(ordered, ordered_reconciliation);
criterion_group! {
    name = unordered;
    config = Criterion::default().sample_size(30);
    targets = unordered_reconciliation
}
criterion_main!(ordered, unordered);
