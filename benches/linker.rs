use divan::{Bencher, black_box};
use treelineage::record::{Extracted, MatchSource};
use treelineage::{Derivation, MatchStore, Tree, link_batch};

fn main() {
    divan::main();
}

fn seeded_store(n: usize) -> MatchStore {
    let subtree = Tree::parse("(NP (DT the) (JJ big) (NN cat))").unwrap();
    MatchStore::create_initial((0..n).map(|i| Extracted {
        source: MatchSource {
            pattern_name: format!("p{}", i % 4),
            label: "increase".to_string(),
            ..Default::default()
        },
        subtree: subtree.clone(),
    }))
}

fn rewrites(n: usize) -> Vec<Derivation> {
    let rewritten = Tree::parse("(NP (JJ big) (NN cat))").unwrap();
    (0..n)
        .map(|i| Derivation::new(i, "drop-det", rewritten.clone()))
        .collect()
}

/// Link one derived record per original
#[divan::bench(args = [100, 1_000, 10_000])]
fn link_fresh_batch(bencher: Bencher, n: usize) {
    bencher
        .with_inputs(|| (seeded_store(n), rewrites(n)))
        .bench_local_values(|(mut store, batch)| {
            link_batch(&mut store, batch).unwrap();
            black_box(store)
        });
}

/// Every rewrite is a no-op, so only comparison cost remains
#[divan::bench(args = [100, 1_000, 10_000])]
fn link_unchanged_batch(bencher: Bencher, n: usize) {
    let unchanged = Tree::parse("(NP (DT the) (JJ big) (NN cat))").unwrap();
    bencher
        .with_inputs(|| {
            let batch: Vec<Derivation> = (0..n)
                .map(|i| Derivation::new(i, "noop", unchanged.clone()))
                .collect();
            (seeded_store(n), batch)
        })
        .bench_local_values(|(mut store, batch)| {
            black_box(link_batch(&mut store, batch).unwrap())
        });
}

#[divan::bench(args = [1_000, 10_000])]
fn export_wire(bencher: Bencher, n: usize) {
    let mut store = seeded_store(n);
    link_batch(&mut store, rewrites(n)).unwrap();
    bencher.bench_local(|| black_box(&store).to_wire());
}
