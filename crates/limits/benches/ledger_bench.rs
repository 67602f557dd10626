//! Criterion benchmarks for fleet ledger mutations.
//!
//! Every host mutation that changes a grid's size, owner or class ends in one
//! ledger change, so these sit on the enforcement hot path.
//!
//! Run with: cargo bench -p limits --bench ledger_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use limits::catalog::{CatalogSource, ClassId, ClassSource, RuleCatalog};
use limits::fleet::{FleetLedger, LedgerChange};
use limits::host::{GridId, OwnerRef};

const FACTION: OwnerRef = OwnerRef::group(1);
const WARSHIP: ClassId = ClassId(1);

fn catalog() -> RuleCatalog {
    RuleCatalog::build(CatalogSource {
        block_types: Vec::new(),
        classes: vec![
            ClassSource::named("Unclassified"),
            ClassSource::named("Warship")
                .classifier("WarshipCore")
                .per_faction(16),
        ],
    })
    .expect("bench catalog is valid")
}

/// Ledger holding `grids` warships of random size for one faction.
fn populated(catalog: &RuleCatalog, grids: u64, rng: &mut ChaCha8Rng) -> FleetLedger {
    let mut ledger = FleetLedger::default();
    for id in 0..grids {
        ledger.apply(
            LedgerChange::Enroll {
                grid: GridId(id),
                owner: FACTION,
                class: WARSHIP,
                blocks: rng.gen_range(1..5_000),
            },
            catalog,
        );
    }
    ledger
}

fn bench_enroll(c: &mut Criterion) {
    let catalog = catalog();
    let mut group = c.benchmark_group("ledger_enroll");
    for grids in [64u64, 512, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(grids), &grids, |b, &grids| {
            b.iter(|| {
                let mut rng = ChaCha8Rng::seed_from_u64(7);
                black_box(populated(&catalog, grids, &mut rng))
            });
        });
    }
    group.finish();
}

fn bench_resize_churn(c: &mut Criterion) {
    let catalog = catalog();
    let mut group = c.benchmark_group("ledger_resize");
    for grids in [64u64, 512, 4096] {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut ledger = populated(&catalog, grids, &mut rng);
        group.bench_with_input(BenchmarkId::from_parameter(grids), &grids, |b, &grids| {
            b.iter(|| {
                let outcome = ledger.apply(
                    LedgerChange::Resize {
                        grid: GridId(rng.gen_range(0..grids)),
                        owner: FACTION,
                        class: WARSHIP,
                        blocks: rng.gen_range(1..5_000),
                    },
                    &catalog,
                );
                black_box(outcome)
            });
        });
    }
    group.finish();
}

fn bench_transfer(c: &mut Criterion) {
    let catalog = catalog();
    let rival = OwnerRef::group(2);
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    let mut ledger = populated(&catalog, 512, &mut rng);
    let mut owners = vec![FACTION; 512];

    c.bench_function("ledger_transfer_512", |b| {
        b.iter(|| {
            let i = rng.gen_range(0..owners.len());
            let from = owners[i];
            let to = if from == FACTION { rival } else { FACTION };
            owners[i] = to;
            black_box(ledger.apply(
                LedgerChange::Transfer {
                    grid: GridId(i as u64),
                    from: (from, WARSHIP),
                    to: (to, WARSHIP),
                    blocks: rng.gen_range(1..5_000),
                },
                &catalog,
            ))
        });
    });
}

criterion_group!(benches, bench_enroll, bench_resize_churn, bench_transfer);
criterion_main!(benches);
