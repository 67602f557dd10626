use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::catalog::{CatalogSource, ClassId, ClassSource, RuleCatalog};
use crate::compliance::ComplianceState;
use crate::fleet::*;
use crate::host::{GridId, OwnerRef};

const DESTROYER: ClassId = ClassId(1);

fn catalog(per_faction: u32) -> RuleCatalog {
    RuleCatalog::build(CatalogSource {
        block_types: vec![],
        classes: vec![
            ClassSource::named("Unclassified"),
            ClassSource::named("Destroyer")
                .classifier("DestroyerCore")
                .per_faction(per_faction)
                .per_player(1)
                .weight(2.5),
        ],
    })
    .unwrap()
}

fn enroll(ledger: &mut FleetLedger, catalog: &RuleCatalog, grid: u64, blocks: u32) -> LedgerOutcome {
    ledger.apply(
        LedgerChange::Enroll {
            grid: GridId(grid),
            owner: OwnerRef::group(1),
            class: DESTROYER,
            blocks,
        },
        catalog,
    )
}

fn standing(ledger: &FleetLedger, grid: u64) -> Option<Standing> {
    ledger.standing(OwnerRef::group(1), DESTROYER, GridId(grid))
}

#[test]
fn test_enroll_under_quota_is_supported() {
    let catalog = catalog(2);
    let mut ledger = FleetLedger::default();
    let out = enroll(&mut ledger, &catalog, 1, 10);
    assert_eq!(out.standing_of(GridId(1)), Some(Standing::Supported));
    enroll(&mut ledger, &catalog, 2, 5);
    assert_eq!(standing(&ledger, 2), Some(Standing::Supported));
}

#[test]
fn test_bigger_newcomer_swaps_with_smallest() {
    let catalog = catalog(1);
    let mut ledger = FleetLedger::default();
    enroll(&mut ledger, &catalog, 1, 10);
    let out = enroll(&mut ledger, &catalog, 2, 20);
    assert_eq!(out.standing_of(GridId(1)), Some(Standing::Unsupported));
    assert_eq!(out.standing_of(GridId(2)), Some(Standing::Supported));
    ledger.check_invariants().unwrap();
}

#[test]
fn test_equal_size_does_not_swap() {
    let catalog = catalog(1);
    let mut ledger = FleetLedger::default();
    enroll(&mut ledger, &catalog, 1, 10);
    enroll(&mut ledger, &catalog, 2, 10);
    assert_eq!(standing(&ledger, 1), Some(Standing::Supported));
    assert_eq!(standing(&ledger, 2), Some(Standing::Unsupported));
}

#[test]
fn test_swap_demotes_highest_id_among_equal_smallest() {
    let catalog = catalog(2);
    let mut ledger = FleetLedger::default();
    enroll(&mut ledger, &catalog, 3, 10);
    enroll(&mut ledger, &catalog, 4, 10);
    enroll(&mut ledger, &catalog, 5, 11);
    assert_eq!(standing(&ledger, 3), Some(Standing::Supported));
    assert_eq!(standing(&ledger, 4), Some(Standing::Unsupported));
    assert_eq!(standing(&ledger, 5), Some(Standing::Supported));
}

#[test]
fn test_withdraw_promotes_largest_unsupported() {
    let catalog = catalog(1);
    let mut ledger = FleetLedger::default();
    enroll(&mut ledger, &catalog, 1, 50);
    enroll(&mut ledger, &catalog, 2, 20);
    enroll(&mut ledger, &catalog, 3, 30);
    let out = ledger.apply(
        LedgerChange::Withdraw {
            grid: GridId(1),
            owner: OwnerRef::group(1),
            class: DESTROYER,
        },
        &catalog,
    );
    assert_eq!(out.standings, vec![(GridId(3), Standing::Supported)]);
    assert_eq!(standing(&ledger, 1), None);
    assert_eq!(standing(&ledger, 2), Some(Standing::Unsupported));
}

#[test]
fn test_withdraw_unknown_reports_invariant() {
    let catalog = catalog(1);
    let mut ledger = FleetLedger::default();
    let out = ledger.apply(
        LedgerChange::Withdraw {
            grid: GridId(9),
            owner: OwnerRef::group(1),
            class: DESTROYER,
        },
        &catalog,
    );
    assert_eq!(out.errors.len(), 1);
}

#[test]
fn test_resize_rebalances() {
    let catalog = catalog(1);
    let mut ledger = FleetLedger::default();
    enroll(&mut ledger, &catalog, 1, 200);
    enroll(&mut ledger, &catalog, 2, 150);
    assert_eq!(standing(&ledger, 1), Some(Standing::Supported));

    let out = ledger.apply(
        LedgerChange::Resize {
            grid: GridId(1),
            owner: OwnerRef::group(1),
            class: DESTROYER,
            blocks: 100,
        },
        &catalog,
    );
    assert_eq!(out.standing_of(GridId(1)), Some(Standing::Unsupported));
    assert_eq!(out.standing_of(GridId(2)), Some(Standing::Supported));
}

#[test]
fn test_transfer_moves_between_owners() {
    let catalog = catalog(1);
    let mut ledger = FleetLedger::default();
    enroll(&mut ledger, &catalog, 1, 10);
    enroll(&mut ledger, &catalog, 2, 5);

    let out = ledger.apply(
        LedgerChange::Transfer {
            grid: GridId(1),
            from: (OwnerRef::group(1), DESTROYER),
            to: (OwnerRef::group(2), DESTROYER),
            blocks: 10,
        },
        &catalog,
    );
    assert!(out.errors.is_empty());
    assert_eq!(standing(&ledger, 2), Some(Standing::Supported));
    assert_eq!(
        ledger.standing(OwnerRef::group(2), DESTROYER, GridId(1)),
        Some(Standing::Supported)
    );
    assert_eq!(
        ledger.locate(GridId(1)),
        Some((OwnerRef::group(2), DESTROYER, Standing::Supported))
    );
    ledger.check_invariants().unwrap();
}

#[test]
fn test_transfer_to_unknown_class_leaves_grid_in_place() {
    let catalog = catalog(1);
    let mut ledger = FleetLedger::default();
    enroll(&mut ledger, &catalog, 1, 10);
    let out = ledger.apply(
        LedgerChange::Transfer {
            grid: GridId(1),
            from: (OwnerRef::group(1), DESTROYER),
            to: (OwnerRef::group(2), ClassId(7)),
            blocks: 10,
        },
        &catalog,
    );
    assert_eq!(out.errors.len(), 1);
    assert_eq!(standing(&ledger, 1), Some(Standing::Supported));
}

#[test]
fn test_quota_by_owner_kind() {
    let catalog = catalog(3);
    let mut ledger = FleetLedger::default();
    for grid in 1..=2 {
        ledger.apply(
            LedgerChange::Enroll {
                grid: GridId(grid),
                owner: OwnerRef::individual(8),
                class: DESTROYER,
                blocks: grid as u32,
            },
            &catalog,
        );
    }
    let solo = ledger.summary(OwnerRef::individual(8), &catalog).unwrap();
    let destroyers = &solo.classes[DESTROYER.index()];
    assert_eq!((destroyers.supported, destroyers.unsupported), (1, 1));
    assert_eq!(destroyers.max, Some(1));

    for grid in 10..20 {
        ledger.apply(
            LedgerChange::Enroll {
                grid: GridId(grid),
                owner: OwnerRef::NONE,
                class: DESTROYER,
                blocks: 1,
            },
            &catalog,
        );
    }
    let unowned = ledger.summary(OwnerRef::NONE, &catalog).unwrap();
    assert_eq!(unowned.classes[DESTROYER.index()].unsupported, 0);
}

#[test]
fn test_zero_quota_supports_nothing() {
    let catalog = catalog(0);
    let mut ledger = FleetLedger::default();
    let out = enroll(&mut ledger, &catalog, 1, 100);
    assert_eq!(out.standing_of(GridId(1)), Some(Standing::Unsupported));
    assert!(out.errors.is_empty());
}

#[test]
fn test_summary_capture_weight() {
    let catalog = catalog(2);
    let mut ledger = FleetLedger::default();
    enroll(&mut ledger, &catalog, 1, 10);
    enroll(&mut ledger, &catalog, 2, 10);
    enroll(&mut ledger, &catalog, 3, 1);
    let summary = ledger.summary(OwnerRef::group(1), &catalog).unwrap();
    assert!((summary.capture_weight - 5.0).abs() < f32::EPSILON);
    assert!(ledger.summary(OwnerRef::group(99), &catalog).is_none());
}

#[test]
fn test_sync_ledger_follows_owner_and_class() {
    let catalog = catalog(1);
    let mut ledger = FleetLedger::default();
    let mut state = ComplianceState::new(GridId(1), 0, 0);
    state.owner = OwnerRef::group(1);
    state.total_blocks = 12;

    sync_ledger(&mut state, &mut ledger, &catalog);
    assert_eq!(state.enrolled(), Some((OwnerRef::group(1), ClassId::DEFAULT)));

    state.owner = OwnerRef::group(2);
    sync_ledger(&mut state, &mut ledger, &catalog);
    assert_eq!(ledger.locate(GridId(1)).map(|l| l.0), Some(OwnerRef::group(2)));
    ledger.check_invariants().unwrap();

    let out = withdraw(&mut state, &mut ledger, &catalog);
    assert!(out.errors.is_empty());
    assert_eq!(ledger.locate(GridId(1)), None);
    assert_eq!(state.enrolled(), None);
}

#[test]
fn test_sync_ledger_skips_unchanged() {
    let catalog = catalog(1);
    let mut ledger = FleetLedger::default();
    let mut state = ComplianceState::new(GridId(1), 0, 0);
    state.total_blocks = 4;
    sync_ledger(&mut state, &mut ledger, &catalog);
    let again = sync_ledger(&mut state, &mut ledger, &catalog);
    assert_eq!(again, LedgerOutcome::default());
}

/// Random churn across owners, classes and sizes never breaks the quota or
/// single-membership rules, and the supported set is always the largest.
#[test]
fn test_ledger_invariants_under_churn() {
    let catalog = catalog(3);
    let mut ledger = FleetLedger::default();
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let owners = [OwnerRef::group(1), OwnerRef::group(2), OwnerRef::individual(3)];
    let mut placed: Vec<Option<(OwnerRef, ClassId, u32)>> = vec![None; 40];

    for _ in 0..2_000 {
        let grid = rng.gen_range(0..placed.len());
        let id = GridId(grid as u64);
        let blocks = rng.gen_range(1..500);
        let owner = owners[rng.gen_range(0..owners.len())];
        let class = ClassId(rng.gen_range(0..2));
        let change = match placed[grid] {
            None => {
                placed[grid] = Some((owner, class, blocks));
                LedgerChange::Enroll {
                    grid: id,
                    owner,
                    class,
                    blocks,
                }
            }
            Some((o, c, _)) => match rng.gen_range(0..3) {
                0 => {
                    placed[grid] = None;
                    LedgerChange::Withdraw {
                        grid: id,
                        owner: o,
                        class: c,
                    }
                }
                1 => {
                    placed[grid] = Some((o, c, blocks));
                    LedgerChange::Resize {
                        grid: id,
                        owner: o,
                        class: c,
                        blocks,
                    }
                }
                _ => {
                    placed[grid] = Some((owner, class, blocks));
                    LedgerChange::Transfer {
                        grid: id,
                        from: (o, c),
                        to: (owner, class),
                        blocks,
                    }
                }
            },
        };
        let out = ledger.apply(change, &catalog);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        ledger.check_invariants().unwrap();
    }

    for (grid, slot) in placed.iter().enumerate() {
        let located = ledger.locate(GridId(grid as u64));
        assert_eq!(located.map(|l| (l.0, l.1)), slot.map(|s| (s.0, s.1)));
    }

    for owner in owners {
        let Some(entry) = ledger.entry(owner) else { continue };
        for (_, part) in entry.classes() {
            let smallest_supported = part.supported().map(|(_, n)| n).min();
            let largest_unsupported = part.unsupported().map(|(_, n)| n).max();
            if let (Some(s), Some(u)) = (smallest_supported, largest_unsupported) {
                assert!(s >= u, "unsupported grid of {u} blocks beats supported {s}");
            }
        }
    }
}
