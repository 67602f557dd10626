use crate::catalog::{BlockTypeDef, CatalogSource, ClassSource, RuleCatalog};
use crate::cleanup::*;
use crate::compliance::{ComplianceState, EnforcementContext, Violation};
use crate::config::{LimitsConfig, TICK_MILLIS};
use crate::host::{BlockId, BlockInfo, GridId};
use crate::sandbox::SandboxHost;
use crate::Saveable;

const GRID: GridId = GridId(3);

fn catalog() -> RuleCatalog {
    RuleCatalog::build(CatalogSource {
        block_types: vec![BlockTypeDef::new("Turrets", &["Turret"])],
        classes: vec![
            ClassSource::named("Unclassified").max_blocks(4),
            ClassSource::named("Frigate").classifier("FrigateCore"),
            ClassSource::named("Cruiser").classifier("CruiserCore"),
        ],
    })
    .unwrap()
}

/// Grid with blocks `1..` carrying the given definitions, counted as a
/// bulk load.
fn state(definitions: &[&str]) -> ComplianceState {
    let catalog = catalog();
    let config = LimitsConfig::default();
    let host = SandboxHost::new();
    let blocks: Vec<BlockInfo> = definitions
        .iter()
        .enumerate()
        .map(|(i, d)| BlockInfo::new(i as u64 + 1, *d))
        .collect();
    host.with(|w| {
        let g = w.grids.entry(GRID).or_default();
        for b in &blocks {
            g.blocks.insert(b.id, b.clone());
        }
    });
    let mut state = ComplianceState::new(GRID, catalog.block_type_count(), 0);
    let ctx = EnforcementContext {
        catalog: &catalog,
        config: &config,
        tick: 0,
    };
    state.load_manifest(&blocks, ctx, &host);
    state
}

fn ids(raw: &[u64]) -> Vec<BlockId> {
    raw.iter().copied().map(BlockId).collect()
}

// ---------------------------------------------------------------------------
// Pass planning
// ---------------------------------------------------------------------------

#[test]
fn test_total_overage_trims_share_newest_first() {
    let state = state(&["Armor"; 12]);
    let config = LimitsConfig::default();
    let plan = plan_pass(
        &state,
        &[Violation::TotalBlocks { count: 12, max: 4 }],
        None,
        0,
        &config,
    );
    // 25% of 8, rounded up.
    assert_eq!(plan.blocks, ids(&[12, 11]));
    assert!(!plan.destroy);
}

#[test]
fn test_block_type_overage_only_takes_that_type() {
    let state = state(&["Turret", "Armor", "Turret", "Armor", "Turret"]);
    let config = LimitsConfig::default();
    let plan = plan_pass(
        &state,
        &[Violation::BlockType {
            index: 0,
            count: 3,
            max: 1,
        }],
        None,
        0,
        &config,
    );
    assert_eq!(plan.blocks, ids(&[5]));
}

#[test]
fn test_extra_classifiers_removed_worst_first() {
    let state = state(&["FrigateCore", "CruiserCore", "FrigateCore", "Armor", "Armor"]);
    assert_eq!(state.classifiers().count(), 3);
    let config = LimitsConfig {
        remediation_percent: 100,
        ..Default::default()
    };
    let plan = plan_pass(
        &state,
        &[Violation::TooManyClassifiers { count: 3 }],
        None,
        0,
        &config,
    );
    assert_eq!(plan.blocks, ids(&[3, 1]));
}

#[test]
fn test_structural_waits_for_probation() {
    let state = state(&["FrigateCore", "Armor", "Armor", "Armor"]);
    let config = LimitsConfig {
        probation_threshold: 3,
        ..Default::default()
    };
    let violations = [Violation::NotStationary];

    let first = plan_pass(&state, &violations, None, 0, &config);
    assert!(first.blocks.is_empty());
    assert_eq!(first.probation, 1);

    let second = plan_pass(&state, &violations, None, first.probation, &config);
    assert!(second.blocks.is_empty());

    let third = plan_pass(&state, &violations, None, second.probation, &config);
    assert_eq!(third.blocks, ids(&[1]), "removes the active classifier");
    assert_eq!(third.probation, 0);
}

#[test]
fn test_zero_quota_destroys_after_probation() {
    let state = state(&["FrigateCore", "Armor", "Armor"]);
    let config = LimitsConfig {
        probation_threshold: 1,
        ..Default::default()
    };
    let plan = plan_pass(&state, &[Violation::Unsupported], Some(0), 0, &config);
    assert!(plan.destroy);
    assert!(plan.blocks.is_empty());
}

#[test]
fn test_large_unclassified_unsupported_grid_destroyed_at_once() {
    let state = state(&["Armor"; 8]);
    let config = LimitsConfig {
        large_grid_threshold: 5,
        ..Default::default()
    };
    let plan = plan_pass(&state, &[Violation::Unsupported], Some(2), 0, &config);
    assert!(plan.destroy);

    let small = LimitsConfig {
        large_grid_threshold: 50,
        ..Default::default()
    };
    assert!(!plan_pass(&state, &[Violation::Unsupported], Some(2), 0, &small).destroy);
}

#[test]
fn test_trim_to_single_block_destroys_instead() {
    let state = state(&["Armor", "Armor"]);
    let config = LimitsConfig::default();
    let plan = plan_pass(
        &state,
        &[Violation::TotalBlocks { count: 2, max: 1 }],
        None,
        0,
        &config,
    );
    assert!(plan.destroy);
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

fn timer(grid: u64, millis: u64, tick: u64) -> CleanupTimer {
    CleanupTimer {
        grid: GridId(grid),
        phase: CleanupPhase::Warning,
        millis_remaining: millis,
        started_tick: tick,
        probation: 0,
    }
}

#[test]
fn test_advance_skips_start_tick_and_fires_once() {
    let mut timers = CleanupTimers::default();
    timers.start(timer(1, 2 * TICK_MILLIS, 5));

    assert!(timers.advance(5, TICK_MILLIS).is_empty());
    assert_eq!(timers.get(GridId(1)).unwrap().millis_remaining, 2 * TICK_MILLIS);
    assert!(timers.advance(6, TICK_MILLIS).is_empty());

    let expired = timers.advance(7, TICK_MILLIS);
    assert_eq!(expired.len(), 1);
    assert!(!timers.is_running(GridId(1)));
    assert!(timers.advance(8, TICK_MILLIS).is_empty());
}

#[test]
fn test_phase_progression() {
    assert_eq!(CleanupPhase::Warning.next(), CleanupPhase::Remediation(1));
    assert_eq!(CleanupPhase::Remediation(4).next(), CleanupPhase::Remediation(5));
    assert_eq!(CleanupPhase::from_index(0), CleanupPhase::Warning);
    assert_eq!(CleanupPhase::from_index(3).index(), 3);
}

#[test]
fn test_seconds_remaining_rounds_up() {
    assert_eq!(timer(1, 300_000, 0).seconds_remaining(), 300);
    assert_eq!(timer(1, 1_001, 0).seconds_remaining(), 2);
    assert_eq!(timer(1, 0, 0).seconds_remaining(), 0);
}

#[test]
fn test_saveable_keeps_remaining_time() {
    let mut timers = CleanupTimers::default();
    assert!(timers.save_to_bytes().is_none());

    let mut running = timer(7, 42_500, 1);
    running.phase = CleanupPhase::Remediation(2);
    running.probation = 11;
    timers.start(running);

    let bytes = timers.save_to_bytes().unwrap();
    let restored = CleanupTimers::load_from_bytes(&bytes);
    assert!(restored.is_empty(), "nothing runs until the grid is tracked");
    assert_eq!(
        restored.pending_restore(),
        &[TimerRecord {
            grid_id: 7,
            millis_remaining: 42_500,
            phase: 2,
            probation: 11,
        }]
    );
}
