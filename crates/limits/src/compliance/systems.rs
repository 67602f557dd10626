use bevy::prelude::*;

use super::{Admission, ComplianceRegistry, ComplianceState, EnforcementContext};
use crate::catalog::RuleCatalog;
use crate::cleanup::{self, CleanupPhase, CleanupTimers};
use crate::config::LimitsConfig;
use crate::error::LimitsError;
use crate::fleet::{refresh_owner, resolve_owner, sync_ledger, withdraw, FleetLedger};
use crate::host::{GridId, HostEvent, HostLink, SimHost};
use crate::notifications::{
    CleanupTimerEnded, CleanupTimerStarted, CleanupViolation, PlacementViolation, TimerCompletion,
};
use crate::TickCounter;

// =============================================================================
// Intake: host mutation callbacks, in arrival order
// =============================================================================

#[allow(clippy::too_many_arguments)]
pub fn process_host_events(
    mut events: EventReader<HostEvent>,
    catalog: Res<RuleCatalog>,
    config: Res<LimitsConfig>,
    tick: Res<TickCounter>,
    mut host: ResMut<HostLink>,
    mut registry: ResMut<ComplianceRegistry>,
    mut ledger: ResMut<FleetLedger>,
    mut timers: ResMut<CleanupTimers>,
    mut placement: EventWriter<PlacementViolation>,
) {
    let ctx = EnforcementContext {
        catalog: &catalog,
        config: &config,
        tick: tick.0,
    };

    for event in events.read() {
        let grid = event.grid();
        match event {
            HostEvent::GridAdded(_) => {
                track_grid(grid, ctx, host.get(), &mut registry, &mut ledger);
            }
            HostEvent::GridMerging(_) => {
                track_grid(grid, ctx, host.get(), &mut registry, &mut ledger);
                if let Some(state) = registry.get_mut(grid) {
                    state.open_grace(ctx.tick.saturating_add(config.merge_grace_ticks));
                }
            }
            HostEvent::BlockAdded { block, .. } => {
                if !registry.contains(grid) {
                    track_grid(grid, ctx, host.get(), &mut registry, &mut ledger);
                }
                let Some(state) = registry.get_mut(grid) else {
                    continue;
                };
                if let Admission::Deny(kind) = state.on_block_added(block, ctx, host.get_mut()) {
                    placement.send(PlacementViolation { grid, kind });
                }
            }
            HostEvent::BlockRemoved { block, .. } => {
                if let Some(state) = registry.get_mut(grid) {
                    state.on_block_removed(*block, host.get());
                }
            }
            HostEvent::OwnershipChanged(_) => {
                let Some(state) = registry.get_mut(grid) else {
                    continue;
                };
                if refresh_owner(state, host.get()) {
                    let outcome = sync_ledger(state, &mut ledger, &catalog);
                    registry.apply_standings(&outcome);
                }
            }
            HostEvent::GridRemoved(_) => {
                let Some(mut state) = registry.remove(grid) else {
                    continue;
                };
                let outcome = withdraw(&mut state, &mut ledger, &catalog);
                registry.apply_standings(&outcome);
                if timers.cancel(grid).is_some() {
                    debug!("{grid}: removed from world, countdown dropped");
                }
                info!("{grid}: no longer tracked");
            }
        }
    }
}

/// Start tracking a grid, counting its current manifest as bulk-loaded
/// content. A grid already tracked only gets its grace window reopened.
pub fn track_grid(
    grid: GridId,
    ctx: EnforcementContext,
    host: &dyn SimHost,
    registry: &mut ComplianceRegistry,
    ledger: &mut FleetLedger,
) {
    let grace_until = ctx.tick.saturating_add(ctx.config.init_grace_ticks);
    if let Some(state) = registry.get_mut(grid) {
        state.open_grace(grace_until);
        return;
    }

    let mut state = ComplianceState::new(grid, ctx.catalog.block_type_count(), grace_until);
    state.owner = resolve_owner(host, grid);
    match host.manifest(grid) {
        Ok(blocks) => {
            state.load_manifest(&blocks, ctx, host);
        }
        Err(e) => LimitsError::from(e).log(&format!("manifest of {grid}")),
    }
    state.refresh_flags(host);

    let outcome = sync_ledger(&mut state, ledger, ctx.catalog);
    info!(
        "{grid}: tracking {} blocks for {}",
        state.total_blocks(),
        state.owner()
    );
    registry.insert(state);
    registry.apply_standings(&outcome);
}

// =============================================================================
// Evaluation: slow refresh, ledger settlement, violation detection
// =============================================================================

#[allow(clippy::too_many_arguments)]
pub fn evaluate_grids(
    catalog: Res<RuleCatalog>,
    config: Res<LimitsConfig>,
    tick: Res<TickCounter>,
    host: Res<HostLink>,
    mut registry: ResMut<ComplianceRegistry>,
    mut ledger: ResMut<FleetLedger>,
    mut timers: ResMut<CleanupTimers>,
    mut started: EventWriter<CleanupTimerStarted>,
    mut ended: EventWriter<CleanupTimerEnded>,
    mut notices: EventWriter<CleanupViolation>,
) {
    let full_refresh = tick.0 % config.evaluation_interval_ticks.max(1) == 0;

    // Settle the ledger for every grid first so the violation pass below sees
    // final standings.
    let mut outcomes = Vec::new();
    for state in registry.iter_mut() {
        if full_refresh {
            refresh_owner(state, host.get());
            state.refresh_flags(host.get());
        }
        if state.needs_evaluation() {
            outcomes.push(sync_ledger(state, &mut ledger, &catalog));
        }
    }
    for outcome in &outcomes {
        registry.apply_standings(outcome);
    }

    for state in registry.iter_mut() {
        if !state.needs_evaluation() {
            continue;
        }
        state.dirty = false;
        state.violations = state.evaluate_violations(&catalog, &ledger);

        let grid = state.grid;
        match (state.violations.is_empty(), timers.is_running(grid)) {
            (false, false) => {
                let timer = cleanup::start_countdown(
                    &mut timers,
                    grid,
                    CleanupPhase::Warning,
                    config.warning_millis,
                    tick.0,
                    0,
                );
                info!(
                    "{grid}: {} violation(s), cleanup in {}s",
                    state.violations.len(),
                    timer.seconds_remaining
                );
                started.send(timer);
                notices.send(CleanupViolation {
                    grid,
                    violations: state.violations.clone(),
                });
            }
            (true, true) => {
                timers.cancel(grid);
                info!("{grid}: compliant again, cleanup cancelled");
                ended.send(CleanupTimerEnded {
                    grid,
                    completion: TimerCompletion::Cancelled,
                });
            }
            _ => {}
        }
    }
}
