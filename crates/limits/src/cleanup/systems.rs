use bevy::prelude::*;

use super::{plan_pass, start_countdown, CleanupPhase, CleanupTimers};
use crate::catalog::RuleCatalog;
use crate::compliance::ComplianceRegistry;
use crate::config::{LimitsConfig, TICK_MILLIS};
use crate::error::LimitsError;
use crate::fleet::{sync_ledger, withdraw, FleetLedger};
use crate::host::{GridId, HostLink, SimHost};
use crate::notifications::{
    CleanupTimerEnded, CleanupTimerStarted, CleanupViolation, TimerCompletion,
};
use crate::TickCounter;

/// Match restored countdowns to grids. A record resumes with its recorded
/// remaining time once its grid is tracked, and is dropped once the host
/// reports the grid gone. Anything else waits for a later tick.
#[allow(clippy::too_many_arguments)]
pub fn resume_restored_timers(
    catalog: Res<RuleCatalog>,
    tick: Res<TickCounter>,
    host: Res<HostLink>,
    registry: Res<ComplianceRegistry>,
    ledger: Res<FleetLedger>,
    mut timers: ResMut<CleanupTimers>,
    mut started: EventWriter<CleanupTimerStarted>,
    mut notices: EventWriter<CleanupViolation>,
) {
    if timers.pending_restore.is_empty() {
        return;
    }
    let pending = std::mem::take(&mut timers.pending_restore);
    let mut waiting = Vec::new();

    for record in pending {
        let grid = GridId(record.grid_id);
        if let Some(state) = registry.get(grid) {
            if let Some(running) = timers.get(grid) {
                if running.millis_remaining <= record.millis_remaining {
                    debug!("{grid}: keeping running countdown over restored record");
                    continue;
                }
            }
            let phase = CleanupPhase::from_index(record.phase);
            let event = start_countdown(
                &mut timers,
                grid,
                phase,
                record.millis_remaining,
                tick.0,
                record.probation,
            );
            info!(
                "{grid}: resumed {phase} countdown with {}s left",
                event.seconds_remaining
            );
            started.send(event);
            let violations = state.evaluate_violations(&catalog, &ledger);
            if !violations.is_empty() {
                notices.send(CleanupViolation { grid, violations });
            }
            continue;
        }
        match host.get().grid_exists(grid) {
            Ok(false) => warn!("discarding cleanup record for {grid}: grid no longer exists"),
            Ok(true) | Err(_) => waiting.push(record),
        }
    }
    timers.pending_restore = waiting;
}

/// Count down running timers and run one remediation pass for each that
/// expired this tick.
#[allow(clippy::too_many_arguments)]
pub fn advance_cleanup_timers(
    catalog: Res<RuleCatalog>,
    config: Res<LimitsConfig>,
    tick: Res<TickCounter>,
    mut host: ResMut<HostLink>,
    mut registry: ResMut<ComplianceRegistry>,
    mut ledger: ResMut<FleetLedger>,
    mut timers: ResMut<CleanupTimers>,
    mut started: EventWriter<CleanupTimerStarted>,
    mut ended: EventWriter<CleanupTimerEnded>,
    mut notices: EventWriter<CleanupViolation>,
) {
    for timer in timers.advance(tick.0, TICK_MILLIS) {
        let grid = timer.grid;
        ended.send(CleanupTimerEnded {
            grid,
            completion: TimerCompletion::Elapsed,
        });

        let Some(state) = registry.get_mut(grid) else {
            LimitsError::InvariantViolation(format!(
                "countdown for {grid} expired but the grid is not tracked"
            ))
            .log("cleanup");
            continue;
        };
        let violations = state.evaluate_violations(&catalog, &ledger);
        if violations.is_empty() {
            debug!("{grid}: countdown expired with nothing left to remediate");
            continue;
        }
        notices.send(CleanupViolation {
            grid,
            violations: violations.clone(),
        });

        let quota = state
            .enrolled()
            .and_then(|(owner, class)| catalog.rules(class).quota_for(owner.kind));
        let plan = plan_pass(state, &violations, quota, timer.probation, &config);

        if plan.destroy {
            if !destroy_grid(grid, host.get_mut(), &mut registry, &mut ledger, &catalog) {
                // Retry on the next pass, not after a fresh warning.
                let event = start_countdown(
                    &mut timers,
                    grid,
                    timer.phase.next(),
                    config.pass_millis,
                    tick.0,
                    plan.probation,
                );
                started.send(event);
            }
            continue;
        }

        if !plan.blocks.is_empty() {
            info!(
                "{grid}: {} expired, removing {} block(s)",
                timer.phase,
                plan.blocks.len()
            );
        }
        for block in &plan.blocks {
            if let Err(e) = host.get_mut().remove_block(grid, *block) {
                warn!("{grid}: remediation could not remove {block}: {e}");
            }
            state.on_block_removed(*block, host.get());
        }
        let outcome = sync_ledger(state, &mut ledger, &catalog);
        registry.apply_standings(&outcome);

        let Some(state) = registry.get_mut(grid) else {
            continue;
        };
        state.violations = state.evaluate_violations(&catalog, &ledger);
        state.dirty = false;
        if state.violations.is_empty() {
            info!("{grid}: compliant after {}", timer.phase);
            continue;
        }
        let event = start_countdown(
            &mut timers,
            grid,
            timer.phase.next(),
            config.pass_millis,
            tick.0,
            plan.probation,
        );
        started.send(event);
    }
}

/// Remove a grid from the world and from enforcement. Returns `false` if the
/// host refused; the grid then stays tracked.
fn destroy_grid(
    grid: GridId,
    host: &mut dyn SimHost,
    registry: &mut ComplianceRegistry,
    ledger: &mut FleetLedger,
    catalog: &RuleCatalog,
) -> bool {
    if let Err(e) = host.destroy_grid(grid) {
        LimitsError::from(e).log(&format!("destroying {grid}"));
        return false;
    }
    if let Some(mut state) = registry.remove(grid) {
        let outcome = withdraw(&mut state, ledger, catalog);
        registry.apply_standings(&outcome);
        info!("{grid}: destroyed by cleanup ({} blocks)", state.total_blocks());
    }
    true
}
