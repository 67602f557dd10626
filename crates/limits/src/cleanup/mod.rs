//! Cleanup scheduling: the per-grid countdown and what happens when it
//! runs out.
//!
//! A grid with at least one violation has exactly one running countdown.
//! Expiry runs one remediation pass and, if violations remain, starts the
//! next countdown in the following phase.

pub mod remediation;
pub mod save;
pub mod systems;
pub mod timer;

#[cfg(test)]
mod tests;

pub use remediation::{plan_pass, RemediationPlan};
pub use timer::{CleanupPhase, CleanupTimer, CleanupTimers, TimerRecord};

use crate::host::GridId;
use crate::notifications::CleanupTimerStarted;

/// Start a countdown and build the notification announcing it.
pub fn start_countdown(
    timers: &mut CleanupTimers,
    grid: GridId,
    phase: CleanupPhase,
    millis: u64,
    tick: u64,
    probation: u32,
) -> CleanupTimerStarted {
    let timer = timers.start(CleanupTimer {
        grid,
        phase,
        millis_remaining: millis,
        started_tick: tick,
        probation,
    });
    CleanupTimerStarted {
        grid,
        seconds_remaining: timer.seconds_remaining(),
    }
}
