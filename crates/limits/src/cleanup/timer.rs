use std::collections::BTreeMap;
use std::fmt;

use bevy::prelude::*;
use bitcode::{Decode, Encode};

use crate::host::GridId;

/// Stage of a grid's cleanup countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPhase {
    /// First countdown after a violation appears.
    Warning,
    /// Countdown before remediation pass `n` (1-based) after the warning.
    Remediation(u32),
}

impl CleanupPhase {
    /// Stable number for persistence: 0 is the warning, `n` is pass `n`.
    pub fn index(self) -> u32 {
        match self {
            CleanupPhase::Warning => 0,
            CleanupPhase::Remediation(n) => n,
        }
    }

    pub fn from_index(index: u32) -> Self {
        match index {
            0 => CleanupPhase::Warning,
            n => CleanupPhase::Remediation(n),
        }
    }

    pub fn next(self) -> Self {
        CleanupPhase::Remediation(self.index().saturating_add(1))
    }
}

impl fmt::Display for CleanupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupPhase::Warning => write!(f, "warning"),
            CleanupPhase::Remediation(n) => write!(f, "pass {n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupTimer {
    pub grid: GridId,
    pub phase: CleanupPhase,
    pub millis_remaining: u64,
    /// Tick the countdown began; it is not decremented on that tick.
    pub started_tick: u64,
    /// Passes survived by a structural violation since its last removal.
    pub probation: u32,
}

impl CleanupTimer {
    pub fn seconds_remaining(&self) -> u64 {
        self.millis_remaining.div_ceil(1000)
    }

    pub fn record(&self) -> TimerRecord {
        TimerRecord {
            grid_id: self.grid.0,
            millis_remaining: self.millis_remaining,
            phase: self.phase.index(),
            probation: self.probation,
        }
    }
}

/// What survives a restart for one running countdown.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TimerRecord {
    pub grid_id: u64,
    pub millis_remaining: u64,
    pub phase: u32,
    pub probation: u32,
}

/// Running countdowns plus records restored from the session store that have
/// not yet been matched to a tracked grid.
#[derive(Resource, Debug, Default)]
pub struct CleanupTimers {
    running: BTreeMap<GridId, CleanupTimer>,
    pub(crate) pending_restore: Vec<TimerRecord>,
}

impl CleanupTimers {
    /// No countdowns running; `records` wait for their grids.
    pub fn restored(records: Vec<TimerRecord>) -> Self {
        Self {
            running: BTreeMap::new(),
            pending_restore: records,
        }
    }

    pub fn get(&self, grid: GridId) -> Option<&CleanupTimer> {
        self.running.get(&grid)
    }

    pub fn is_running(&self, grid: GridId) -> bool {
        self.running.contains_key(&grid)
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CleanupTimer> {
        self.running.values()
    }

    pub fn pending_restore(&self) -> &[TimerRecord] {
        &self.pending_restore
    }

    /// Start (or replace) the countdown for `grid`.
    pub fn start(&mut self, timer: CleanupTimer) -> &CleanupTimer {
        let grid = timer.grid;
        self.running.insert(grid, timer);
        &self.running[&grid]
    }

    /// Stop the countdown, if any.
    pub fn cancel(&mut self, grid: GridId) -> Option<CleanupTimer> {
        self.running.remove(&grid)
    }

    /// Advance every countdown not started on `tick` by `millis` and take out
    /// the ones that reached zero. Each is returned exactly once.
    pub fn advance(&mut self, tick: u64, millis: u64) -> Vec<CleanupTimer> {
        let mut expired = Vec::new();
        for timer in self.running.values_mut() {
            if timer.started_tick == tick {
                continue;
            }
            timer.millis_remaining = timer.millis_remaining.saturating_sub(millis);
            if timer.millis_remaining == 0 {
                expired.push(timer.grid);
            }
        }
        expired
            .into_iter()
            .filter_map(|grid| self.running.remove(&grid))
            .collect()
    }

    /// Records for every running countdown plus any still awaiting restore.
    pub fn records(&self) -> Vec<TimerRecord> {
        let mut records: Vec<TimerRecord> = self.running.values().map(CleanupTimer::record).collect();
        records.extend(
            self.pending_restore
                .iter()
                .filter(|r| !self.running.contains_key(&GridId(r.grid_id)))
                .cloned(),
        );
        records
    }
}
