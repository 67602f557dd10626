use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Length of one `FixedUpdate` tick. The host drives enforcement at 10 Hz.
pub const TICK_MILLIS: u64 = 100;
pub const TICKS_PER_SECOND: u64 = 1000 / TICK_MILLIS;

/// First countdown after a violation is detected (5 minutes).
pub const DEFAULT_WARNING_MILLIS: u64 = 300_000;
/// Countdown between remediation passes once the warning has elapsed.
pub const DEFAULT_PASS_MILLIS: u64 = 10_000;
/// Share of a block-count overage removed per pass, in percent.
pub const DEFAULT_REMEDIATION_PERCENT: u32 = 25;
/// Passes a quota or stationary violation must survive before one removal.
pub const DEFAULT_PROBATION_THRESHOLD: u32 = 96;
/// Unsupported, never-classified grids above this size are removed outright.
pub const DEFAULT_LARGE_GRID_THRESHOLD: u32 = 5_000;
/// Blocks arriving within this many ticks of a grid appearing are not judged.
pub const DEFAULT_INIT_GRACE_TICKS: u64 = 5 * TICKS_PER_SECOND;
pub const DEFAULT_MERGE_GRACE_TICKS: u64 = 2 * TICKS_PER_SECOND;
/// Full refresh cadence (ownership, power state, ledger sizes).
pub const DEFAULT_EVALUATION_INTERVAL_TICKS: u64 = TICKS_PER_SECOND;
/// How often running timers are written to the session store (1 minute).
pub const DEFAULT_PERSIST_INTERVAL_TICKS: u64 = 60 * TICKS_PER_SECOND;

/// Tunables for enforcement, loaded once per session.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub warning_millis: u64,
    pub pass_millis: u64,
    pub remediation_percent: u32,
    pub probation_threshold: u32,
    pub large_grid_threshold: u32,
    pub init_grace_ticks: u64,
    pub merge_grace_ticks: u64,
    pub evaluation_interval_ticks: u64,
    pub persist_interval_ticks: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            warning_millis: DEFAULT_WARNING_MILLIS,
            pass_millis: DEFAULT_PASS_MILLIS,
            remediation_percent: DEFAULT_REMEDIATION_PERCENT,
            probation_threshold: DEFAULT_PROBATION_THRESHOLD,
            large_grid_threshold: DEFAULT_LARGE_GRID_THRESHOLD,
            init_grace_ticks: DEFAULT_INIT_GRACE_TICKS,
            merge_grace_ticks: DEFAULT_MERGE_GRACE_TICKS,
            evaluation_interval_ticks: DEFAULT_EVALUATION_INTERVAL_TICKS,
            persist_interval_ticks: DEFAULT_PERSIST_INTERVAL_TICKS,
        }
    }
}

impl LimitsConfig {
    /// Parse from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, crate::error::LimitsError> {
        let mut config: LimitsConfig = serde_json::from_str(json).map_err(|e| {
            crate::error::LimitsError::Configuration(format!("unreadable limits config: {e}"))
        })?;
        config.sanitize();
        Ok(config)
    }

    /// Clamp values that would stall or spin the scheduler.
    pub fn sanitize(&mut self) {
        self.evaluation_interval_ticks = self.evaluation_interval_ticks.max(1);
        self.persist_interval_ticks = self.persist_interval_ticks.max(1);
        self.remediation_percent = self.remediation_percent.clamp(1, 100);
        self.probation_threshold = self.probation_threshold.max(1);
        self.warning_millis = self.warning_millis.max(TICK_MILLIS);
        self.pass_millis = self.pass_millis.max(TICK_MILLIS);
    }

    /// Blocks to remove from an overage this pass: the configured share,
    /// rounded up, and at least one whenever there is any overage.
    pub fn pass_quota(&self, overage: u32) -> u32 {
        if overage == 0 {
            return 0;
        }
        let pct = self.remediation_percent.clamp(1, 100);
        (overage.saturating_mul(pct)).div_ceil(100).max(1)
    }
}
