//! Outbound notifications for the surrounding notification layer.
//!
//! Each is a Bevy event, so any number of readers can subscribe without
//! affecting one another.

use bevy::prelude::*;

use crate::compliance::{Violation, ViolationKind};
use crate::host::GridId;

/// A placement was refused and the block removed.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct PlacementViolation {
    pub grid: GridId,
    pub kind: ViolationKind,
}

/// Violations a grid carries, sent when its countdown starts and after each
/// remediation pass.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct CleanupViolation {
    pub grid: GridId,
    pub violations: Vec<Violation>,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct CleanupTimerStarted {
    pub grid: GridId,
    pub seconds_remaining: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCompletion {
    /// Violations cleared before the countdown ran out.
    Cancelled,
    /// The countdown ran out and a remediation pass ran.
    Elapsed,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct CleanupTimerEnded {
    pub grid: GridId,
    pub completion: TimerCompletion,
}

pub struct NotificationsPlugin;

impl Plugin for NotificationsPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<PlacementViolation>()
            .add_event::<CleanupViolation>()
            .add_event::<CleanupTimerStarted>()
            .add_event::<CleanupTimerEnded>();
    }
}
