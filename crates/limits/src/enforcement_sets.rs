//! Ordering of enforcement systems within `FixedUpdate`.
//!
//! ```text
//! Clock  →  Intake  →  Evaluate  →  Cleanup
//! ```
//!
//! * **Clock** – advance the session tick.
//! * **Intake** – drain host mutation events in arrival order.
//! * **Evaluate** – resume restored countdowns, refresh slow host state,
//!   settle the ledger, recompute violations and start or cancel countdowns.
//! * **Cleanup** – count down and run remediation passes.
//!
//! Systems outside this crate that persist or report enforcement state should
//! run `.after(EnforcementSet::Cleanup)`.

use bevy::prelude::*;

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnforcementSet {
    Clock,
    Intake,
    Evaluate,
    Cleanup,
}

pub struct EnforcementSetsPlugin;

impl Plugin for EnforcementSetsPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            FixedUpdate,
            (
                EnforcementSet::Clock,
                EnforcementSet::Intake,
                EnforcementSet::Evaluate,
                EnforcementSet::Cleanup,
            )
                .chain(),
        );
    }
}
