use bevy::ecs::event::Events;
use bevy::prelude::*;

use crate::catalog::RuleCatalog;
use crate::cleanup::CleanupTimers;
use crate::compliance::{ComplianceRegistry, ComplianceReport, ComplianceState};
use crate::fleet::{FleetLedger, Standing};
use crate::host::{GridId, HostEvent};
use crate::sandbox::SandboxHost;
use crate::TickCounter;

use super::TestSession;

impl TestSession {
    // -----------------------------------------------------------------------
    // Time control
    // -----------------------------------------------------------------------

    /// Run `n` fixed ticks directly, bypassing wall-clock time.
    pub fn tick(&mut self, n: u32) {
        for _ in 0..n {
            self.app.world_mut().run_schedule(FixedUpdate);
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.resource::<TickCounter>().0
    }

    /// Queue a host event without ticking.
    pub fn send(&mut self, event: HostEvent) {
        self.app.world_mut().send_event(event);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn resource<T: Resource>(&self) -> &T {
        self.app.world().resource::<T>()
    }

    pub fn host(&self) -> &SandboxHost {
        &self.host
    }

    pub fn registry(&self) -> &ComplianceRegistry {
        self.resource::<ComplianceRegistry>()
    }

    pub fn ledger(&self) -> &FleetLedger {
        self.resource::<FleetLedger>()
    }

    pub fn timers(&self) -> &CleanupTimers {
        self.resource::<CleanupTimers>()
    }

    /// Tracked state of a grid. Panics if the grid is not tracked.
    pub fn state(&self, grid: GridId) -> &ComplianceState {
        self.registry()
            .get(grid)
            .unwrap_or_else(|| panic!("{grid} is not tracked"))
    }

    pub fn is_tracked(&self, grid: GridId) -> bool {
        self.registry().contains(grid)
    }

    /// Ledger standing of a grid wherever it is enrolled.
    pub fn standing(&self, grid: GridId) -> Option<Standing> {
        self.ledger().locate(grid).map(|(_, _, s)| s)
    }

    pub fn report(&self, grid: GridId) -> Option<ComplianceReport> {
        self.registry().report(
            grid,
            self.resource::<RuleCatalog>(),
            self.resource::<CleanupTimers>(),
        )
    }

    /// Every event of type `E` sent since the session started.
    pub fn events<E: Event + Clone>(&self) -> Vec<E> {
        let events = self.resource::<Events<E>>();
        let mut cursor = events.get_cursor();
        cursor.read(events).cloned().collect()
    }
}
