//! Per-grid compliance tracking.
//!
//! One [`ComplianceState`] per grid seen by the host, held in the
//! [`ComplianceRegistry`] resource. Mutation callbacks update it
//! incrementally (`admission`); the fixed tick re-reads slow host state,
//! settles the ledger and recomputes violations (`systems`).

mod admission;
pub mod systems;
pub mod types;
mod violations;


pub use types::{
    Admission, ComplianceReport, ComplianceState, EnforcementContext, TimerReport, Violation,
    ViolationKind,
};

use std::collections::BTreeMap;

use bevy::prelude::*;

use crate::catalog::RuleCatalog;
use crate::cleanup::CleanupTimers;
use crate::fleet::{LedgerOutcome, Standing};
use crate::host::GridId;

#[derive(Resource, Debug, Default)]
pub struct ComplianceRegistry {
    grids: BTreeMap<GridId, ComplianceState>,
}

impl ComplianceRegistry {
    pub fn get(&self, grid: GridId) -> Option<&ComplianceState> {
        self.grids.get(&grid)
    }

    pub fn get_mut(&mut self, grid: GridId) -> Option<&mut ComplianceState> {
        self.grids.get_mut(&grid)
    }

    pub fn contains(&self, grid: GridId) -> bool {
        self.grids.contains_key(&grid)
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComplianceState> {
        self.grids.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ComplianceState> {
        self.grids.values_mut()
    }

    pub fn insert(&mut self, state: ComplianceState) {
        self.grids.insert(state.grid, state);
    }

    pub fn remove(&mut self, grid: GridId) -> Option<ComplianceState> {
        self.grids.remove(&grid)
    }

    /// Push standing flips from a ledger mutation onto the affected grids and
    /// queue them for re-evaluation.
    pub fn apply_standings(&mut self, outcome: &LedgerOutcome) {
        for (grid, standing) in &outcome.standings {
            if let Some(state) = self.grids.get_mut(grid) {
                state.supported = *standing == Standing::Supported;
                state.dirty = true;
            }
        }
    }

    /// Snapshot of one grid's standing for display.
    pub fn report(
        &self,
        grid: GridId,
        catalog: &RuleCatalog,
        timers: &CleanupTimers,
    ) -> Option<ComplianceReport> {
        let state = self.grids.get(&grid)?;
        let rules = catalog.rules(state.effective_class());
        Some(ComplianceReport {
            grid,
            owner: state.owner,
            class_name: rules.name.clone(),
            reserved_class: state.reserved_class(),
            effective_class: state.effective_class(),
            total_blocks: state.total_blocks,
            max_blocks: rules.max_blocks,
            supported: state.supported,
            violations: state.violations.clone(),
            timer: timers.get(grid).map(|t| TimerReport {
                phase: t.phase,
                seconds_remaining: t.seconds_remaining(),
            }),
        })
    }
}
