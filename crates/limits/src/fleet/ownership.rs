//! Ownership resolution and the grid side of ledger bookkeeping.
//!
//! `sync_ledger` is the only code that moves a grid between ledger slots, so
//! the grid's recorded slot and the ledger never disagree.

use bevy::prelude::*;

use super::ledger::{FleetLedger, LedgerChange, LedgerOutcome};
use crate::catalog::RuleCatalog;
use crate::compliance::ComplianceState;
use crate::error::LimitsError;
use crate::host::{GridId, OwnerRef, SimHost};

/// Current owner group of a grid. A host that cannot answer yet leaves the
/// grid unowned until the next refresh.
pub fn resolve_owner(host: &dyn SimHost, grid: GridId) -> OwnerRef {
    match host.majority_owner(grid) {
        Ok(owner) => owner,
        Err(e) => {
            LimitsError::from(e).log(&format!("ownership of {grid}"));
            OwnerRef::NONE
        }
    }
}

/// Re-resolve the owner. Returns `true` when it changed; the ledger move
/// happens on the next `sync_ledger`.
pub fn refresh_owner(state: &mut ComplianceState, host: &dyn SimHost) -> bool {
    let owner = resolve_owner(host, state.grid);
    if owner == state.owner {
        return false;
    }
    info!("{}: owner {} -> {owner}", state.grid, state.owner);
    state.owner = owner;
    state.dirty = true;
    true
}

/// Bring the ledger in line with the grid's owner, effective class and size
/// in one ledger mutation.
pub fn sync_ledger(
    state: &mut ComplianceState,
    ledger: &mut FleetLedger,
    catalog: &RuleCatalog,
) -> LedgerOutcome {
    let target = (state.owner, state.effective_class());
    let blocks = state.total_blocks;
    let grid = state.grid;
    let change = match state.enrolled {
        None => LedgerChange::Enroll {
            grid,
            owner: target.0,
            class: target.1,
            blocks,
        },
        Some(current) if current == target => {
            if state.enrolled_blocks == blocks {
                return LedgerOutcome::default();
            }
            LedgerChange::Resize {
                grid,
                owner: target.0,
                class: target.1,
                blocks,
            }
        }
        Some((owner, from)) if owner == target.0 => LedgerChange::Reclassify {
            grid,
            owner,
            from,
            to: target.1,
            blocks,
        },
        Some(from) => LedgerChange::Transfer {
            grid,
            from,
            to: target,
            blocks,
        },
    };
    let outcome = ledger.apply(change, catalog);
    state.enrolled = Some(target);
    state.enrolled_blocks = blocks;
    if let Some(standing) = outcome.standing_of(grid) {
        state.supported = standing == super::Standing::Supported;
    }
    outcome
}

/// Take the grid out of the ledger entirely (grid removed or destroyed).
pub fn withdraw(
    state: &mut ComplianceState,
    ledger: &mut FleetLedger,
    catalog: &RuleCatalog,
) -> LedgerOutcome {
    let Some((owner, class)) = state.enrolled.take() else {
        return LedgerOutcome::default();
    };
    state.enrolled_blocks = 0;
    ledger.apply(
        LedgerChange::Withdraw {
            grid: state.grid,
            owner,
            class,
        },
        catalog,
    )
}
