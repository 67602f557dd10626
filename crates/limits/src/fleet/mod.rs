//! Fleet capacity: per-owner quotas and who holds the slots.

pub mod ledger;
pub mod ownership;

#[cfg(test)]
mod tests;

pub use ledger::{
    ClassPartition, ClassSummary, FleetLedger, FleetLedgerEntry, FleetSummary, LedgerChange,
    LedgerOutcome, Standing,
};
pub use ownership::{refresh_owner, resolve_owner, sync_ledger, withdraw};
