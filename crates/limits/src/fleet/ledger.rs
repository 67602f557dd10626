use std::collections::{BTreeMap, HashMap};

use bevy::prelude::*;

use crate::catalog::{ClassId, RuleCatalog};
use crate::error::LimitsError;
use crate::host::{GridId, OwnerRef};

/// Whether a grid counts against its owner's quota for its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Supported,
    Unsupported,
}

// =============================================================================
// Per-class partition
// =============================================================================

/// Grids of one class under one owner, split by standing. Values are the
/// block counts last reported for each grid.
#[derive(Debug, Clone, Default)]
pub struct ClassPartition {
    max: Option<u32>,
    supported: BTreeMap<GridId, u32>,
    unsupported: BTreeMap<GridId, u32>,
}

impl ClassPartition {
    fn with_max(max: Option<u32>) -> Self {
        Self {
            max,
            ..Default::default()
        }
    }

    pub fn max(&self) -> Option<u32> {
        self.max
    }

    pub fn count(&self) -> usize {
        self.supported.len() + self.unsupported.len()
    }

    pub fn supported(&self) -> impl Iterator<Item = (GridId, u32)> + '_ {
        self.supported.iter().map(|(g, n)| (*g, *n))
    }

    pub fn unsupported(&self) -> impl Iterator<Item = (GridId, u32)> + '_ {
        self.unsupported.iter().map(|(g, n)| (*g, *n))
    }

    pub fn standing(&self, grid: GridId) -> Option<Standing> {
        if self.supported.contains_key(&grid) {
            Some(Standing::Supported)
        } else if self.unsupported.contains_key(&grid) {
            Some(Standing::Unsupported)
        } else {
            None
        }
    }

    fn has_room(&self) -> bool {
        self.max.is_none_or(|max| (self.supported.len() as u32) < max)
    }

    /// Smallest supported grid. Among equals the newest (highest id) goes first.
    fn smallest_supported(&self) -> Option<(GridId, u32)> {
        self.supported
            .iter()
            .min_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(g, n)| (*g, *n))
    }

    /// Largest unsupported grid. Among equals the oldest (lowest id) goes first.
    fn largest_unsupported(&self) -> Option<(GridId, u32)> {
        self.unsupported
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(g, n)| (*g, *n))
    }

    fn insert(&mut self, grid: GridId, blocks: u32, out: &mut LedgerOutcome) {
        if self.has_room() {
            self.supported.insert(grid, blocks);
            out.record(grid, Standing::Supported);
            return;
        }
        match self.smallest_supported() {
            Some((smallest, size)) if blocks > size => {
                self.supported.remove(&smallest);
                self.unsupported.insert(smallest, size);
                out.record(smallest, Standing::Unsupported);
                self.supported.insert(grid, blocks);
                out.record(grid, Standing::Supported);
            }
            Some(_) => {
                self.unsupported.insert(grid, blocks);
                out.record(grid, Standing::Unsupported);
            }
            None => {
                if self.max != Some(0) {
                    out.invariant(format!(
                        "partition full ({:?}) but holds no supported grid to swap with",
                        self.max
                    ));
                }
                self.unsupported.insert(grid, blocks);
                out.record(grid, Standing::Unsupported);
            }
        }
    }

    fn remove(&mut self, grid: GridId, out: &mut LedgerOutcome) -> Option<Standing> {
        if self.supported.remove(&grid).is_some() {
            if let Some((next, size)) = self.largest_unsupported() {
                if self.has_room() {
                    self.unsupported.remove(&next);
                    self.supported.insert(next, size);
                    out.record(next, Standing::Supported);
                }
            }
            Some(Standing::Supported)
        } else if self.unsupported.remove(&grid).is_some() {
            Some(Standing::Unsupported)
        } else {
            None
        }
    }

    fn resize(&mut self, grid: GridId, blocks: u32, out: &mut LedgerOutcome) -> bool {
        if let Some(n) = self.supported.get_mut(&grid) {
            *n = blocks;
        } else if let Some(n) = self.unsupported.get_mut(&grid) {
            *n = blocks;
        } else {
            return false;
        }
        self.rebalance(out);
        true
    }

    /// Restore "largest K win" after sizes moved: fill free slots, then swap
    /// while some unsupported grid is strictly bigger than the smallest
    /// supported one. Each swap strictly raises the supported total, so this
    /// terminates.
    fn rebalance(&mut self, out: &mut LedgerOutcome) {
        while self.has_room() {
            let Some((next, size)) = self.largest_unsupported() else {
                break;
            };
            self.unsupported.remove(&next);
            self.supported.insert(next, size);
            out.record(next, Standing::Supported);
        }
        loop {
            let (Some((small, small_n)), Some((big, big_n))) =
                (self.smallest_supported(), self.largest_unsupported())
            else {
                break;
            };
            if big_n <= small_n {
                break;
            }
            self.supported.remove(&small);
            self.unsupported.remove(&big);
            self.supported.insert(big, big_n);
            self.unsupported.insert(small, small_n);
            out.record(big, Standing::Supported);
            out.record(small, Standing::Unsupported);
        }
    }
}

// =============================================================================
// Per-owner entry
// =============================================================================

#[derive(Debug, Clone)]
pub struct FleetLedgerEntry {
    pub owner: OwnerRef,
    classes: Vec<ClassPartition>,
}

impl FleetLedgerEntry {
    fn new(owner: OwnerRef, catalog: &RuleCatalog) -> Self {
        let classes = catalog
            .classes()
            .map(|rules| ClassPartition::with_max(rules.quota_for(owner.kind)))
            .collect();
        Self { owner, classes }
    }

    pub fn class(&self, class: ClassId) -> Option<&ClassPartition> {
        self.classes.get(class.index())
    }

    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &ClassPartition)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, p)| (ClassId(i as u16), p))
    }

    fn class_mut(&mut self, class: ClassId) -> Result<&mut ClassPartition, LimitsError> {
        let owner = self.owner;
        self.classes.get_mut(class.index()).ok_or_else(|| {
            LimitsError::Configuration(format!("{owner} has no ledger slot for class {}", class.0))
        })
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Single entry point for every ledger mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerChange {
    Enroll {
        grid: GridId,
        owner: OwnerRef,
        class: ClassId,
        blocks: u32,
    },
    Withdraw {
        grid: GridId,
        owner: OwnerRef,
        class: ClassId,
    },
    Resize {
        grid: GridId,
        owner: OwnerRef,
        class: ClassId,
        blocks: u32,
    },
    /// Same owner, new class.
    Reclassify {
        grid: GridId,
        owner: OwnerRef,
        from: ClassId,
        to: ClassId,
        blocks: u32,
    },
    /// New owner, possibly a new class too.
    Transfer {
        grid: GridId,
        from: (OwnerRef, ClassId),
        to: (OwnerRef, ClassId),
        blocks: u32,
    },
}

/// Standing changes produced by one mutation, in the order they happened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerOutcome {
    pub standings: Vec<(GridId, Standing)>,
    pub errors: Vec<LimitsError>,
}

impl LedgerOutcome {
    fn record(&mut self, grid: GridId, standing: Standing) {
        self.standings.retain(|(g, _)| *g != grid);
        self.standings.push((grid, standing));
    }

    fn invariant(&mut self, msg: String) {
        self.errors.push(LimitsError::InvariantViolation(msg));
    }

    /// Final standing of `grid` if this mutation set one.
    pub fn standing_of(&self, grid: GridId) -> Option<Standing> {
        self.standings
            .iter()
            .find(|(g, _)| *g == grid)
            .map(|(_, s)| *s)
    }

    pub fn merge(&mut self, other: LedgerOutcome) {
        for (grid, standing) in other.standings {
            self.record(grid, standing);
        }
        self.errors.extend(other.errors);
    }
}

/// Per-owner capacity ledger. Entries are created on first reference and kept
/// for the session.
#[derive(Resource, Debug, Default)]
pub struct FleetLedger {
    entries: HashMap<OwnerRef, FleetLedgerEntry>,
}

/// Per-class totals for one owner.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSummary {
    pub class: ClassId,
    pub supported: usize,
    pub unsupported: usize,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FleetSummary {
    pub owner: OwnerRef,
    pub classes: Vec<ClassSummary>,
    /// Sum of `capture_weight` over supported grids.
    pub capture_weight: f32,
}

impl FleetLedger {
    pub fn apply(&mut self, change: LedgerChange, catalog: &RuleCatalog) -> LedgerOutcome {
        let mut out = LedgerOutcome::default();
        if let Err(e) = self.apply_inner(&change, catalog, &mut out) {
            out.errors.push(e);
        }
        for e in &out.errors {
            e.log("FleetLedger");
        }
        out
    }

    fn apply_inner(
        &mut self,
        change: &LedgerChange,
        catalog: &RuleCatalog,
        out: &mut LedgerOutcome,
    ) -> Result<(), LimitsError> {
        match *change {
            LedgerChange::Enroll {
                grid,
                owner,
                class,
                blocks,
            } => {
                let part = self.entry_mut(owner, catalog).class_mut(class)?;
                if part.standing(grid).is_some() {
                    part.resize(grid, blocks, out);
                } else {
                    part.insert(grid, blocks, out);
                }
            }
            LedgerChange::Withdraw { grid, owner, class } => {
                let part = self.entry_mut(owner, catalog).class_mut(class)?;
                if part.remove(grid, out).is_none() {
                    return Err(LimitsError::InvariantViolation(format!(
                        "withdraw of {grid} from {owner} class {} found no entry",
                        class.0
                    )));
                }
            }
            LedgerChange::Resize {
                grid,
                owner,
                class,
                blocks,
            } => {
                let part = self.entry_mut(owner, catalog).class_mut(class)?;
                if !part.resize(grid, blocks, out) {
                    part.insert(grid, blocks, out);
                }
            }
            LedgerChange::Reclassify {
                grid,
                owner,
                from,
                to,
                blocks,
            } => {
                self.move_grid(grid, (owner, from), (owner, to), blocks, catalog, out)?;
            }
            LedgerChange::Transfer {
                grid,
                from,
                to,
                blocks,
            } => {
                self.move_grid(grid, from, to, blocks, catalog, out)?;
            }
        }
        Ok(())
    }

    /// Remove from one slot and insert into another inside a single `&mut`
    /// call, so no other handler can see the grid in neither or both.
    fn move_grid(
        &mut self,
        grid: GridId,
        from: (OwnerRef, ClassId),
        to: (OwnerRef, ClassId),
        blocks: u32,
        catalog: &RuleCatalog,
        out: &mut LedgerOutcome,
    ) -> Result<(), LimitsError> {
        // Validate the destination first so a bad class id leaves the grid where it was.
        self.entry_mut(to.0, catalog).class_mut(to.1)?;
        let removed = self.entry_mut(from.0, catalog).class_mut(from.1)?.remove(grid, out);
        if removed.is_none() {
            out.invariant(format!(
                "move of {grid} from {} class {} found no entry",
                from.0, from.1 .0
            ));
        }
        self.entry_mut(to.0, catalog)
            .class_mut(to.1)?
            .insert(grid, blocks, out);
        Ok(())
    }

    fn entry_mut(&mut self, owner: OwnerRef, catalog: &RuleCatalog) -> &mut FleetLedgerEntry {
        self.entries
            .entry(owner)
            .or_insert_with(|| FleetLedgerEntry::new(owner, catalog))
    }

    pub fn entry(&self, owner: OwnerRef) -> Option<&FleetLedgerEntry> {
        self.entries.get(&owner)
    }

    pub fn standing(&self, owner: OwnerRef, class: ClassId, grid: GridId) -> Option<Standing> {
        self.entries
            .get(&owner)
            .and_then(|e| e.class(class))
            .and_then(|p| p.standing(grid))
    }

    pub fn owners(&self) -> impl Iterator<Item = &OwnerRef> {
        self.entries.keys()
    }

    pub fn summary(&self, owner: OwnerRef, catalog: &RuleCatalog) -> Option<FleetSummary> {
        let entry = self.entries.get(&owner)?;
        let mut capture_weight = 0.0;
        let classes = entry
            .classes()
            .map(|(class, part)| {
                capture_weight += catalog.rules(class).capture_weight * part.supported.len() as f32;
                ClassSummary {
                    class,
                    supported: part.supported.len(),
                    unsupported: part.unsupported.len(),
                    max: part.max,
                }
            })
            .collect();
        Some(FleetSummary {
            owner,
            classes,
            capture_weight,
        })
    }

    /// Check quota bounds and single membership across the whole ledger.
    pub fn check_invariants(&self) -> Result<(), LimitsError> {
        let mut seen: HashMap<GridId, (OwnerRef, ClassId)> = HashMap::new();
        for entry in self.entries.values() {
            for (class, part) in entry.classes() {
                if let Some(max) = part.max {
                    if part.supported.len() as u32 > max {
                        return Err(LimitsError::InvariantViolation(format!(
                            "{} class {} supports {} grids over quota {max}",
                            entry.owner,
                            class.0,
                            part.supported.len()
                        )));
                    }
                }
                for grid in part.supported.keys().chain(part.unsupported.keys()) {
                    if let Some(prev) = seen.insert(*grid, (entry.owner, class)) {
                        return Err(LimitsError::InvariantViolation(format!(
                            "{grid} is in both {} class {} and {} class {}",
                            prev.0, prev.1 .0, entry.owner, class.0
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Where a grid is enrolled, if anywhere.
    pub fn locate(&self, grid: GridId) -> Option<(OwnerRef, ClassId, Standing)> {
        self.entries.values().find_map(|entry| {
            entry
                .classes()
                .find_map(|(class, part)| part.standing(grid).map(|s| (entry.owner, class, s)))
        })
    }
}
