//! In-memory host simulation for tests and benchmarks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::host::{BlockId, BlockInfo, GridId, HostError, OwnerRef, SimHost};

#[derive(Debug, Clone, Default)]
pub struct SandboxGrid {
    pub blocks: BTreeMap<BlockId, BlockInfo>,
    pub owner: OwnerRef,
    /// Ownership queries fail with a transient error while set.
    pub owner_unavailable: bool,
    pub stationary: bool,
    pub projecting: bool,
    /// Blocks that are built but not functional.
    pub unpowered: BTreeSet<BlockId>,
}

#[derive(Debug, Default)]
pub struct SandboxWorld {
    pub grids: BTreeMap<GridId, SandboxGrid>,
    /// Every block removal enforcement asked for, in order.
    pub removed: Vec<(GridId, BlockId)>,
    /// Every grid enforcement destroyed, in order.
    pub destroyed: Vec<GridId>,
    /// Destroy requests fail with a transient error while set.
    pub refuse_destroy: bool,
}

/// Shared handle: one clone goes into the `App` as the host, the test keeps
/// another to drive and inspect the world.
#[derive(Debug, Clone, Default)]
pub struct SandboxHost {
    world: Arc<Mutex<SandboxWorld>>,
}

impl SandboxHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut SandboxWorld) -> R) -> R {
        let mut world = self.world.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut world)
    }

    pub fn removed(&self) -> Vec<(GridId, BlockId)> {
        self.with(|w| w.removed.clone())
    }

    pub fn destroyed(&self) -> Vec<GridId> {
        self.with(|w| w.destroyed.clone())
    }
}

impl SimHost for SandboxHost {
    fn grid_exists(&self, grid: GridId) -> Result<bool, HostError> {
        Ok(self.with(|w| w.grids.contains_key(&grid)))
    }

    fn manifest(&self, grid: GridId) -> Result<Vec<BlockInfo>, HostError> {
        self.with(|w| {
            w.grids
                .get(&grid)
                .map(|g| g.blocks.values().cloned().collect())
                .ok_or(HostError::UnknownGrid(grid))
        })
    }

    fn majority_owner(&self, grid: GridId) -> Result<OwnerRef, HostError> {
        self.with(|w| match w.grids.get(&grid) {
            Some(g) if g.owner_unavailable => {
                Err(HostError::Transient("ownership not initialized".into()))
            }
            Some(g) => Ok(g.owner),
            None => Err(HostError::UnknownGrid(grid)),
        })
    }

    fn is_functional(&self, grid: GridId, block: BlockId) -> bool {
        self.with(|w| {
            w.grids
                .get(&grid)
                .is_some_and(|g| g.blocks.contains_key(&block) && !g.unpowered.contains(&block))
        })
    }

    fn is_stationary(&self, grid: GridId) -> bool {
        self.with(|w| w.grids.get(&grid).is_some_and(|g| g.stationary))
    }

    fn is_projecting(&self, grid: GridId) -> bool {
        self.with(|w| w.grids.get(&grid).is_some_and(|g| g.projecting))
    }

    fn remove_block(&mut self, grid: GridId, block: BlockId) -> Result<(), HostError> {
        self.with(|w| {
            let g = w.grids.get_mut(&grid).ok_or(HostError::UnknownGrid(grid))?;
            g.blocks
                .remove(&block)
                .ok_or(HostError::UnknownBlock(grid, block))?;
            g.unpowered.remove(&block);
            w.removed.push((grid, block));
            Ok(())
        })
    }

    fn destroy_grid(&mut self, grid: GridId) -> Result<(), HostError> {
        self.with(|w| {
            if w.refuse_destroy {
                return Err(HostError::Transient("grid is locked".into()));
            }
            w.grids.remove(&grid).ok_or(HostError::UnknownGrid(grid))?;
            w.destroyed.push(grid);
            Ok(())
        })
    }
}
