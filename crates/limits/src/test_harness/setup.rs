use crate::host::{BlockId, BlockInfo, GridId, HostEvent, OwnerRef};
use crate::sandbox::SandboxGrid;
use crate::config::LimitsConfig;

use super::TestSession;

impl TestSession {
    // -----------------------------------------------------------------------
    // World setup: every helper mirrors a host mutation and ticks once
    // -----------------------------------------------------------------------

    fn alloc_block(&mut self, definition: &str) -> BlockInfo {
        let block = BlockInfo::new(self.next_block, definition);
        self.next_block += 1;
        block
    }

    /// Add an empty, stationary grid owned by `owner`.
    pub fn add_grid(&mut self, grid: u64, owner: OwnerRef) -> GridId {
        self.add_grid_with(grid, owner, &[]).0
    }

    /// Add a grid that arrives with `definitions` already built, as on world
    /// load or paste.
    pub fn add_grid_with(
        &mut self,
        grid: u64,
        owner: OwnerRef,
        definitions: &[&str],
    ) -> (GridId, Vec<BlockId>) {
        let id = GridId(grid);
        let blocks: Vec<BlockInfo> = definitions.iter().map(|d| self.alloc_block(d)).collect();
        let ids = blocks.iter().map(|b| b.id).collect();
        self.host.with(|w| {
            w.grids.insert(
                id,
                SandboxGrid {
                    blocks: blocks.into_iter().map(|b| (b.id, b)).collect(),
                    owner,
                    stationary: true,
                    ..Default::default()
                },
            );
        });
        self.send(HostEvent::GridAdded(id));
        self.tick(1);
        (id, ids)
    }

    /// Place one block and let enforcement judge it.
    pub fn place(&mut self, grid: GridId, definition: &str) -> BlockId {
        let block = self.alloc_block(definition);
        self.place_block(grid, block)
    }

    pub fn place_essential(&mut self, grid: GridId, definition: &str) -> BlockId {
        let block = self.alloc_block(definition).essential();
        self.place_block(grid, block)
    }

    fn place_block(&mut self, grid: GridId, block: BlockInfo) -> BlockId {
        let id = block.id;
        self.host.with(|w| {
            if let Some(g) = w.grids.get_mut(&grid) {
                g.blocks.insert(id, block.clone());
            }
        });
        self.send(HostEvent::BlockAdded { grid, block });
        self.tick(1);
        id
    }

    /// Place `n` blocks in one tick.
    pub fn place_n(&mut self, grid: GridId, definition: &str, n: usize) -> Vec<BlockId> {
        let blocks: Vec<BlockInfo> = (0..n).map(|_| self.alloc_block(definition)).collect();
        let ids = blocks.iter().map(|b| b.id).collect();
        self.host.with(|w| {
            if let Some(g) = w.grids.get_mut(&grid) {
                for b in &blocks {
                    g.blocks.insert(b.id, b.clone());
                }
            }
        });
        for block in blocks {
            self.send(HostEvent::BlockAdded { grid, block });
        }
        self.tick(1);
        ids
    }

    /// Remove blocks as a player would, in one tick.
    pub fn remove(&mut self, grid: GridId, blocks: &[BlockId]) {
        self.host.with(|w| {
            if let Some(g) = w.grids.get_mut(&grid) {
                for b in blocks {
                    g.blocks.remove(b);
                }
            }
        });
        for block in blocks {
            self.send(HostEvent::BlockRemoved {
                grid,
                block: *block,
            });
        }
        self.tick(1);
    }

    pub fn remove_grid(&mut self, grid: GridId) {
        self.host.with(|w| w.grids.remove(&grid));
        self.send(HostEvent::GridRemoved(grid));
        self.tick(1);
    }

    pub fn set_owner(&mut self, grid: GridId, owner: OwnerRef) {
        self.host.with(|w| {
            if let Some(g) = w.grids.get_mut(&grid) {
                g.owner = owner;
                g.owner_unavailable = false;
            }
        });
        self.send(HostEvent::OwnershipChanged(grid));
        self.tick(1);
    }

    /// Host-side flags with no mutation callback; picked up on the next
    /// full refresh.
    pub fn set_stationary(&mut self, grid: GridId, stationary: bool) {
        self.host.with(|w| {
            if let Some(g) = w.grids.get_mut(&grid) {
                g.stationary = stationary;
            }
        });
    }

    pub fn set_projecting(&mut self, grid: GridId, projecting: bool) {
        self.host.with(|w| {
            if let Some(g) = w.grids.get_mut(&grid) {
                g.projecting = projecting;
            }
        });
    }

    pub fn set_powered(&mut self, grid: GridId, block: BlockId, powered: bool) {
        self.host.with(|w| {
            if let Some(g) = w.grids.get_mut(&grid) {
                if powered {
                    g.unpowered.remove(&block);
                } else {
                    g.unpowered.insert(block);
                }
            }
        });
    }

    /// Tick past the initialization grace window of grids added so far.
    pub fn skip_grace(&mut self) {
        let ticks = self.resource::<LimitsConfig>().init_grace_ticks;
        self.tick(ticks as u32);
    }

    /// Tick until the next full refresh has run.
    pub fn refresh(&mut self) {
        let interval = self.resource::<LimitsConfig>().evaluation_interval_ticks;
        self.tick(interval as u32);
    }
}
