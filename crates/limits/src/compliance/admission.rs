//! Incremental block bookkeeping: the hot path run on every host mutation.

use bevy::prelude::*;

use super::types::{Admission, ComplianceState, EnforcementContext, ViolationKind};
use crate::catalog::BlockTags;
use crate::classifier::{Attached, ClassifierRef, Detached};
use crate::host::{BlockId, BlockInfo, SimHost};

impl ComplianceState {
    /// Decide whether `block` may stay on the grid, and count it if so.
    ///
    /// A denied block is removed from the host before returning and is never
    /// counted. A block already tracked is a no-op.
    pub fn on_block_added(
        &mut self,
        block: &BlockInfo,
        ctx: EnforcementContext,
        host: &mut dyn SimHost,
    ) -> Admission {
        if self.blocks.contains_key(&block.id) {
            return Admission::Allow;
        }
        let tags = ctx.catalog.tag(block);
        self.projecting = host.is_projecting(self.grid);

        let admission = if self.in_grace(ctx.tick) {
            Admission::Allow
        } else {
            self.admit(block.id, &tags, ctx)
        };

        match admission {
            Admission::Allow => {
                let functional = tags.is_classifier() && host.is_functional(self.grid, block.id);
                self.record_added(block.id, tags, functional);
            }
            Admission::Deny(kind) => {
                debug!("{}: denied {} ({}): {kind}", self.grid, block.id, block.definition);
                if let Err(e) = host.remove_block(self.grid, block.id) {
                    warn!("{}: could not remove denied {}: {e}", self.grid, block.id);
                }
            }
        }
        admission
    }

    /// Count a bulk-loaded manifest without judging it. Returns how many
    /// blocks were new.
    pub fn load_manifest(
        &mut self,
        blocks: &[BlockInfo],
        ctx: EnforcementContext,
        host: &dyn SimHost,
    ) -> u32 {
        let mut added = 0;
        for block in blocks {
            if self.blocks.contains_key(&block.id) {
                continue;
            }
            let tags = ctx.catalog.tag(block);
            let functional = tags.is_classifier() && host.is_functional(self.grid, block.id);
            self.record_added(block.id, tags, functional);
            added += 1;
        }
        added
    }

    /// Admission outside any grace window.
    pub fn admit(&self, id: BlockId, tags: &BlockTags, ctx: EnforcementContext) -> Admission {
        if let Some(class) = tags.classifier {
            let candidate = ClassifierRef { block: id, class };
            let becomes_active = match self.classifiers.active() {
                None => true,
                Some(active) => candidate.outranks(&active),
            };
            if becomes_active {
                return Admission::Allow;
            }
            return Admission::Deny(ViolationKind::TooManyClassifiers);
        }

        let rules = ctx.catalog.rules(self.effective_class());
        if let Some(max) = rules.max_blocks {
            let waived = tags.essential && self.reserved_class().is_default();
            if self.total_blocks >= max && !waived {
                return Admission::Deny(ViolationKind::TotalBlocks);
            }
        }
        for &t in &tags.types {
            let t = t as usize;
            if let Some(max) = rules.type_limit(t) {
                if self.type_count(t) >= max {
                    return Admission::Deny(ViolationKind::BlockType(t));
                }
            }
        }
        Admission::Allow
    }

    fn record_added(&mut self, id: BlockId, tags: BlockTags, functional: bool) {
        self.total_blocks += 1;
        for &t in &tags.types {
            if let Some(count) = self.type_counts.get_mut(t as usize) {
                *count += 1;
            }
        }
        if let Some(class) = tags.classifier {
            let attached = self
                .classifiers
                .attach(ClassifierRef { block: id, class }, functional);
            if let Attached::Replaced { previous } = attached {
                debug!(
                    "{}: classifier {id} outranks {}, which is now an extra",
                    self.grid, previous.block
                );
            }
            if self.classifiers.is_functional() {
                self.ever_classified = true;
            }
        }
        self.blocks.insert(id, tags);
        self.dirty = true;
    }

    /// Forget a block. Returns `false` when the block was not tracked
    /// (denied, already remediated, or never seen).
    pub fn on_block_removed(&mut self, block: BlockId, host: &dyn SimHost) -> bool {
        let Some(tags) = self.blocks.remove(&block) else {
            return false;
        };
        self.total_blocks = self.total_blocks.saturating_sub(1);
        for &t in &tags.types {
            if let Some(count) = self.type_counts.get_mut(t as usize) {
                *count = count.saturating_sub(1);
            }
        }
        if tags.is_classifier() {
            if let Detached::Active { promoted } = self.classifiers.detach(block) {
                match promoted {
                    Some(next) => {
                        let functional = host.is_functional(self.grid, next.block);
                        self.classifiers.set_functional(functional);
                        if functional {
                            self.ever_classified = true;
                        }
                        debug!("{}: promoted classifier {}", self.grid, next.block);
                    }
                    None => debug!("{}: declassified", self.grid),
                }
            }
        }
        self.dirty = true;
        true
    }

    /// Re-read the host-side flags that have no mutation callback.
    pub fn refresh_flags(&mut self, host: &dyn SimHost) {
        if let Some(active) = self.classifiers.active() {
            let functional = host.is_functional(self.grid, active.block);
            if self.classifiers.set_functional(functional) {
                debug!(
                    "{}: classifier {} is now {}",
                    self.grid,
                    active.block,
                    if functional { "functional" } else { "offline" }
                );
            }
            if functional {
                self.ever_classified = true;
            }
        }
        self.stationary = host.is_stationary(self.grid);
        self.projecting = host.is_projecting(self.grid);
        self.dirty = true;
    }
}
