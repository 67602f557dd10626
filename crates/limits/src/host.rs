//! Boundary with the host simulation.
//!
//! The host owns the authoritative world: which grids exist, what blocks they
//! hold and who owns them. Enforcement only sees it through [`SimHost`], which
//! the session stores in the [`HostLink`] resource, and through the
//! [`HostEvent`] stream the host feeds into the `App`.

use std::fmt;

use bevy::prelude::*;
use bitcode::{Decode, Encode};

// =============================================================================
// Identifiers
// =============================================================================

/// Stable host id of a grid (a buildable structure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct GridId(pub u64);

/// Stable host id of a single block on a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct BlockId(pub u64);

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grid#{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

/// Kind of owner credited with a grid for quota purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OwnerKind {
    /// Nobody owns the grid (or ownership is not known yet).
    None,
    /// A player that belongs to no group.
    Individual,
    /// A faction or other collective.
    Group,
}

/// Owner group of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerRef {
    pub kind: OwnerKind,
    pub id: u64,
}

impl OwnerRef {
    pub const NONE: OwnerRef = OwnerRef {
        kind: OwnerKind::None,
        id: 0,
    };

    pub const fn individual(id: u64) -> Self {
        Self {
            kind: OwnerKind::Individual,
            id,
        }
    }

    pub const fn group(id: u64) -> Self {
        Self {
            kind: OwnerKind::Group,
            id,
        }
    }

    pub fn is_none(&self) -> bool {
        self.kind == OwnerKind::None
    }
}

impl Default for OwnerRef {
    fn default() -> Self {
        OwnerRef::NONE
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OwnerKind::None => write!(f, "unowned"),
            OwnerKind::Individual => write!(f, "player:{}", self.id),
            OwnerKind::Group => write!(f, "group:{}", self.id),
        }
    }
}

/// A block as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub id: BlockId,
    /// Host definition id of the block (e.g. `"LargeBlockArmorBlock"`).
    pub definition: String,
    /// Infrastructure a grid cannot live without, such as a power source.
    pub essential: bool,
}

impl BlockInfo {
    pub fn new(id: u64, definition: impl Into<String>) -> Self {
        Self {
            id: BlockId(id),
            definition: definition.into(),
            essential: false,
        }
    }

    pub fn essential(mut self) -> Self {
        self.essential = true;
        self
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Failures reported by a host query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The host cannot answer right now (e.g. ownership data not initialized).
    Transient(String),
    /// The grid is unknown to the host or is mid-deletion.
    UnknownGrid(GridId),
    /// The block is unknown to the host or already gone.
    UnknownBlock(GridId, BlockId),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Transient(msg) => write!(f, "host temporarily unavailable: {msg}"),
            HostError::UnknownGrid(grid) => write!(f, "host does not know {grid}"),
            HostError::UnknownBlock(grid, block) => {
                write!(f, "host does not know {block} on {grid}")
            }
        }
    }
}

impl std::error::Error for HostError {}

// =============================================================================
// Host trait
// =============================================================================

/// Query and command surface the host simulation exposes to enforcement.
///
/// Every call runs synchronously on the host's update cycle. Queries must be
/// cheap; the heavy ones (`manifest`) are only issued from the tick path.
pub trait SimHost: Send + Sync + 'static {
    /// Whether the grid still exists. `Err` means the host cannot tell yet.
    fn grid_exists(&self, grid: GridId) -> Result<bool, HostError>;

    /// Every block currently on the grid.
    fn manifest(&self, grid: GridId) -> Result<Vec<BlockInfo>, HostError>;

    /// Owner group credited with the majority of the grid.
    fn majority_owner(&self, grid: GridId) -> Result<OwnerRef, HostError>;

    /// Whether a block is built, powered and switched on.
    fn is_functional(&self, grid: GridId, block: BlockId) -> bool;

    /// Whether the grid is anchored in place.
    fn is_stationary(&self, grid: GridId) -> bool;

    /// Whether the grid is currently projecting a blueprint.
    fn is_projecting(&self, grid: GridId) -> bool;

    /// Remove one block from the grid.
    fn remove_block(&mut self, grid: GridId, block: BlockId) -> Result<(), HostError>;

    /// Remove the whole grid from the world.
    fn destroy_grid(&mut self, grid: GridId) -> Result<(), HostError>;
}

/// Host used until the embedding application installs a real one. It knows
/// nothing, so every answer is transient and enforcement stays idle.
struct DetachedHost;

impl SimHost for DetachedHost {
    fn grid_exists(&self, _grid: GridId) -> Result<bool, HostError> {
        Err(HostError::Transient("no host attached".into()))
    }

    fn manifest(&self, grid: GridId) -> Result<Vec<BlockInfo>, HostError> {
        Err(HostError::UnknownGrid(grid))
    }

    fn majority_owner(&self, _grid: GridId) -> Result<OwnerRef, HostError> {
        Err(HostError::Transient("no host attached".into()))
    }

    fn is_functional(&self, _grid: GridId, _block: BlockId) -> bool {
        false
    }

    fn is_stationary(&self, _grid: GridId) -> bool {
        false
    }

    fn is_projecting(&self, _grid: GridId) -> bool {
        false
    }

    fn remove_block(&mut self, grid: GridId, block: BlockId) -> Result<(), HostError> {
        Err(HostError::UnknownBlock(grid, block))
    }

    fn destroy_grid(&mut self, grid: GridId) -> Result<(), HostError> {
        Err(HostError::UnknownGrid(grid))
    }
}

/// The session's handle on the host simulation.
#[derive(Resource)]
pub struct HostLink(Box<dyn SimHost>);

impl HostLink {
    pub fn new(host: impl SimHost) -> Self {
        Self(Box::new(host))
    }

    pub fn detached() -> Self {
        Self(Box::new(DetachedHost))
    }

    pub fn get(&self) -> &dyn SimHost {
        &*self.0
    }

    pub fn get_mut(&mut self) -> &mut dyn SimHost {
        &mut *self.0
    }
}

// =============================================================================
// Inbound events
// =============================================================================

/// Mutation callbacks from the host, delivered in the order they happened.
///
/// A single event type keeps add/remove ordering intact within one tick.
#[derive(Event, Debug, Clone)]
pub enum HostEvent {
    /// A grid appeared (world load, paste, spawn). Its manifest is counted
    /// inside the initialization grace window.
    GridAdded(GridId),
    /// Another grid is being merged into this one; its blocks arrive next.
    GridMerging(GridId),
    BlockAdded { grid: GridId, block: BlockInfo },
    BlockRemoved { grid: GridId, block: BlockId },
    OwnershipChanged(GridId),
    /// The grid left the world.
    GridRemoved(GridId),
}

impl HostEvent {
    pub fn grid(&self) -> GridId {
        match self {
            HostEvent::GridAdded(grid)
            | HostEvent::GridMerging(grid)
            | HostEvent::OwnershipChanged(grid)
            | HostEvent::GridRemoved(grid) => *grid,
            HostEvent::BlockAdded { grid, .. } | HostEvent::BlockRemoved { grid, .. } => *grid,
        }
    }
}
