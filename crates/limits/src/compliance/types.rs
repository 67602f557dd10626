use std::collections::BTreeMap;
use std::fmt;

use crate::catalog::{BlockTags, ClassId, RuleCatalog};
use crate::classifier::ClassifierSet;
use crate::cleanup::CleanupPhase;
use crate::config::LimitsConfig;
use crate::host::{BlockId, GridId, OwnerRef};

// =============================================================================
// Admission
// =============================================================================

/// Why a placement was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    TooManyClassifiers,
    TotalBlocks,
    /// Index of the block type whose limit would be exceeded.
    BlockType(usize),
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::TooManyClassifiers => write!(f, "too many classifiers"),
            ViolationKind::TotalBlocks => write!(f, "total block limit"),
            ViolationKind::BlockType(i) => write!(f, "block type #{i} limit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny(ViolationKind),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allow)
    }
}

// =============================================================================
// Violations
// =============================================================================

/// An active rule violation on a grid.
///
/// `evaluate_violations` reports them in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Over the owner's quota for the grid's class.
    Unsupported,
    TotalBlocks { count: u32, max: u32 },
    BlockType { index: usize, count: u32, max: u32 },
    TooManyClassifiers { count: u32 },
    NotStationary,
}

impl Violation {
    /// Slow violations handled through the probation counter rather than by
    /// trimming a share of an overage each pass.
    pub fn is_structural(&self) -> bool {
        matches!(self, Violation::Unsupported | Violation::NotStationary)
    }

    pub fn kind(&self) -> Option<ViolationKind> {
        match self {
            Violation::TotalBlocks { .. } => Some(ViolationKind::TotalBlocks),
            Violation::BlockType { index, .. } => Some(ViolationKind::BlockType(*index)),
            Violation::TooManyClassifiers { .. } => Some(ViolationKind::TooManyClassifiers),
            Violation::Unsupported | Violation::NotStationary => None,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Unsupported => write!(f, "over owner quota"),
            Violation::TotalBlocks { count, max } => write!(f, "{count}/{max} blocks"),
            Violation::BlockType { index, count, max } => {
                write!(f, "{count}/{max} blocks of type #{index}")
            }
            Violation::TooManyClassifiers { count } => write!(f, "{count} classifiers"),
            Violation::NotStationary => write!(f, "must be stationary"),
        }
    }
}

// =============================================================================
// Context
// =============================================================================

/// Read-only session state every handler needs.
#[derive(Clone, Copy)]
pub struct EnforcementContext<'a> {
    pub catalog: &'a RuleCatalog,
    pub config: &'a LimitsConfig,
    pub tick: u64,
}

// =============================================================================
// Per-grid state
// =============================================================================

/// Incremental bookkeeping for one grid.
///
/// Counters track admitted, not-yet-removed blocks only. The cached
/// [`BlockTags`] of each block are the sole input on removal, so the host is
/// never asked what a departed block used to be.
#[derive(Debug, Clone)]
pub struct ComplianceState {
    pub grid: GridId,
    pub(crate) total_blocks: u32,
    pub(crate) type_counts: Vec<u32>,
    pub(crate) blocks: BTreeMap<BlockId, BlockTags>,
    pub(crate) classifiers: ClassifierSet,
    pub(crate) owner: OwnerRef,
    pub(crate) supported: bool,
    /// Whether a classifier ever took effect on this grid.
    pub(crate) ever_classified: bool,
    /// Blocks are admitted unconditionally until this tick.
    pub(crate) grace_until: u64,
    pub(crate) projecting: bool,
    pub(crate) stationary: bool,
    pub(crate) dirty: bool,
    pub(crate) violations: Vec<Violation>,
    /// Ledger slot the grid currently occupies and the size last reported
    /// there. Written only by `fleet::ownership::sync_ledger`.
    pub(crate) enrolled: Option<(OwnerRef, ClassId)>,
    pub(crate) enrolled_blocks: u32,
}

impl ComplianceState {
    pub fn new(grid: GridId, block_types: usize, grace_until: u64) -> Self {
        Self {
            grid,
            total_blocks: 0,
            type_counts: vec![0; block_types],
            blocks: BTreeMap::new(),
            classifiers: ClassifierSet::default(),
            owner: OwnerRef::NONE,
            supported: true,
            ever_classified: false,
            grace_until,
            projecting: false,
            stationary: true,
            dirty: true,
            violations: Vec::new(),
            enrolled: None,
            enrolled_blocks: 0,
        }
    }

    pub fn total_blocks(&self) -> u32 {
        self.total_blocks
    }

    pub fn type_count(&self, block_type: usize) -> u32 {
        self.type_counts.get(block_type).copied().unwrap_or(0)
    }

    pub fn tracks(&self, block: BlockId) -> bool {
        self.blocks.contains_key(&block)
    }

    pub fn blocks(&self) -> impl DoubleEndedIterator<Item = (&BlockId, &BlockTags)> {
        self.blocks.iter()
    }

    pub fn classifiers(&self) -> &ClassifierSet {
        &self.classifiers
    }

    pub fn owner(&self) -> OwnerRef {
        self.owner
    }

    pub fn reserved_class(&self) -> ClassId {
        self.classifiers.reserved_class()
    }

    pub fn effective_class(&self) -> ClassId {
        self.classifiers.effective_class()
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn ever_classified(&self) -> bool {
        self.ever_classified
    }

    pub fn is_stationary(&self) -> bool {
        self.stationary
    }

    /// Violations found by the last evaluation.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn enrolled(&self) -> Option<(OwnerRef, ClassId)> {
        self.enrolled
    }

    pub fn needs_evaluation(&self) -> bool {
        self.dirty
    }

    pub fn in_grace(&self, tick: u64) -> bool {
        tick < self.grace_until || self.projecting
    }

    /// Extend the grace window; never shortens one already open.
    pub fn open_grace(&mut self, until: u64) {
        self.grace_until = self.grace_until.max(until);
    }
}

/// Read-only snapshot of one grid for a notification or command layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceReport {
    pub grid: GridId,
    pub owner: OwnerRef,
    pub class_name: String,
    pub reserved_class: ClassId,
    pub effective_class: ClassId,
    pub total_blocks: u32,
    pub max_blocks: Option<u32>,
    pub supported: bool,
    pub violations: Vec<Violation>,
    pub timer: Option<TimerReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerReport {
    pub phase: CleanupPhase,
    pub seconds_remaining: u64,
}
