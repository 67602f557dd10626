use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::host::OwnerKind;

// =============================================================================
// Identifiers
// =============================================================================

/// Index of a class in the catalog.
///
/// Declaration order is the class hierarchy: a higher id outranks a lower
/// one. Id 0 is always the default class applied to unclassified grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct ClassId(pub u16);

impl ClassId {
    pub const DEFAULT: ClassId = ClassId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

// =============================================================================
// Catalog source (as authored)
// =============================================================================

/// A named family of blocks, matched by host definition id.
///
/// A pattern ending in `*` matches every definition with that prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTypeDef {
    pub name: String,
    pub matches: Vec<String>,
}

impl BlockTypeDef {
    pub fn new(name: impl Into<String>, matches: &[&str]) -> Self {
        Self {
            name: name.into(),
            matches: matches.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn matches(&self, definition: &str) -> bool {
        self.matches.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => definition.starts_with(prefix),
            None => pattern == definition,
        })
    }
}

/// Cap on one block type within a class, by block type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTypeLimit {
    pub block_type: String,
    pub max: u32,
}

/// A class as authored. `None` limits are unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClassSource {
    pub name: String,
    /// Host definition id of the block that assigns this class.
    pub classifier: Option<String>,
    pub max_blocks: Option<u32>,
    pub max_per_faction: Option<u32>,
    pub max_per_solo_player: Option<u32>,
    pub block_type_limits: Vec<BlockTypeLimit>,
    pub must_be_stationary: bool,
    pub capture_weight: f32,
}

impl ClassSource {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn classifier(mut self, definition: impl Into<String>) -> Self {
        self.classifier = Some(definition.into());
        self
    }

    pub fn max_blocks(mut self, max: u32) -> Self {
        self.max_blocks = Some(max);
        self
    }

    pub fn per_faction(mut self, max: u32) -> Self {
        self.max_per_faction = Some(max);
        self
    }

    pub fn per_player(mut self, max: u32) -> Self {
        self.max_per_solo_player = Some(max);
        self
    }

    pub fn limit(mut self, block_type: impl Into<String>, max: u32) -> Self {
        self.block_type_limits.push(BlockTypeLimit {
            block_type: block_type.into(),
            max,
        });
        self
    }

    pub fn stationary(mut self) -> Self {
        self.must_be_stationary = true;
        self
    }

    pub fn weight(mut self, weight: f32) -> Self {
        self.capture_weight = weight;
        self
    }
}

/// The whole catalog as authored. The first class is the default class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogSource {
    pub block_types: Vec<BlockTypeDef>,
    pub classes: Vec<ClassSource>,
}

// =============================================================================
// Resolved rules
// =============================================================================

/// Rules of one class, with block-type limits resolved to type indices.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub class_id: ClassId,
    pub name: String,
    pub classifier: Option<String>,
    pub max_blocks: Option<u32>,
    pub max_per_faction: Option<u32>,
    pub max_per_solo_player: Option<u32>,
    /// Indexed by block type; `None` is unbounded.
    pub block_type_limits: Vec<Option<u32>>,
    pub must_be_stationary: bool,
    pub capture_weight: f32,
}

impl RuleSet {
    /// How many grids of this class an owner of `kind` may field.
    /// Unowned grids are never limited.
    pub fn quota_for(&self, kind: OwnerKind) -> Option<u32> {
        match kind {
            OwnerKind::None => None,
            OwnerKind::Individual => self.max_per_solo_player,
            OwnerKind::Group => self.max_per_faction,
        }
    }

    pub fn type_limit(&self, block_type: usize) -> Option<u32> {
        self.block_type_limits.get(block_type).copied().flatten()
    }
}

/// Classification of one block, computed once when it is first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockTags {
    /// Class this block assigns when it is the grid's classifier.
    pub classifier: Option<ClassId>,
    pub essential: bool,
    /// Block types (indices) this block counts against.
    pub types: Vec<u16>,
}

impl BlockTags {
    pub fn is_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn counts_as(&self, block_type: usize) -> bool {
        self.types.iter().any(|&t| t as usize == block_type)
    }
}
