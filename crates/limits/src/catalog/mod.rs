//! Rule catalog: the static per-session table of classes and their limits.
//!
//! Built once from a [`CatalogSource`] (in code or JSON) and read-only
//! afterwards. Everything downstream refers to classes by [`ClassId`] and to
//! block types by index.

pub mod types;

pub use types::{
    BlockTags, BlockTypeDef, BlockTypeLimit, CatalogSource, ClassId, ClassSource, RuleSet,
};

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;

use crate::error::LimitsError;
use crate::host::BlockInfo;

#[derive(Resource, Debug, Clone)]
pub struct RuleCatalog {
    block_types: Vec<BlockTypeDef>,
    classes: Vec<RuleSet>,
    classifier_index: HashMap<String, ClassId>,
}

impl Default for RuleCatalog {
    /// A single unbounded default class: nothing is ever enforced.
    fn default() -> Self {
        Self {
            block_types: Vec::new(),
            classes: vec![RuleSet {
                class_id: ClassId::DEFAULT,
                name: "Unclassified".into(),
                classifier: None,
                max_blocks: None,
                max_per_faction: None,
                max_per_solo_player: None,
                block_type_limits: Vec::new(),
                must_be_stationary: false,
                capture_weight: 0.0,
            }],
            classifier_index: HashMap::new(),
        }
    }
}

impl RuleCatalog {
    /// Resolve and validate an authored catalog.
    pub fn build(source: CatalogSource) -> Result<Self, LimitsError> {
        if source.classes.is_empty() {
            return Err(LimitsError::Catalog("no classes defined".into()));
        }
        if source.classes.len() > u16::MAX as usize {
            return Err(LimitsError::Catalog("too many classes".into()));
        }
        if source.block_types.len() > u16::MAX as usize {
            return Err(LimitsError::Catalog("too many block types".into()));
        }
        if let Some(classifier) = &source.classes[0].classifier {
            return Err(LimitsError::Catalog(format!(
                "default class '{}' cannot have a classifier ('{classifier}')",
                source.classes[0].name
            )));
        }

        let mut type_index = HashMap::new();
        for (i, def) in source.block_types.iter().enumerate() {
            if type_index.insert(def.name.clone(), i).is_some() {
                return Err(LimitsError::Catalog(format!(
                    "duplicate block type '{}'",
                    def.name
                )));
            }
        }

        let mut names = HashSet::new();
        let mut classifier_index = HashMap::new();
        let mut classes = Vec::with_capacity(source.classes.len());
        for (i, class) in source.classes.into_iter().enumerate() {
            let class_id = ClassId(i as u16);
            if !names.insert(class.name.clone()) {
                return Err(LimitsError::Catalog(format!(
                    "duplicate class '{}'",
                    class.name
                )));
            }
            if i > 0 && class.classifier.is_none() {
                return Err(LimitsError::Catalog(format!(
                    "class '{}' has no classifier block",
                    class.name
                )));
            }
            if let Some(definition) = &class.classifier {
                if classifier_index
                    .insert(definition.clone(), class_id)
                    .is_some()
                {
                    return Err(LimitsError::Catalog(format!(
                        "classifier '{definition}' assigned to more than one class"
                    )));
                }
            }

            let mut limits = vec![None; source.block_types.len()];
            for limit in &class.block_type_limits {
                let Some(&t) = type_index.get(&limit.block_type) else {
                    return Err(LimitsError::Catalog(format!(
                        "class '{}' limits unknown block type '{}'",
                        class.name, limit.block_type
                    )));
                };
                limits[t] = Some(limit.max);
            }

            classes.push(RuleSet {
                class_id,
                name: class.name,
                classifier: class.classifier,
                max_blocks: class.max_blocks,
                max_per_faction: class.max_per_faction,
                max_per_solo_player: class.max_per_solo_player,
                block_type_limits: limits,
                must_be_stationary: class.must_be_stationary,
                capture_weight: class.capture_weight,
            });
        }

        Ok(Self {
            block_types: source.block_types,
            classes,
            classifier_index,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, LimitsError> {
        let source: CatalogSource = serde_json::from_str(json)
            .map_err(|e| LimitsError::Catalog(format!("unreadable catalog: {e}")))?;
        Self::build(source)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn block_type_count(&self) -> usize {
        self.block_types.len()
    }

    pub fn block_type(&self, index: usize) -> Option<&BlockTypeDef> {
        self.block_types.get(index)
    }

    pub fn classes(&self) -> impl Iterator<Item = &RuleSet> {
        self.classes.iter()
    }

    pub fn default_rules(&self) -> &RuleSet {
        &self.classes[0]
    }

    /// Rules for a class, or `Err` if the id is not in the catalog.
    pub fn try_rules(&self, class: ClassId) -> Result<&RuleSet, LimitsError> {
        self.classes.get(class.index()).ok_or_else(|| {
            LimitsError::Configuration(format!("no rules defined for class id {}", class.0))
        })
    }

    /// Rules for a class, falling back to the default class (logged) when the
    /// id is unknown.
    pub fn rules(&self, class: ClassId) -> &RuleSet {
        match self.try_rules(class) {
            Ok(rules) => rules,
            Err(e) => {
                e.log("RuleCatalog");
                self.default_rules()
            }
        }
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.classes
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.class_id)
    }

    pub fn block_type_by_name(&self, name: &str) -> Option<usize> {
        self.block_types.iter().position(|t| t.name == name)
    }

    /// Class assigned by a classifier block with this definition, if any.
    pub fn classifier_class(&self, definition: &str) -> Option<ClassId> {
        self.classifier_index.get(definition).copied()
    }

    /// Compute the cached tags of a block.
    pub fn tag(&self, block: &BlockInfo) -> BlockTags {
        let types = self
            .block_types
            .iter()
            .enumerate()
            .filter(|(_, def)| def.matches(&block.definition))
            .map(|(i, _)| i as u16)
            .collect();
        BlockTags {
            classifier: self.classifier_class(&block.definition),
            essential: block.essential,
            types,
        }
    }
}
