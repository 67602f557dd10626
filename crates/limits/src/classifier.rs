//! Classifier resolution.
//!
//! A grid's class comes from its classifier blocks. The best-ranked one is
//! active and sets the reserved class; any others are extras, kept in rank
//! order so the next one can be promoted when the active block goes away.
//! The effective class equals the reserved class only while the active block
//! is functional.

use crate::catalog::ClassId;
use crate::host::BlockId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierRef {
    pub block: BlockId,
    pub class: ClassId,
}

impl ClassifierRef {
    /// Higher class wins; within a class the older (lower id) block wins.
    pub fn outranks(&self, other: &ClassifierRef) -> bool {
        (self.class, std::cmp::Reverse(self.block)) > (other.class, std::cmp::Reverse(other.block))
    }
}

/// Result of attaching a classifier block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attached {
    /// No classifier was active; this one now is.
    Activated,
    /// This one outranked the active classifier, which became an extra.
    Replaced { previous: ClassifierRef },
    /// Queued behind the active classifier as an extra.
    Queued,
}

/// Result of detaching a classifier block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    NotTracked,
    Extra,
    /// The active classifier went away. `promoted` is the extra that took its
    /// place; its functional state must be re-checked by the caller.
    Active { promoted: Option<ClassifierRef> },
}

#[derive(Debug, Clone, Default)]
pub struct ClassifierSet {
    active: Option<ClassifierRef>,
    active_functional: bool,
    /// Best-ranked first.
    extras: Vec<ClassifierRef>,
}

impl ClassifierSet {
    pub fn active(&self) -> Option<ClassifierRef> {
        self.active
    }

    pub fn extras(&self) -> &[ClassifierRef] {
        &self.extras
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_functional(&self) -> bool {
        self.active.is_some() && self.active_functional
    }

    /// Total classifier blocks on the grid, active included.
    pub fn count(&self) -> usize {
        self.extras.len() + usize::from(self.active.is_some())
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.active.is_some_and(|a| a.block == block) || self.extras.iter().any(|e| e.block == block)
    }

    /// Class of the active classifier, or the default class.
    pub fn reserved_class(&self) -> ClassId {
        self.active.map(|a| a.class).unwrap_or(ClassId::DEFAULT)
    }

    /// Class whose rules currently apply.
    pub fn effective_class(&self) -> ClassId {
        if self.is_functional() {
            self.reserved_class()
        } else {
            ClassId::DEFAULT
        }
    }

    pub fn attach(&mut self, candidate: ClassifierRef, functional: bool) -> Attached {
        match self.active {
            None => {
                self.active = Some(candidate);
                self.active_functional = functional;
                Attached::Activated
            }
            Some(current) if candidate.outranks(&current) => {
                self.insert_extra(current);
                self.active = Some(candidate);
                self.active_functional = functional;
                Attached::Replaced { previous: current }
            }
            Some(_) => {
                self.insert_extra(candidate);
                Attached::Queued
            }
        }
    }

    pub fn detach(&mut self, block: BlockId) -> Detached {
        if self.active.is_some_and(|a| a.block == block) {
            let promoted = if self.extras.is_empty() {
                None
            } else {
                Some(self.extras.remove(0))
            };
            self.active = promoted;
            self.active_functional = false;
            return Detached::Active { promoted };
        }
        match self.extras.iter().position(|e| e.block == block) {
            Some(i) => {
                self.extras.remove(i);
                Detached::Extra
            }
            None => Detached::NotTracked,
        }
    }

    /// Record the active classifier's functional state. Returns `true` when the
    /// effective class changed as a result.
    pub fn set_functional(&mut self, functional: bool) -> bool {
        if self.active.is_none() {
            return false;
        }
        let before = self.effective_class();
        self.active_functional = functional;
        before != self.effective_class()
    }

    /// Extras ordered worst-ranked first, i.e. in removal order.
    pub fn extras_worst_first(&self) -> impl Iterator<Item = &ClassifierRef> {
        self.extras.iter().rev()
    }

    fn insert_extra(&mut self, extra: ClassifierRef) {
        let at = self
            .extras
            .iter()
            .position(|e| extra.outranks(e))
            .unwrap_or(self.extras.len());
        self.extras.insert(at, extra);
    }
}
