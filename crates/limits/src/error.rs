// ---------------------------------------------------------------------------
// LimitsError: failure taxonomy for the enforcement core
// ---------------------------------------------------------------------------

use std::fmt;

use bevy::prelude::*;

use crate::host::HostError;

/// Errors raised inside enforcement.
///
/// None of them escape to the host loop: handlers log them with
/// [`LimitsError::log`] and skip the affected grid until the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitsError {
    /// A host query was unavailable; the grid is treated as unowned for now.
    TransientHost(HostError),
    /// A class id had no rule; the default class's rules are applied instead.
    Configuration(String),
    /// Internal bookkeeping disagreed with itself.
    InvariantViolation(String),
    /// The rule catalog could not be built from its source.
    Catalog(String),
}

/// Log level used when an error is swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warn,
    Error,
}

impl LimitsError {
    pub fn severity(&self) -> Severity {
        match self {
            LimitsError::TransientHost(_) | LimitsError::Configuration(_) => Severity::Warn,
            LimitsError::InvariantViolation(_) | LimitsError::Catalog(_) => Severity::Error,
        }
    }

    /// Log and drop. The caller turns the failed operation into a no-op.
    pub fn log(&self, context: &str) {
        match self.severity() {
            Severity::Warn => warn!("{context}: {self}"),
            Severity::Error => error!("{context}: {self}"),
        }
    }
}

impl fmt::Display for LimitsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitsError::TransientHost(e) => write!(f, "transient host error: {e}"),
            LimitsError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            LimitsError::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
            LimitsError::Catalog(msg) => write!(f, "invalid rule catalog: {msg}"),
        }
    }
}

impl std::error::Error for LimitsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LimitsError::TransientHost(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HostError> for LimitsError {
    fn from(e: HostError) -> Self {
        LimitsError::TransientHost(e)
    }
}
