//! Error types for the ZPD estimators.
//!
//! Only configuration problems and oracle failures are errors. Out-of-range
//! numbers are clamped in place (see [`crate::sanitize`]) and rounds without an
//! eligible trace are skipped by the estimator that hit them.

use thiserror::Error;

use crate::types::Trace;

/// Invalid input detected at estimator entry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("progression graph contains a cycle through trace {trace:?}")]
    Cycle { trace: Trace },

    #[error("trace {trace:?} is not part of the progression graph")]
    DanglingTrace { trace: Trace },

    #[error("trace {trace:?} has no problem queue")]
    MissingProblems { trace: Trace },

    #[error("trace {trace:?} has an empty problem queue")]
    EmptyProblems { trace: Trace },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl ConfigurationError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Failure reported by a learner oracle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("oracle failed: {0}")]
pub struct OracleError(pub String);

/// Top-level error type
#[derive(Debug, Error)]
pub enum ZpdError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

pub type Result<T> = std::result::Result<T, ZpdError>;
