//! Error types shared across the engine

use persistence::DbError;
use thiserror::Error;

/// A string that does not name a known variant of one of the engine enums
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Run-level failure of a sweep.
///
/// Provider and notification failures never surface here; they are scoped to
/// the pair/timeframe or row they happened on.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("detection log error: {0}")]
    Log(#[from] DbError),
}
