//! Error types shared by every PeakFilter stage
//!
//! Stage functions validate their parameters and their input table before
//! touching any frame, so an `Err` always means the table was left as it was
//! handed in.

use thiserror::Error;

/// Errors raised by the clustering and consolidation stages
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PeakFilterError {
    /// A parameter lies outside its documented domain
    #[error("invalid parameter '{name}' = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
    /// The frame table is not in the shape a stage requires
    #[error("invalid input table: {0}")]
    InvalidInput(String),
}

impl PeakFilterError {
    pub(crate) fn parameter(name: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    pub(crate) fn input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PeakFilterError>;

// ============================================================================
// Parameter checks
// ============================================================================

/// Fails unless `value` is finite and `>= 0`
pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PeakFilterError::parameter(name, value, "must be a finite value >= 0"))
    }
}

/// Fails unless `value` is finite and `> 0`
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PeakFilterError::parameter(name, value, "must be a finite value > 0"))
    }
}
