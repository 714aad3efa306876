//! Crate-wide error types.
//!
//! Every fallible module is free to define its own narrow error enum (see
//! [`crate::decimal::DecimalError`]); those fold into [`CoreError`] at the public
//! boundary via `#[from]`, mirroring how the upstream trading engine consolidates
//! websocket/execution/database/auth failures into one caller-facing `EngineError`.

use thiserror::Error;

/// Errors surfaced by the public API of this crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A caller-supplied value violates a documented precondition: malformed
    /// tolerance, non-positive limits, missing spend bounds, an unknown graph
    /// node, or a currency code outside `[A-Z]{3,12}`.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A decimal operation could not be carried out at the requested scale.
    #[error("precision violation: {0}")]
    Precision(String),
}

impl From<crate::decimal::DecimalError> for CoreError {
    fn from(e: crate::decimal::DecimalError) -> Self {
        CoreError::Precision(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
