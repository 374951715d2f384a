//! Identifier parsing errors.

use thiserror::Error;

/// Failure to build an identifier from raw input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input was not an integer at all.
    #[error("{kind}: not a number")]
    NotNumeric { kind: &'static str },

    /// The input parsed but was zero or negative.
    #[error("{kind}: must be positive")]
    NotPositive { kind: &'static str },
}
