//! Error types for the requirer.

use thiserror::Error;

/// Errors returned by requirer accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequireError {
    /// The provider published a CA that is not valid base64.
    #[error("Invalid CA encoding: {0}")]
    InvalidCa(#[from] base64::DecodeError),
}
