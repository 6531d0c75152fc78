//! Error types for parsing shared enumerations at typed boundaries.

use thiserror::Error;

/// Errors raised when an external string does not name a known tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The string is not one of the eight modules.
    #[error("unknown module: {0}")]
    UnknownModule(String),

    /// The string is not one of the six permissions.
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    /// The string is not one of the five role presets.
    #[error("unknown role preset: {0}")]
    UnknownPreset(String),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
