//! Error types for `keygate-core`.
//!
//! Configuration, hashing and token operations return [`CoreResult<T>`].
//! The login and registration paths have their own outcome enums
//! ([`crate::VerifyFailure`], [`crate::RegisterError`]) because callers
//! branch on them rather than just report them.

use std::path::PathBuf;

/// Error type for configuration, digest and token operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The configuration file does not exist.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// The process lacks permission to read the configuration file.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The configuration is malformed or carries an unusable value.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Computing a password digest failed.
    #[error("hash error: {0}")]
    Hash(String),

    /// Minting or validating a session token failed.
    #[error("token error: {0}")]
    Token(String),

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout `keygate-core`.
pub type CoreResult<T> = Result<T, CoreError>;
