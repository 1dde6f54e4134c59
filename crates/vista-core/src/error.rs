//! Error types for VISTA core.

use thiserror::Error;

/// Coarse classification shared by every error in the workspace.
///
/// Callers branch on the kind rather than on individual variants: input
/// errors are the caller's fault, authorization errors are trust decisions,
/// cryptographic errors mean a check failed, and infrastructure errors mean
/// something underneath us (store, randomness, link) is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Input,
    Authorization,
    Cryptographic,
    Infrastructure,
}

/// Errors raised by the pairing crypto engine.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The randomness source could not be used.
    #[error("crypto initialization failed: {0}")]
    CryptoInit(String),

    /// Key material cannot produce a signature.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A key or signature encoding is structurally invalid.
    #[error("malformed input: {0}")]
    MalformedInput(String),
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptoError::CryptoInit(_) => ErrorKind::Infrastructure,
            CryptoError::Signing(_) => ErrorKind::Cryptographic,
            CryptoError::MalformedInput(_) => ErrorKind::Input,
        }
    }
}

/// Core errors for credential and squitter handling.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid validity window: not_before={not_before}, not_after={not_after}")]
    InvalidWindow { not_before: i64, not_after: i64 },

    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("decoding error: {0}")]
    DecodingError(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Crypto(e) => e.kind(),
            CoreError::InvalidIdentity(_)
            | CoreError::InvalidWindow { .. }
            | CoreError::PayloadTooLarge { .. }
            | CoreError::DecodingError(_) => ErrorKind::Input,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
