//! Error types for the authority.

use thiserror::Error;
use vista_core::{CoreError, CredentialId, CryptoError, ErrorKind, Identity};
use vista_store::StoreError;

/// Errors that can occur during authority operations.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// Requested duration is not in `(0, max]`.
    #[error("invalid duration: {requested}s (must be between {min}s and {max}s)")]
    InvalidDuration { requested: i64, min: i64, max: i64 },

    /// The identity already holds a live credential.
    #[error("{identity} already holds live credential {credential_id}")]
    AlreadyAuthorized {
        identity: Identity,
        credential_id: CredentialId,
    },

    /// The identity holds no live credential.
    #[error("{0} holds no live credential")]
    NotAuthorized(Identity),

    /// No credential with this id was ever issued.
    #[error("credential not found: {0}")]
    NotFound(CredentialId),

    /// Key generation or signing failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Credential construction failed.
    #[error("credential error: {0}")]
    Credential(#[from] CoreError),

    /// The credential store failed. Not retried here.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl AuthorityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthorityError::InvalidDuration { .. } | AuthorityError::NotFound(_) => ErrorKind::Input,
            AuthorityError::AlreadyAuthorized { .. } | AuthorityError::NotAuthorized(_) => {
                ErrorKind::Authorization
            }
            AuthorityError::Crypto(e) => e.kind(),
            AuthorityError::Credential(e) => e.kind(),
            AuthorityError::StoreUnavailable(e) => e.kind(),
        }
    }
}

/// Result type for authority operations.
pub type Result<T> = std::result::Result<T, AuthorityError>;
