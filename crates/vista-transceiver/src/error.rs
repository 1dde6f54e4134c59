//! Error types for the transceiver.

use thiserror::Error;
use vista_core::{CoreError, CredentialId, CryptoError, ErrorKind};

use crate::state::TransceiverState;

/// Errors raised by transceiver lifecycle operations.
#[derive(Debug, Error)]
pub enum TransceiverError {
    /// The credential cannot be loaded.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The requested operation is not allowed in the current state.
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: TransceiverState,
        to: TransceiverState,
    },

    /// The link failed.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// A background task panicked or was aborted.
    #[error("task failed: {0}")]
    TaskFailed(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl TransceiverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransceiverError::InvalidCredential(_) => ErrorKind::Authorization,
            TransceiverError::InvalidTransition { .. } => ErrorKind::Input,
            TransceiverError::Link(_) | TransceiverError::TaskFailed(_) => {
                ErrorKind::Infrastructure
            }
            TransceiverError::Crypto(e) => e.kind(),
            TransceiverError::Core(e) => e.kind(),
        }
    }
}

/// Why an inbound frame was rejected.
///
/// A rejection never changes the peer table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Undecodable bytes or a missing or oversized field.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The credential reference cannot be resolved, or resolves to a
    /// credential bound to a different identity.
    #[error("unknown sender under credential {0}")]
    UnknownSender(CredentialId),

    /// The sender's credential is outside its validity window.
    #[error("credential {0} is outside its validity window")]
    ExpiredCredential(CredentialId),

    /// The sender's credential has been revoked.
    #[error("credential {0} has been revoked")]
    RevokedCredential(CredentialId),

    /// A signature did not verify.
    #[error("{0} signature verification failed")]
    SignatureVerification(&'static str),

    /// Sequence number not strictly greater than the last accepted one.
    #[error("replayed sequence number {got} (last accepted {last})")]
    Replay { last: u64, got: u64 },

    /// Emission timestamp too far from local time.
    #[error("stale message: timestamp {timestamp}ms, local time {now}ms")]
    Stale { timestamp: i64, now: i64 },

    /// The credential resolver could not be reached.
    #[error("credential resolver unavailable: {0}")]
    ResolverUnavailable(String),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::Malformed(_) => ErrorKind::Input,
            ValidationError::UnknownSender(_)
            | ValidationError::ExpiredCredential(_)
            | ValidationError::RevokedCredential(_)
            | ValidationError::Replay { .. }
            | ValidationError::Stale { .. } => ErrorKind::Authorization,
            ValidationError::SignatureVerification(_) => ErrorKind::Cryptographic,
            ValidationError::ResolverUnavailable(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Errors raised by a [`Link`](crate::link::Link).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The link has been detached from its medium.
    #[error("link closed")]
    Closed,

    /// The frame exceeds what the link can carry.
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type for transceiver operations.
pub type Result<T> = std::result::Result<T, TransceiverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_kinds() {
        let id = CredentialId::from_bytes([1; 32]);
        assert_eq!(ValidationError::Malformed("x".into()).kind(), ErrorKind::Input);
        assert_eq!(ValidationError::RevokedCredential(id).kind(), ErrorKind::Authorization);
        assert_eq!(
            ValidationError::Replay { last: 2, got: 2 }.kind(),
            ValidationError::Stale { timestamp: 0, now: 60_000 }.kind()
        );
        assert_eq!(
            ValidationError::SignatureVerification("squitter").kind(),
            ErrorKind::Cryptographic
        );
        assert_eq!(
            ValidationError::ResolverUnavailable("down".into()).kind(),
            ErrorKind::Infrastructure
        );
    }

    #[test]
    fn test_link_errors_are_infrastructure() {
        let err: TransceiverError = LinkError::Closed.into();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }
}
