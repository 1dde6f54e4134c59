//! Unified error type.

use thiserror::Error;
use vista_authority::AuthorityError;
use vista_core::{CoreError, CryptoError, ErrorKind};
use vista_store::StoreError;
use vista_transceiver::{TransceiverError, ValidationError};

/// Any error raised by a VISTA component.
#[derive(Debug, Error)]
pub enum VistaError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("authority error: {0}")]
    Authority(#[from] AuthorityError),

    #[error("transceiver error: {0}")]
    Transceiver(#[from] TransceiverError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl VistaError {
    /// The error category, for retry-or-abort decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VistaError::Core(e) => e.kind(),
            VistaError::Crypto(e) => e.kind(),
            VistaError::Store(e) => e.kind(),
            VistaError::Authority(e) => e.kind(),
            VistaError::Transceiver(e) => e.kind(),
            VistaError::Validation(e) => e.kind(),
        }
    }

    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, VistaError>;
