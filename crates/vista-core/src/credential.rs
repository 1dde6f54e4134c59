//! Credentials: authority-signed, time-bounded participant authorizations.
//!
//! A credential binds an identity to a participant public key for the
//! half-open window `[not_before, not_after)` (Unix seconds). It is
//! immutable once signed; it stops being usable either by running out of
//! window or by an entry in the revocation log.

use serde::{Deserialize, Serialize};

use crate::canonical::{credential_signed_bytes, decode_credential, encode_credential};
use crate::crypto::{verify, AuthorityKeyPair, PublicKey, Signature};
use crate::error::{CoreError, Result};
use crate::types::{CredentialId, Identity};

/// Where a point in time falls relative to a credential's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    NotYetValid,
    Valid,
    Expired,
}

/// An issued credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The participant this credential authorizes.
    pub identity: Identity,

    /// The participant's signing key.
    pub public_key: PublicKey,

    /// Start of validity (Unix seconds, inclusive).
    pub not_before: i64,

    /// End of validity (Unix seconds, exclusive).
    pub not_after: i64,

    /// Authority signature over the fields above.
    pub signature: Signature,
}

impl Credential {
    /// Compute the credential id (Blake3 of the wire bytes).
    pub fn id(&self) -> CredentialId {
        CredentialId::digest(&self.to_bytes())
    }

    /// The bytes covered by the authority signature.
    pub fn signed_message(&self) -> Vec<u8> {
        credential_signed_bytes(
            &self.identity,
            &self.public_key,
            self.not_before,
            self.not_after,
        )
    }

    /// Check the authority signature.
    pub fn verify(&self, authority: &PublicKey) -> bool {
        verify(authority, &self.signed_message(), &self.signature)
    }

    /// Classify `now` (Unix seconds) against the validity window.
    pub fn validity_at(&self, now: i64) -> Validity {
        if now < self.not_before {
            Validity::NotYetValid
        } else if now >= self.not_after {
            Validity::Expired
        } else {
            Validity::Valid
        }
    }

    /// Whether `now` lies inside `[not_before, not_after)`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.validity_at(now) == Validity::Valid
    }

    /// Window length in seconds.
    pub fn duration(&self) -> i64 {
        self.not_after - self.not_before
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_credential(self)
    }

    /// Decode from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_credential(bytes)
    }
}

/// Builder for issuing credentials.
pub struct CredentialBuilder {
    identity: Identity,
    public_key: PublicKey,
    not_before: i64,
    not_after: i64,
}

impl CredentialBuilder {
    /// Start building a credential.
    pub fn new(identity: Identity, public_key: PublicKey) -> Self {
        Self {
            identity,
            public_key,
            not_before: 0,
            not_after: 0,
        }
    }

    /// Set the validity window `[not_before, not_after)`.
    pub fn window(mut self, not_before: i64, not_after: i64) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    /// Sign with the authority master key.
    pub fn sign(self, authority: &AuthorityKeyPair) -> Result<Credential> {
        if self.not_after <= self.not_before {
            return Err(CoreError::InvalidWindow {
                not_before: self.not_before,
                not_after: self.not_after,
            });
        }

        let message = credential_signed_bytes(
            &self.identity,
            &self.public_key,
            self.not_before,
            self.not_after,
        );
        let signature = authority.sign(&message)?;

        Ok(Credential {
            identity: self.identity,
            public_key: self.public_key,
            not_before: self.not_before,
            not_after: self.not_after,
            signature,
        })
    }
}

/// An entry in the append-only revocation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevocationEntry {
    /// The revoked credential.
    pub credential_id: CredentialId,

    /// When the revocation was recorded (Unix seconds).
    pub revoked_at: i64,
}

impl RevocationEntry {
    pub fn new(credential_id: CredentialId, revoked_at: i64) -> Self {
        Self {
            credential_id,
            revoked_at,
        }
    }
}
