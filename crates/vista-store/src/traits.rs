//! CredentialStore trait: the abstract interface for credential persistence.
//!
//! This trait keeps the authority storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests and short-lived authorities).

use async_trait::async_trait;
use vista_core::{Credential, CredentialId, Identity, RevocationEntry};

use crate::error::Result;

/// Result of storing a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutResult {
    /// Credential was stored.
    Inserted,
    /// The identical credential is already stored (idempotent, not an error).
    AlreadyExists,
}

/// Result of appending to the revocation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationResult {
    /// A new entry was appended.
    Appended,
    /// The credential was already revoked; the original entry is kept.
    AlreadyRevoked,
}

/// Async interface for credential and revocation persistence.
///
/// # Design Notes
///
/// - **Credentials are immutable**: `put` of an existing id is `AlreadyExists`.
/// - **Revocations are append-only**: the first entry for an id wins and
///   nothing is ever deleted, so a revoked credential cannot come back.
/// - **Expiry is lazy**: nothing is swept; readers compare windows against
///   their own clock (see [`CredentialStoreExt::live_credential`]).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Credential Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a credential.
    async fn put(&self, credential: &Credential) -> Result<PutResult>;

    /// Get the most recently issued credential for an identity.
    async fn get(&self, identity: &Identity) -> Result<Option<Credential>>;

    /// Get a credential by its content-addressed id.
    async fn get_by_id(&self, id: &CredentialId) -> Result<Option<Credential>>;

    /// All credentials ever issued to an identity, oldest first.
    async fn credentials_for(&self, identity: &Identity) -> Result<Vec<Credential>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Revocation Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an entry to the revocation log.
    async fn append_revocation(&self, entry: &RevocationEntry) -> Result<RevocationResult>;

    /// Store `credential` and append `revocation` as one write.
    ///
    /// Either both take effect or neither does. Used to reissue an identity
    /// whose previous credential is still live.
    async fn replace(
        &self,
        credential: &Credential,
        revocation: &RevocationEntry,
    ) -> Result<PutResult>;

    /// Check whether a credential has been revoked.
    async fn is_revoked(&self, id: &CredentialId) -> Result<bool>;

    /// Get the revocation entry for a credential, if any.
    async fn revocation(&self, id: &CredentialId) -> Result<Option<RevocationEntry>>;

    /// Revocations recorded at or after `since` (Unix seconds), oldest first.
    async fn revocations_since(&self, since: i64) -> Result<Vec<RevocationEntry>>;
}

/// Extension trait for common store patterns.
#[async_trait]
pub trait CredentialStoreExt: CredentialStore {
    /// The newest credential for `identity` that is inside its window at
    /// `now` (Unix seconds) and not revoked.
    async fn live_credential(&self, identity: &Identity, now: i64) -> Result<Option<Credential>>;
}

#[async_trait]
impl<S: CredentialStore + ?Sized> CredentialStoreExt for S {
    async fn live_credential(&self, identity: &Identity, now: i64) -> Result<Option<Credential>> {
        let credentials = self.credentials_for(identity).await?;
        for credential in credentials.into_iter().rev() {
            if !credential.is_valid_at(now) {
                continue;
            }
            if self.is_revoked(&credential.id()).await? {
                continue;
            }
            return Ok(Some(credential));
        }
        Ok(None)
    }
}
