//! The Authority: issues, revokes, and looks up participant credentials.
//!
//! The authority owns the master key pair for its whole lifetime and
//! persists everything it signs through a [`CredentialStore`]. Expiry is
//! never swept: a credential is simply compared against the clock whenever
//! somebody asks.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vista_core::ibs::{self, IdentityKey};
use vista_core::{
    generate_participant_keypair, AuthorityKeyPair, Clock, Credential, CredentialBuilder,
    CredentialId, Identity, PublicKey, RevocationEntry, SecretKey, SystemClock,
};
use vista_store::{CredentialStore, CredentialStoreExt, PutResult, RevocationResult};

use crate::error::{AuthorityError, Result};
use crate::locks::IssuanceLocks;

/// What to do when an identity that already holds a live credential asks
/// for another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReissuePolicy {
    /// Refuse with `AlreadyAuthorized`.
    #[default]
    Reject,
    /// Revoke the live credential, then issue the new one.
    RevokePrevious,
}

/// Configuration for the Authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Shortest credential the authority will issue.
    pub min_duration: Duration,
    /// Longest credential the authority will issue.
    pub max_duration: Duration,
    /// Behavior when the identity already holds a live credential.
    pub reissue: ReissuePolicy,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            min_duration: Duration::from_secs(1),
            max_duration: Duration::from_secs(24 * 60 * 60),
            reissue: ReissuePolicy::Reject,
        }
    }
}

/// A freshly issued credential together with the participant secret key
/// generated for it. The authority keeps no copy of the secret.
#[derive(Debug)]
pub struct Authorization {
    pub credential: Credential,
    pub secret_key: SecretKey,
}

/// The credential authority.
pub struct Authority<S: CredentialStore> {
    /// The master key pair. Never persisted.
    keypair: AuthorityKeyPair,
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: AuthorityConfig,
    /// Time source for issuance windows and revocation stamps.
    clock: Arc<dyn Clock>,
    /// Per-identity issuance serialization.
    locks: IssuanceLocks,
}

impl<S: CredentialStore> Authority<S> {
    /// Create an authority around an existing master key pair.
    pub fn new(keypair: AuthorityKeyPair, store: S, config: AuthorityConfig) -> Self {
        Self::with_shared_store(keypair, Arc::new(store), config)
    }

    /// Create an authority over a store that is shared with other readers.
    pub fn with_shared_store(
        keypair: AuthorityKeyPair,
        store: Arc<S>,
        config: AuthorityConfig,
    ) -> Self {
        info!(public_key = ?keypair.public_key(), "authority started");
        Self {
            keypair,
            store,
            config,
            clock: Arc::new(SystemClock),
            locks: IssuanceLocks::new(),
        }
    }

    /// Start an authority with a freshly generated master key pair.
    pub fn start(store: S, config: AuthorityConfig) -> Result<Self> {
        let keypair = AuthorityKeyPair::generate()?;
        Ok(Self::new(keypair, store, config))
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the master public key.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Issuance
    // ─────────────────────────────────────────────────────────────────────────

    /// Authorize `identity` for `duration_secs` seconds starting now.
    ///
    /// Generates the participant key pair, signs a credential over the
    /// window `[now, now + duration_secs)`, persists it, and hands back both.
    pub async fn authorize(&self, identity: &Identity, duration_secs: i64) -> Result<Authorization> {
        self.check_duration(duration_secs)?;
        let (public_key, secret_key) = generate_participant_keypair()?;
        let credential = self.issue(identity, public_key, duration_secs).await?;
        Ok(Authorization {
            credential,
            secret_key,
        })
    }

    /// Authorize a participant that generated its own key pair.
    pub async fn authorize_key(
        &self,
        identity: &Identity,
        public_key: PublicKey,
        duration_secs: i64,
    ) -> Result<Credential> {
        self.check_duration(duration_secs)?;
        self.issue(identity, public_key, duration_secs).await
    }

    fn check_duration(&self, requested: i64) -> Result<()> {
        let min = self.config.min_duration.as_secs().max(1) as i64;
        let max = self.config.max_duration.as_secs() as i64;
        if requested < min || requested > max {
            return Err(AuthorityError::InvalidDuration { requested, min, max });
        }
        Ok(())
    }

    async fn issue(
        &self,
        identity: &Identity,
        public_key: PublicKey,
        duration_secs: i64,
    ) -> Result<Credential> {
        let _guard = self.locks.acquire(identity).await;
        let now = self.clock.now_secs();

        let previous = match self.store.live_credential(identity, now).await? {
            None => None,
            Some(existing) => match self.config.reissue {
                ReissuePolicy::Reject => {
                    return Err(AuthorityError::AlreadyAuthorized {
                        identity: identity.clone(),
                        credential_id: existing.id(),
                    });
                }
                ReissuePolicy::RevokePrevious => Some(existing.id()),
            },
        };

        let not_after = now.saturating_add(duration_secs);
        let credential = CredentialBuilder::new(identity.clone(), public_key)
            .window(now, not_after)
            .sign(&self.keypair)?;

        // The previous credential is only revoked in the same write that
        // stores its successor.
        let stored = match previous {
            None => self.store.put(&credential).await?,
            Some(previous) => {
                let stored = self
                    .store
                    .replace(&credential, &RevocationEntry::new(previous, now))
                    .await?;
                info!(%identity, credential = %previous, "revoked previous credential for reissue");
                stored
            }
        };
        if stored == PutResult::AlreadyExists {
            debug!(credential = %credential.id(), "credential already stored");
        }

        info!(
            %identity,
            credential = %credential.id(),
            not_before = now,
            not_after,
            "issued credential"
        );
        Ok(credential)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Revocation and lookup
    // ─────────────────────────────────────────────────────────────────────────

    /// Revoke a credential. Revoking twice is a no-op.
    pub async fn revoke(&self, id: &CredentialId) -> Result<()> {
        if self.store.get_by_id(id).await?.is_none() {
            return Err(AuthorityError::NotFound(*id));
        }

        let entry = RevocationEntry::new(*id, self.clock.now_secs());
        match self.store.append_revocation(&entry).await? {
            RevocationResult::Appended => info!(credential = %id, "revoked credential"),
            RevocationResult::AlreadyRevoked => debug!(credential = %id, "credential already revoked"),
        }
        Ok(())
    }

    /// Look up a credential by id.
    pub async fn lookup(&self, id: &CredentialId) -> Result<Credential> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or(AuthorityError::NotFound(*id))
    }

    /// The most recently issued credential for an identity, live or not.
    pub async fn current(&self, identity: &Identity) -> Result<Option<Credential>> {
        Ok(self.store.get(identity).await?)
    }

    /// Whether a credential has been revoked.
    pub async fn is_revoked(&self, id: &CredentialId) -> Result<bool> {
        Ok(self.store.is_revoked(id).await?)
    }

    /// Revocations recorded at or after `since` (Unix seconds).
    pub async fn revocations_since(&self, since: i64) -> Result<Vec<RevocationEntry>> {
        Ok(self.store.revocations_since(since).await?)
    }

    /// Extract the identity-based signing key for an identity holding a live
    /// credential.
    pub async fn extract_identity_key(&self, identity: &Identity) -> Result<IdentityKey> {
        let now = self.clock.now_secs();
        if self.store.live_credential(identity, now).await?.is_none() {
            return Err(AuthorityError::NotAuthorized(identity.clone()));
        }
        Ok(ibs::extract(&self.keypair, identity))
    }

    /// Shut the authority down, wiping the master secret.
    pub fn shutdown(mut self) {
        self.keypair.discard();
        info!(public_key = ?self.keypair.public_key(), "authority shut down");
    }
}
