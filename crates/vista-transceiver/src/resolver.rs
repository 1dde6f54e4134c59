//! Credential resolution and the local credential cache.
//!
//! A transceiver learns about peer credentials in two ways: they are pushed
//! in ahead of time (`seed_credentials`, `apply_revocations`), or they are
//! fetched on demand from a [`CredentialResolver`] the first time a squitter
//! references them.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vista_core::{Credential, CredentialId, PublicKey, RevocationEntry};

/// The resolver could not answer.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ResolverError(pub String);

/// Where a transceiver goes when its cache cannot answer.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Fetch a credential by id.
    async fn resolve(&self, id: &CredentialId) -> Result<Option<Credential>, ResolverError>;

    /// Whether a credential has been revoked.
    async fn is_revoked(&self, id: &CredentialId) -> Result<bool, ResolverError>;
}

/// How the validator resolves credentials and revocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Query the resolver on a cache miss, and for revocation on every frame.
    #[default]
    OnDemand,
    /// Use only seeded credentials and pushed revocations.
    CacheOnly,
}

#[derive(Default)]
struct CacheInner {
    credentials: HashMap<CredentialId, Credential>,
    revoked: HashSet<CredentialId>,
}

/// Verified peer credentials and known revocations.
///
/// Only credentials that verify under the authority key get in.
pub struct CredentialCache {
    authority_key: PublicKey,
    inner: RwLock<CacheInner>,
}

impl CredentialCache {
    pub fn new(authority_key: PublicKey) -> Self {
        Self {
            authority_key,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    pub fn authority_key(&self) -> &PublicKey {
        &self.authority_key
    }

    /// Get a cached credential.
    pub fn get(&self, id: &CredentialId) -> Option<Credential> {
        self.read(|inner| inner.credentials.get(id).cloned())
    }

    /// Insert a credential if it verifies. Returns whether it was inserted.
    pub fn insert(&self, credential: Credential) -> bool {
        if !credential.verify(&self.authority_key) {
            return false;
        }
        let id = credential.id();
        self.write(|inner| inner.credentials.insert(id, credential).is_none())
    }

    /// Whether a revocation is known locally.
    pub fn is_revoked(&self, id: &CredentialId) -> bool {
        self.read(|inner| inner.revoked.contains(id))
    }

    /// Record a revocation. Returns whether it was new.
    pub fn revoke(&self, id: CredentialId) -> bool {
        self.write(|inner| inner.revoked.insert(id))
    }

    /// Record a batch of revocations. Returns the newly learned ids.
    pub fn apply_revocations(&self, entries: &[RevocationEntry]) -> Vec<CredentialId> {
        self.write(|inner| {
            entries
                .iter()
                .filter(|e| inner.revoked.insert(e.credential_id))
                .map(|e| e.credential_id)
                .collect()
        })
    }

    /// Drop credentials whose window has closed at `now` (Unix seconds).
    pub fn purge_expired(&self, now: i64) -> usize {
        self.write(|inner| {
            let before = inner.credentials.len();
            inner.credentials.retain(|_, c| c.not_after > now);
            before - inner.credentials.len()
        })
    }

    /// Number of cached credentials.
    pub fn len(&self) -> usize {
        self.read(|inner| inner.credentials.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&CacheInner) -> T) -> T {
        f(&self.inner.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn write<T>(&self, f: impl FnOnce(&mut CacheInner) -> T) -> T {
        f(&mut self.inner.write().unwrap_or_else(|e| e.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_core::{AuthorityKeyPair, CredentialBuilder, Identity, SecretKey};

    fn credential(authority: &AuthorityKeyPair, name: &str, window: (i64, i64)) -> Credential {
        let sk = SecretKey::from_seed(&[7; 32]);
        CredentialBuilder::new(Identity::new(name).unwrap(), sk.public_key())
            .window(window.0, window.1)
            .sign(authority)
            .unwrap()
    }

    #[test]
    fn test_only_verified_credentials_enter() {
        let authority = AuthorityKeyPair::from_seed(&[1; 32]);
        let rogue = AuthorityKeyPair::from_seed(&[2; 32]);
        let cache = CredentialCache::new(authority.public_key());

        let good = credential(&authority, "veh-1", (1000, 1600));
        let forged = credential(&rogue, "veh-2", (1000, 1600));

        assert!(cache.insert(good.clone()));
        assert!(!cache.insert(good.clone()));
        assert!(!cache.insert(forged.clone()));
        assert_eq!(cache.get(&good.id()), Some(good));
        assert!(cache.get(&forged.id()).is_none());
    }

    #[test]
    fn test_purge_expired() {
        let authority = AuthorityKeyPair::from_seed(&[1; 32]);
        let cache = CredentialCache::new(authority.public_key());
        cache.insert(credential(&authority, "veh-1", (1000, 1600)));
        cache.insert(credential(&authority, "veh-2", (1000, 2000)));

        assert_eq!(cache.purge_expired(1599), 0);
        assert_eq!(cache.purge_expired(1600), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_revocations_are_sticky() {
        let cache = CredentialCache::new(AuthorityKeyPair::from_seed(&[1; 32]).public_key());
        let id = CredentialId::from_bytes([9; 32]);
        let entries = [RevocationEntry::new(id, 10), RevocationEntry::new(id, 20)];

        assert_eq!(cache.apply_revocations(&entries), vec![id]);
        assert!(cache.is_revoked(&id));
        assert!(!cache.revoke(id));
    }
}
