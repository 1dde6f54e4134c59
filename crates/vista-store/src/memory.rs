//! In-memory implementation of the CredentialStore trait.
//!
//! Same semantics as SQLite, no persistence. Used by tests and by
//! authorities that do not need to survive a restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use vista_core::{Credential, CredentialId, Identity, RevocationEntry};

use crate::error::{Result, StoreError};
use crate::traits::{CredentialStore, PutResult, RevocationResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Credentials indexed by id.
    credentials: HashMap<CredentialId, Credential>,

    /// Issue order per identity.
    by_identity: HashMap<Identity, Vec<CredentialId>>,

    /// Revocation log.
    revocations: HashMap<CredentialId, RevocationEntry>,

    /// Revocation log ordered by (revoked_at, append order).
    revocation_order: BTreeMap<(i64, u64), CredentialId>,

    appended: u64,
}

impl MemoryStoreInner {
    fn insert_credential(&mut self, credential: &Credential) -> PutResult {
        let id = credential.id();
        if self.credentials.contains_key(&id) {
            return PutResult::AlreadyExists;
        }

        self.credentials.insert(id, credential.clone());
        self.by_identity
            .entry(credential.identity.clone())
            .or_default()
            .push(id);
        PutResult::Inserted
    }

    fn append(&mut self, entry: &RevocationEntry) -> RevocationResult {
        if self.revocations.contains_key(&entry.credential_id) {
            return RevocationResult::AlreadyRevoked;
        }

        let order = self.appended;
        self.appended += 1;
        self.revocations.insert(entry.credential_id, *entry);
        self.revocation_order
            .insert((entry.revoked_at, order), entry.credential_id);
        RevocationResult::Appended
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn put(&self, credential: &Credential) -> Result<PutResult> {
        Ok(self.write()?.insert_credential(credential))
    }

    async fn get(&self, identity: &Identity) -> Result<Option<Credential>> {
        let inner = self.read()?;
        Ok(inner
            .by_identity
            .get(identity)
            .and_then(|ids| ids.last())
            .and_then(|id| inner.credentials.get(id))
            .cloned())
    }

    async fn get_by_id(&self, id: &CredentialId) -> Result<Option<Credential>> {
        let inner = self.read()?;
        Ok(inner.credentials.get(id).cloned())
    }

    async fn credentials_for(&self, identity: &Identity) -> Result<Vec<Credential>> {
        let inner = self.read()?;
        Ok(inner
            .by_identity
            .get(identity)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.credentials.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append_revocation(&self, entry: &RevocationEntry) -> Result<RevocationResult> {
        Ok(self.write()?.append(entry))
    }

    async fn replace(
        &self,
        credential: &Credential,
        revocation: &RevocationEntry,
    ) -> Result<PutResult> {
        let mut inner = self.write()?;
        let result = inner.insert_credential(credential);
        inner.append(revocation);
        Ok(result)
    }

    async fn is_revoked(&self, id: &CredentialId) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner.revocations.contains_key(id))
    }

    async fn revocation(&self, id: &CredentialId) -> Result<Option<RevocationEntry>> {
        let inner = self.read()?;
        Ok(inner.revocations.get(id).copied())
    }

    async fn revocations_since(&self, since: i64) -> Result<Vec<RevocationEntry>> {
        let inner = self.read()?;
        Ok(inner
            .revocation_order
            .range((since, 0)..)
            .filter_map(|(_, id)| inner.revocations.get(id).copied())
            .collect())
    }
}
