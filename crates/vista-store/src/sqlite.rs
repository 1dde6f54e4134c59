//! SQLite implementation of the CredentialStore trait.
//!
//! rusqlite with bundled SQLite, made async via `tokio::task::spawn_blocking`.
//! Credentials are stored as their wire bytes plus a few indexed columns;
//! the wire bytes are the source of truth on read.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use vista_core::{now_millis, Credential, CredentialId, Identity, RevocationEntry};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CredentialStore, PutResult, RevocationResult};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex, which also serializes writes. All
/// operations use spawn_blocking to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }

    /// Run a blocking operation that needs mutable access, e.g. a transaction.
    async fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

fn decode_wire(bytes: Vec<u8>) -> Result<Credential> {
    Credential::from_bytes(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn id_from_blob(blob: Vec<u8>) -> Result<CredentialId> {
    CredentialId::try_from(blob.as_slice())
        .map_err(|_| StoreError::InvalidData(format!("credential id is {} bytes", blob.len())))
}

fn row_to_revocation(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, i64)> {
    Ok((row.get("credential_id")?, row.get("revoked_at")?))
}

fn insert_credential(conn: &Connection, credential: &Credential) -> Result<PutResult> {
    let id = credential.id();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO credentials (
            credential_id, identity, public_key, not_before, not_after,
            wire_bytes, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.0.as_slice(),
            credential.identity.as_str(),
            credential.public_key.to_bytes().as_slice(),
            credential.not_before,
            credential.not_after,
            credential.to_bytes(),
            now_millis(),
        ],
    )?;

    Ok(if inserted == 1 {
        PutResult::Inserted
    } else {
        PutResult::AlreadyExists
    })
}

fn insert_revocation(conn: &Connection, entry: &RevocationEntry) -> Result<RevocationResult> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO revocations (credential_id, revoked_at) VALUES (?1, ?2)",
        params![entry.credential_id.0.as_slice(), entry.revoked_at],
    )?;

    Ok(if inserted == 1 {
        RevocationResult::Appended
    } else {
        RevocationResult::AlreadyRevoked
    })
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn put(&self, credential: &Credential) -> Result<PutResult> {
        let credential = credential.clone();
        self.with_conn(move |conn| insert_credential(conn, &credential)).await
    }

    async fn get(&self, identity: &Identity) -> Result<Option<Credential>> {
        let identity = identity.clone();

        self.with_conn(move |conn| {
            let wire: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT wire_bytes FROM credentials WHERE identity = ?1
                     ORDER BY rowid DESC LIMIT 1",
                    params![identity.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            wire.map(decode_wire).transpose()
        })
        .await
    }

    async fn get_by_id(&self, id: &CredentialId) -> Result<Option<Credential>> {
        let id = *id;

        self.with_conn(move |conn| {
            let wire: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT wire_bytes FROM credentials WHERE credential_id = ?1",
                    params![id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            wire.map(decode_wire).transpose()
        })
        .await
    }

    async fn credentials_for(&self, identity: &Identity) -> Result<Vec<Credential>> {
        let identity = identity.clone();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT wire_bytes FROM credentials WHERE identity = ?1 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map(params![identity.as_str()], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(decode_wire).collect()
        })
        .await
    }

    async fn append_revocation(&self, entry: &RevocationEntry) -> Result<RevocationResult> {
        let entry = *entry;
        self.with_conn(move |conn| insert_revocation(conn, &entry)).await
    }

    async fn replace(
        &self,
        credential: &Credential,
        revocation: &RevocationEntry,
    ) -> Result<PutResult> {
        let credential = credential.clone();
        let revocation = *revocation;

        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;
            let result = insert_credential(&tx, &credential)?;
            insert_revocation(&tx, &revocation)?;
            tx.commit()?;
            Ok(result)
        })
        .await
    }

    async fn is_revoked(&self, id: &CredentialId) -> Result<bool> {
        let id = *id;

        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM revocations WHERE credential_id = ?1",
                    params![id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn revocation(&self, id: &CredentialId) -> Result<Option<RevocationEntry>> {
        let id = *id;

        self.with_conn(move |conn| {
            let revoked_at: Option<i64> = conn
                .query_row(
                    "SELECT revoked_at FROM revocations WHERE credential_id = ?1",
                    params![id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(revoked_at.map(|at| RevocationEntry::new(id, at)))
        })
        .await
    }

    async fn revocations_since(&self, since: i64) -> Result<Vec<RevocationEntry>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT credential_id, revoked_at FROM revocations
                 WHERE revoked_at >= ?1 ORDER BY revoked_at, rowid",
            )?;
            let rows = stmt
                .query_map(params![since], row_to_revocation)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|(blob, at)| Ok(RevocationEntry::new(id_from_blob(blob)?, at)))
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::CredentialStoreExt;
    use vista_core::{AuthorityKeyPair, CredentialBuilder, SecretKey};

    fn make_credential(name: &str, seed: u8, start: i64, end: i64) -> Credential {
        let authority = AuthorityKeyPair::from_seed(&[0x42; 32]);
        CredentialBuilder::new(
            Identity::new(name).unwrap(),
            SecretKey::from_seed(&[seed; 32]).public_key(),
        )
        .window(start, end)
        .sign(&authority)
        .unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = SqliteStore::open_memory().unwrap();
        let credential = make_credential("veh-1", 1, 1000, 1600);

        assert_eq!(store.put(&credential).await.unwrap(), PutResult::Inserted);
        assert_eq!(store.put(&credential).await.unwrap(), PutResult::AlreadyExists);

        let got = store.get(&credential.identity).await.unwrap().unwrap();
        assert_eq!(got, credential);
        let by_id = store.get_by_id(&credential.id()).await.unwrap().unwrap();
        assert_eq!(by_id, credential);

        let missing = Identity::new("veh-404").unwrap();
        assert!(store.get(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_returns_latest() {
        let store = SqliteStore::open_memory().unwrap();
        let first = make_credential("veh-1", 1, 1000, 1600);
        let second = make_credential("veh-1", 2, 2000, 2600);
        store.put(&first).await.unwrap();
        store.put(&second).await.unwrap();

        assert_eq!(store.get(&first.identity).await.unwrap(), Some(second.clone()));
        assert_eq!(
            store.credentials_for(&first.identity).await.unwrap(),
            vec![first, second]
        );
    }

    #[tokio::test]
    async fn test_revocation_first_entry_wins() {
        let store = SqliteStore::open_memory().unwrap();
        let id = CredentialId::from_bytes([9; 32]);

        assert_eq!(
            store.append_revocation(&RevocationEntry::new(id, 100)).await.unwrap(),
            RevocationResult::Appended
        );
        assert_eq!(
            store.append_revocation(&RevocationEntry::new(id, 500)).await.unwrap(),
            RevocationResult::AlreadyRevoked
        );
        assert!(store.is_revoked(&id).await.unwrap());
        assert_eq!(store.revocation(&id).await.unwrap(), Some(RevocationEntry::new(id, 100)));
        assert!(!store.is_revoked(&CredentialId::from_bytes([1; 32])).await.unwrap());
    }

    #[tokio::test]
    async fn test_revocations_since_ordered() {
        let store = SqliteStore::open_memory().unwrap();
        for (byte, at) in [(1u8, 300), (2, 100), (3, 200)] {
            store
                .append_revocation(&RevocationEntry::new(CredentialId::from_bytes([byte; 32]), at))
                .await
                .unwrap();
        }

        let entries = store.revocations_since(150).await.unwrap();
        let times: Vec<i64> = entries.iter().map(|e| e.revoked_at).collect();
        assert_eq!(times, vec![200, 300]);
        assert_eq!(entries[0].credential_id, CredentialId::from_bytes([3; 32]));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authority.db");
        let credential = make_credential("veh-1", 1, 1000, 1600);

        {
            let store = SqliteStore::open(&path).unwrap();
            store.put(&credential).await.unwrap();
            store
                .append_revocation(&RevocationEntry::new(credential.id(), 1200))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_by_id(&credential.id()).await.unwrap(), Some(credential.clone()));
        assert!(store.is_revoked(&credential.id()).await.unwrap());
        assert_eq!(store.live_credential(&credential.identity, 1300).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_serialization_error() {
        let store = SqliteStore::open_memory().unwrap();
        let credential = make_credential("veh-1", 1, 1000, 1600);
        store.put(&credential).await.unwrap();

        store
            .with_conn(|conn| {
                conn.execute("UPDATE credentials SET wire_bytes = x'00'", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.get(&credential.identity).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_replace_commits_both_writes() {
        let store = SqliteStore::open_memory().unwrap();
        let old = make_credential("veh-1", 1, 1000, 1600);
        let new = make_credential("veh-1", 2, 1100, 1700);
        store.put(&old).await.unwrap();

        store
            .replace(&new, &RevocationEntry::new(old.id(), 1100))
            .await
            .unwrap();
        assert!(store.is_revoked(&old.id()).await.unwrap());
        assert_eq!(store.get(&old.identity).await.unwrap(), Some(new));
    }

    #[tokio::test]
    async fn test_replace_rolls_back_on_failure() {
        let store = SqliteStore::open_memory().unwrap();
        let old = make_credential("veh-1", 1, 1000, 1600);
        let new = make_credential("veh-1", 2, 1100, 1700);
        store.put(&old).await.unwrap();

        // Break the revocation half of the write.
        store
            .conn
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE revocations")
            .unwrap();

        let result = store
            .replace(&new, &RevocationEntry::new(old.id(), 1100))
            .await;
        assert!(result.is_err());
        assert_eq!(store.get_by_id(&new.id()).await.unwrap(), None);
        assert_eq!(store.credentials_for(&old.identity).await.unwrap(), vec![old]);
    }
}
