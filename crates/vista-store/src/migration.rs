//! Database schema migrations for SQLite.
//!
//! Versioned migrations: each version is applied once, inside one
//! transaction, and recorded in `schema_migrations`.

use rusqlite::Connection;
use vista_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: credentials and the revocation log.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Issued credentials. Immutable once written.
        CREATE TABLE credentials (
            credential_id BLOB PRIMARY KEY,   -- 32 bytes, Blake3 of wire bytes
            identity TEXT NOT NULL,
            public_key BLOB NOT NULL,         -- 96 bytes, compressed G2
            not_before INTEGER NOT NULL,      -- Unix seconds, inclusive
            not_after INTEGER NOT NULL,       -- Unix seconds, exclusive
            wire_bytes BLOB NOT NULL,         -- length-prefixed encoding
            stored_at INTEGER NOT NULL        -- local time of insert (Unix ms)
        );

        -- Revocation log. Append-only: rows are never updated or deleted.
        CREATE TABLE revocations (
            credential_id BLOB PRIMARY KEY,
            revoked_at INTEGER NOT NULL       -- Unix seconds
        );

        CREATE INDEX idx_credentials_identity ON credentials(identity);
        CREATE INDEX idx_revocations_revoked_at ON revocations(revoked_at);
        "#,
    )?;

    Ok(())
}
