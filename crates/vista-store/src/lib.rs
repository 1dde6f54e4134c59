//! # VISTA Store
//!
//! Storage abstraction for the VISTA authority. Provides a trait-based
//! interface for credential and revocation persistence with SQLite and
//! in-memory implementations.
//!
//! ## Overview
//!
//! The authority keeps everything it issues behind the [`CredentialStore`]
//! trait, so it does not care where the bytes live. The primary
//! implementation is [`SqliteStore`], with [`MemoryStore`] for tests.
//!
//! ## Key Types
//!
//! - [`CredentialStore`] - The async trait for all storage operations
//! - [`CredentialStoreExt`] - Derived queries (the live credential of an identity)
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage
//! - [`PutResult`] / [`RevocationResult`] - Idempotent write outcomes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vista_store::{CredentialStore, SqliteStore};
//! use vista_core::Identity;
//!
//! async fn example() {
//!     let store = SqliteStore::open("authority.db").unwrap();
//!
//!     let identity = Identity::new("veh-42").unwrap();
//!     let latest = store.get(&identity).await.unwrap();
//!     // let result = store.put(&credential).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent puts**: Storing the same credential twice returns `AlreadyExists`
//! - **Append-only revocations**: The first revocation entry wins; none are deleted
//! - **Lazy expiry**: Expired credentials stay stored; readers check windows

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CredentialStore, CredentialStoreExt, PutResult, RevocationResult};
