//! # VISTA Authority
//!
//! The credential authority. It holds the master key pair, signs
//! time-bounded credentials binding an identity to a participant public key,
//! keeps an append-only revocation log, and answers lookups.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vista_authority::{Authority, AuthorityConfig};
//! use vista_core::Identity;
//! use vista_store::MemoryStore;
//!
//! async fn example() -> vista_authority::Result<()> {
//!     let authority = Authority::start(MemoryStore::new(), AuthorityConfig::default())?;
//!
//!     let identity = Identity::new("veh-42").unwrap();
//!     let auth = authority.authorize(&identity, 600).await?;
//!     assert!(auth.credential.verify(&authority.public_key()));
//!
//!     authority.revoke(&auth.credential.id()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! - At most one live credential per identity (see [`ReissuePolicy`])
//! - Issuance for the same identity is serialized; different identities run
//!   in parallel
//! - Revocation is idempotent and permanent
//! - Store failures surface as [`AuthorityError::StoreUnavailable`] and are
//!   never retried here

pub mod authority;
pub mod error;
mod locks;

pub use authority::{Authority, AuthorityConfig, Authorization, ReissuePolicy};
pub use error::{AuthorityError, Result};
