//! # VISTA
//!
//! Vehicle-to-vehicle transient trust. A central authority issues
//! time-bounded credentials binding a vehicle pseudonym to a pairing-based
//! public key; vehicles broadcast signed squitters under those credentials
//! and validate the squitters they hear.
//!
//! ## Overview
//!
//! - **Authority**: issues, revokes, and looks up credentials
//! - **Credential**: authority-signed, immutable, valid for `[not_before, not_after)`
//! - **Transceiver**: broadcaster and validator tasks around a lifecycle
//!   state machine
//! - **Squitter**: a signed periodic broadcast with a strictly increasing
//!   sequence number
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vista::{Authority, AuthorityConfig, AuthorityResolver, Identity};
//! use vista::store::SqliteStore;
//! use vista::transceiver::{memory::RadioMedium, Transceiver, TransceiverConfig};
//!
//! async fn example() -> vista::Result<()> {
//!     let store = SqliteStore::open("authority.db")?;
//!     let authority = Arc::new(Authority::start(store, AuthorityConfig::default())?);
//!
//!     let identity = Identity::new("veh-42")?;
//!     let auth = authority.authorize(&identity, 600).await?;
//!
//!     let medium = RadioMedium::new();
//!     let mut transceiver = Transceiver::new(
//!         authority.public_key(),
//!         medium.attach(),
//!         TransceiverConfig::default(),
//!     )
//!     .with_resolver(Arc::new(AuthorityResolver::new(authority.clone())));
//!
//!     transceiver.load_credential(auth.credential, auth.secret_key)?;
//!     let running = transceiver.start()?;
//!     // ...
//!     let report = running.stop().await?;
//!     println!("emitted {} squitters", report.emitted);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `vista::core` - Crypto, credentials, squitters, wire encoding
//! - `vista::store` - Credential store abstraction and SQLite
//! - `vista::authority` - The credential authority
//! - `vista::transceiver` - Broadcast, validation, links

pub mod error;
pub mod resolver;

// Re-export component crates
pub use vista_authority as authority;
pub use vista_core as core;
pub use vista_store as store;
pub use vista_transceiver as transceiver;

// Re-export main types for convenience
pub use error::{Result, VistaError};
pub use resolver::AuthorityResolver;

pub use vista_authority::{Authority, AuthorityConfig, Authorization, ReissuePolicy};
pub use vista_core::{
    AuthorityKeyPair, Clock, Credential, CredentialId, ErrorKind, Identity, PublicKey,
    RevocationEntry, SecretKey, SquitterMessage, SystemClock,
};
pub use vista_transceiver::{
    ReceiveEvent, ResolutionPolicy, RunningTransceiver, Transceiver, TransceiverConfig,
    TransceiverReport, TransceiverState, ValidationError,
};
