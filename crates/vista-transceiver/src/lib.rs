//! # VISTA Transceiver
//!
//! The per-vehicle side of VISTA: periodically broadcast signed squitters
//! under an authority-issued credential, and validate the squitters heard
//! from peers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vista_transceiver::{memory::RadioMedium, Transceiver, TransceiverConfig};
//! # use vista_core::{Credential, PublicKey, SecretKey};
//!
//! # async fn example(authority_key: PublicKey, credential: Credential, secret_key: SecretKey)
//! #     -> vista_transceiver::Result<()> {
//! let medium = RadioMedium::new();
//! let mut transceiver = Transceiver::new(authority_key, medium.attach(), TransceiverConfig::default());
//!
//! transceiver.load_credential(credential, secret_key)?;
//! let running = transceiver.start()?;
//! running.set_payload(&b"lat=37.77,lon=-122.41"[..])?;
//!
//! let mut events = running.subscribe();
//! // while let Ok(event) = events.recv().await { ... }
//! # drop(events);
//!
//! let report = running.stop().await?;
//! println!("emitted {} squitters", report.emitted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Validation Order
//!
//! ```text
//! frame -> decode -> own? -> resolve credential -> revoked? -> window
//!       -> squitter signature -> sequence (per credential) -> timestamp -> peer table
//! ```
//!
//! The first failing check decides the rejection, and a rejection never
//! touches the peer table.

pub mod broadcaster;
pub mod error;
pub mod link;
pub mod peers;
pub mod resolver;
pub mod state;
pub mod transceiver;
pub mod validator;

pub use broadcaster::{Broadcaster, TickOutcome};
pub use error::{LinkError, Result, TransceiverError, ValidationError};
pub use link::{memory, Link};
pub use peers::{PeerTable, PeerTrustEntry, TrustState};
pub use resolver::{CredentialCache, CredentialResolver, ResolutionPolicy, ResolverError};
pub use state::TransceiverState;
pub use transceiver::{
    ReceiveEvent, RunningTransceiver, Transceiver, TransceiverConfig, TransceiverReport,
};
pub use validator::{RejectionCounts, Validator};
