//! # VISTA Core
//!
//! Pure primitives for VISTA (V2V transient trust): pairing-based
//! signatures, credentials, squitters, and their wire encoding.
//!
//! This crate contains no I/O, no storage, no networking. The only impure
//! pieces are key generation (OS randomness) and [`SystemClock`].
//!
//! ## Key Types
//!
//! - [`AuthorityKeyPair`] - The authority master key pair (BLS12-381)
//! - [`Credential`] - An authority-signed, time-bounded authorization
//! - [`CredentialId`] - Content-addressed credential identifier (Blake3)
//! - [`SquitterMessage`] - A signed periodic broadcast
//! - [`RevocationEntry`] - An entry in the append-only revocation log
//! - [`Clock`] - Injectable time source
//!
//! ## Encoding
//!
//! Credentials and squitters use a length-prefixed binary encoding. See the
//! [`canonical`] module.

pub mod canonical;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod ibs;
pub mod squitter;
pub mod time;
pub mod types;

pub use canonical::{MAX_IDENTITY_LEN, MAX_PAYLOAD_LEN, MAX_SQUITTER_LEN};
pub use credential::{Credential, CredentialBuilder, RevocationEntry, Validity};
pub use crypto::{
    generate_master_keypair, generate_participant_keypair, sign, verify, verify_encoded,
    AuthorityKeyPair, PublicKey, SecretKey, Signature,
};
pub use error::{CoreError, CryptoError, ErrorKind};
pub use ibs::{IdentityKey, IdentitySignature};
pub use squitter::{SquitterBuilder, SquitterMessage};
pub use time::{now_millis, Clock, ManualClock, SystemClock};
pub use types::{CredentialId, Identity};
