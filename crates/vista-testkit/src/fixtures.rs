//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an authority over an in-memory
//! store driven by a manual clock, plus quick credential and squitter
//! builders that skip the authority entirely.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use vista_authority::{Authority, AuthorityConfig, Authorization};
use vista_core::{
    AuthorityKeyPair, Credential, CredentialBuilder, Identity, ManualClock, PublicKey, SecretKey,
    SquitterBuilder, SquitterMessage,
};
use vista_store::MemoryStore;
use vista_transceiver::{Link, ResolutionPolicy, Transceiver, TransceiverConfig};

/// Default fixture start time (Unix seconds).
pub const START_SECS: i64 = 1000;

/// An authority, its store, and the clock both it and its transceivers read.
pub struct AuthorityFixture {
    pub authority: Arc<Authority<MemoryStore>>,
    pub clock: Arc<ManualClock>,
}

impl AuthorityFixture {
    /// Authority with a fixed master seed, clock at [`START_SECS`].
    pub fn new() -> Self {
        Self::with_seed([0x42; 32], START_SECS)
    }

    /// Authority with a deterministic master key and start time.
    pub fn with_seed(seed: [u8; 32], start_secs: i64) -> Self {
        Self::with_config(seed, start_secs, AuthorityConfig::default())
    }

    pub fn with_config(seed: [u8; 32], start_secs: i64, config: AuthorityConfig) -> Self {
        let clock = Arc::new(ManualClock::at_secs(start_secs));
        let authority = Authority::new(AuthorityKeyPair::from_seed(&seed), MemoryStore::new(), config)
            .with_clock(clock.clone());
        Self {
            authority: Arc::new(authority),
            clock,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.authority.public_key()
    }

    /// Authorize `name` for `duration_secs`, panicking on failure.
    pub async fn authorize(&self, name: &str, duration_secs: i64) -> Authorization {
        self.authority
            .authorize(&identity(name), duration_secs)
            .await
            .expect("authorize failed")
    }

    /// A transceiver trusting this authority and reading this clock.
    pub fn transceiver<L: Link + 'static>(&self, link: L, config: TransceiverConfig) -> Transceiver<L> {
        Transceiver::new(self.public_key(), link, config).with_clock(self.clock.clone())
    }

    /// A transceiver already loaded with a fresh authorization for `name`.
    pub async fn loaded_transceiver<L: Link + 'static>(
        &self,
        name: &str,
        duration_secs: i64,
        link: L,
        config: TransceiverConfig,
    ) -> (Transceiver<L>, Credential) {
        let auth = self.authorize(name, duration_secs).await;
        let credential = auth.credential.clone();
        let mut transceiver = self.transceiver(link, config);
        transceiver
            .load_credential(auth.credential, auth.secret_key)
            .expect("load_credential failed");
        (transceiver, credential)
    }
}

impl Default for AuthorityFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Transceiver config with a short tick, for tests that wait on real time.
pub fn fast_config(resolution: ResolutionPolicy) -> TransceiverConfig {
    TransceiverConfig {
        broadcast_interval: Duration::from_millis(20),
        resolution,
        ..TransceiverConfig::default()
    }
}

/// Parse an identity, panicking on invalid input.
pub fn identity(name: &str) -> Identity {
    Identity::new(name).expect("invalid identity")
}

/// Sign a credential directly, without an authority or store.
pub fn credential_for(
    authority: &AuthorityKeyPair,
    name: &str,
    key_seed: [u8; 32],
    not_before: i64,
    not_after: i64,
) -> (Credential, SecretKey) {
    let secret_key = SecretKey::from_seed(&key_seed);
    let credential = CredentialBuilder::new(identity(name), secret_key.public_key())
        .window(not_before, not_after)
        .sign(authority)
        .expect("credential signing failed");
    (credential, secret_key)
}

/// Sign a squitter under `credential`.
pub fn squitter(
    credential: &Credential,
    secret_key: &SecretKey,
    seq: u64,
    timestamp: i64,
    payload: impl Into<Bytes>,
) -> SquitterMessage {
    SquitterBuilder::new(credential.identity.clone(), credential.id(), seq)
        .timestamp(timestamp)
        .payload(payload)
        .sign(secret_key)
        .expect("squitter signing failed")
}

/// Several vehicles' credentials under one authority, named `veh-0..n`.
pub fn fleet(authority: &AuthorityKeyPair, count: usize) -> Vec<(Credential, SecretKey)> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            seed[1] = 0xfe;
            credential_for(
                authority,
                &format!("veh-{}", i),
                seed,
                START_SECS,
                START_SECS + 600,
            )
        })
        .collect()
}
