//! Outbound squitter production.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use vista_core::{Credential, CredentialId, SecretKey, SquitterBuilder, SquitterMessage, Validity};

use crate::error::Result;
use crate::resolver::CredentialCache;

/// What a broadcast tick produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A squitter was built and should be sent.
    Emitted(SquitterMessage),
    /// The credential just stopped being usable. Nothing was built.
    Expired,
    /// Nothing was built; the credential was already known unusable.
    Suppressed,
}

/// Builds this transceiver's squitters.
///
/// Owns the participant secret key. Sequence numbers start at 1 and only
/// advance when a squitter is actually built.
pub struct Broadcaster {
    credential: Credential,
    credential_id: CredentialId,
    secret_key: SecretKey,
    next_seq: u64,
    payload: watch::Receiver<Bytes>,
    cache: Arc<CredentialCache>,
    expired: bool,
}

impl Broadcaster {
    pub fn new(
        credential: Credential,
        secret_key: SecretKey,
        payload: watch::Receiver<Bytes>,
        cache: Arc<CredentialCache>,
    ) -> Self {
        Self {
            credential_id: credential.id(),
            credential,
            secret_key,
            next_seq: 1,
            payload,
            cache,
            expired: false,
        }
    }

    pub fn credential_id(&self) -> CredentialId {
        self.credential_id
    }

    /// The sequence number the next squitter will carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Whether the credential has been found unusable.
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Run one tick at local time `now` (Unix milliseconds).
    pub fn tick(&mut self, now: i64) -> Result<TickOutcome> {
        if self.expired {
            return Ok(TickOutcome::Suppressed);
        }

        let in_window = self.credential.validity_at(now.div_euclid(1000)) == Validity::Valid;
        if !in_window || self.cache.is_revoked(&self.credential_id) {
            self.expired = true;
            return Ok(TickOutcome::Expired);
        }

        let payload = self.payload.borrow().clone();
        let message = SquitterBuilder::new(
            self.credential.identity.clone(),
            self.credential_id,
            self.next_seq,
        )
        .timestamp(now)
        .payload(payload)
        .sign(&self.secret_key)?;

        self.next_seq += 1;
        Ok(TickOutcome::Emitted(message))
    }

    /// Wipe the secret key. Every later tick is suppressed.
    pub fn discard(&mut self) {
        self.secret_key.discard();
        self.expired = true;
    }
}
