//! Inbound squitter validation.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. Decode (malformed frames)
//! 2. Resolve the sender credential (unknown sender, forged credential)
//! 3. Revocation, then validity window (a revoked credential reports as
//!    revoked even once it has also expired)
//! 4. Squitter signature
//! 5. Sequence number (per sender credential), then emission timestamp
//!
//! Only a frame that passes every check touches the peer table.

use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;

use vista_core::{Credential, ErrorKind, Identity, SquitterMessage, Validity};

use crate::error::ValidationError;
use crate::peers::{PeerTable, PeerTrustEntry};
use crate::resolver::{CredentialCache, CredentialResolver, ResolutionPolicy};

/// Rejection counters, one per reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionCounts {
    pub malformed: u64,
    pub unknown_sender: u64,
    pub expired: u64,
    pub revoked: u64,
    pub signature: u64,
    pub replay: u64,
    pub stale: u64,
    pub resolver_unavailable: u64,
}

impl RejectionCounts {
    pub fn record(&mut self, error: &ValidationError) {
        let counter = match error {
            ValidationError::Malformed(_) => &mut self.malformed,
            ValidationError::UnknownSender(_) => &mut self.unknown_sender,
            ValidationError::ExpiredCredential(_) => &mut self.expired,
            ValidationError::RevokedCredential(_) => &mut self.revoked,
            ValidationError::SignatureVerification(_) => &mut self.signature,
            ValidationError::Replay { .. } => &mut self.replay,
            ValidationError::Stale { .. } => &mut self.stale,
            ValidationError::ResolverUnavailable(_) => &mut self.resolver_unavailable,
        };
        *counter += 1;
    }

    pub fn total(&self) -> u64 {
        self.malformed
            + self.unknown_sender
            + self.expired
            + self.revoked
            + self.signature
            + self.replay
            + self.stale
            + self.resolver_unavailable
    }

    /// Rejections that fall under an error kind.
    pub fn by_kind(&self, kind: ErrorKind) -> u64 {
        match kind {
            ErrorKind::Input => self.malformed,
            ErrorKind::Authorization => {
                self.unknown_sender + self.expired + self.revoked + self.replay + self.stale
            }
            ErrorKind::Cryptographic => self.signature,
            ErrorKind::Infrastructure => self.resolver_unavailable,
        }
    }
}

/// Validates inbound frames for one transceiver.
pub struct Validator {
    own: Identity,
    cache: Arc<CredentialCache>,
    resolver: Option<Arc<dyn CredentialResolver>>,
    policy: ResolutionPolicy,
    max_message_age: Option<i64>,
    peers: Arc<RwLock<PeerTable>>,
}

impl Validator {
    pub fn new(
        own: Identity,
        cache: Arc<CredentialCache>,
        peers: Arc<RwLock<PeerTable>>,
        policy: ResolutionPolicy,
    ) -> Self {
        Self {
            own,
            cache,
            resolver: None,
            policy,
            max_message_age: None,
            peers,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn CredentialResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Reject squitters whose timestamp is further than `age` from local time.
    pub fn with_max_message_age(mut self, age: Option<Duration>) -> Self {
        self.max_message_age = age.map(|a| i64::try_from(a.as_millis()).unwrap_or(i64::MAX));
        self
    }

    /// Decode a frame.
    pub fn decode(frame: &[u8]) -> Result<SquitterMessage, ValidationError> {
        SquitterMessage::from_bytes(frame).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Whether a squitter was sent by this transceiver.
    pub fn is_own(&self, message: &SquitterMessage) -> bool {
        message.sender == self.own
    }

    /// Decode and admit a frame at local time `now` (Unix milliseconds).
    ///
    /// Returns `Ok(None)` for our own frames, which are ignored.
    pub async fn validate(
        &self,
        frame: &[u8],
        now: i64,
    ) -> Result<Option<SquitterMessage>, ValidationError> {
        let message = Self::decode(frame)?;
        if self.is_own(&message) {
            return Ok(None);
        }
        self.admit(&message, now).await?;
        Ok(Some(message))
    }

    /// Run every check on a decoded squitter and, if all pass, record the
    /// sender in the peer table.
    pub async fn admit(&self, message: &SquitterMessage, now: i64) -> Result<(), ValidationError> {
        let id = message.credential_id;
        let credential = self.resolve(message).await?;

        if self.check_revoked(message).await? {
            return Err(ValidationError::RevokedCredential(id));
        }
        match credential.validity_at(now.div_euclid(1000)) {
            Validity::Valid => {}
            Validity::NotYetValid | Validity::Expired => {
                return Err(ValidationError::ExpiredCredential(id));
            }
        }

        if !message.verify(&credential.public_key) {
            return Err(ValidationError::SignatureVerification("squitter"));
        }

        let mut peers = self.peers_mut();
        if let Some(last) = peers.last_seq_for(message) {
            if message.seq <= last {
                return Err(ValidationError::Replay {
                    last,
                    got: message.seq,
                });
            }
        }
        if let Some(max_age) = self.max_message_age {
            if now.saturating_sub(message.timestamp).saturating_abs() > max_age {
                return Err(ValidationError::Stale {
                    timestamp: message.timestamp,
                    now,
                });
            }
        }

        let evicted = peers.record(message, credential.public_key, credential.not_after, now);
        if let Some(evicted) = evicted {
            tracing::debug!(peer = %evicted, "peer table full, evicted least recent");
        }
        Ok(())
    }

    /// Evict peers that have gone quiet. Returns how many were removed.
    pub fn evict_stale(&self, now: i64) -> usize {
        self.peers_mut().evict_stale(now)
    }

    /// Drop cached credentials whose window closed before `now` (Unix seconds).
    pub fn purge_expired(&self, now: i64) -> usize {
        self.cache.purge_expired(now)
    }

    /// Snapshot of one peer entry.
    pub fn peer(&self, identity: &Identity) -> Option<PeerTrustEntry> {
        self.peers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity)
            .cloned()
    }

    async fn resolve(&self, message: &SquitterMessage) -> Result<Credential, ValidationError> {
        let id = message.credential_id;
        let credential = match self.cache.get(&id) {
            Some(credential) => credential,
            None => {
                let resolver = self
                    .on_demand()
                    .ok_or(ValidationError::UnknownSender(id))?;
                let credential = resolver
                    .resolve(&id)
                    .await
                    .map_err(|e| ValidationError::ResolverUnavailable(e.0))?
                    .ok_or(ValidationError::UnknownSender(id))?;
                if credential.id() != id {
                    return Err(ValidationError::UnknownSender(id));
                }
                if !credential.verify(self.cache.authority_key()) {
                    return Err(ValidationError::SignatureVerification("credential"));
                }
                self.cache.insert(credential.clone());
                credential
            }
        };

        if credential.identity != message.sender {
            return Err(ValidationError::UnknownSender(id));
        }
        Ok(credential)
    }

    async fn check_revoked(&self, message: &SquitterMessage) -> Result<bool, ValidationError> {
        let id = message.credential_id;
        if self.cache.is_revoked(&id) {
            return Ok(true);
        }
        let Some(resolver) = self.on_demand() else {
            return Ok(false);
        };
        let revoked = resolver
            .is_revoked(&id)
            .await
            .map_err(|e| ValidationError::ResolverUnavailable(e.0))?;
        if revoked && self.cache.revoke(id) {
            self.peers_mut().distrust(&id);
        }
        Ok(revoked)
    }

    fn on_demand(&self) -> Option<&Arc<dyn CredentialResolver>> {
        match self.policy {
            ResolutionPolicy::OnDemand => self.resolver.as_ref(),
            ResolutionPolicy::CacheOnly => None,
        }
    }

    fn peers_mut(&self) -> RwLockWriteGuard<'_, PeerTable> {
        self.peers.write().unwrap_or_else(|e| e.into_inner())
    }
}
