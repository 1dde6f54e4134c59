//! The transceiver lifecycle.
//!
//! A [`Transceiver`] is configured and loaded with a credential, then
//! [`start`](Transceiver::start)ed into a [`RunningTransceiver`] that owns two
//! tasks: the broadcaster, which emits a squitter every
//! `broadcast_interval`, and the validator, which checks every inbound
//! frame. Neither waits on the other.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use vista_core::{
    Clock, CoreError, Credential, CredentialId, Identity, PublicKey, RevocationEntry, SecretKey,
    SystemClock, Validity, MAX_PAYLOAD_LEN,
};

use crate::broadcaster::{Broadcaster, TickOutcome};
use crate::error::{LinkError, Result, TransceiverError, ValidationError};
use crate::link::Link;
use crate::peers::{PeerTable, PeerTrustEntry};
use crate::resolver::{CredentialCache, CredentialResolver, ResolutionPolicy};
use crate::state::TransceiverState;
use crate::validator::{RejectionCounts, Validator};

/// Configuration for a transceiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransceiverConfig {
    /// Time between squitters.
    pub broadcast_interval: Duration,
    /// Peers silent for longer than this are forgotten.
    pub peer_staleness: Duration,
    /// Peer table capacity.
    pub max_peers: usize,
    /// Largest accepted distance between a squitter timestamp and local
    /// time. `None` disables the check.
    pub max_message_age: Option<Duration>,
    /// How unknown credentials and revocations are resolved.
    pub resolution: ResolutionPolicy,
    /// Capacity of the receive event channel.
    pub event_capacity: usize,
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self {
            broadcast_interval: Duration::from_secs(1),
            peer_staleness: Duration::from_secs(10),
            max_peers: 1024,
            max_message_age: Some(Duration::from_secs(30)),
            resolution: ResolutionPolicy::OnDemand,
            event_capacity: 256,
        }
    }
}

/// The outcome of one inbound frame.
#[derive(Debug, Clone)]
pub enum ReceiveEvent {
    Accepted {
        sender: Identity,
        credential_id: CredentialId,
        seq: u64,
        payload: Bytes,
    },
    Rejected {
        /// Absent when the frame could not be decoded.
        sender: Option<Identity>,
        credential_id: Option<CredentialId>,
        error: ValidationError,
    },
}

/// Counters collected over a transceiver's run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransceiverReport {
    /// Squitters handed to the link.
    pub emitted: u64,
    /// Ticks that built nothing because the credential was unusable.
    pub suppressed: u64,
    /// Inbound squitters accepted.
    pub accepted: u64,
    /// Own frames heard back.
    pub ignored: u64,
    /// Inbound rejections by reason.
    pub rejected: RejectionCounts,
    /// Peers evicted for staleness.
    pub evicted: u64,
    /// Failed link operations.
    pub link_errors: u64,
    /// The last sequence number emitted, 0 if none.
    pub last_seq: u64,
}

/// A configured transceiver that has not started yet.
pub struct Transceiver<L: Link + 'static> {
    link: Arc<L>,
    config: TransceiverConfig,
    clock: Arc<dyn Clock>,
    resolver: Option<Arc<dyn CredentialResolver>>,
    cache: Arc<CredentialCache>,
    state: TransceiverState,
    loaded: Option<(Credential, SecretKey)>,
}

impl<L: Link + 'static> Transceiver<L> {
    /// Create a transceiver that trusts credentials issued under
    /// `authority_key`.
    pub fn new(authority_key: PublicKey, link: L, config: TransceiverConfig) -> Self {
        Self {
            link: Arc::new(link),
            config,
            clock: Arc::new(SystemClock),
            resolver: None,
            cache: Arc::new(CredentialCache::new(authority_key)),
            state: TransceiverState::Uninitialized,
            loaded: None,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resolve unknown credentials through `resolver`.
    pub fn with_resolver(mut self, resolver: Arc<dyn CredentialResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn state(&self) -> TransceiverState {
        self.state
    }

    pub fn config(&self) -> &TransceiverConfig {
        &self.config
    }

    /// Load this transceiver's credential and the matching secret key.
    pub fn load_credential(&mut self, credential: Credential, secret_key: SecretKey) -> Result<()> {
        self.transition(TransceiverState::Authorized)?;

        if !credential.verify(self.cache.authority_key()) {
            return Err(TransceiverError::InvalidCredential(
                "authority signature does not verify".into(),
            ));
        }
        let now = self.clock.now_secs();
        if credential.validity_at(now) != Validity::Valid {
            return Err(TransceiverError::InvalidCredential(format!(
                "outside validity window [{}, {}) at {}",
                credential.not_before, credential.not_after, now
            )));
        }
        if secret_key.public_key() != credential.public_key {
            return Err(TransceiverError::InvalidCredential(
                "secret key does not match credential".into(),
            ));
        }

        info!(identity = %credential.identity, credential = %credential.id(), "credential loaded");
        self.loaded = Some((credential, secret_key));
        self.state = TransceiverState::Authorized;
        Ok(())
    }

    /// Pre-load peer credentials. Returns how many were new and verified.
    pub fn seed_credentials(&self, credentials: impl IntoIterator<Item = Credential>) -> usize {
        seed(&self.cache, credentials)
    }

    /// Record revocations pushed from the authority.
    pub fn apply_revocations(&self, entries: &[RevocationEntry]) -> usize {
        self.cache.apply_revocations(entries).len()
    }

    /// Spawn the broadcaster and validator tasks.
    pub fn start(mut self) -> Result<RunningTransceiver> {
        self.transition(TransceiverState::Active)?;
        let (credential, secret_key) = self.loaded.take().ok_or(TransceiverError::InvalidTransition {
            from: self.state,
            to: TransceiverState::Active,
        })?;

        let identity = credential.identity.clone();
        let credential_id = credential.id();

        let (state_tx, _) = watch::channel(TransceiverState::Active);
        let state_tx = Arc::new(state_tx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (payload_tx, payload_rx) = watch::channel(Bytes::new());
        let (events, _) = broadcast::channel(self.config.event_capacity.max(1));
        let peers = Arc::new(RwLock::new(PeerTable::new(
            self.config.peer_staleness,
            self.config.max_peers,
        )));

        let broadcaster = Broadcaster::new(credential, secret_key, payload_rx, self.cache.clone());
        let broadcast_task = tokio::spawn(run_broadcaster(
            broadcaster,
            self.link.clone(),
            self.clock.clone(),
            self.config.broadcast_interval,
            state_tx.clone(),
            shutdown_rx.clone(),
        ));

        let mut validator = Validator::new(
            identity.clone(),
            self.cache.clone(),
            peers.clone(),
            self.config.resolution,
        )
        .with_max_message_age(self.config.max_message_age);
        if let Some(resolver) = self.resolver.clone() {
            validator = validator.with_resolver(resolver);
        }
        let validate_task = tokio::spawn(run_validator(
            validator,
            self.link.clone(),
            self.clock.clone(),
            self.config.peer_staleness,
            events.clone(),
            shutdown_rx,
        ));

        info!(%identity, credential = %credential_id, "transceiver started");
        Ok(RunningTransceiver {
            identity,
            credential_id,
            state: state_tx,
            shutdown: shutdown_tx,
            payload: payload_tx,
            events,
            peers,
            cache: self.cache,
            broadcast_task,
            validate_task,
        })
    }

    fn transition(&self, to: TransceiverState) -> Result<()> {
        if self.state.can_transition_to(to) {
            Ok(())
        } else {
            Err(TransceiverError::InvalidTransition {
                from: self.state,
                to,
            })
        }
    }
}

/// A transceiver whose tasks are running.
pub struct RunningTransceiver {
    identity: Identity,
    credential_id: CredentialId,
    state: Arc<watch::Sender<TransceiverState>>,
    shutdown: watch::Sender<bool>,
    payload: watch::Sender<Bytes>,
    events: broadcast::Sender<ReceiveEvent>,
    peers: Arc<RwLock<PeerTable>>,
    cache: Arc<CredentialCache>,
    broadcast_task: JoinHandle<BroadcastStats>,
    validate_task: JoinHandle<ReceiveStats>,
}

impl RunningTransceiver {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn credential_id(&self) -> CredentialId {
        self.credential_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransceiverState {
        *self.state.borrow()
    }

    /// Watch lifecycle state changes.
    pub fn watch_state(&self) -> watch::Receiver<TransceiverState> {
        self.state.subscribe()
    }

    /// Subscribe to inbound validation outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<ReceiveEvent> {
        self.events.subscribe()
    }

    /// Replace the payload carried by subsequent squitters.
    pub fn set_payload(&self, payload: impl Into<Bytes>) -> Result<()> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(CoreError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            }
            .into());
        }
        self.payload.send_replace(payload);
        Ok(())
    }

    /// Snapshot of the peer table, ordered by identity.
    pub fn peers(&self) -> Vec<PeerTrustEntry> {
        self.peers.read().unwrap_or_else(|e| e.into_inner()).snapshot()
    }

    pub fn peer(&self, identity: &Identity) -> Option<PeerTrustEntry> {
        self.peers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity)
            .cloned()
    }

    /// Pre-load peer credentials. Returns how many were new and verified.
    pub fn seed_credentials(&self, credentials: impl IntoIterator<Item = Credential>) -> usize {
        seed(&self.cache, credentials)
    }

    /// Record revocations pushed from the authority. Peers trusted under a
    /// revoked credential become untrusted; our own revoked credential stops
    /// the broadcaster at its next tick.
    pub fn apply_revocations(&self, entries: &[RevocationEntry]) -> usize {
        let fresh = self.cache.apply_revocations(entries);
        if !fresh.is_empty() {
            let mut peers = self.peers.write().unwrap_or_else(|e| e.into_inner());
            for id in &fresh {
                peers.distrust(id);
            }
        }
        if fresh.contains(&self.credential_id) {
            warn!(identity = %self.identity, "own credential revoked");
        }
        fresh.len()
    }

    /// Stop both tasks, wipe the secret key, and report.
    pub async fn stop(self) -> Result<TransceiverReport> {
        self.shutdown.send_replace(true);

        let broadcast = self
            .broadcast_task
            .await
            .map_err(|e| TransceiverError::TaskFailed(e.to_string()))?;
        let receive = self
            .validate_task
            .await
            .map_err(|e| TransceiverError::TaskFailed(e.to_string()))?;
        self.state.send_replace(TransceiverState::Stopped);

        let report = TransceiverReport {
            emitted: broadcast.emitted,
            suppressed: broadcast.suppressed,
            accepted: receive.accepted,
            ignored: receive.ignored,
            rejected: receive.rejected,
            evicted: receive.evicted,
            link_errors: broadcast.link_errors + receive.link_errors,
            last_seq: broadcast.last_seq,
        };
        info!(
            identity = %self.identity,
            emitted = report.emitted,
            accepted = report.accepted,
            rejected = report.rejected.total(),
            "transceiver stopped"
        );
        Ok(report)
    }
}

fn seed(cache: &CredentialCache, credentials: impl IntoIterator<Item = Credential>) -> usize {
    let mut inserted = 0;
    for credential in credentials {
        let id = credential.id();
        if cache.insert(credential) {
            inserted += 1;
        } else {
            debug!(credential = %id, "seed credential skipped");
        }
    }
    inserted
}

// ─────────────────────────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BroadcastStats {
    emitted: u64,
    suppressed: u64,
    link_errors: u64,
    last_seq: u64,
}

#[derive(Debug, Default)]
struct ReceiveStats {
    accepted: u64,
    ignored: u64,
    rejected: RejectionCounts,
    evicted: u64,
    link_errors: u64,
}

async fn run_broadcaster<L: Link>(
    mut broadcaster: Broadcaster,
    link: Arc<L>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    state: Arc<watch::Sender<TransceiverState>>,
    mut shutdown: watch::Receiver<bool>,
) -> BroadcastStats {
    let mut stats = BroadcastStats::default();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            deadline = ticker.tick() => {
                let late = deadline.elapsed();
                if late > interval {
                    warn!(late_ms = late.as_millis() as u64, "broadcaster slipping");
                }

                match broadcaster.tick(clock.now_millis()) {
                    Ok(TickOutcome::Emitted(message)) => {
                        let seq = message.seq;
                        match link.send(Bytes::from(message.to_bytes())).await {
                            Ok(()) => {
                                stats.emitted += 1;
                                stats.last_seq = seq;
                            }
                            Err(e) => {
                                stats.link_errors += 1;
                                warn!(seq, error = %e, "squitter send failed");
                            }
                        }
                    }
                    Ok(TickOutcome::Expired) => {
                        stats.suppressed += 1;
                        state.send_replace(TransceiverState::Expired);
                        info!(credential = %broadcaster.credential_id(), "credential no longer usable, broadcasting suspended");
                    }
                    Ok(TickOutcome::Suppressed) => stats.suppressed += 1,
                    Err(e) => {
                        stats.suppressed += 1;
                        warn!(error = %e, "squitter signing failed");
                    }
                }
            }
        }
    }

    broadcaster.discard();
    stats
}

async fn run_validator<L: Link>(
    validator: Validator,
    link: Arc<L>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
    events: broadcast::Sender<ReceiveEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> ReceiveStats {
    let mut stats = ReceiveStats::default();
    let mut sweep = tokio::time::interval(sweep_interval.max(Duration::from_millis(1)));
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = sweep.tick() => {
                let now = clock.now_millis();
                stats.evicted += validator.evict_stale(now) as u64;
                validator.purge_expired(now.div_euclid(1000));
            }
            frame = link.recv() => match frame {
                Ok(frame) => handle_frame(&validator, &frame, clock.now_millis(), &events, &mut stats).await,
                Err(LinkError::Closed) => {
                    warn!("link closed, validator exiting");
                    break;
                }
                Err(e) => {
                    stats.link_errors += 1;
                    warn!(error = %e, "link receive failed");
                }
            },
        }
    }

    stats
}

async fn handle_frame(
    validator: &Validator,
    frame: &[u8],
    now: i64,
    events: &broadcast::Sender<ReceiveEvent>,
    stats: &mut ReceiveStats,
) {
    stats.evicted += validator.evict_stale(now) as u64;

    let message = match Validator::decode(frame) {
        Ok(message) => message,
        Err(error) => {
            stats.rejected.record(&error);
            warn!(error = %error, "rejected frame");
            let _ = events.send(ReceiveEvent::Rejected {
                sender: None,
                credential_id: None,
                error,
            });
            return;
        }
    };
    if validator.is_own(&message) {
        stats.ignored += 1;
        return;
    }

    let event = match validator.admit(&message, now).await {
        Ok(()) => {
            stats.accepted += 1;
            debug!(sender = %message.sender, seq = message.seq, "accepted squitter");
            ReceiveEvent::Accepted {
                sender: message.sender,
                credential_id: message.credential_id,
                seq: message.seq,
                payload: message.payload,
            }
        }
        Err(error) => {
            stats.rejected.record(&error);
            warn!(sender = %message.sender, seq = message.seq, error = %error, "rejected squitter");
            ReceiveEvent::Rejected {
                sender: Some(message.sender),
                credential_id: Some(message.credential_id),
                error,
            }
        }
    };
    // No subscribers is fine.
    let _ = events.send(event);
}
