//! The peer trust table.
//!
//! One entry per peer identity the validator has accepted a squitter from.
//! Sequence numbers are tracked per (identity, credential), so a peer holding
//! several live credentials cannot replay traffic from one while sending on
//! another. The validator task is the only writer.

use std::collections::HashMap;
use std::time::Duration;

use vista_core::{CredentialId, Identity, PublicKey, SquitterMessage};

/// Whether a peer is currently trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustState {
    Trusted,
    /// The credential the peer was trusted under has since been revoked.
    Untrusted,
}

/// What the validator knows about one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerTrustEntry {
    pub identity: Identity,
    /// The credentialed key the last accepted squitter verified under.
    pub public_key: PublicKey,
    /// The credential the peer was validated under.
    pub credential_id: CredentialId,
    /// Last accepted sequence number.
    pub last_seq: u64,
    /// Local time of the last acceptance (Unix milliseconds).
    pub last_validated: i64,
    pub state: TrustState,
}

/// Highest sequence number accepted under one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SequenceMark {
    last_seq: u64,
    /// End of the credential's window (Unix seconds); the mark is useless after.
    not_after: i64,
}

/// Bounded table of peer trust entries.
#[derive(Debug)]
pub struct PeerTable {
    entries: HashMap<Identity, PeerTrustEntry>,
    marks: HashMap<(Identity, CredentialId), SequenceMark>,
    staleness: i64,
    capacity: usize,
}

impl PeerTable {
    /// Create a table that forgets peers silent for longer than `staleness`
    /// and holds at most `capacity` entries.
    pub fn new(staleness: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            marks: HashMap::new(),
            staleness: i64::try_from(staleness.as_millis()).unwrap_or(i64::MAX),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, identity: &Identity) -> Option<&PeerTrustEntry> {
        self.entries.get(identity)
    }

    /// The last accepted sequence number that `message` must exceed, if any.
    ///
    /// Each credential has its own sequence space, remembered for as long as
    /// the peer stays in the table.
    pub fn last_seq_for(&self, message: &SquitterMessage) -> Option<u64> {
        self.marks
            .get(&(message.sender.clone(), message.credential_id))
            .map(|m| m.last_seq)
    }

    /// Record an accepted squitter verified under a credential valid until
    /// `not_after` (Unix seconds).
    ///
    /// Returns the identity evicted to make room, if the table was full.
    pub fn record(
        &mut self,
        message: &SquitterMessage,
        public_key: PublicKey,
        not_after: i64,
        now: i64,
    ) -> Option<Identity> {
        let mut evicted = None;
        if !self.entries.contains_key(&message.sender) && self.entries.len() >= self.capacity {
            evicted = self
                .entries
                .values()
                .min_by_key(|e| e.last_validated)
                .map(|e| e.identity.clone());
            if let Some(identity) = &evicted {
                self.entries.remove(identity);
                self.marks.retain(|(peer, _), _| peer != identity);
            }
        }

        self.marks.insert(
            (message.sender.clone(), message.credential_id),
            SequenceMark {
                last_seq: message.seq,
                not_after,
            },
        );

        self.entries.insert(
            message.sender.clone(),
            PeerTrustEntry {
                identity: message.sender.clone(),
                public_key,
                credential_id: message.credential_id,
                last_seq: message.seq,
                last_validated: now,
                state: TrustState::Trusted,
            },
        );
        evicted
    }

    /// Mark every peer validated under `credential_id` as untrusted.
    pub fn distrust(&mut self, credential_id: &CredentialId) -> usize {
        let mut count = 0;
        for entry in self.entries.values_mut() {
            if entry.credential_id == *credential_id && entry.state == TrustState::Trusted {
                entry.state = TrustState::Untrusted;
                count += 1;
            }
        }
        count
    }

    /// Evict entries untouched for longer than the staleness timeout, along
    /// with sequence marks of evicted peers and of expired credentials.
    pub fn evict_stale(&mut self, now: i64) -> usize {
        let before = self.entries.len();
        let staleness = self.staleness;
        self.entries
            .retain(|_, e| now.saturating_sub(e.last_validated) <= staleness);

        let now_secs = now.div_euclid(1000);
        let entries = &self.entries;
        self.marks
            .retain(|(peer, _), m| m.not_after > now_secs && entries.contains_key(peer));
        before - self.entries.len()
    }

    /// Copy of every entry.
    pub fn snapshot(&self) -> Vec<PeerTrustEntry> {
        let mut entries: Vec<_> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.identity.cmp(&b.identity));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_core::{SecretKey, SquitterBuilder};

    fn squitter(sender: &str, cred: u8, seq: u64) -> (SquitterMessage, PublicKey) {
        let sk = SecretKey::from_seed(&[cred; 32]);
        let msg = SquitterBuilder::new(
            Identity::new(sender).unwrap(),
            CredentialId::from_bytes([cred; 32]),
            seq,
        )
        .sign(&sk)
        .unwrap();
        (msg, sk.public_key())
    }

    #[test]
    fn test_record_and_last_seq() {
        let mut table = PeerTable::new(Duration::from_secs(10), 16);
        let (m1, pk) = squitter("veh-1", 1, 1);
        table.record(&m1, pk, i64::MAX, 1_000);

        let (m2, _) = squitter("veh-1", 1, 2);
        assert_eq!(table.last_seq_for(&m2), Some(1));

        // New credential, new sequence space.
        let (fresh, _) = squitter("veh-1", 2, 1);
        assert_eq!(table.last_seq_for(&fresh), None);
    }

    #[test]
    fn test_evict_stale() {
        let mut table = PeerTable::new(Duration::from_secs(10), 16);
        let (a, pk_a) = squitter("veh-a", 1, 1);
        let (b, pk_b) = squitter("veh-b", 2, 1);
        table.record(&a, pk_a, i64::MAX, 1_000);
        table.record(&b, pk_b, i64::MAX, 5_000);

        assert_eq!(table.evict_stale(11_000), 0);
        assert_eq!(table.evict_stale(11_001), 1);
        assert!(table.get(&a.sender).is_none());
        assert!(table.get(&b.sender).is_some());
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let mut table = PeerTable::new(Duration::from_secs(10), 2);
        let (a, pk_a) = squitter("veh-a", 1, 1);
        let (b, pk_b) = squitter("veh-b", 2, 1);
        let (c, pk_c) = squitter("veh-c", 3, 1);

        table.record(&a, pk_a, i64::MAX, 1_000);
        table.record(&b, pk_b, i64::MAX, 2_000);
        let evicted = table.record(&c, pk_c, i64::MAX, 3_000);

        assert_eq!(evicted, Some(a.sender.clone()));
        assert_eq!(table.len(), 2);

        // Updating an existing peer never evicts.
        let (b2, _) = squitter("veh-b", 2, 2);
        assert_eq!(table.record(&b2, pk_b, i64::MAX, 4_000), None);
    }

    #[test]
    fn test_distrust() {
        let mut table = PeerTable::new(Duration::from_secs(10), 16);
        let (a, pk) = squitter("veh-a", 1, 1);
        table.record(&a, pk, i64::MAX, 1_000);

        assert_eq!(table.distrust(&CredentialId::from_bytes([1; 32])), 1);
        assert_eq!(table.get(&a.sender).unwrap().state, TrustState::Untrusted);
        assert_eq!(table.distrust(&CredentialId::from_bytes([1; 32])), 0);
    }

    #[test]
    fn test_sequence_kept_per_credential() {
        let mut table = PeerTable::new(Duration::from_secs(10), 16);
        let (a5, pk_a) = squitter("veh-1", 1, 5);
        let (b1, pk_b) = squitter("veh-1", 2, 1);
        table.record(&a5, pk_a, i64::MAX, 1_000);
        table.record(&b1, pk_b, i64::MAX, 2_000);

        // Switching to credential 2 does not reset credential 1.
        assert_eq!(table.last_seq_for(&a5), Some(5));
        assert_eq!(table.last_seq_for(&b1), Some(1));
        assert_eq!(table.get(&a5.sender).unwrap().credential_id, b1.credential_id);
    }

    #[test]
    fn test_marks_pruned_with_peer_and_credential() {
        let mut table = PeerTable::new(Duration::from_secs(10), 16);
        let (a, pk_a) = squitter("veh-1", 1, 3);
        let (b, pk_b) = squitter("veh-1", 2, 4);
        let (c, pk_c) = squitter("veh-2", 3, 1);
        table.record(&a, pk_a, 5, 1_000);
        table.record(&b, pk_b, 100, 2_000);
        table.record(&c, pk_c, 100, 1_000);

        // Credential 1 expired at 5s; veh-2 has gone quiet.
        assert_eq!(table.evict_stale(11_500), 1);
        assert_eq!(table.last_seq_for(&a), None);
        assert_eq!(table.last_seq_for(&b), Some(4));
        assert_eq!(table.last_seq_for(&c), None);
    }

    #[test]
    fn test_capacity_eviction_drops_marks() {
        let mut table = PeerTable::new(Duration::from_secs(10), 1);
        let (a, pk_a) = squitter("veh-a", 1, 7);
        let (b, pk_b) = squitter("veh-b", 2, 1);
        table.record(&a, pk_a, i64::MAX, 1_000);
        table.record(&b, pk_b, i64::MAX, 2_000);

        assert_eq!(table.last_seq_for(&a), None);
        assert_eq!(table.last_seq_for(&b), Some(1));
    }
}
