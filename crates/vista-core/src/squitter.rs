//! Squitters: the periodic signed broadcast a transceiver emits.
//!
//! A squitter names its sender and the credential it is speaking under,
//! carries a per-sender sequence number and an emission timestamp, and is
//! signed with the participant key the credential certifies.

use bytes::Bytes;

use crate::canonical::{decode_squitter, encode_squitter, squitter_signed_bytes, MAX_PAYLOAD_LEN};
use crate::crypto::{verify, PublicKey, SecretKey, Signature};
use crate::error::{CoreError, Result};
use crate::types::{CredentialId, Identity};

/// A signed broadcast message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquitterMessage {
    /// Claimed sender identity.
    pub sender: Identity,

    /// The credential the sender is speaking under.
    pub credential_id: CredentialId,

    /// Per-sender sequence number, strictly increasing from 1.
    pub seq: u64,

    /// Emission time (Unix milliseconds).
    pub timestamp: i64,

    /// Application payload.
    pub payload: Bytes,

    /// Participant signature over the fields above.
    pub signature: Signature,
}

impl SquitterMessage {
    /// The bytes covered by the sender's signature.
    pub fn signed_message(&self) -> Vec<u8> {
        squitter_signed_bytes(
            &self.sender,
            &self.credential_id,
            self.seq,
            self.timestamp,
            &self.payload,
        )
    }

    /// Check the signature against the sender's credentialed key.
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        verify(public_key, &self.signed_message(), &self.signature)
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_squitter(self)
    }

    /// Decode from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_squitter(bytes)
    }
}

/// Builder for squitters.
pub struct SquitterBuilder {
    sender: Identity,
    credential_id: CredentialId,
    seq: u64,
    timestamp: i64,
    payload: Bytes,
}

impl SquitterBuilder {
    /// Start building a squitter.
    pub fn new(sender: Identity, credential_id: CredentialId, seq: u64) -> Self {
        Self {
            sender,
            credential_id,
            seq,
            timestamp: 0,
            payload: Bytes::new(),
        }
    }

    /// Set the emission timestamp (Unix milliseconds).
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = ts;
        self
    }

    /// Set the payload.
    pub fn payload(mut self, p: impl Into<Bytes>) -> Self {
        self.payload = p.into();
        self
    }

    /// Build and sign the squitter.
    pub fn sign(self, secret_key: &SecretKey) -> Result<SquitterMessage> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(CoreError::PayloadTooLarge {
                len: self.payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let message = squitter_signed_bytes(
            &self.sender,
            &self.credential_id,
            self.seq,
            self.timestamp,
            &self.payload,
        );
        let signature = secret_key.sign(&message)?;

        Ok(SquitterMessage {
            sender: self.sender,
            credential_id: self.credential_id,
            seq: self.seq,
            timestamp: self.timestamp,
            payload: self.payload,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoError;

    fn sender() -> (Identity, SecretKey) {
        (Identity::new("veh-42").unwrap(), SecretKey::from_seed(&[0x42; 32]))
    }

    #[test]
    fn test_squitter_sign_verify() {
        let (id, sk) = sender();
        let msg = SquitterBuilder::new(id, CredentialId::from_bytes([1; 32]), 1)
            .timestamp(1_001_000)
            .payload(b"hello".to_vec())
            .sign(&sk)
            .unwrap();

        assert!(msg.verify(&sk.public_key()));
        assert!(!msg.verify(&SecretKey::from_seed(&[0x43; 32]).public_key()));
    }

    #[test]
    fn test_every_field_is_signed() {
        let (id, sk) = sender();
        let pk = sk.public_key();
        let msg = SquitterBuilder::new(id, CredentialId::from_bytes([1; 32]), 5)
            .timestamp(1_001_000)
            .payload(b"hello".to_vec())
            .sign(&sk)
            .unwrap();

        let mut m = msg.clone();
        m.seq = 6;
        assert!(!m.verify(&pk));

        let mut m = msg.clone();
        m.timestamp += 1;
        assert!(!m.verify(&pk));

        let mut m = msg.clone();
        m.credential_id = CredentialId::from_bytes([2; 32]);
        assert!(!m.verify(&pk));

        let mut m = msg.clone();
        m.payload = Bytes::from_static(b"hellp");
        assert!(!m.verify(&pk));

        let mut m = msg;
        m.sender = Identity::new("veh-43").unwrap();
        assert!(!m.verify(&pk));
    }

    #[test]
    fn test_oversized_payload_refused() {
        let (id, sk) = sender();
        let err = SquitterBuilder::new(id, CredentialId::from_bytes([1; 32]), 1)
            .payload(vec![0u8; MAX_PAYLOAD_LEN + 1])
            .sign(&sk)
            .unwrap_err();
        assert!(matches!(err, CoreError::PayloadTooLarge { .. }));
    }

    #[test]
    fn test_discarded_key_refuses_to_sign() {
        let (id, mut sk) = sender();
        sk.discard();
        let err = SquitterBuilder::new(id, CredentialId::from_bytes([1; 32]), 1)
            .sign(&sk)
            .unwrap_err();
        assert!(matches!(err, CoreError::Crypto(CryptoError::Signing(_))));
    }
}
