//! Length-prefixed wire encoding for credentials and squitters.
//!
//! Every field is written as a 4-byte big-endian length followed by the
//! field bytes. Integers are fixed-width big-endian (u64 sequence numbers,
//! i64 timestamps) but still carry their length prefix, so a decoder never
//! has to know a schema to skip a field. Decoding is strict: every length
//! must match the field's expected size, identities must be valid UTF-8,
//! and trailing bytes are an error.
//!
//! Signed bytes are the encoding of the fields that precede the signature,
//! prefixed with a domain tag so a credential signature can never be
//! replayed as a squitter signature or the other way round.
//!
//! **This encoding is FROZEN.** Changing it invalidates every issued
//! credential.

use bytes::Bytes;

use crate::credential::Credential;
use crate::crypto::{PublicKey, Signature, PUBLIC_KEY_LEN, SIGNATURE_LEN};
use crate::error::{CoreError, Result};
use crate::squitter::SquitterMessage;
use crate::types::{CredentialId, Identity};

/// Domain separation prefix for credential signatures.
pub const CREDENTIAL_SIGN_DOMAIN: &[u8] = b"vista/credential/v1";

/// Domain separation prefix for squitter signatures.
pub const SQUITTER_SIGN_DOMAIN: &[u8] = b"vista/squitter/v1";

/// Maximum identity length in bytes.
pub const MAX_IDENTITY_LEN: usize = 255;

/// Maximum squitter payload length in bytes.
pub const MAX_PAYLOAD_LEN: usize = 1024;

/// Maximum encoded squitter length in bytes.
pub const MAX_SQUITTER_LEN: usize = 2048;

/// Maximum encoded credential length in bytes.
pub const MAX_CREDENTIAL_LEN: usize = 5 * 4 + MAX_IDENTITY_LEN + PUBLIC_KEY_LEN + 8 + 8 + SIGNATURE_LEN;

/// Appends length-prefixed fields.
struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn with_domain(domain: &[u8]) -> Self {
        Self {
            buf: domain.to_vec(),
        }
    }

    fn bytes(&mut self, field: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(&(field.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(field);
        self
    }

    fn u64(&mut self, n: u64) -> &mut Self {
        self.bytes(&n.to_be_bytes())
    }

    fn i64(&mut self, n: i64) -> &mut Self {
        self.bytes(&n.to_be_bytes())
    }

    fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

/// Reads length-prefixed fields, failing on any structural problem.
struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn field(&mut self, name: &str, max_len: usize) -> Result<&'a [u8]> {
        let remaining = &self.bytes[self.pos..];
        if remaining.len() < 4 {
            return Err(CoreError::DecodingError(format!("missing length for {}", name)));
        }
        let len = u32::from_be_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]) as usize;
        if len > max_len {
            return Err(CoreError::DecodingError(format!(
                "{} is {} bytes (max {})",
                name, len, max_len
            )));
        }
        if remaining.len() - 4 < len {
            return Err(CoreError::DecodingError(format!("truncated {}", name)));
        }
        self.pos += 4 + len;
        Ok(&remaining[4..4 + len])
    }

    fn fixed<const N: usize>(&mut self, name: &str) -> Result<[u8; N]> {
        let field = self.field(name, N)?;
        field.try_into().map_err(|_| {
            CoreError::DecodingError(format!("{} must be {} bytes, got {}", name, N, field.len()))
        })
    }

    fn identity(&mut self, name: &str) -> Result<Identity> {
        let raw = self.field(name, MAX_IDENTITY_LEN)?;
        let s = std::str::from_utf8(raw)
            .map_err(|_| CoreError::DecodingError(format!("{} is not valid UTF-8", name)))?;
        Identity::new(s)
    }

    fn u64(&mut self, name: &str) -> Result<u64> {
        Ok(u64::from_be_bytes(self.fixed::<8>(name)?))
    }

    fn i64(&mut self, name: &str) -> Result<i64> {
        Ok(i64::from_be_bytes(self.fixed::<8>(name)?))
    }

    fn finish(self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(CoreError::DecodingError(format!(
                "{} trailing bytes",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}

fn credential_fields(
    w: &mut FieldWriter,
    identity: &Identity,
    public_key: &PublicKey,
    not_before: i64,
    not_after: i64,
) {
    w.bytes(identity.as_bytes())
        .bytes(&public_key.to_bytes())
        .i64(not_before)
        .i64(not_after);
}

/// The message the authority signs when issuing a credential.
pub fn credential_signed_bytes(
    identity: &Identity,
    public_key: &PublicKey,
    not_before: i64,
    not_after: i64,
) -> Vec<u8> {
    let mut w = FieldWriter::with_domain(CREDENTIAL_SIGN_DOMAIN);
    credential_fields(&mut w, identity, public_key, not_before, not_after);
    w.finish()
}

/// Encode a credential to wire bytes.
pub fn encode_credential(credential: &Credential) -> Vec<u8> {
    let mut w = FieldWriter::new();
    credential_fields(
        &mut w,
        &credential.identity,
        &credential.public_key,
        credential.not_before,
        credential.not_after,
    );
    w.bytes(&credential.signature.to_bytes());
    w.finish()
}

/// Decode a credential from wire bytes.
///
/// Only the structure is checked here; call [`Credential::verify`] to check
/// the authority signature.
pub fn decode_credential(bytes: &[u8]) -> Result<Credential> {
    if bytes.len() > MAX_CREDENTIAL_LEN {
        return Err(CoreError::DecodingError(format!(
            "credential is {} bytes (max {})",
            bytes.len(),
            MAX_CREDENTIAL_LEN
        )));
    }
    let mut r = FieldReader::new(bytes);
    let identity = r.identity("identity")?;
    let public_key = PublicKey::from_bytes(&r.fixed::<PUBLIC_KEY_LEN>("public_key")?)?;
    let not_before = r.i64("not_before")?;
    let not_after = r.i64("not_after")?;
    let signature = Signature::from_bytes(&r.fixed::<SIGNATURE_LEN>("signature")?)?;
    r.finish()?;

    if not_after <= not_before {
        return Err(CoreError::InvalidWindow {
            not_before,
            not_after,
        });
    }

    Ok(Credential {
        identity,
        public_key,
        not_before,
        not_after,
        signature,
    })
}

fn squitter_fields(
    w: &mut FieldWriter,
    sender: &Identity,
    credential_id: &CredentialId,
    seq: u64,
    timestamp: i64,
    payload: &[u8],
) {
    w.bytes(sender.as_bytes())
        .bytes(credential_id.as_bytes())
        .u64(seq)
        .i64(timestamp)
        .bytes(payload);
}

/// The message a transceiver signs for each squitter.
pub fn squitter_signed_bytes(
    sender: &Identity,
    credential_id: &CredentialId,
    seq: u64,
    timestamp: i64,
    payload: &[u8],
) -> Vec<u8> {
    let mut w = FieldWriter::with_domain(SQUITTER_SIGN_DOMAIN);
    squitter_fields(&mut w, sender, credential_id, seq, timestamp, payload);
    w.finish()
}

/// Encode a squitter to wire bytes.
pub fn encode_squitter(message: &SquitterMessage) -> Vec<u8> {
    let mut w = FieldWriter::new();
    squitter_fields(
        &mut w,
        &message.sender,
        &message.credential_id,
        message.seq,
        message.timestamp,
        &message.payload,
    );
    w.bytes(&message.signature.to_bytes());
    w.finish()
}

/// Decode a squitter from wire bytes.
pub fn decode_squitter(bytes: &[u8]) -> Result<SquitterMessage> {
    if bytes.len() > MAX_SQUITTER_LEN {
        return Err(CoreError::DecodingError(format!(
            "squitter is {} bytes (max {})",
            bytes.len(),
            MAX_SQUITTER_LEN
        )));
    }
    let mut r = FieldReader::new(bytes);
    let sender = r.identity("sender")?;
    let credential_id = CredentialId::from_bytes(r.fixed::<32>("credential_id")?);
    let seq = r.u64("seq")?;
    let timestamp = r.i64("timestamp")?;
    let payload = Bytes::copy_from_slice(r.field("payload", MAX_PAYLOAD_LEN)?);
    let signature = Signature::from_bytes(&r.fixed::<SIGNATURE_LEN>("signature")?)?;
    r.finish()?;

    Ok(SquitterMessage {
        sender,
        credential_id,
        seq,
        timestamp,
        payload,
        signature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialBuilder;
    use crate::crypto::{AuthorityKeyPair, SecretKey};
    use crate::squitter::SquitterBuilder;

    fn sample_credential() -> (Credential, SecretKey) {
        let authority = AuthorityKeyPair::from_seed(&[0x42; 32]);
        let sk = SecretKey::from_seed(&[0x43; 32]);
        let credential = CredentialBuilder::new(Identity::new("veh-42").unwrap(), sk.public_key())
            .window(1000, 1600)
            .sign(&authority)
            .unwrap();
        (credential, sk)
    }

    #[test]
    fn test_field_layout() {
        let mut w = FieldWriter::new();
        w.bytes(b"ab").u64(1);
        let buf = w.finish();
        assert_eq!(
            buf,
            vec![0, 0, 0, 2, b'a', b'b', 0, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn test_credential_roundtrip() {
        let (credential, _) = sample_credential();
        let bytes = encode_credential(&credential);
        let decoded = decode_credential(&bytes).unwrap();
        assert_eq!(decoded, credential);
        assert_eq!(encode_credential(&decoded), bytes);
    }

    #[test]
    fn test_squitter_roundtrip() {
        let (credential, sk) = sample_credential();
        let message = SquitterBuilder::new(credential.identity.clone(), credential.id(), 1)
            .timestamp(1_001_000)
            .payload(b"pos=1,2".to_vec())
            .sign(&sk)
            .unwrap();
        let bytes = encode_squitter(&message);
        assert_eq!(decode_squitter(&bytes).unwrap(), message);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let (credential, _) = sample_credential();
        let mut bytes = encode_credential(&credential);
        bytes.push(0);
        assert!(matches!(
            decode_credential(&bytes),
            Err(CoreError::DecodingError(_))
        ));
    }

    #[test]
    fn test_truncated_rejected() {
        let (credential, _) = sample_credential();
        let bytes = encode_credential(&credential);
        for cut in [0, 3, 10, bytes.len() - 1] {
            assert!(decode_credential(&bytes[..cut]).is_err(), "cut at {}", cut);
        }
    }

    #[test]
    fn test_wrong_field_length_rejected() {
        let mut w = FieldWriter::new();
        w.bytes(b"veh-1")
            .bytes(&[0u8; 31])
            .u64(1)
            .i64(0)
            .bytes(b"")
            .bytes(&[0u8; SIGNATURE_LEN]);
        assert!(decode_squitter(&w.finish()).is_err());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let (credential, _) = sample_credential();
        let mut w = FieldWriter::new();
        w.bytes(credential.identity.as_bytes())
            .bytes(credential.id().as_bytes())
            .u64(1)
            .i64(0)
            .bytes(&vec![0u8; MAX_PAYLOAD_LEN + 1])
            .bytes(&credential.signature.to_bytes());
        let err = decode_squitter(&w.finish()).unwrap_err();
        assert!(matches!(err, CoreError::DecodingError(_)));
    }

    #[test]
    fn test_signed_bytes_are_domain_separated() {
        let (credential, _) = sample_credential();
        let signed = credential_signed_bytes(
            &credential.identity,
            &credential.public_key,
            credential.not_before,
            credential.not_after,
        );
        assert!(signed.starts_with(CREDENTIAL_SIGN_DOMAIN));
        assert!(!encode_credential(&credential).starts_with(CREDENTIAL_SIGN_DOMAIN));
    }
}
