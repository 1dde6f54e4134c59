//! Golden test vectors for deterministic verification.
//!
//! Master and participant keys are derived from fixed seeds and BLS
//! signatures are deterministic, so each vector always yields the same
//! credential bytes, credential id, and squitter bytes.

use vista_core::{
    AuthorityKeyPair, Credential, CredentialBuilder, Identity, SecretKey, SquitterBuilder,
    SquitterMessage,
};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed for the authority master key.
    pub authority_seed: [u8; 32],
    /// Seed for the participant key.
    pub key_seed: [u8; 32],
    pub identity: &'static str,
    pub not_before: i64,
    pub not_after: i64,
    /// Squitter sequence number.
    pub seq: u64,
    /// Squitter timestamp (Unix milliseconds).
    pub timestamp: i64,
    pub payload: &'static [u8],
    /// Expected credential id (hex). Empty means "report only".
    pub expected_credential_id: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "veh-42 ten minute credential",
            authority_seed: [0x42; 32],
            key_seed: [0x43; 32],
            identity: "veh-42",
            not_before: 1000,
            not_after: 1600,
            seq: 1,
            timestamp: 1_001_000,
            payload: b"lat=37.7749,lon=-122.4194",
            expected_credential_id: "",
        },
        GoldenVector {
            name: "day-long credential, empty payload",
            authority_seed: [0x01; 32],
            key_seed: [0x02; 32],
            identity: "fleet-7/unit-12",
            not_before: 1_736_870_400,
            not_after: 1_736_956_800,
            seq: 86_400,
            timestamp: 1_736_956_799_999,
            payload: b"",
            expected_credential_id: "",
        },
        GoldenVector {
            name: "one second credential at epoch",
            authority_seed: [0xff; 32],
            key_seed: [0x00; 32],
            identity: "x",
            not_before: 0,
            not_after: 1,
            seq: u64::MAX,
            timestamp: 0,
            payload: b"\x00\x01\x02\x03",
            expected_credential_id: "",
        },
    ]
}

/// Build the credential a vector describes.
pub fn credential_from_vector(vector: &GoldenVector) -> Credential {
    let authority = AuthorityKeyPair::from_seed(&vector.authority_seed);
    let key = SecretKey::from_seed(&vector.key_seed);
    CredentialBuilder::new(
        Identity::new(vector.identity).expect("vector identity is valid"),
        key.public_key(),
    )
    .window(vector.not_before, vector.not_after)
    .sign(&authority)
    .expect("vector window is valid")
}

/// Build the squitter a vector describes, under its credential.
pub fn squitter_from_vector(vector: &GoldenVector) -> SquitterMessage {
    let credential = credential_from_vector(vector);
    SquitterBuilder::new(credential.identity.clone(), credential.id(), vector.seq)
        .timestamp(vector.timestamp)
        .payload(vector.payload)
        .sign(&SecretKey::from_seed(&vector.key_seed))
        .expect("vector payload is within limits")
}

/// Hex of the squitter wire bytes a vector describes.
pub fn squitter_wire_hex(vector: &GoldenVector) -> String {
    hex::encode(squitter_from_vector(vector).to_bytes())
}

/// Verify all golden vectors produce their expected credential ids.
///
/// Returns `(name, matches, computed_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let hex = credential_from_vector(v).id().to_hex();

            // If expected is empty, just report what we got
            let matches = v.expected_credential_id.is_empty() || hex == v.expected_credential_id;

            (v.name.to_string(), matches, hex)
        })
        .collect()
}
