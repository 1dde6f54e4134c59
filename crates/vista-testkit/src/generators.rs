//! Proptest generators for property-based testing.

use proptest::prelude::*;

use vista_core::{
    AuthorityKeyPair, Credential, CredentialBuilder, CredentialId, Identity, SecretKey,
    SquitterBuilder, SquitterMessage, MAX_PAYLOAD_LEN,
};

/// Generate a valid identity.
pub fn identity() -> impl Strategy<Value = Identity> {
    "[a-z][a-z0-9-]{0,31}".prop_map(|s| Identity::new(s).expect("pattern yields valid identity"))
}

/// Generate a random CredentialId.
pub fn credential_id() -> impl Strategy<Value = CredentialId> {
    any::<[u8; 32]>().prop_map(CredentialId::from_bytes)
}

/// Generate a participant secret key.
pub fn secret_key() -> impl Strategy<Value = SecretKey> {
    any::<[u8; 32]>().prop_map(|seed| SecretKey::from_seed(&seed))
}

/// Generate a validity window `[not_before, not_after)`.
pub fn window() -> impl Strategy<Value = (i64, i64)> {
    (0i64..=2_000_000_000, 1i64..=86_400).prop_map(|(start, len)| (start, start + len))
}

/// Generate payload bytes of at most `max_len` bytes.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Parameters for generating a credential.
#[derive(Debug, Clone)]
pub struct CredentialParams {
    pub authority_seed: [u8; 32],
    pub key_seed: [u8; 32],
    pub identity: Identity,
    pub not_before: i64,
    pub not_after: i64,
}

impl Arbitrary for CredentialParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<[u8; 32]>(), any::<[u8; 32]>(), identity(), window())
            .prop_map(|(authority_seed, key_seed, identity, (not_before, not_after))| {
                CredentialParams {
                    authority_seed,
                    key_seed,
                    identity,
                    not_before,
                    not_after,
                }
            })
            .boxed()
    }
}

/// Generate a credential from parameters.
pub fn credential_from_params(params: &CredentialParams) -> Credential {
    let authority = AuthorityKeyPair::from_seed(&params.authority_seed);
    let key = SecretKey::from_seed(&params.key_seed);
    CredentialBuilder::new(params.identity.clone(), key.public_key())
        .window(params.not_before, params.not_after)
        .sign(&authority)
        .expect("generated window is valid")
}

/// Parameters for generating a squitter.
#[derive(Debug, Clone)]
pub struct SquitterParams {
    pub key_seed: [u8; 32],
    pub sender: Identity,
    pub credential_id: CredentialId,
    pub seq: u64,
    pub timestamp: i64,
    pub payload: Vec<u8>,
}

impl Arbitrary for SquitterParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(),
            identity(),
            credential_id(),
            1u64..=u64::MAX,
            0i64..=2_000_000_000_000i64,
            payload(MAX_PAYLOAD_LEN),
        )
            .prop_map(|(key_seed, sender, credential_id, seq, timestamp, payload)| {
                SquitterParams {
                    key_seed,
                    sender,
                    credential_id,
                    seq,
                    timestamp,
                    payload,
                }
            })
            .boxed()
    }
}

/// Generate a squitter from parameters.
pub fn squitter_from_params(params: &SquitterParams) -> SquitterMessage {
    SquitterBuilder::new(params.sender.clone(), params.credential_id, params.seq)
        .timestamp(params.timestamp)
        .payload(params.payload.clone())
        .sign(&SecretKey::from_seed(&params.key_seed))
        .expect("generated payload is within limits")
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn test_credential_id_deterministic(params: CredentialParams) {
            let c1 = credential_from_params(&params);
            let c2 = credential_from_params(&params);
            prop_assert_eq!(c1.id(), c2.id());
        }

        #[test]
        fn test_credential_wire_round_trip(params: CredentialParams) {
            let credential = credential_from_params(&params);
            let decoded = Credential::from_bytes(&credential.to_bytes()).unwrap();
            prop_assert_eq!(&decoded, &credential);
            prop_assert!(decoded.verify(&AuthorityKeyPair::from_seed(&params.authority_seed).public_key()));
        }

        #[test]
        fn test_squitter_wire_round_trip(params: SquitterParams) {
            let msg = squitter_from_params(&params);
            let decoded = SquitterMessage::from_bytes(&msg.to_bytes()).unwrap();
            prop_assert!(decoded.verify(&SecretKey::from_seed(&params.key_seed).public_key()));
            prop_assert_eq!(decoded, msg);
        }

        #[test]
        fn test_squitter_seq_is_signed(params: SquitterParams) {
            prop_assume!(params.seq < u64::MAX);
            let mut msg = squitter_from_params(&params);
            msg.seq += 1;
            prop_assert!(!msg.verify(&SecretKey::from_seed(&params.key_seed).public_key()));
        }
    }
}
