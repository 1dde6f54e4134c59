//! Identity-based signatures (Cha–Cheon over BLS12-381).
//!
//! The authority extracts a signing key for an identity from its master
//! secret. Anyone holding the master public key can verify a signature
//! against the identity string alone, with no per-participant public key.
//!
//! - extract: `d = s·H(id)`
//! - sign: `U = r·H(id)`, `h = H'(m, U)`, `V = (r + h)·d`
//! - verify: `e(V, g2) == e(U + h·H(id), P_pub)`

use std::fmt;

use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, Scalar};
use group::Curve;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{hash_to_g1, random_scalar, AuthorityKeyPair, PublicKey};
use crate::error::CryptoError;
use crate::types::Identity;

/// Hash-to-curve domain separation tag for identities.
pub const IDENTITY_DST: &[u8] = b"VISTA-IBS-V01-CS01-with-BLS12381G1_XMD:SHA-256_SSWU_RO_";

const CHALLENGE_CONTEXT: &str = "vista 2024-06 ibs challenge v1";

/// Encoded length of an identity-based signature (`U || V`).
pub const IDENTITY_SIGNATURE_LEN: usize = 96;

fn identity_point(identity: &Identity) -> G1Affine {
    hash_to_g1(identity.as_bytes(), IDENTITY_DST)
}

fn challenge(message: &[u8], u: &G1Affine) -> Scalar {
    let mut hasher = blake3::Hasher::new_derive_key(CHALLENGE_CONTEXT);
    hasher.update(&u.to_compressed());
    hasher.update(message);
    let mut wide = Zeroizing::new([0u8; 64]);
    hasher.finalize_xof().fill(&mut wide[..]);
    Scalar::from_bytes_wide(&wide)
}

/// Extract the identity signing key for `identity`.
pub fn extract(master: &AuthorityKeyPair, identity: &Identity) -> IdentityKey {
    let point = (identity_point(identity) * master.master_scalar()).to_affine();
    IdentityKey {
        identity: identity.clone(),
        point: Zeroizing::new(point.to_compressed()),
    }
}

/// Verify an identity-based signature under the authority public key.
pub fn verify(
    master_public: &PublicKey,
    identity: &Identity,
    message: &[u8],
    signature: &IdentitySignature,
) -> bool {
    let q = identity_point(identity);
    let h = challenge(message, &signature.u);
    let combined = (G1Projective::from(signature.u) + q * h).to_affine();
    pairing(&signature.v, &G2Affine::generator()) == pairing(&combined, &master_public.0)
}

/// A private signing key bound to one identity.
///
/// The key point is kept compressed and zeroized on drop or
/// [`discard`](IdentityKey::discard).
pub struct IdentityKey {
    identity: Identity,
    point: Zeroizing<[u8; 48]>,
}

impl IdentityKey {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Sign a message. Randomized: two signatures over the same message differ.
    pub fn sign(&self, message: &[u8]) -> Result<IdentitySignature, CryptoError> {
        // A zeroized encoding lacks the compression flag and never decodes.
        let point: G1Affine = Option::from(G1Affine::from_compressed_unchecked(&self.point))
            .ok_or_else(|| CryptoError::Signing("identity key has been discarded".into()))?;
        let r = random_scalar()?;
        let u = (identity_point(&self.identity) * r).to_affine();
        let h = challenge(message, &u);
        let v = (point * (r + h)).to_affine();
        Ok(IdentitySignature { u, v })
    }

    /// Overwrite the key point. The key can no longer sign.
    pub fn discard(&mut self) {
        self.zeroize();
    }

    pub fn is_discarded(&self) -> bool {
        self.point.iter().all(|b| *b == 0)
    }
}

impl Zeroize for IdentityKey {
    fn zeroize(&mut self) {
        self.point.zeroize();
    }
}

impl ZeroizeOnDrop for IdentityKey {}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityKey({})", self.identity)
    }
}

/// A Cha–Cheon signature `(U, V)`, both points in G1.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IdentitySignature {
    u: G1Affine,
    v: G1Affine,
}

impl IdentitySignature {
    pub fn to_bytes(&self) -> [u8; IDENTITY_SIGNATURE_LEN] {
        let mut out = [0u8; IDENTITY_SIGNATURE_LEN];
        out[..48].copy_from_slice(&self.u.to_compressed());
        out[48..].copy_from_slice(&self.v.to_compressed());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != IDENTITY_SIGNATURE_LEN {
            return Err(CryptoError::MalformedInput(format!(
                "identity signature must be {} bytes, got {}",
                IDENTITY_SIGNATURE_LEN,
                bytes.len()
            )));
        }
        let u = decode_g1(&bytes[..48])?;
        let v = decode_g1(&bytes[48..])?;
        Ok(Self { u, v })
    }
}

impl fmt::Debug for IdentitySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentitySignature({}...)", &hex::encode(self.to_bytes())[..16])
    }
}

fn decode_g1(bytes: &[u8]) -> Result<G1Affine, CryptoError> {
    let arr: [u8; 48] = bytes
        .try_into()
        .map_err(|_| CryptoError::MalformedInput("G1 point must be 48 bytes".into()))?;
    let point: G1Affine = Option::from(G1Affine::from_compressed(&arr))
        .ok_or_else(|| CryptoError::MalformedInput("not a valid G1 point".into()))?;
    if bool::from(point.is_identity()) {
        return Err(CryptoError::MalformedInput("identity point".into()));
    }
    Ok(point)
}
