//! Pairing-based cryptographic primitives for VISTA.
//!
//! BLS signatures over BLS12-381: public keys live in G2 (96 bytes
//! compressed), signatures in G1 (48 bytes compressed), and messages are
//! hashed to G1 with the standard SSWU hash-to-curve suite. Verification is
//! a single pairing equation, so it needs nothing but the signer's public key.

use std::fmt;

use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, Scalar};
use ff::Field;
use group::Curve;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

/// Hash-to-curve domain separation tag for signatures.
pub const SIGNATURE_DST: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_NUL_";

/// Encoded length of a secret key.
pub const SECRET_KEY_LEN: usize = 32;

/// Encoded length of a public key (compressed G2).
pub const PUBLIC_KEY_LEN: usize = 96;

/// Encoded length of a signature (compressed G1).
pub const SIGNATURE_LEN: usize = 48;

const SEED_CONTEXT: &str = "vista 2024-06 keypair seed v1";

/// Hash a message onto G1 under the given domain separation tag.
pub(crate) fn hash_to_g1(message: &[u8], dst: &[u8]) -> G1Affine {
    <G1Projective as HashToCurve<ExpandMsgXmd<sha2::Sha256>>>::hash_to_curve(message, dst)
        .to_affine()
}

/// Draw a uniformly random non-zero scalar from the OS CSPRNG.
pub(crate) fn random_scalar() -> Result<Scalar, CryptoError> {
    let mut wide = Zeroizing::new([0u8; 64]);
    OsRng
        .try_fill_bytes(&mut wide[..])
        .map_err(|e| CryptoError::CryptoInit(e.to_string()))?;
    let scalar = Scalar::from_bytes_wide(&wide);

    if scalar == Scalar::ZERO {
        return Err(CryptoError::CryptoInit("randomness source returned a degenerate scalar".into()));
    }
    Ok(scalar)
}

fn scalar_from_seed(seed: &[u8; 32]) -> Scalar {
    let mut hasher = blake3::Hasher::new_derive_key(SEED_CONTEXT);
    hasher.update(seed);
    let mut wide = Zeroizing::new([0u8; 64]);
    hasher.finalize_xof().fill(&mut wide[..]);
    Scalar::from_bytes_wide(&wide)
}

/// A participant or authority public key (a point in G2).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub(crate) G2Affine);

impl PublicKey {
    /// Compressed 96-byte encoding.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0.to_compressed()
    }

    /// Decode a compressed public key.
    ///
    /// Rejects wrong lengths, points off the curve or outside the prime-order
    /// subgroup, and the identity point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::MalformedInput(format!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            ))
        })?;
        let point: G2Affine = Option::from(G2Affine::from_compressed(&arr))
            .ok_or_else(|| CryptoError::MalformedInput("public key is not a valid G2 point".into()))?;
        if bool::from(point.is_identity()) {
            return Err(CryptoError::MalformedInput("public key is the identity point".into()));
        }
        Ok(Self(point))
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        verify(self, message, signature)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

/// A BLS signature (a point in G1).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub(crate) G1Affine);

impl Signature {
    /// Compressed 48-byte encoding.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0.to_compressed()
    }

    /// Decode a compressed signature.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::MalformedInput(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            ))
        })?;
        let point: G1Affine = Option::from(G1Affine::from_compressed(&arr))
            .ok_or_else(|| CryptoError::MalformedInput("signature is not a valid G1 point".into()))?;
        if bool::from(point.is_identity()) {
            return Err(CryptoError::MalformedInput("signature is the identity point".into()));
        }
        Ok(Self(point))
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

/// A secret signing scalar.
///
/// Held as its canonical encoding, which is zeroized when the key is dropped
/// or [`discard`](SecretKey::discard)ed; a discarded key refuses to sign.
pub struct SecretKey {
    bytes: Zeroizing<[u8; SECRET_KEY_LEN]>,
}

impl SecretKey {
    fn from_scalar(scalar: Scalar) -> Self {
        Self {
            bytes: Zeroizing::new(scalar.to_bytes()),
        }
    }

    /// Generate a fresh random secret key.
    pub fn generate() -> Result<Self, CryptoError> {
        random_scalar().map(Self::from_scalar)
    }

    /// Derive a secret key deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_scalar(scalar_from_seed(seed))
    }

    /// Little-endian 32-byte encoding of the scalar.
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_LEN] {
        *self.bytes
    }

    /// Decode a secret key. Non-canonical and zero scalars are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: Zeroizing<[u8; SECRET_KEY_LEN]> =
            Zeroizing::new(bytes.try_into().map_err(|_| {
                CryptoError::MalformedInput(format!(
                    "secret key must be {} bytes, got {}",
                    SECRET_KEY_LEN,
                    bytes.len()
                ))
            })?);
        let scalar: Scalar = Option::from(Scalar::from_bytes(&arr))
            .ok_or_else(|| CryptoError::MalformedInput("secret key is not a canonical scalar".into()))?;
        if scalar == Scalar::ZERO {
            return Err(CryptoError::MalformedInput("secret key is zero".into()));
        }
        Ok(Self { bytes: arr })
    }

    /// The scalar behind the encoding. Zero once discarded.
    pub(crate) fn scalar(&self) -> Scalar {
        Option::from(Scalar::from_bytes(&self.bytes)).unwrap_or(Scalar::ZERO)
    }

    /// The public key matching this secret.
    pub fn public_key(&self) -> PublicKey {
        PublicKey((G2Affine::generator() * self.scalar()).to_affine())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        sign(self, message)
    }

    /// Overwrite the key material. The key can no longer sign.
    pub fn discard(&mut self) {
        self.zeroize();
    }

    /// Whether the key material has been discarded.
    pub fn is_discarded(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.bytes.zeroize();
    }
}

// `Zeroizing` wipes the encoding on drop.
impl ZeroizeOnDrop for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_discarded() {
            write!(f, "SecretKey(<discarded>)")
        } else {
            write!(f, "SecretKey({:?})", self.public_key())
        }
    }
}

/// The authority's master key pair.
///
/// Generated once when an authority starts. The secret half is never
/// encoded by anything in this workspace.
pub struct AuthorityKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl AuthorityKeyPair {
    /// Generate a new random master key pair.
    pub fn generate() -> Result<Self, CryptoError> {
        let secret = SecretKey::generate()?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let secret = SecretKey::from_seed(seed);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Get the master public key.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Sign a message with the master secret.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        self.secret.sign(message)
    }

    pub(crate) fn master_scalar(&self) -> Scalar {
        self.secret.scalar()
    }

    /// Wipe the master secret. Subsequent signing fails.
    pub fn discard(&mut self) {
        self.secret.discard();
    }
}

impl fmt::Debug for AuthorityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorityKeyPair({:?})", self.public)
    }
}

/// Generate the authority master key pair from the OS CSPRNG.
pub fn generate_master_keypair() -> Result<AuthorityKeyPair, CryptoError> {
    AuthorityKeyPair::generate()
}

/// Generate a participant key pair from the OS CSPRNG.
pub fn generate_participant_keypair() -> Result<(PublicKey, SecretKey), CryptoError> {
    let secret = SecretKey::generate()?;
    Ok((secret.public_key(), secret))
}

/// Sign a message. Deterministic for a given key and message.
pub fn sign(secret_key: &SecretKey, message: &[u8]) -> Result<Signature, CryptoError> {
    if secret_key.is_discarded() {
        return Err(CryptoError::Signing("secret key has been discarded".into()));
    }
    let point = hash_to_g1(message, SIGNATURE_DST);
    Ok(Signature((point * secret_key.scalar()).to_affine()))
}

/// Verify a signature: `e(sig, g2) == e(H(m), pk)`.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    let point = hash_to_g1(message, SIGNATURE_DST);
    pairing(&signature.0, &G2Affine::generator()) == pairing(&point, &public_key.0)
}

/// Verify over raw encodings.
///
/// Structurally invalid encodings are `MalformedInput`; a well-formed
/// signature that does not match is `Ok(false)`.
pub fn verify_encoded(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, CryptoError> {
    let public_key = PublicKey::from_bytes(public_key)?;
    let signature = Signature::from_bytes(signature)?;
    Ok(verify(&public_key, message, &signature))
}
