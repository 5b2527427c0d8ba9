// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDSA Request Signing
//!
//! Signs store requests with the session's private scalar so the broadcast
//! server can authenticate writes to a session record.
//!
//! ## Signature Format
//! - Message digest: Keccak-256 of the raw message bytes
//! - Nonce: RFC 6979 HMAC-DRBG (HMAC-SHA256) seeded with the private key and
//!   the digest reduced mod n, so the same (key, message) always signs the same
//! - `s` normalized to the lower half of the order
//! - Transport: DER `SEQUENCE { INTEGER r, INTEGER s }`, hex-encoded

use hmac::{Hmac, Mac};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::point::AffineCoordinates;
use k256::elliptic_curve::scalar::IsHigh;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, ProjectivePoint, Scalar, U256};
use num_bigint::BigUint;
use sha2::Sha256;
use tiny_keccak::{Hasher, Keccak};

use super::curve::{AffinePoint, Curve};
use super::error::CryptoError;

/// Candidates drawn from the DRBG before giving up.
///
/// Each retry has probability ~2^-128 of being needed.
const MAX_SIGN_ATTEMPTS: usize = 16;

type HmacSha256 = Hmac<Sha256>;

/// Keccak-256 digest (Ethereum flavour, not NIST SHA3-256)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut hash);
    hash
}

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 32], CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|e| {
        CryptoError::SigningFailed {
            reason: format!("hmac init failed: {}", e),
        }
    })?;
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// RFC 6979 §3.2 HMAC-DRBG for secp256k1 (qlen = hlen = 256)
struct NonceGenerator {
    k: [u8; 32],
    v: [u8; 32],
    drawn: usize,
}

impl NonceGenerator {
    fn new(private_key: &[u8; 32], reduced_digest: &[u8; 32]) -> Result<Self, CryptoError> {
        let v = [0x01u8; 32];
        let k = [0x00u8; 32];

        let k = hmac_sha256(&k, &[&v, &[0x00], private_key, reduced_digest])?;
        let v = hmac_sha256(&k, &[&v])?;
        let k = hmac_sha256(&k, &[&v, &[0x01], private_key, reduced_digest])?;
        let v = hmac_sha256(&k, &[&v])?;

        Ok(Self { k, v, drawn: 0 })
    }

    /// Next nonce candidate. Every call after the first reseeds with
    /// `K = HMAC_K(V ‖ 0x00)`, `V = HMAC_K(V)` as step h.3 requires.
    fn next_candidate(&mut self) -> Result<[u8; 32], CryptoError> {
        if self.drawn > 0 {
            self.k = hmac_sha256(&self.k, &[&self.v, &[0x00]])?;
            self.v = hmac_sha256(&self.k, &[&self.v])?;
        }
        self.drawn += 1;
        self.v = hmac_sha256(&self.k, &[&self.v])?;
        Ok(self.v)
    }
}

/// Low-S ECDSA signature over secp256k1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdsaSignature {
    inner: Signature,
}

impl EcdsaSignature {
    pub fn r_bytes(&self) -> [u8; 32] {
        self.inner.r().to_bytes().into()
    }

    pub fn s_bytes(&self) -> [u8; 32] {
        self.inner.s().to_bytes().into()
    }

    /// `s ≤ n/2`
    pub fn is_low_s(&self) -> bool {
        let half_order = Curve::secp256k1().order() >> 1usize;
        BigUint::from_bytes_be(&self.s_bytes()) <= half_order
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.inner.to_der().as_bytes().to_vec()
    }

    pub fn to_der_hex(&self) -> String {
        hex::encode(self.to_der())
    }
}

fn scalar_from_bytes(bytes: &[u8; 32]) -> Option<Scalar> {
    let scalar: Option<Scalar> = Scalar::from_repr(FieldBytes::clone_from_slice(bytes)).into();
    scalar.filter(|s| !bool::from(s.is_zero()))
}

/// Sign a 32-byte digest with a deterministic nonce
pub fn sign_prehash(private_key: &[u8; 32], digest: &[u8; 32]) -> Result<EcdsaSignature, CryptoError> {
    let d = scalar_from_bytes(private_key).ok_or_else(|| CryptoError::InvalidKey {
        key_type: "signing_key".to_string(),
        reason: "private scalar must be in [1, n)".to_string(),
    })?;

    let z = <Scalar as Reduce<U256>>::reduce_bytes(FieldBytes::from_slice(digest));
    let reduced_digest: [u8; 32] = z.to_bytes().into();
    let mut nonces = NonceGenerator::new(private_key, &reduced_digest)?;

    for _ in 0..MAX_SIGN_ATTEMPTS {
        let candidate = nonces.next_candidate()?;
        let k = match scalar_from_bytes(&candidate) {
            Some(k) => k,
            None => continue,
        };

        let r_point = (ProjectivePoint::GENERATOR * k).to_affine();
        let r = <Scalar as Reduce<U256>>::reduce_bytes(&r_point.x());
        if bool::from(r.is_zero()) {
            continue;
        }

        let k_inv: Option<Scalar> = k.invert().into();
        let k_inv = match k_inv {
            Some(k_inv) => k_inv,
            None => continue,
        };

        let s = k_inv * (z + r * d);
        if bool::from(s.is_zero()) {
            continue;
        }
        let s = if bool::from(s.is_high()) { -s } else { s };

        let inner = Signature::from_scalars(r.to_bytes(), s.to_bytes())?;
        return Ok(EcdsaSignature { inner });
    }

    Err(CryptoError::SigningFailed {
        reason: format!("no valid nonce after {} attempts", MAX_SIGN_ATTEMPTS),
    })
}

/// Sign `message` (hashed with Keccak-256)
///
/// # Example
///
/// ```ignore
/// let sig = sign(&session.to_bytes(), envelope_json.as_bytes())?;
/// let transport = sig.to_der_hex();
/// ```
pub fn sign(private_key: &[u8; 32], message: &[u8]) -> Result<EcdsaSignature, CryptoError> {
    sign_prehash(private_key, &keccak256(message))
}

/// Verify a DER-hex signature over `message`.
///
/// High-S signatures are accepted: they are normalized before verification.
pub fn verify(public_key: &AffinePoint, message: &[u8], der_hex: &str) -> Result<bool, CryptoError> {
    let der = hex::decode(der_hex.trim_start_matches("0x"))?;
    let signature = Signature::from_der(&der).map_err(|e| CryptoError::InvalidPayload {
        field: "signature".to_string(),
        reason: format!("not a DER ECDSA signature: {}", e),
    })?;
    let signature = signature.normalize_s().unwrap_or(signature);

    let verifying_key = VerifyingKey::from_sec1_bytes(&public_key.to_uncompressed()).map_err(|e| {
        CryptoError::InvalidPublicKey {
            reason: format!("k256 rejected point: {}", e),
        }
    })?;

    Ok(verifying_key
        .verify_prehash(&keccak256(message), &signature)
        .is_ok())
}
