// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDH Key Agreement
//!
//! Derives symmetric key material from a local private scalar and a remote
//! secp256k1 point. The shared point's X coordinate (big-endian, minimal
//! length) is hashed with SHA-512; the first half of the digest is the
//! AES-256 key and the second half keys the envelope MAC.

use num_bigint::BigUint;
use sha2::{Digest, Sha512};

use super::curve::{AffinePoint, Curve, ProjectivePoint};
use super::error::CryptoError;
use super::keys::validate_scalar;

/// Both halves of `SHA-512(x(S))`
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKeyMaterial {
    pub encryption_key: [u8; 32],
    pub mac_key: [u8; 32],
}

/// Compute the shared point's X coordinate as minimal big-endian bytes
fn shared_x(private_scalar: &BigUint, remote_public: &AffinePoint) -> Result<Vec<u8>, CryptoError> {
    let curve = Curve::secp256k1();
    validate_scalar(private_scalar)?;

    if !curve.is_on_curve(remote_public) {
        return Err(CryptoError::InvalidPublicKey {
            reason: "point is not on the curve".to_string(),
        });
    }

    let shared = curve.multiply(&ProjectivePoint::from_affine(remote_public), private_scalar);
    let shared = curve
        .to_affine(&shared)
        .ok_or_else(|| CryptoError::InvalidPublicKey {
            reason: "shared point is the identity".to_string(),
        })?;

    Ok(shared.x.to_bytes_be())
}

/// Derive encryption and MAC keys from `d · Q`
pub fn derive_key_material(
    private_scalar: &BigUint,
    remote_public: &AffinePoint,
) -> Result<SharedKeyMaterial, CryptoError> {
    let x = shared_x(private_scalar, remote_public)?;
    let digest = Sha512::digest(&x);

    let mut encryption_key = [0u8; 32];
    let mut mac_key = [0u8; 32];
    encryption_key.copy_from_slice(&digest[..32]);
    mac_key.copy_from_slice(&digest[32..]);

    Ok(SharedKeyMaterial {
        encryption_key,
        mac_key,
    })
}

/// Derive the 32-byte AES-256 key shared between `d` and `Q`
///
/// # Example
///
/// ```ignore
/// let key = derive_shared_key(session.private_scalar(), &ephemeral_public)?;
/// ```
pub fn derive_shared_key(
    private_scalar: &BigUint,
    remote_public: &AffinePoint,
) -> Result<[u8; 32], CryptoError> {
    Ok(derive_key_material(private_scalar, remote_public)?.encryption_key)
}

/// Parse a SEC1-encoded remote public key.
///
/// Supports both compressed (33 bytes) and uncompressed (65 bytes) formats;
/// the single-byte identity encoding is rejected explicitly.
pub fn parse_public_key(bytes: &[u8]) -> Result<AffinePoint, CryptoError> {
    if bytes == [0x00] {
        return Err(CryptoError::InvalidPublicKey {
            reason: "point at infinity".to_string(),
        });
    }
    Curve::secp256k1().decode_point(bytes)
}

/// Byte-oriented variant used at the wire boundary
pub fn derive_shared_key_from_bytes(
    remote_public: &[u8],
    private_key: &[u8],
) -> Result<[u8; 32], CryptoError> {
    if private_key.len() != 32 {
        return Err(CryptoError::InvalidKey {
            key_type: "private_key".to_string(),
            reason: format!("expected 32 bytes, got {}", private_key.len()),
        });
    }
    let remote = parse_public_key(remote_public)?;
    derive_shared_key(&BigUint::from_bytes_be(private_key), &remote)
}
