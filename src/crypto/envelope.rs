// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encrypted Envelope
//!
//! Seals session payloads for a recipient public key and opens them with the
//! matching private scalar.
//!
//! **Wire Format** (JSON, every field lower-case hex):
//! ```text
//! { "iv": 16 bytes, "ephemPublicKey": 65 bytes (04‖x‖y),
//!   "ciphertext": AES-256-CBC/PKCS#7, "mac": HMAC-SHA256 (32 bytes) }
//! ```
//!
//! Keys come from `SHA-512(x(e·Q))`: the first half drives the cipher and the
//! second half keys the MAC over `iv ‖ ephemPublicKey ‖ ciphertext`. The MAC
//! is checked before any decryption is attempted.

use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::aes_cbc::{self, IV_SIZE};
use super::curve::AffinePoint;
use super::ecdh::{derive_key_material, parse_public_key};
use super::error::CryptoError;
use super::keys::KeyPair;
use num_bigint::BigUint;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded envelope as exchanged through the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    pub iv: String,
    pub ephem_public_key: String,
    pub ciphertext: String,
    pub mac: String,
}

impl EncryptedEnvelope {
    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string(self).map_err(|e| CryptoError::InvalidPayload {
            field: "envelope".to_string(),
            reason: format!("serialization failed: {}", e),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json).map_err(|e| CryptoError::InvalidPayload {
            field: "envelope".to_string(),
            reason: format!("not an envelope: {}", e),
        })
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(value).map_err(|e| CryptoError::InvalidPayload {
        field: name.to_string(),
        reason: format!("hex decode error: {}", e),
    })
}

fn compute_mac(
    mac_key: &[u8],
    iv: &[u8],
    ephem_public_key: &[u8],
    ciphertext: &[u8],
) -> Result<HmacSha256, CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key).map_err(|e| {
        CryptoError::InvalidKey {
            key_type: "mac_key".to_string(),
            reason: e.to_string(),
        }
    })?;
    mac.update(iv);
    mac.update(ephem_public_key);
    mac.update(ciphertext);
    Ok(mac)
}

/// Encrypt `plaintext` for `recipient` under a fresh ephemeral key
///
/// # Example
///
/// ```ignore
/// let envelope = seal(session.key_pair().public_point(), payload.as_bytes())?;
/// store.set(key, envelope.to_json()?, signature, timeout).await?;
/// ```
pub fn seal(recipient: &AffinePoint, plaintext: &[u8]) -> Result<EncryptedEnvelope, CryptoError> {
    let ephemeral = KeyPair::random();
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    seal_with(&ephemeral, &iv, recipient, plaintext)
}

/// Deterministic core of [`seal`], split out so tests can pin the IV
fn seal_with(
    ephemeral: &KeyPair,
    iv: &[u8; IV_SIZE],
    recipient: &AffinePoint,
    plaintext: &[u8],
) -> Result<EncryptedEnvelope, CryptoError> {
    let material = derive_key_material(ephemeral.private_scalar(), recipient)?;
    let ciphertext = aes_cbc::encrypt(&material.encryption_key, iv, plaintext)?;
    let ephem_public_key = ephemeral.public_point().to_uncompressed();

    let mac = compute_mac(&material.mac_key, iv, &ephem_public_key, &ciphertext)?
        .finalize()
        .into_bytes();

    Ok(EncryptedEnvelope {
        iv: hex::encode(iv),
        ephem_public_key: hex::encode(ephem_public_key),
        ciphertext: hex::encode(ciphertext),
        mac: hex::encode(mac),
    })
}

/// Verify and decrypt an envelope addressed to `private_scalar`
///
/// # Errors
///
/// - `InvalidPayload` if a field is not hex or the IV has the wrong size
/// - `InvalidPublicKey` if the ephemeral key is malformed or the identity
/// - `DecryptionFailed` if the MAC does not verify or the cipher rejects it
pub fn open(private_scalar: &BigUint, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, CryptoError> {
    let iv = decode_field("iv", &envelope.iv)?;
    let ephem_public_key = decode_field("ephemPublicKey", &envelope.ephem_public_key)?;
    let ciphertext = decode_field("ciphertext", &envelope.ciphertext)?;
    let mac = decode_field("mac", &envelope.mac)?;

    if iv.len() != IV_SIZE {
        return Err(CryptoError::InvalidPayload {
            field: "iv".to_string(),
            reason: format!("expected {} bytes, got {}", IV_SIZE, iv.len()),
        });
    }

    let ephemeral = parse_public_key(&ephem_public_key)?;
    let material = derive_key_material(private_scalar, &ephemeral)?;

    compute_mac(&material.mac_key, &iv, &ephem_public_key, &ciphertext)?
        .verify_slice(&mac)
        .map_err(|_| CryptoError::DecryptionFailed {
            operation: "envelope_open".to_string(),
            reason: "mac mismatch".to_string(),
        })?;

    aes_cbc::decrypt(&material.encryption_key, &iv, &ciphertext)
}
