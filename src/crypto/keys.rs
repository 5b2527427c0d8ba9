// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Identifiers and Key Pairs
//!
//! A session id is a random 256-bit scalar written as 64 lower-case hex
//! characters. It is both the lookup handle for a login attempt and the
//! private key of that session, so the key pair is a pure function of it and
//! is recomputed whenever needed instead of being cached alongside it.

use k256::SecretKey;
use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;
use std::fmt;

use super::curve::{to_fixed_32, AffinePoint, Curve};
use super::error::CryptoError;

/// 64-char hex encoding of a valid secp256k1 private scalar
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh random session id from the OS RNG
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        Self(hex::encode(secret.to_bytes()))
    }

    /// Parse a hex session id, accepting an optional `0x` prefix and
    /// fewer than 64 digits (left-padded).
    pub fn parse(value: &str) -> Result<Self, CryptoError> {
        let trimmed = value.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 64 {
            return Err(CryptoError::InvalidKey {
                key_type: "session_id".to_string(),
                reason: format!("expected 1-64 hex digits, got {}", digits.len()),
            });
        }
        // parse_bytes alone would also take a sign and `_` separators
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CryptoError::InvalidKey {
                key_type: "session_id".to_string(),
                reason: "not a hex string".to_string(),
            });
        }
        let scalar = BigUint::parse_bytes(digits.as_bytes(), 16).ok_or_else(|| {
            CryptoError::InvalidKey {
                key_type: "session_id".to_string(),
                reason: "not a hex string".to_string(),
            }
        })?;
        validate_scalar(&scalar)?;
        Ok(Self(hex::encode(to_fixed_32(&scalar))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The private scalar this id encodes
    pub fn scalar(&self) -> BigUint {
        BigUint::parse_bytes(self.0.as_bytes(), 16).unwrap_or_default()
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        to_fixed_32(&self.scalar())
    }

    pub fn key_pair(&self) -> KeyPair {
        KeyPair::from_scalar(self.scalar())
    }

    /// Short non-secret prefix for log lines
    pub fn log_prefix(&self) -> &str {
        &self.0[..8]
    }
}

// Never print the full id: it is a private key.
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}…)", self.log_prefix())
    }
}

/// Private scalar and its public point `d·G`
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    private_scalar: BigUint,
    public_point: AffinePoint,
}

impl KeyPair {
    fn from_scalar(private_scalar: BigUint) -> Self {
        let curve = Curve::secp256k1();
        // A validated scalar is in [1, n) so d·G is never the identity
        let public_point = curve
            .to_affine(&curve.multiply_generator(&private_scalar))
            .unwrap_or_else(|| curve.generator().clone());
        Self {
            private_scalar,
            public_point,
        }
    }

    /// Fresh random key pair (used for per-envelope ephemeral keys)
    pub fn random() -> Self {
        SessionId::generate().key_pair()
    }

    pub fn private_scalar(&self) -> &BigUint {
        &self.private_scalar
    }

    pub fn private_key_bytes(&self) -> [u8; 32] {
        to_fixed_32(&self.private_scalar)
    }

    pub fn public_point(&self) -> &AffinePoint {
        &self.public_point
    }

    /// Uncompressed SEC1 public key, hex-encoded (130 chars, `04` prefix)
    pub fn public_key_hex(&self) -> String {
        self.public_point.to_hex()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// `0 < scalar < n`
pub fn validate_scalar(scalar: &BigUint) -> Result<(), CryptoError> {
    if scalar.is_zero() {
        return Err(CryptoError::InvalidKey {
            key_type: "private_scalar".to_string(),
            reason: "scalar is zero".to_string(),
        });
    }
    if scalar >= Curve::secp256k1().order() {
        return Err(CryptoError::InvalidKey {
            key_type: "private_scalar".to_string(),
            reason: "scalar is not below the curve order".to_string(),
        });
    }
    Ok(())
}
