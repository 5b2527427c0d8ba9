// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Error Types
//!
//! Error type shared by every primitive in [`crate::crypto`], with enough
//! context to tell which operation failed without leaking key material.
//!
//! ## Error Variants
//!
//! - **InvalidPublicKey**: remote point is malformed, off-curve or the identity
//! - **InvalidKey**: local key material has the wrong size or is out of range
//! - **DecryptionFailed**: MAC mismatch, wrong key/iv or bad padding
//! - **EncryptionFailed**: cipher could not be initialized
//! - **SigningFailed**: no valid (r, s) could be produced
//! - **InvalidPayload**: envelope field missing or not decodable
//!
//! ## Usage Example
//!
//! ```rust
//! use broadcast_session::crypto::CryptoError;
//!
//! fn open(ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
//!     Err(CryptoError::DecryptionFailed {
//!         operation: "envelope_open".to_string(),
//!         reason: "mac mismatch".to_string(),
//!     })
//! }
//! ```

use std::fmt;

/// Error type for all cryptographic operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The counterparty public key cannot be used for key agreement
    ///
    /// This error occurs when:
    /// - Encoding is neither 33-byte compressed nor 65-byte uncompressed SEC1
    /// - The point does not satisfy the curve equation
    /// - The point (or the shared point) is the identity
    InvalidPublicKey {
        /// Specific failure reason
        reason: String,
    },

    /// Invalid local key material
    InvalidKey {
        /// Type of key that failed (e.g., "session_private_key", "aes_key")
        key_type: String,
        /// Specific failure reason
        reason: String,
    },

    /// Decryption failed
    ///
    /// Padding failures and wrong-key failures are reported identically.
    DecryptionFailed {
        /// Which operation was being performed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// Encryption could not be performed
    EncryptionFailed {
        /// Specific failure reason
        reason: String,
    },

    /// ECDSA signing produced no usable signature
    SigningFailed {
        /// Specific failure reason
        reason: String,
    },

    /// Envelope or encoded field validation failed
    InvalidPayload {
        /// Which field failed validation
        field: String,
        /// Specific failure reason
        reason: String,
    },
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidPublicKey { reason } => {
                write!(f, "Invalid public key: {}", reason)
            }
            CryptoError::InvalidKey { key_type, reason } => {
                write!(f, "Invalid key ({}): {}", key_type, reason)
            }
            CryptoError::DecryptionFailed { operation, reason } => {
                write!(f, "Decryption failed during {}: {}", operation, reason)
            }
            CryptoError::EncryptionFailed { reason } => {
                write!(f, "Encryption failed: {}", reason)
            }
            CryptoError::SigningFailed { reason } => {
                write!(f, "Signing failed: {}", reason)
            }
            CryptoError::InvalidPayload { field, reason } => {
                write!(f, "Invalid payload field '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for CryptoError {}

// Conversion from hex decode errors
impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        CryptoError::InvalidPayload {
            field: "hex_field".to_string(),
            reason: format!("hex decode error: {}", err),
        }
    }
}

// Conversion from k256 errors (signature assembly)
impl From<k256::ecdsa::Error> for CryptoError {
    fn from(err: k256::ecdsa::Error) -> Self {
        CryptoError::SigningFailed {
            reason: format!("k256 error: {}", err),
        }
    }
}
