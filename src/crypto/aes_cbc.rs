// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! AES-256-CBC Encryption/Decryption
//!
//! PKCS#7-padded AES-256 in CBC mode. The IV is always supplied by the
//! caller; decryption must be given the IV that encryption used.
//!
//! This mode has no integrity of its own. Session payloads go through
//! [`super::envelope`], which checks an HMAC before calling [`decrypt`].

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use super::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;

fn check_sizes(key: &[u8], iv: &[u8]) -> Result<(), CryptoError> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKey {
            key_type: "aes_key".to_string(),
            reason: format!("expected {} bytes, got {}", KEY_SIZE, key.len()),
        });
    }
    if iv.len() != IV_SIZE {
        return Err(CryptoError::InvalidPayload {
            field: "iv".to_string(),
            reason: format!("expected {} bytes, got {}", IV_SIZE, iv.len()),
        });
    }
    Ok(())
}

/// Encrypt `plaintext` with AES-256-CBC / PKCS#7
///
/// # Arguments
///
/// * `key` - 32-byte key (normally from [`super::ecdh::derive_key_material`])
/// * `iv` - 16-byte initialization vector
/// * `plaintext` - Data to encrypt (any length, including empty)
pub fn encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_sizes(key, iv)?;
    let cipher = Aes256CbcEnc::new_from_slices(key, iv).map_err(|e| {
        CryptoError::EncryptionFailed {
            reason: format!("failed to create cipher: {}", e),
        }
    })?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt AES-256-CBC / PKCS#7 ciphertext
///
/// # Errors
///
/// Returns `DecryptionFailed` if the ciphertext is not block aligned or the
/// padding does not validate (which is also what a wrong key or IV looks like).
pub fn decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_sizes(key, iv)?;
    let cipher = Aes256CbcDec::new_from_slices(key, iv).map_err(|e| {
        CryptoError::DecryptionFailed {
            operation: "aes_cbc".to_string(),
            reason: format!("failed to create cipher: {}", e),
        }
    })?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed {
            operation: "aes_cbc".to_string(),
            reason: "ciphertext did not decrypt under this key and iv".to_string(),
        })
}
