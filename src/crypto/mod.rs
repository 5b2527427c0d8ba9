// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Cryptography
//!
//! The primitives behind the broadcast session protocol:
//!
//! - **Curve**: projective secp256k1 arithmetic (add, double, scalar multiply)
//! - **ECDH**: shared key material from a private scalar and a remote point
//! - **AES-CBC**: AES-256-CBC with PKCS#7 padding and a caller-supplied IV
//! - **Signature**: Keccak-256 + RFC 6979 ECDSA, low-S, DER-hex encoded
//! - **Envelope**: ECIES-style seal/open with an HMAC-SHA256 check
//! - **Keys**: session ids and the key pairs derived from them
//!
//! ## Security Considerations
//!
//! - A session id *is* a private key; it is never logged in full
//! - Envelope MACs are verified before ciphertext is decrypted
//! - Every operation here is pure and safe to call from any thread

pub mod aes_cbc;
pub mod curve;
pub mod ecdh;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod signature;

pub use curve::{AffinePoint, Curve, ProjectivePoint};
pub use ecdh::{derive_key_material, derive_shared_key, parse_public_key, SharedKeyMaterial};
pub use envelope::{open, seal, EncryptedEnvelope};
pub use error::CryptoError;
pub use keys::{KeyPair, SessionId};
pub use signature::{keccak256, sign, verify, EcdsaSignature};
