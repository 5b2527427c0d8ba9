// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Envelope seal/open and its JSON transport form

use broadcast_session::crypto::{
    aes_cbc, derive_key_material, open, parse_public_key, seal, CryptoError, EncryptedEnvelope,
    SessionId,
};

#[test]
fn test_roundtrip_through_json() {
    let id = SessionId::generate();
    let payload = br#"{"privKey":"0c5f","userInfo":{"verifier":"google"}}"#;

    let json = seal(id.key_pair().public_point(), payload)
        .unwrap()
        .to_json()
        .unwrap();
    let envelope = EncryptedEnvelope::from_json(&json).unwrap();

    assert_eq!(open(&id.scalar(), &envelope).unwrap(), payload.to_vec());
}

#[test]
fn test_ciphertext_uses_first_half_of_digest() {
    let id = SessionId::generate();
    let envelope = seal(id.key_pair().public_point(), b"layout check").unwrap();

    let ephemeral = parse_public_key(&hex::decode(&envelope.ephem_public_key).unwrap()).unwrap();
    let material = derive_key_material(&id.scalar(), &ephemeral).unwrap();
    let plaintext = aes_cbc::decrypt(
        &material.encryption_key,
        &hex::decode(&envelope.iv).unwrap(),
        &hex::decode(&envelope.ciphertext).unwrap(),
    )
    .unwrap();
    assert_eq!(plaintext, b"layout check");
}

#[test]
fn test_each_seal_uses_fresh_ephemeral_key_and_iv() {
    let id = SessionId::generate();
    let a = seal(id.key_pair().public_point(), b"same").unwrap();
    let b = seal(id.key_pair().public_point(), b"same").unwrap();
    assert_ne!(a.ephem_public_key, b.ephem_public_key);
    assert_ne!(a.iv, b.iv);
    assert_ne!(a.ciphertext, b.ciphertext);
}

#[test]
fn test_tampered_mac_rejected() {
    let id = SessionId::generate();
    let mut envelope = seal(id.key_pair().public_point(), b"payload").unwrap();
    envelope.mac = "00".repeat(32);
    assert!(matches!(
        open(&id.scalar(), &envelope),
        Err(CryptoError::DecryptionFailed { .. })
    ));
}

#[test]
fn test_non_hex_field_rejected() {
    let id = SessionId::generate();
    let mut envelope = seal(id.key_pair().public_point(), b"payload").unwrap();
    envelope.iv = "zz".to_string();
    assert!(matches!(
        open(&id.scalar(), &envelope),
        Err(CryptoError::InvalidPayload { .. })
    ));
}

#[test]
fn test_malformed_json_rejected() {
    assert!(EncryptedEnvelope::from_json("{\"iv\": 1}").is_err());
}
