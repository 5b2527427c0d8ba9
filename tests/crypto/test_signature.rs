// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request signing: determinism, low-S and verification by k256

use broadcast_session::crypto::{keccak256, sign, verify, SessionId};
use k256::ecdsa::{signature::hazmat::PrehashVerifier, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

#[test]
fn test_signature_is_deterministic() {
    let id = SessionId::generate();
    let data = r#"{"iv":"00","ephemPublicKey":"04","ciphertext":"","mac":""}"#;
    assert_eq!(
        sign(&id.to_bytes(), data.as_bytes()).unwrap().to_der_hex(),
        sign(&id.to_bytes(), data.as_bytes()).unwrap().to_der_hex()
    );
}

#[test]
fn test_signatures_are_canonical() {
    let id = SessionId::generate();
    for i in 0..32 {
        let sig = sign(&id.to_bytes(), format!("request {}", i).as_bytes()).unwrap();
        assert!(sig.is_low_s(), "high-S signature for message {}", i);
    }
}

#[test]
fn test_k256_verifies_our_signatures() {
    let id = SessionId::generate();
    let message = b"store/set body";
    let der = hex::decode(sign(&id.to_bytes(), message).unwrap().to_der_hex()).unwrap();

    let public = hex::decode(id.key_pair().public_key_hex()).unwrap();
    let verifying_key = VerifyingKey::from_sec1_bytes(&public).unwrap();
    let signature = Signature::from_der(&der).unwrap();
    assert!(verifying_key
        .verify_prehash(&keccak256(message), &signature)
        .is_ok());
}

#[test]
fn test_verify_accepts_high_s_form() {
    let id = SessionId::generate();
    let message = b"migration window";
    let sig = sign(&id.to_bytes(), message).unwrap();

    // s' = n - s is the same signature in high-S form
    let low = Signature::from_der(&sig.to_der()).unwrap();
    let (r, s) = low.split_scalars();
    let high = Signature::from_scalars(r.to_bytes(), (-*s).to_bytes()).unwrap();
    let high_hex = hex::encode(high.to_der().as_bytes());

    assert!(verify(id.key_pair().public_point(), message, &high_hex).unwrap());
}

#[test]
fn test_verify_rejects_other_key() {
    let signer = SessionId::generate();
    let other = SessionId::generate();
    let sig = sign(&signer.to_bytes(), b"hello").unwrap().to_der_hex();
    assert!(!verify(other.key_pair().public_point(), b"hello", &sig).unwrap());
}

#[test]
fn test_public_key_hex_is_sec1_uncompressed() {
    let id = SessionId::generate();
    let secret = k256::SecretKey::from_slice(&id.to_bytes()).unwrap();
    let expected = secret.public_key().to_encoded_point(false);
    assert_eq!(id.key_pair().public_key_hex(), hex::encode(expected.as_bytes()));
}
