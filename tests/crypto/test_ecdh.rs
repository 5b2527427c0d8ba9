// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDH key agreement: reciprocity and agreement with k256's ECDH

use broadcast_session::crypto::{
    derive_shared_key, ecdh::derive_shared_key_from_bytes, CryptoError, KeyPair, SessionId,
};
use k256::{
    ecdh::diffie_hellman,
    elliptic_curve::sec1::ToEncodedPoint,
    SecretKey,
};
use num_bigint::BigUint;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};

#[test]
fn test_reciprocity() {
    for _ in 0..5 {
        let d = KeyPair::random();
        let e = KeyPair::random();
        assert_eq!(
            derive_shared_key(d.private_scalar(), e.public_point()).unwrap(),
            derive_shared_key(e.private_scalar(), d.public_point()).unwrap(),
        );
    }
}

#[test]
fn test_matches_k256_shared_secret() {
    for _ in 0..5 {
        let local = SecretKey::random(&mut OsRng);
        let remote = SecretKey::random(&mut OsRng);

        let shared = diffie_hellman(local.to_nonzero_scalar(), remote.public_key().as_affine());
        // Minimal big-endian X, as an unsigned integer would serialize it
        let x = BigUint::from_bytes_be(shared.raw_secret_bytes().as_slice()).to_bytes_be();
        let expected = Sha512::digest(&x);

        let remote_pub = remote.public_key().to_encoded_point(false);
        let ours = derive_shared_key_from_bytes(remote_pub.as_bytes(), &local.to_bytes()).unwrap();
        assert_eq!(&ours[..], &expected[..32]);
    }
}

#[test]
fn test_shared_x_with_leading_zero_byte_is_hashed_minimal() {
    // x(0x1d · 0x56 · G) = 00a9f581...e287, one leading zero byte
    let d = SessionId::parse("1d").unwrap().key_pair();
    let e = SessionId::parse("56").unwrap().key_pair();
    let shared_x =
        hex::decode("00a9f58156a28eb3eea12d742ab5a2c37aece78258bceca0a434dd4cabe0e287").unwrap();

    let minimal = Sha512::digest(&shared_x[1..]);
    let padded = Sha512::digest(&shared_x);
    assert_eq!(
        hex::encode(&minimal[..32]),
        "253e553bb3028dd300d23d09e2a8d2912533ca285d6cbc716bc1d782bb1398bb"
    );

    let de = derive_shared_key(d.private_scalar(), e.public_point()).unwrap();
    let ed = derive_shared_key(e.private_scalar(), d.public_point()).unwrap();
    assert_eq!(de, ed);
    assert_eq!(&de[..], &minimal[..32]);
    assert_ne!(&de[..], &padded[..32]);
}

#[test]
fn test_compressed_and_uncompressed_agree() {
    let local = SecretKey::random(&mut OsRng);
    let remote = SecretKey::random(&mut OsRng).public_key();

    let a = derive_shared_key_from_bytes(remote.to_encoded_point(true).as_bytes(), &local.to_bytes())
        .unwrap();
    let b = derive_shared_key_from_bytes(remote.to_encoded_point(false).as_bytes(), &local.to_bytes())
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_invalid_public_keys() {
    let local = SecretKey::random(&mut OsRng).to_bytes();

    for bad in [vec![0u8; 20], vec![0x00], vec![0x04; 65], vec![0x05; 33]] {
        let result = derive_shared_key_from_bytes(&bad, &local);
        assert!(
            matches!(result, Err(CryptoError::InvalidPublicKey { .. })),
            "accepted {:?}",
            hex::encode(&bad)
        );
    }
}
