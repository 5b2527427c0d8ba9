// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Curve arithmetic checked against k256 as an independent secp256k1

use broadcast_session::crypto::{Curve, ProjectivePoint, SessionId};
use k256::{elliptic_curve::sec1::ToEncodedPoint, SecretKey};
use num_bigint::BigUint;
use rand::rngs::OsRng;

fn k256_public_hex(private_key: &[u8; 32]) -> String {
    let secret = SecretKey::from_slice(private_key).unwrap();
    hex::encode(secret.public_key().to_encoded_point(false).as_bytes())
}

#[test]
fn test_fixed_session_id_matches_k256() {
    let id = SessionId::parse("7b7afb9b4f1c2d3e5a6b7c8d9e0f11223344556677889900aabbccddeeff9713")
        .unwrap();
    assert_eq!(id.key_pair().public_key_hex(), k256_public_hex(&id.to_bytes()));
}

#[test]
fn test_random_scalars_match_k256() {
    for _ in 0..10 {
        let secret = SecretKey::random(&mut OsRng);
        let bytes: [u8; 32] = secret.to_bytes().into();
        let id = SessionId::parse(&hex::encode(bytes)).unwrap();
        assert_eq!(id.key_pair().public_key_hex(), k256_public_hex(&bytes));
    }
}

#[test]
fn test_multiply_is_linear() {
    let curve = Curve::secp256k1();
    let g = ProjectivePoint::from_affine(curve.generator());
    let a = BigUint::from(123_456_789u64);
    let b = BigUint::from(987_654_321u64);

    let lhs = curve.add(&curve.multiply(&g, &a), &curve.multiply(&g, &b));
    let rhs = curve.multiply(&g, &(&a + &b));
    assert!(curve.point_eq(&lhs, &rhs));
}

#[test]
fn test_multiply_by_order_minus_one_is_negation() {
    let curve = Curve::secp256k1();
    let g = ProjectivePoint::from_affine(curve.generator());
    let k = curve.order() - BigUint::from(1u8);

    let result = curve.multiply(&g, &k);
    assert!(curve.point_eq(&result, &curve.negate(&g)));
}

#[test]
fn test_identity_is_absorbing_for_multiply() {
    let curve = Curve::secp256k1();
    let identity = ProjectivePoint::identity();
    assert!(curve.multiply(&identity, &BigUint::from(42u8)).is_identity());
    assert!(curve.to_affine(&identity).is_none());
}
