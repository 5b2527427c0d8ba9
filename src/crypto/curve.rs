// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Elliptic Curve Point Arithmetic
//!
//! Projective-coordinate arithmetic over a short Weierstrass curve
//! `y^2 = x^3 + ax + b (mod p)`. Points are kept as `(X : Y : Z)` with
//! `x = X/Z`, `y = Y/Z`, so add/double/multiply never invert; the single
//! modular inversion happens in [`Curve::to_affine`] when a result leaves
//! this module.
//!
//! Only secp256k1 is instantiated, but nothing below depends on `a == 0`.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use std::sync::OnceLock;

use super::error::CryptoError;

const SECP256K1_P: &str = "fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f";
const SECP256K1_N: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";
const SECP256K1_GX: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
const SECP256K1_GY: &str = "483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

/// A point in affine coordinates (always on the curve it was produced by)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinePoint {
    pub x: BigUint,
    pub y: BigUint,
}

impl AffinePoint {
    /// SEC1 uncompressed encoding: `0x04 ‖ x ‖ y`, coordinates left-padded to 32 bytes
    pub fn to_uncompressed(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0] = 0x04;
        out[1..33].copy_from_slice(&to_fixed_32(&self.x));
        out[33..].copy_from_slice(&to_fixed_32(&self.y));
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_uncompressed())
    }
}

/// A point in homogeneous projective coordinates.
///
/// The identity is any point with `Z == 0`.
#[derive(Debug, Clone)]
pub struct ProjectivePoint {
    x: BigInt,
    y: BigInt,
    z: BigInt,
}

impl ProjectivePoint {
    pub fn identity() -> Self {
        Self {
            x: BigInt::zero(),
            y: BigInt::one(),
            z: BigInt::zero(),
        }
    }

    pub fn from_affine(point: &AffinePoint) -> Self {
        Self {
            x: BigInt::from(point.x.clone()),
            y: BigInt::from(point.y.clone()),
            z: BigInt::one(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.z.is_zero()
    }
}

/// Short Weierstrass curve parameters
#[derive(Debug, Clone)]
pub struct Curve {
    p: BigInt,
    a: BigInt,
    b: BigInt,
    n: BigUint,
    generator: AffinePoint,
}

impl Curve {
    /// The secp256k1 curve (`a = 0`, `b = 7`)
    pub fn secp256k1() -> &'static Curve {
        static SECP256K1: OnceLock<Curve> = OnceLock::new();
        SECP256K1.get_or_init(|| Curve {
            p: BigInt::from(hex_uint(SECP256K1_P)),
            a: BigInt::zero(),
            b: BigInt::from(7u8),
            n: hex_uint(SECP256K1_N),
            generator: AffinePoint {
                x: hex_uint(SECP256K1_GX),
                y: hex_uint(SECP256K1_GY),
            },
        })
    }

    pub fn order(&self) -> &BigUint {
        &self.n
    }

    pub fn generator(&self) -> &AffinePoint {
        &self.generator
    }

    fn reduce(&self, v: BigInt) -> BigInt {
        let r = v % &self.p;
        if r.sign() == Sign::Minus {
            r + &self.p
        } else {
            r
        }
    }

    pub fn negate(&self, point: &ProjectivePoint) -> ProjectivePoint {
        ProjectivePoint {
            x: point.x.clone(),
            y: self.reduce(-point.y.clone()),
            z: point.z.clone(),
        }
    }

    /// Projective equality: `X1·Z2 == X2·Z1` and `Y1·Z2 == Y2·Z1`
    pub fn point_eq(&self, lhs: &ProjectivePoint, rhs: &ProjectivePoint) -> bool {
        if lhs.is_identity() || rhs.is_identity() {
            return lhs.is_identity() && rhs.is_identity();
        }
        let u = self.reduce(&rhs.y * &lhs.z - &lhs.y * &rhs.z);
        let v = self.reduce(&rhs.x * &lhs.z - &lhs.x * &rhs.z);
        u.is_zero() && v.is_zero()
    }

    pub fn add(&self, lhs: &ProjectivePoint, rhs: &ProjectivePoint) -> ProjectivePoint {
        if lhs.is_identity() {
            return rhs.clone();
        }
        if rhs.is_identity() {
            return lhs.clone();
        }

        // u = Y2·Z1 − Y1·Z2, v = X2·Z1 − X1·Z2
        let u = self.reduce(&rhs.y * &lhs.z - &lhs.y * &rhs.z);
        let v = self.reduce(&rhs.x * &lhs.z - &lhs.x * &rhs.z);

        if v.is_zero() {
            if u.is_zero() {
                return self.twice(lhs);
            }
            // lhs == -rhs
            return ProjectivePoint::identity();
        }

        let three = BigInt::from(3u8);
        let v2 = &v * &v;
        let v3 = &v2 * &v;
        let x1v2 = &lhs.x * &v2;
        let zu2 = &u * &u * &lhs.z;

        // x3 = v·(Z2·(Z1·u² − 2·X1·v²) − v³)
        let x3 = self.reduce((&rhs.z * (&zu2 - (&x1v2 << 1usize)) - &v3) * &v);

        // y3 = Z2·(3·X1·u·v² − Y1·v³ − Z1·u³) + u·v³
        let y3 = self.reduce(
            &rhs.z * (&three * &x1v2 * &u - &lhs.y * &v3 - &zu2 * &u) + &u * &v3,
        );

        // z3 = v³·Z1·Z2
        let z3 = self.reduce(&v3 * &lhs.z * &rhs.z);

        ProjectivePoint {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    pub fn twice(&self, point: &ProjectivePoint) -> ProjectivePoint {
        if point.is_identity() {
            return point.clone();
        }
        if self.reduce(point.y.clone()).is_zero() {
            return ProjectivePoint::identity();
        }

        let three = BigInt::from(3u8);
        let x1 = &point.x;
        let y1 = &point.y;

        let y1z1 = y1 * &point.z;
        let y1sqz1 = self.reduce(&y1z1 * y1);

        // w = 3·X1² + a·Z1²
        let mut w = &three * x1 * x1;
        if !self.a.is_zero() {
            w += &self.a * &point.z * &point.z;
        }
        let w = self.reduce(w);

        // x3 = 2·Y1·Z1·(w² − 8·X1·Y1²·Z1)
        let x3 = self.reduce(((&w * &w - ((x1 << 3usize) * &y1sqz1)) << 1usize) * &y1z1);

        // y3 = 4·Y1²·Z1·(3·w·X1 − 2·Y1²·Z1) − w³
        let y3 = self.reduce(
            ((&three * &w * x1 - (&y1sqz1 << 1usize)) << 2usize) * &y1sqz1 - &w * &w * &w,
        );

        // z3 = 8·(Y1·Z1)³
        let z3 = self.reduce((&y1z1 * &y1z1 * &y1z1) << 3usize);

        ProjectivePoint {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    /// Scalar multiplication.
    ///
    /// Scans `h = 3k` against `k` from the second-highest bit of `h` down to
    /// bit 1, doubling each step and adding `P` or `-P` where the bits differ.
    pub fn multiply(&self, point: &ProjectivePoint, k: &BigUint) -> ProjectivePoint {
        if point.is_identity() || k.is_zero() {
            return ProjectivePoint::identity();
        }

        let h = k * BigUint::from(3u8);
        let neg = self.negate(point);
        let mut r = point.clone();

        for i in (1..h.bits() - 1).rev() {
            r = self.twice(&r);
            let h_bit = h.bit(i);
            let k_bit = k.bit(i);
            if h_bit != k_bit {
                r = self.add(&r, if h_bit { point } else { &neg });
            }
        }

        r
    }

    /// `k · G`
    pub fn multiply_generator(&self, k: &BigUint) -> ProjectivePoint {
        self.multiply(&ProjectivePoint::from_affine(&self.generator), k)
    }

    /// Normalize to affine coordinates. Returns `None` for the identity.
    pub fn to_affine(&self, point: &ProjectivePoint) -> Option<AffinePoint> {
        let z = self.reduce(point.z.clone());
        if z.is_zero() {
            return None;
        }
        // p is prime, so z^(p-2) is the inverse of z
        let z_inv = z.modpow(&(&self.p - BigInt::from(2u8)), &self.p);
        let x = self.reduce(&point.x * &z_inv);
        let y = self.reduce(&point.y * &z_inv);
        Some(AffinePoint {
            x: x.to_biguint()?,
            y: y.to_biguint()?,
        })
    }

    pub fn is_on_curve(&self, point: &AffinePoint) -> bool {
        let p_uint = match self.p.to_biguint() {
            Some(p) => p,
            None => return false,
        };
        if point.x >= p_uint || point.y >= p_uint {
            return false;
        }
        let x = BigInt::from(point.x.clone());
        let y = BigInt::from(point.y.clone());
        let lhs = self.reduce(&y * &y);
        let rhs = self.reduce(&x * &x * &x + &self.a * &x + &self.b);
        lhs == rhs
    }

    /// Parse a SEC1 point (33-byte compressed or 65-byte uncompressed)
    pub fn decode_point(&self, bytes: &[u8]) -> Result<AffinePoint, CryptoError> {
        let point = match (bytes.len(), bytes.first().copied()) {
            (65, Some(0x04)) => AffinePoint {
                x: BigUint::from_bytes_be(&bytes[1..33]),
                y: BigUint::from_bytes_be(&bytes[33..]),
            },
            (33, Some(prefix @ (0x02 | 0x03))) => {
                let x = BigUint::from_bytes_be(&bytes[1..]);
                let y = self.recover_y(&x, prefix == 0x03)?;
                AffinePoint { x, y }
            }
            (len, _) => {
                return Err(CryptoError::InvalidPublicKey {
                    reason: format!(
                        "expected 33-byte compressed or 65-byte uncompressed point, got {} bytes",
                        len
                    ),
                })
            }
        };

        if !self.is_on_curve(&point) {
            return Err(CryptoError::InvalidPublicKey {
                reason: "point is not on the curve".to_string(),
            });
        }
        Ok(point)
    }

    // Square root via y = rhs^((p+1)/4), valid because p ≡ 3 (mod 4)
    fn recover_y(&self, x: &BigUint, odd: bool) -> Result<BigUint, CryptoError> {
        let x = BigInt::from(x.clone());
        let rhs = self.reduce(&x * &x * &x + &self.a * &x + &self.b);
        let exp = (&self.p + BigInt::one()) >> 2usize;
        let y = rhs.modpow(&exp, &self.p);
        if self.reduce(&y * &y) != rhs {
            return Err(CryptoError::InvalidPublicKey {
                reason: "x coordinate has no matching point".to_string(),
            });
        }
        let y_is_odd = y.bit(0);
        let y = if y_is_odd == odd { y } else { &self.p - y };
        y.to_biguint().ok_or_else(|| CryptoError::InvalidPublicKey {
            reason: "negative y coordinate".to_string(),
        })
    }
}

/// Big-endian, left-padded to 32 bytes
pub fn to_fixed_32(v: &BigUint) -> [u8; 32] {
    let bytes = v.to_bytes_be();
    let mut out = [0u8; 32];
    let start = 32usize.saturating_sub(bytes.len());
    let src_start = bytes.len().saturating_sub(32);
    out[start..].copy_from_slice(&bytes[src_start..]);
    out
}

fn hex_uint(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).unwrap_or_default()
}
