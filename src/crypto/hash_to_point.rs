//! Deterministic map from bytes onto the prime-order subgroup, as used for key images.
//!
//! This is the Elligator-style `ge_fromfe_frombytes_vartime` construction: the Keccak digest of
//! the input is interpreted as a field element, mapped to a Montgomery-curve point, converted to
//! Edwards form and finally multiplied by the cofactor.

use super::{CryptoError, keccak256};

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use num_bigint::BigUint;

const MONTGOMERY_A: u32 = 486662;

struct Field {
    p: BigUint,
}

impl Field {
    fn new() -> Self {
        Self {
            p: (BigUint::from(1u8) << 255) - BigUint::from(19u8),
        }
    }

    fn reduce(&self, value: BigUint) -> BigUint {
        value % &self.p
    }

    fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        self.reduce(a * b)
    }

    fn add(&self, a: &BigUint, b: &BigUint) -> BigUint {
        self.reduce(a + b)
    }

    fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        self.reduce(a + &self.p - (b % &self.p))
    }

    fn pow(&self, a: &BigUint, exponent: &BigUint) -> BigUint {
        a.modpow(exponent, &self.p)
    }

    fn invert(&self, a: &BigUint) -> BigUint {
        self.pow(a, &(&self.p - BigUint::from(2u8)))
    }

    fn is_zero(value: &BigUint) -> bool {
        value.bits() == 0
    }
}

pub fn hash_to_point(data: &[u8]) -> Result<EdwardsPoint, CryptoError> {
    let field = Field::new();
    let a = BigUint::from(MONTGOMERY_A);

    let u = field.reduce(BigUint::from_bytes_le(&keccak256(data)));
    let v = field.mul(&field.mul(&u, &u), &BigUint::from(2u8));
    let w = field.add(&v, &BigUint::from(1u8));
    let x = field.sub(&field.mul(&w, &w), &field.mul(&field.mul(&a, &a), &v));

    let x3 = field.pow(&x, &BigUint::from(3u8));
    let x7 = field.pow(&x, &BigUint::from(7u8));
    let exponent = (&field.p - BigUint::from(5u8)) >> 3;
    let r_x = field.mul(
        &field.mul(&w, &x3),
        &field.pow(&field.mul(&w, &x7), &exponent),
    );
    let check = field.mul(&field.mul(&r_x, &r_x), &x);

    let neg_a = &field.p - &a;
    let (sign, z) = if !Field::is_zero(&field.sub(&w, &check))
        && !Field::is_zero(&field.add(&w, &check))
    {
        (1u8, neg_a)
    } else {
        (0u8, field.mul(&neg_a, &v))
    };

    let y = field.mul(
        &field.sub(&z, &w),
        &field.invert(&field.add(&z, &w)),
    );

    let mut encoded = [0u8; 32];
    let y_bytes = y.to_bytes_le();
    encoded[..y_bytes.len()].copy_from_slice(&y_bytes);
    encoded[31] |= sign << 7;

    let point = CompressedEdwardsY(encoded)
        .decompress()
        .ok_or(CryptoError::InvalidPoint)?;
    Ok(point.mul_by_cofactor())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_to_point_vector() {
        let point = hash_to_point(&[0u8; 32]).unwrap();
        assert_eq!(
            hex::encode(point.compress().as_bytes()),
            "2d2c4d74df05ba930eaab01825af274eaabcd217bf99dfd54fdf2efe574033f3"
        );
    }

    #[test]
    fn test_result_is_in_prime_order_subgroup() {
        for i in 0u8..8 {
            let point = hash_to_point(&[i; 5]).unwrap();
            assert!(point.is_torsion_free());
        }
    }
}
