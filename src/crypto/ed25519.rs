use super::{
    CryptoError, CryptoProvider, KeyDerivation, KeyImage, PublicKey, SecretKey, Signature,
    hash_to_point, write_varint,
};

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use rand::Rng;
use sha3::{Digest, Keccak256};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// [`CryptoProvider`] over the Ed25519 group.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Provider;

impl Ed25519Provider {
    pub fn new() -> Self {
        Self
    }

    fn point(key: &[u8; 32]) -> Result<EdwardsPoint, CryptoError> {
        CompressedEdwardsY(*key)
            .decompress()
            .ok_or(CryptoError::InvalidPoint)
    }

    fn scalar(key: &[u8; 32]) -> Result<Scalar, CryptoError> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(*key)).ok_or(CryptoError::InvalidScalar)
    }

    fn random_scalar() -> Scalar {
        let mut wide = [0u8; 64];
        rand::rng().fill(&mut wide[..]);
        Scalar::from_bytes_mod_order_wide(&wide)
    }

    fn derivation_to_scalar(derivation: &KeyDerivation, output_index: u64) -> Scalar {
        let mut buf = Vec::with_capacity(32 + 10);
        buf.extend_from_slice(&derivation.0);
        write_varint(&mut buf, output_index);
        Scalar::from_bytes_mod_order(keccak256(&buf))
    }

    fn key_image_base(public_key: &PublicKey) -> Result<EdwardsPoint, CryptoError> {
        hash_to_point(&public_key.0)
    }
}

impl CryptoProvider for Ed25519Provider {
    fn cn_fast_hash(&self, data: &[u8]) -> [u8; 32] {
        keccak256(data)
    }

    fn sc_reduce32(&self, bytes: &[u8; 32]) -> SecretKey {
        SecretKey(Scalar::from_bytes_mod_order(*bytes).to_bytes())
    }

    fn secret_key_to_public_key(&self, secret: &SecretKey) -> Result<PublicKey, CryptoError> {
        let scalar = Self::scalar(&secret.0)?;
        Ok(PublicKey((&scalar * ED25519_BASEPOINT_TABLE).compress().to_bytes()))
    }

    fn generate_key_derivation(
        &self,
        transaction_public_key: &PublicKey,
        private_view_key: &SecretKey,
    ) -> Result<KeyDerivation, CryptoError> {
        let point = Self::point(&transaction_public_key.0)?;
        let view = Self::scalar(&private_view_key.0)?;
        Ok(KeyDerivation(
            (point * view).mul_by_cofactor().compress().to_bytes(),
        ))
    }

    fn derive_public_key(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
        public_spend_key: &PublicKey,
    ) -> Result<PublicKey, CryptoError> {
        let base = Self::point(&public_spend_key.0)?;
        let scalar = Self::derivation_to_scalar(derivation, output_index);
        Ok(PublicKey(
            (&scalar * ED25519_BASEPOINT_TABLE + base)
                .compress()
                .to_bytes(),
        ))
    }

    fn derive_secret_key(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
        private_spend_key: &SecretKey,
    ) -> Result<SecretKey, CryptoError> {
        let base = Self::scalar(&private_spend_key.0)?;
        let scalar = Self::derivation_to_scalar(derivation, output_index);
        Ok(SecretKey((scalar + base).to_bytes()))
    }

    fn underive_public_key(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
        output_key: &PublicKey,
    ) -> Result<PublicKey, CryptoError> {
        let output = Self::point(&output_key.0)?;
        let scalar = Self::derivation_to_scalar(derivation, output_index);
        Ok(PublicKey(
            (output - &scalar * ED25519_BASEPOINT_TABLE)
                .compress()
                .to_bytes(),
        ))
    }

    fn generate_key_image(
        &self,
        public_ephemeral: &PublicKey,
        private_ephemeral: &SecretKey,
    ) -> Result<KeyImage, CryptoError> {
        let base = Self::key_image_base(public_ephemeral)?;
        let secret = Self::scalar(&private_ephemeral.0)?;
        Ok(KeyImage((base * secret).compress().to_bytes()))
    }

    fn generate_ring_signatures(
        &self,
        prefix_hash: &[u8; 32],
        key_image: &KeyImage,
        public_keys: &[PublicKey],
        private_ephemeral: &SecretKey,
        real_index: usize,
    ) -> Result<Vec<Signature>, CryptoError> {
        if real_index >= public_keys.len() {
            return Err(CryptoError::RingIndexOutOfRange {
                index: real_index,
                size: public_keys.len(),
            });
        }

        let image = Self::point(&key_image.0)?;
        let secret = Self::scalar(&private_ephemeral.0)?;

        let mut buf = prefix_hash.to_vec();
        let mut signatures = vec![Signature { c: [0; 32], r: [0; 32] }; public_keys.len()];
        let mut sum = Scalar::ZERO;
        let mut nonce = Scalar::ZERO;

        for (i, public_key) in public_keys.iter().enumerate() {
            let point = Self::point(&public_key.0)?;
            let hashed = Self::key_image_base(public_key)?;

            let (l, r) = if i == real_index {
                nonce = Self::random_scalar();
                (&nonce * ED25519_BASEPOINT_TABLE, hashed * nonce)
            } else {
                let c = Self::random_scalar();
                let r = Self::random_scalar();
                signatures[i] = Signature {
                    c: c.to_bytes(),
                    r: r.to_bytes(),
                };
                sum += c;
                (
                    &r * ED25519_BASEPOINT_TABLE + point * c,
                    hashed * r + image * c,
                )
            };

            buf.extend_from_slice(l.compress().as_bytes());
            buf.extend_from_slice(r.compress().as_bytes());
        }

        let challenge = Scalar::from_bytes_mod_order(keccak256(&buf));
        let c = challenge - sum;
        let r = nonce - c * secret;
        signatures[real_index] = Signature {
            c: c.to_bytes(),
            r: r.to_bytes(),
        };

        Ok(signatures)
    }

    fn check_ring_signatures(
        &self,
        prefix_hash: &[u8; 32],
        key_image: &KeyImage,
        public_keys: &[PublicKey],
        signatures: &[Signature],
    ) -> bool {
        if public_keys.is_empty() || public_keys.len() != signatures.len() {
            return false;
        }

        let image = match Self::point(&key_image.0) {
            Ok(point) if point.is_torsion_free() => point,
            _ => return false,
        };

        let mut buf = prefix_hash.to_vec();
        let mut sum = Scalar::ZERO;

        for (public_key, signature) in public_keys.iter().zip(signatures) {
            let (Ok(point), Ok(hashed), Ok(c), Ok(r)) = (
                Self::point(&public_key.0),
                Self::key_image_base(public_key),
                Self::scalar(&signature.c),
                Self::scalar(&signature.r),
            ) else {
                return false;
            };

            let l = &r * ED25519_BASEPOINT_TABLE + point * c;
            let r = hashed * r + image * c;
            buf.extend_from_slice(l.compress().as_bytes());
            buf.extend_from_slice(r.compress().as_bytes());
            sum += c;
        }

        Scalar::from_bytes_mod_order(keccak256(&buf)) == sum
    }
}
