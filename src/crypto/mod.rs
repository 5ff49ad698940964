//! Cryptographic primitive provider.
//!
//! The wallet engine never performs curve arithmetic directly. Everything it needs (hashing,
//! key derivation and underivation, key images, ring signatures) goes through the
//! [`CryptoProvider`] capability set, which is carried by each wallet's `Config`. The default
//! implementation is [`Ed25519Provider`], backed by `curve25519-dalek`.

/// Default provider built on curve25519-dalek
mod ed25519;
/// CryptoNote hash-to-point map
mod hash_to_point;

pub use ed25519::{Ed25519Provider, keccak256};
pub use hash_to_point::hash_to_point;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid key encoding: {0}")]
    InvalidHex(String),

    #[error("Value is not a valid curve point")]
    InvalidPoint,

    #[error("Value is not a reduced scalar")]
    InvalidScalar,

    #[error("Real output index {index} is outside a ring of {size}")]
    RingIndexOutOfRange { index: usize, size: usize },
}

fn parse_hex32(value: &str) -> Result<[u8; 32], CryptoError> {
    if value.len() != 64 {
        return Err(CryptoError::InvalidHex(format!(
            "expected 64 hex characters, got {}",
            value.len()
        )));
    }

    let mut out = [0u8; 32];
    hex::decode_to_slice(value, &mut out).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    Ok(out)
}

macro_rules! hex_key_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl FromStr for $name {
            type Err = CryptoError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex32(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_key_type!(
    /// Compressed Edwards point
    PublicKey
);
hex_key_type!(
    /// Reduced scalar. The all-zero value is the view-wallet spend key sentinel.
    SecretKey
);
hex_key_type!(
    /// Shared secret `8·a·R` between a transaction key and a view key
    KeyDerivation
);
hex_key_type!(KeyImage);

impl SecretKey {
    /// Placeholder spend key of view-only subwallets, rendered as 64 `'0'` characters.
    pub const NULL: SecretKey = SecretKey([0u8; 32]);

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl fmt::Debug for KeyDerivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyDerivation(..)")
    }
}

impl fmt::Debug for KeyImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyImage({})", self.to_hex())
    }
}

/// One `(c, r)` pair of a CryptoNote ring signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub c: [u8; 32],
    pub r: [u8; 32],
}

/// Capability set the wallet consumes for all curve and hash operations.
///
/// All methods are pure functions over fixed-width values, so a provider can be shared across
/// threads and wallets.
pub trait CryptoProvider: Send + Sync + fmt::Debug {
    /// Keccak-256 as used by CryptoNote.
    fn cn_fast_hash(&self, data: &[u8]) -> [u8; 32];

    /// Reduces 32 little-endian bytes modulo the group order.
    fn sc_reduce32(&self, bytes: &[u8; 32]) -> SecretKey;

    /// `cn_fast_hash` reduced modulo the group order.
    fn hash_to_scalar(&self, data: &[u8]) -> SecretKey {
        self.sc_reduce32(&self.cn_fast_hash(data))
    }

    fn secret_key_to_public_key(&self, secret: &SecretKey) -> Result<PublicKey, CryptoError>;

    fn generate_key_derivation(
        &self,
        transaction_public_key: &PublicKey,
        private_view_key: &SecretKey,
    ) -> Result<KeyDerivation, CryptoError>;

    /// One-time output key `H_s(D ‖ i)·G + B` for output `output_index`.
    fn derive_public_key(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
        public_spend_key: &PublicKey,
    ) -> Result<PublicKey, CryptoError>;

    fn derive_secret_key(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
        private_spend_key: &SecretKey,
    ) -> Result<SecretKey, CryptoError>;

    /// Recovers the candidate public spend key `P - H_s(D ‖ i)·G` an output was sent to.
    fn underive_public_key(
        &self,
        derivation: &KeyDerivation,
        output_index: u64,
        output_key: &PublicKey,
    ) -> Result<PublicKey, CryptoError>;

    fn generate_key_image(
        &self,
        public_ephemeral: &PublicKey,
        private_ephemeral: &SecretKey,
    ) -> Result<KeyImage, CryptoError>;

    fn generate_ring_signatures(
        &self,
        prefix_hash: &[u8; 32],
        key_image: &KeyImage,
        public_keys: &[PublicKey],
        private_ephemeral: &SecretKey,
        real_index: usize,
    ) -> Result<Vec<Signature>, CryptoError>;

    fn check_ring_signatures(
        &self,
        prefix_hash: &[u8; 32],
        key_image: &KeyImage,
        public_keys: &[PublicKey],
        signatures: &[Signature],
    ) -> bool;
}

/// Appends `value` as a little-endian base-128 varint.
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Reads a varint from the front of `bytes`, returning the value and the bytes consumed.
pub fn read_varint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}
