//! Deterministic key derivation.
//!
//! A wallet seed is 32 bytes of entropy. Reduced modulo the group order it becomes the primary
//! private spend key; hashing that key gives the private view key. Further subwallet spend keys
//! are derived from the primary spend key and an index.

/// 25-word mnemonic encoding
pub mod mnemonic;
/// Mnemonic dictionary
mod wordlist;

pub use mnemonic::{
    MnemonicError, is_valid_mnemonic, is_valid_mnemonic_word, mnemonic_to_seed, seed_to_mnemonic,
};

use crate::crypto::{CryptoError, CryptoProvider, PublicKey, SecretKey, write_varint};

use rand::Rng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Raw wallet entropy. Cleared from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; 32]);

impl Seed {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_mnemonic(phrase: &str) -> Result<Self, MnemonicError> {
        mnemonic_to_seed(phrase).map(Self)
    }

    pub fn to_mnemonic(&self) -> Vec<String> {
        seed_to_mnemonic(&self.0)
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed(..)")
    }
}

pub fn generate_random_seed() -> Seed {
    let mut seed = [0u8; 32];
    rand::rng().fill(&mut seed[..]);
    let result = Seed(seed);
    seed.zeroize();
    result
}

/// Private key pair of a deterministic wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletKeys {
    pub private_spend_key: SecretKey,
    pub private_view_key: SecretKey,
}

pub fn seed_to_keys(crypto: &dyn CryptoProvider, seed: &Seed) -> WalletKeys {
    let private_spend_key = crypto.sc_reduce32(seed.as_bytes());
    WalletKeys {
        private_spend_key,
        private_view_key: derive_private_view_key(crypto, &private_spend_key),
    }
}

pub fn derive_private_view_key(crypto: &dyn CryptoProvider, private_spend_key: &SecretKey) -> SecretKey {
    crypto.hash_to_scalar(private_spend_key.as_bytes())
}

/// True when `private_view_key` was derived from `private_spend_key`, i.e. the pair can be
/// restored from the spend key's mnemonic.
pub fn private_keys_are_deterministic(
    crypto: &dyn CryptoProvider,
    private_spend_key: &SecretKey,
    private_view_key: &SecretKey,
) -> bool {
    derive_private_view_key(crypto, private_spend_key) == *private_view_key
}

/// Spend key of the `index`-th generated subwallet.
pub fn generate_deterministic_subwallet_key(
    crypto: &dyn CryptoProvider,
    primary_private_spend_key: &SecretKey,
    index: u64,
) -> SecretKey {
    let mut data = primary_private_spend_key.0.to_vec();
    write_varint(&mut data, index);
    let key = crypto.hash_to_scalar(&data);
    data.zeroize();
    key
}

pub fn public_key_pair(
    crypto: &dyn CryptoProvider,
    private_spend_key: &SecretKey,
    private_view_key: &SecretKey,
) -> Result<(PublicKey, PublicKey), CryptoError> {
    Ok((
        crypto.secret_key_to_public_key(private_spend_key)?,
        crypto.secret_key_to_public_key(private_view_key)?,
    ))
}
