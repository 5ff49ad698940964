//! Password-based wallet encryption.
//!
//! Layout of an encrypted wallet:
//!
//! ```text
//! "CNWALLET" | version (1) | m_cost, t_cost, p_cost (u32 LE each) | salt (16) | nonce (24) | ciphertext
//! ```
//!
//! The key is derived with Argon2id from the UTF-8 bytes of the password, and the canonical JSON is
//! sealed with XChaCha20-Poly1305. The string form is lowercase hex of the whole blob.

use crate::config::KdfParams;
use crate::wallet::WalletError;

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::Rng;
use zeroize::Zeroizing;

pub const MAGIC: &[u8; 8] = b"CNWALLET";
pub const ENCRYPTION_VERSION: u8 = 1;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = MAGIC.len() + 1 + 12 + SALT_LEN + NONCE_LEN;

/// Upper bounds on the costs accepted from a file; the header is read before it can be authenticated.
/// Memory is capped at 4 GiB.
const MAX_MEMORY_KIB: u32 = 1 << 22;
const MAX_ITERATIONS: u32 = 64;
const MAX_PARALLELISM: u32 = 64;

fn derive_key(
    password: &str,
    salt: &[u8],
    kdf: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, argon2::Error> {
    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(KEY_LEN))?;
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params).hash_password_into(
        password.as_bytes(),
        salt,
        &mut key[..],
    )?;
    Ok(key)
}

pub fn encrypt(plaintext: &[u8], password: &str, kdf: &KdfParams) -> Result<Vec<u8>, WalletError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    let mut rng = rand::rng();
    rng.fill(&mut salt);
    rng.fill(&mut nonce);

    let key = derive_key(password, &salt, kdf)
        .map_err(|e| WalletError::EncryptionFailed(format!("key derivation failed: {}", e)))?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| WalletError::EncryptionFailed(e.to_string()))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    blob.extend_from_slice(MAGIC);
    blob.push(ENCRYPTION_VERSION);
    blob.extend_from_slice(&kdf.memory_kib.to_le_bytes());
    blob.extend_from_slice(&kdf.iterations.to_le_bytes());
    blob.extend_from_slice(&kdf.parallelism.to_le_bytes());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

pub fn decrypt(blob: &[u8], password: &str) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    if blob.len() < MAGIC.len() || &blob[..MAGIC.len()] != MAGIC {
        return Err(WalletError::NotAWalletFile);
    }
    let version = blob.get(MAGIC.len()).copied().ok_or_else(|| {
        WalletError::WalletFileCorrupted("missing encryption version".to_string())
    })?;
    if version != ENCRYPTION_VERSION {
        return Err(WalletError::UnsupportedWalletFileFormatVersion(u32::from(version)));
    }
    if blob.len() < HEADER_LEN + TAG_LEN {
        return Err(WalletError::WalletFileCorrupted(
            "encrypted wallet is truncated".to_string(),
        ));
    }

    let read_u32 = |offset: usize| {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&blob[offset..offset + 4]);
        u32::from_le_bytes(bytes)
    };
    let params_start = MAGIC.len() + 1;
    let kdf = KdfParams {
        memory_kib: read_u32(params_start),
        iterations: read_u32(params_start + 4),
        parallelism: read_u32(params_start + 8),
    };
    check_kdf_bounds(&kdf)?;

    let salt_start = params_start + 12;
    let nonce_start = salt_start + SALT_LEN;
    let salt = &blob[salt_start..nonce_start];
    let nonce = &blob[nonce_start..HEADER_LEN];
    let ciphertext = &blob[HEADER_LEN..];

    let key = derive_key(password, salt, &kdf).map_err(|e| {
        WalletError::WalletFileCorrupted(format!("invalid key derivation parameters: {}", e))
    })?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| WalletError::InvalidPassword)
}

fn check_kdf_bounds(kdf: &KdfParams) -> Result<(), WalletError> {
    let excess = if kdf.memory_kib > MAX_MEMORY_KIB {
        Some(format!("memory cost {} KiB", kdf.memory_kib))
    } else if kdf.iterations > MAX_ITERATIONS {
        Some(format!("iteration count {}", kdf.iterations))
    } else if kdf.parallelism > MAX_PARALLELISM {
        Some(format!("parallelism {}", kdf.parallelism))
    } else {
        None
    };
    match excess {
        Some(what) => Err(WalletError::WalletFileCorrupted(format!(
            "key derivation {} is too large",
            what
        ))),
        None => Ok(()),
    }
}

pub fn encrypt_to_string(
    plaintext: &[u8],
    password: &str,
    kdf: &KdfParams,
) -> Result<String, WalletError> {
    encrypt(plaintext, password, kdf).map(hex::encode)
}

pub fn decrypt_from_str(data: &str, password: &str) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    let blob = hex::decode(data.trim()).map_err(|_| WalletError::NotAWalletFile)?;
    decrypt(&blob, password)
}
