//! Wallet persistence service.
//!
//! This module provides the `WalletPersistence` service, which turns wallet state into its canonical
//! JSON, seals it with a password and hands the result to a repository. It is used by the wallet
//! backend to save and open wallets, and keeps encryption details out of the backend.

/// Canonical JSON form of the wallet
pub mod canonical;
/// Password-based encryption of the canonical form
pub mod encryption;
/// Storage of encrypted wallets
pub mod repositories;

pub use canonical::{WALLET_FILE_FORMAT_VERSION, WalletFile, from_canonical_str, to_canonical_string};
pub use repositories::{FileWalletRepository, WalletMetadata, WalletRepository};

use crate::config::KdfParams;
use crate::wallet::WalletError;
use crate::wallet::state::WalletState;

use std::path::Path;
use tracing::{debug, info};

/// Service for saving and opening encrypted wallets.
pub struct WalletPersistence {
    repository: Box<dyn WalletRepository>,
    kdf: KdfParams,
}

impl WalletPersistence {
    /// Persistence backed by plain files.
    pub fn new(kdf: KdfParams) -> Self {
        Self::with_repository(Box::new(FileWalletRepository::new()), kdf)
    }

    pub fn with_repository(repository: Box<dyn WalletRepository>, kdf: KdfParams) -> Self {
        Self { repository, kdf }
    }

    pub fn encrypt_to_string(&self, state: &WalletState, password: &str) -> Result<String, WalletError> {
        let canonical = zeroize::Zeroizing::new(to_canonical_string(state)?);
        encryption::encrypt_to_string(canonical.as_bytes(), password, &self.kdf)
    }

    pub fn decrypt_from_str(data: &str, password: &str) -> Result<WalletState, WalletError> {
        let plaintext = encryption::decrypt_from_str(data, password)?;
        Self::parse_plaintext(&plaintext)
    }

    pub async fn save(
        &self,
        path: &Path,
        state: &WalletState,
        password: &str,
    ) -> Result<(), WalletError> {
        let canonical = zeroize::Zeroizing::new(to_canonical_string(state)?);
        let password = zeroize::Zeroizing::new(password.to_string());
        let kdf = self.kdf;
        let blob = off_runtime(move || encryption::encrypt(canonical.as_bytes(), &password, &kdf)).await?;
        let scan_height = state.sub_wallets.min_scan_height();
        self.repository.save(path, &blob, scan_height).await
    }

    pub async fn load(&self, path: &Path, password: &str) -> Result<WalletState, WalletError> {
        if let Some(metadata) = self.repository.load_metadata(path).await? {
            debug!(
                "Wallet {:?} was saved at {} at height {}",
                path, metadata.saved_at, metadata.scan_height
            );
        }
        let blob = self.repository.load(path).await?;
        let password = zeroize::Zeroizing::new(password.to_string());
        let state = off_runtime(move || {
            let plaintext = encryption::decrypt(&blob, &password)?;
            Self::parse_plaintext(&plaintext)
        })
        .await?;
        info!(
            "Opened wallet with {} subwallets at height {}",
            state.sub_wallets.count(),
            state.sub_wallets.min_scan_height()
        );
        Ok(state)
    }

    fn parse_plaintext(plaintext: &[u8]) -> Result<WalletState, WalletError> {
        let json = std::str::from_utf8(plaintext)
            .map_err(|e| WalletError::WalletFileCorrupted(e.to_string()))?;
        from_canonical_str(json)
    }
}

/// Runs key derivation and sealing on the blocking pool.
async fn off_runtime<T, F>(work: F) -> Result<T, WalletError>
where
    F: FnOnce() -> Result<T, WalletError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| WalletError::Io(std::io::Error::other(e)))?
}
