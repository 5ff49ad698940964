use crate::wallet::WalletError;

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Sidecar written next to every saved wallet. Readable without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletMetadata {
	pub scan_height: u64,
	/// RFC 3339
	pub saved_at: String,
}

/// Repository for encrypted wallet blobs
#[async_trait::async_trait]
pub trait WalletRepository: Send + Sync {
	async fn save(&self, path: &Path, blob: &[u8], scan_height: u64) -> Result<(), WalletError>;
	async fn load(&self, path: &Path) -> Result<Vec<u8>, WalletError>;
	async fn load_metadata(&self, path: &Path) -> Result<Option<WalletMetadata>, WalletError>;
}

/// File-based implementation of WalletRepository
#[derive(Debug, Clone, Copy, Default)]
pub struct FileWalletRepository;

impl FileWalletRepository {
	pub fn new() -> Self {
		Self
	}

	fn sibling(path: &Path, suffix: &str) -> PathBuf {
		let mut name: OsString = path.as_os_str().to_owned();
		name.push(suffix);
		PathBuf::from(name)
	}

	pub fn metadata_path(path: &Path) -> PathBuf {
		Self::sibling(path, ".meta.json")
	}
}

#[async_trait::async_trait]
impl WalletRepository for FileWalletRepository {
	async fn save(&self, path: &Path, blob: &[u8], scan_height: u64) -> Result<(), WalletError> {
		// replace atomically
		let temporary = Self::sibling(path, ".tmp");
		tokio::fs::write(&temporary, blob).await?;
		tokio::fs::rename(&temporary, path).await?;

		let metadata = WalletMetadata {
			scan_height,
			saved_at: chrono::Utc::now().to_rfc3339(),
		};
		let content = serde_json::to_string_pretty(&metadata)
			.map_err(|e| WalletError::WalletFileCorrupted(e.to_string()))?;
		if let Err(e) = tokio::fs::write(Self::metadata_path(path), content).await {
			warn!("Failed to write wallet metadata for {:?}: {}", path, e);
		}

		info!("Saved wallet to {:?} at height {}", path, scan_height);
		Ok(())
	}

	async fn load(&self, path: &Path) -> Result<Vec<u8>, WalletError> {
		let blob = tokio::fs::read(path).await?;
		info!("Loaded wallet from {:?}", path);
		Ok(blob)
	}

	async fn load_metadata(&self, path: &Path) -> Result<Option<WalletMetadata>, WalletError> {
		let content = match tokio::fs::read_to_string(Self::metadata_path(path)).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		};
		match serde_json::from_str(&content) {
			Ok(metadata) => Ok(Some(metadata)),
			Err(e) => {
				warn!("Ignoring unreadable wallet metadata for {:?}: {}", path, e);
				Ok(None)
			}
		}
	}
}
