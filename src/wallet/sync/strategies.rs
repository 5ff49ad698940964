use crate::config::Config;
use crate::daemon::{Block, Daemon, DaemonError, GetBlocksRequest};

use tracing::{debug, warn};

/// Trait for different block-fetching strategies
#[async_trait::async_trait]
pub trait SyncStrategy: Send + Sync {
	/// Fetch the next batch of blocks described by `request`. The strategy decides the batch size.
	async fn fetch_blocks(
		&mut self,
		daemon: &dyn Daemon,
		request: GetBlocksRequest,
	) -> Result<Vec<Block>, DaemonError>;

	/// Get the name of this strategy
	fn name(&self) -> &'static str;
}

/// Configuration for sync strategies
#[derive(Debug, Clone)]
pub struct SyncConfig {
	/// Timeout for a single daemon request
	pub request_timeout: tokio::time::Duration,
	/// Largest batch ever requested
	pub max_blocks_per_request: u64,
	pub skip_coinbase_transactions: bool,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			request_timeout: tokio::time::Duration::from_secs(10),
			max_blocks_per_request: 100,
			skip_coinbase_transactions: true,
		}
	}
}

impl From<&Config> for SyncConfig {
	fn from(config: &Config) -> Self {
		Self {
			request_timeout: config.daemon_request_timeout,
			max_blocks_per_request: config.blocks_per_daemon_request.max(1),
			skip_coinbase_transactions: !config.scan_coinbase_transactions,
		}
	}
}

/// Strategy that shrinks its batch size when the daemon times out and grows it back on success
pub struct AdaptiveBatchSync {
	config: SyncConfig,
	batch_size: u64,
}

impl AdaptiveBatchSync {
	pub fn new(config: SyncConfig) -> Self {
		let batch_size = config.max_blocks_per_request;
		Self { config, batch_size }
	}

	pub fn batch_size(&self) -> u64 {
		self.batch_size
	}

	fn shrink(&mut self) {
		self.batch_size = (self.batch_size / 2).max(1);
		warn!(
			"Daemon request timed out, reducing batch size to {}",
			self.batch_size
		);
	}

	fn grow(&mut self) {
		if self.batch_size < self.config.max_blocks_per_request {
			self.batch_size = (self.batch_size * 2).min(self.config.max_blocks_per_request);
			debug!("Increasing batch size to {}", self.batch_size);
		}
	}
}

#[async_trait::async_trait]
impl SyncStrategy for AdaptiveBatchSync {
	async fn fetch_blocks(
		&mut self,
		daemon: &dyn Daemon,
		mut request: GetBlocksRequest,
	) -> Result<Vec<Block>, DaemonError> {
		request.block_count = self.batch_size;
		request.skip_coinbase_transactions = self.config.skip_coinbase_transactions;

		debug!(
			"Requesting up to {} blocks from height {} ({} checkpoints)",
			request.block_count,
			request.start_height,
			request.block_hash_checkpoints.len()
		);

		match tokio::time::timeout(self.config.request_timeout, daemon.get_wallet_sync_data(&request))
			.await
		{
			Ok(Ok(blocks)) => {
				self.grow();
				Ok(blocks)
			}
			Ok(Err(DaemonError::Timeout(elapsed))) => {
				self.shrink();
				Err(DaemonError::Timeout(elapsed))
			}
			Ok(Err(DaemonError::HttpError(e))) if e.is_timeout() => {
				self.shrink();
				Err(DaemonError::HttpError(e))
			}
			Ok(Err(e)) => Err(e),
			Err(_) => {
				self.shrink();
				Err(DaemonError::Timeout(self.config.request_timeout))
			}
		}
	}

	fn name(&self) -> &'static str {
		"AdaptiveBatchSync"
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::daemon::{DaemonConnection, DaemonEvent, InMemoryDaemon};
	use tokio::sync::broadcast;

	/// Daemon that never answers.
	struct StalledDaemon {
		events: broadcast::Sender<DaemonEvent>,
	}

	#[async_trait::async_trait]
	impl Daemon for StalledDaemon {
		async fn init(&self) -> Result<(), DaemonError> {
			Ok(())
		}

		async fn update_daemon_info(&self) -> Result<(), DaemonError> {
			Ok(())
		}

		async fn get_wallet_sync_data(
			&self,
			_request: &GetBlocksRequest,
		) -> Result<Vec<Block>, DaemonError> {
			std::future::pending().await
		}

		fn get_node_fee(&self) -> (String, u64) {
			(String::new(), 0)
		}

		fn get_connection_info(&self) -> DaemonConnection {
			DaemonConnection {
				host: "stalled".to_string(),
				port: 0,
				daemon_type: Default::default(),
				daemon_type_determined: false,
				ssl: false,
				ssl_determined: false,
			}
		}

		fn local_daemon_block_count(&self) -> u64 {
			0
		}

		fn network_block_count(&self) -> u64 {
			0
		}

		fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
			self.events.subscribe()
		}
	}

	fn config(max: u64) -> SyncConfig {
		SyncConfig {
			request_timeout: tokio::time::Duration::from_millis(20),
			max_blocks_per_request: max,
			skip_coinbase_transactions: true,
		}
	}

	#[tokio::test]
	async fn test_batch_size_halves_on_timeout() {
		let daemon = StalledDaemon {
			events: broadcast::channel(1).0,
		};
		let mut strategy = AdaptiveBatchSync::new(config(8));

		for expected in [4, 2, 1, 1] {
			let result = strategy
				.fetch_blocks(&daemon, GetBlocksRequest::default())
				.await;
			assert!(matches!(result, Err(DaemonError::Timeout(_))));
			assert_eq!(strategy.batch_size(), expected);
		}
	}

	#[tokio::test]
	async fn test_batch_size_recovers_after_success() {
		let daemon = InMemoryDaemon::new("127.0.0.1", 11898);
		daemon.push_empty_blocks(50);
		let mut strategy = AdaptiveBatchSync::new(config(8));
		strategy.batch_size = 1;

		let blocks = strategy
			.fetch_blocks(&daemon, GetBlocksRequest::default())
			.await
			.unwrap();
		assert_eq!(blocks.len(), 1);
		assert_eq!(strategy.batch_size(), 2);

		for _ in 0..5 {
			strategy
				.fetch_blocks(&daemon, GetBlocksRequest::default())
				.await
				.unwrap();
		}
		assert_eq!(strategy.batch_size(), 8);
	}
}
