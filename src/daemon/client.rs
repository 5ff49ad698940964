//!
//! HTTP client for CryptoNote daemons and blockchain cache APIs.
//!
//! This module provides an async client that detects whether the node speaks HTTPS, whether it is
//! a conventional daemon or a cache API, and retrieves wallet sync data, heights and fee
//! information. Transient failures are retried with exponential backoff before being reported.

use super::types::*;
use super::Daemon;

use backoff::{ExponentialBackoff, future::retry};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct ConnectionState {
	ssl: bool,
	ssl_determined: bool,
	daemon_type: DaemonType,
	daemon_type_determined: bool,
	connected: bool,
	local_height: u64,
	network_height: u64,
	fee: (String, u64),
}

impl Default for ConnectionState {
	fn default() -> Self {
		Self {
			ssl: true,
			ssl_determined: false,
			daemon_type: DaemonType::ConventionalDaemon,
			daemon_type_determined: false,
			connected: true,
			local_height: 0,
			network_height: 0,
			fee: (String::new(), 0),
		}
	}
}

/// Daemon client speaking the CryptoNote wallet HTTP API
pub struct HttpDaemon {
	/// The underlying HTTP client.
	http_client: Client,
	host: String,
	port: u16,
	/// Upper bound on time spent retrying one request.
	retry_window: Duration,
	state: RwLock<ConnectionState>,
	events: broadcast::Sender<DaemonEvent>,
}

impl HttpDaemon {
	/// Create a new daemon client.
	///
	/// # Arguments
	/// * `host` - Hostname or IP of the node.
	/// * `port` - Port of the node's HTTP API.
	///
	/// # Returns
	/// A new `HttpDaemon`, or a `DaemonError` if the HTTP client cannot be built.
	pub fn new(host: impl Into<String>, port: u16) -> Result<Self, DaemonError> {
		Self::with_timeout(host, port, Duration::from_secs(10))
	}

	pub fn with_timeout(
		host: impl Into<String>,
		port: u16,
		timeout: Duration,
	) -> Result<Self, DaemonError> {
		let http_client = Client::builder().timeout(timeout).build()?;
		let (events, _) = broadcast::channel(16);

		Ok(Self {
			http_client,
			host: host.into(),
			port,
			retry_window: timeout,
			state: RwLock::new(ConnectionState::default()),
			events,
		})
	}

	/// Pins the transport instead of auto-detecting it during `init`.
	pub fn with_ssl(self, ssl: bool) -> Self {
		{
			let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
			state.ssl = ssl;
			state.ssl_determined = true;
		}
		self
	}

	fn snapshot(&self) -> ConnectionState {
		self.state
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	fn url(&self, ssl: bool, path: &str) -> Result<Url, DaemonError> {
		let scheme = if ssl { "https" } else { "http" };
		Url::parse(&format!("{}://{}:{}/", scheme, self.host, self.port))
			.and_then(|base| base.join(path))
			.map_err(|e| DaemonError::InvalidUrl(format!("{}:{}: {}", self.host, self.port, e)))
	}

	/// Execute a request, retrying connection failures and server errors.
	///
	/// # Arguments
	/// * `ssl` - Whether to use HTTPS.
	/// * `path` - Endpoint path relative to the node root.
	/// * `body` - JSON body; `None` issues a GET.
	async fn request<T: DeserializeOwned>(
		&self,
		ssl: bool,
		path: &str,
		body: Option<&serde_json::Value>,
	) -> Result<T, DaemonError> {
		let url = self.url(ssl, path)?;
		let backoff = ExponentialBackoff {
			max_elapsed_time: Some(self.retry_window),
			..ExponentialBackoff::default()
		};

		retry(backoff, || async {
			let request = match body {
				Some(body) => self.http_client.post(url.clone()).json(body),
				None => self.http_client.get(url.clone()),
			};

			let response = request.send().await.map_err(|e| {
				debug!("Daemon request to {} failed: {}", url, e);
				if e.is_connect() || e.is_timeout() {
					backoff::Error::transient(DaemonError::HttpError(e))
				} else {
					backoff::Error::permanent(DaemonError::HttpError(e))
				}
			})?;

			let response = response.error_for_status().map_err(|e| {
				let server_side = e.status().is_some_and(|s| s.is_server_error());
				if server_side {
					backoff::Error::transient(DaemonError::HttpError(e))
				} else {
					backoff::Error::permanent(DaemonError::HttpError(e))
				}
			})?;

			response.json::<T>().await.map_err(|e| {
				backoff::Error::permanent(DaemonError::InvalidResponse(e.to_string()))
			})
		})
		.await
	}

	fn mark_connected(&self) {
		let was_connected = {
			let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
			std::mem::replace(&mut state.connected, true)
		};
		if !was_connected {
			info!("Reconnected to daemon {}:{}", self.host, self.port);
			let _ = self.events.send(DaemonEvent::Connect);
		}
	}

	fn mark_disconnected(&self, error: &DaemonError) {
		let was_connected = {
			let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
			std::mem::replace(&mut state.connected, false)
		};
		if was_connected {
			warn!("Lost connection to daemon {}:{}: {}", self.host, self.port, error);
			let _ = self.events.send(DaemonEvent::Disconnect(error.to_string()));
		}
	}

	fn apply_info(&self, ssl: bool, info: &InfoResponse) {
		let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
		state.ssl = ssl;
		state.ssl_determined = true;
		state.daemon_type = if info.is_cache_api {
			DaemonType::BlockchainCacheApi
		} else {
			DaemonType::ConventionalDaemon
		};
		state.daemon_type_determined = true;
		state.local_height = info.height;
		state.network_height = info.network_height.max(info.height);
	}

	async fn update_fee_info(&self, ssl: bool) -> Result<(), DaemonError> {
		let fee: FeeResponse = self.request(ssl, "fee", None).await?;
		debug!("Node fee: {} to {:?}", fee.amount, fee.address);
		let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
		state.fee = (fee.address, fee.amount);
		Ok(())
	}
}

#[async_trait::async_trait]
impl Daemon for HttpDaemon {
	async fn init(&self) -> Result<(), DaemonError> {
		let current = self.snapshot();
		let candidates: &[bool] = if current.ssl_determined {
			if current.ssl { &[true] } else { &[false] }
		} else {
			&[true, false]
		};

		let mut last_error = None;
		for &ssl in candidates {
			match self.request::<InfoResponse>(ssl, "info", None).await {
				Ok(info) => {
					self.apply_info(ssl, &info);
					self.mark_connected();
					if let Err(e) = self.update_fee_info(ssl).await {
						warn!("Failed to fetch node fee from {}:{}: {}", self.host, self.port, e);
					}
					info!(
						"Connected to {:?} at {}:{} (ssl: {}, height {})",
						self.snapshot().daemon_type,
						self.host,
						self.port,
						ssl,
						info.height
					);
					return Ok(());
				}
				Err(e) => {
					debug!("Daemon probe with ssl={} failed: {}", ssl, e);
					last_error = Some(e);
				}
			}
		}

		let reason = last_error
			.map(|e| e.to_string())
			.unwrap_or_else(|| "no transport available".to_string());
		let error = DaemonError::ConnectError {
			host: self.host.clone(),
			port: self.port,
			reason,
		};
		self.mark_disconnected(&error);
		Err(error)
	}

	async fn update_daemon_info(&self) -> Result<(), DaemonError> {
		let ssl = self.snapshot().ssl;
		match self.request::<InfoResponse>(ssl, "info", None).await {
			Ok(info) => {
				self.apply_info(ssl, &info);
				self.mark_connected();
				Ok(())
			}
			Err(e) => {
				self.mark_disconnected(&e);
				Err(e)
			}
		}
	}

	async fn get_wallet_sync_data(
		&self,
		request: &GetBlocksRequest,
	) -> Result<Vec<Block>, DaemonError> {
		let current = self.snapshot();
		let path = match current.daemon_type {
			DaemonType::ConventionalDaemon => "getwalletsyncdata",
			DaemonType::BlockchainCacheApi => "sync",
		};

		let body = serde_json::to_value(request)?;
		match self
			.request::<WalletSyncDataResponse>(current.ssl, path, Some(&body))
			.await
		{
			Ok(response) => {
				self.mark_connected();
				if let Some(top) = &response.top_block {
					let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
					state.local_height = state.local_height.max(top.height);
					state.network_height = state.network_height.max(top.height);
				}
				debug!(
					"Fetched {} blocks from height {} (synced: {})",
					response.items.len(),
					request.start_height,
					response.synced
				);
				Ok(response.items)
			}
			Err(e) => {
				self.mark_disconnected(&e);
				Err(e)
			}
		}
	}

	fn get_node_fee(&self) -> (String, u64) {
		self.snapshot().fee
	}

	fn get_connection_info(&self) -> DaemonConnection {
		let state = self.snapshot();
		DaemonConnection {
			host: self.host.clone(),
			port: self.port,
			daemon_type: state.daemon_type,
			daemon_type_determined: state.daemon_type_determined,
			ssl: state.ssl,
			ssl_determined: state.ssl_determined,
		}
	}

	fn local_daemon_block_count(&self) -> u64 {
		self.snapshot().local_height
	}

	fn network_block_count(&self) -> u64 {
		self.snapshot().network_height
	}

	fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
		self.events.subscribe()
	}
}
