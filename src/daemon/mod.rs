//! Block-data source integration
//!
//! The wallet only consumes the narrow [`Daemon`] interface: fetch block data for scanning,
//! report heights and the node fee, and announce connectivity changes. [`HttpDaemon`] talks to a
//! real node over HTTP; [`InMemoryDaemon`] serves a scripted chain.

/// HTTP client for conventional daemons and blockchain cache APIs
mod client;
/// Scripted in-memory chain
mod memory;
/// Type definitions for daemon data structures
mod types;

pub use client::HttpDaemon;
pub use memory::{
    InMemoryDaemon, Recipient, build_coinbase_transaction, build_transaction, output_key_image,
};
pub use types::*;

use tokio::sync::broadcast;

#[async_trait::async_trait]
pub trait Daemon: Send + Sync {
    /// Connects, determines SSL and node type, and loads heights and the node fee.
    async fn init(&self) -> Result<(), DaemonError>;

    /// Refreshes heights and fee information.
    async fn update_daemon_info(&self) -> Result<(), DaemonError>;

    async fn get_wallet_sync_data(
        &self,
        request: &GetBlocksRequest,
    ) -> Result<Vec<Block>, DaemonError>;

    /// Fee address and amount requested by the node; `("", 0)` until a successful `init`.
    fn get_node_fee(&self) -> (String, u64);

    fn get_connection_info(&self) -> DaemonConnection;

    fn local_daemon_block_count(&self) -> u64;

    fn network_block_count(&self) -> u64;

    fn subscribe(&self) -> broadcast::Receiver<DaemonEvent>;
}
