//! Types for the block-data source ("daemon") integration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors raised while talking to a daemon.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("Failed to connect to daemon at {host}:{port}: {reason}")]
    ConnectError {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid daemon URL: {0}")]
    InvalidUrl(String),

    #[error("Daemon returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Daemon request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Daemon is offline")]
    Offline,

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Kind of node behind a daemon connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DaemonType {
    /// A regular node serving `/getwalletsyncdata`
    #[default]
    ConventionalDaemon,
    /// A blockchain cache API serving `/sync`
    BlockchainCacheApi,
}

/// Connection details reported by [`crate::daemon::Daemon::get_connection_info`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConnection {
    pub host: String,
    pub port: u16,
    pub daemon_type: DaemonType,
    pub daemon_type_determined: bool,
    pub ssl: bool,
    pub ssl_determined: bool,
}

/// Connectivity notifications emitted by a daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonEvent {
    Connect,
    Disconnect(String),
}

/// Parameters of a block-data request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetBlocksRequest {
    /// Newest-first hashes of blocks the wallet already holds
    pub block_hash_checkpoints: Vec<String>,
    pub start_height: u64,
    pub start_timestamp: u64,
    pub block_count: u64,
    pub skip_coinbase_transactions: bool,
}

/// An output as reported by the daemon. Keys are left as untrusted hex strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyOutput {
    pub key: String,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_index: Option<u64>,
}

/// A spent input, identified by its key image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyInput {
    pub amount: u64,
    #[serde(rename = "k_image")]
    pub key_image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawCoinbaseTransaction {
    pub outputs: Vec<KeyOutput>,
    pub hash: String,
    #[serde(rename = "txPublicKey")]
    pub transaction_public_key: String,
    #[serde(default)]
    pub unlock_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub outputs: Vec<KeyOutput>,
    pub hash: String,
    #[serde(rename = "txPublicKey")]
    pub transaction_public_key: String,
    #[serde(default)]
    pub unlock_time: u64,
    #[serde(rename = "paymentID", default)]
    pub payment_id: String,
    #[serde(rename = "inputs", default)]
    pub key_inputs: Vec<KeyInput>,
}

/// A block together with the transaction data a wallet needs to scan it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub block_hash: String,
    pub block_height: u64,
    pub block_timestamp: u64,
    #[serde(rename = "coinbaseTX", default, skip_serializing_if = "Option::is_none")]
    pub coinbase_transaction: Option<RawCoinbaseTransaction>,
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TopBlock {
    pub hash: String,
    pub height: u64,
}

/// Body of a `/getwalletsyncdata` or `/sync` response.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletSyncDataResponse {
    pub items: Vec<Block>,
    pub synced: bool,
    pub top_block: Option<TopBlock>,
}

/// Body of an `/info` response.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InfoResponse {
    pub height: u64,
    #[serde(alias = "networkHeight")]
    pub network_height: u64,
    #[serde(rename = "isCacheApi")]
    pub is_cache_api: bool,
}

/// Body of a `/fee` response.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FeeResponse {
    pub address: String,
    pub amount: u64,
}
