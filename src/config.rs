//! Per-wallet configuration.
//!
//! Every wallet instance carries its own [`Config`]; nothing here is process-global, so wallets on
//! different networks or with different primitive providers can coexist.

use crate::address::AddressCodec;
use crate::crypto::{CryptoProvider, Ed25519Provider};

use std::sync::Arc;
use std::time::Duration;

/// Argon2id cost parameters used when encrypting wallet files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Varint network prefix of every address
    pub address_prefix: u64,
    pub decimal_places: u32,
    pub ticker: String,
    /// Blocks an input must be buried under before it counts as unlocked
    pub maturity_window: u64,
    /// Upper bound on blocks requested per daemon call
    pub blocks_per_daemon_request: u64,
    pub sync_interval: Duration,
    pub daemon_update_interval: Duration,
    pub daemon_request_timeout: Duration,
    pub scan_coinbase_transactions: bool,
    pub last_known_block_hashes_size: usize,
    /// A block hash is kept permanently every this many blocks
    pub block_hash_checkpoints_interval: u64,
    pub kdf: KdfParams,
    pub crypto: Arc<dyn CryptoProvider>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address_prefix: 3914525,
            decimal_places: 2,
            ticker: "TRTL".to_string(),
            maturity_window: 10,
            blocks_per_daemon_request: 100,
            sync_interval: Duration::from_secs(1),
            daemon_update_interval: Duration::from_secs(10),
            daemon_request_timeout: Duration::from_secs(10),
            scan_coinbase_transactions: false,
            last_known_block_hashes_size: 50,
            block_hash_checkpoints_interval: 5000,
            kdf: KdfParams::default(),
            crypto: Arc::new(Ed25519Provider::new()),
        }
    }
}

impl Config {
    pub fn with_address_prefix(mut self, prefix: u64) -> Self {
        self.address_prefix = prefix;
        self
    }

    pub fn with_decimal_places(mut self, decimal_places: u32, ticker: impl Into<String>) -> Self {
        self.decimal_places = decimal_places;
        self.ticker = ticker.into();
        self
    }

    pub fn with_maturity_window(mut self, blocks: u64) -> Self {
        self.maturity_window = blocks;
        self
    }

    pub fn with_blocks_per_daemon_request(mut self, blocks: u64) -> Self {
        self.blocks_per_daemon_request = blocks.max(1);
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_daemon_update_interval(mut self, interval: Duration) -> Self {
        self.daemon_update_interval = interval;
        self
    }

    pub fn with_daemon_request_timeout(mut self, timeout: Duration) -> Self {
        self.daemon_request_timeout = timeout;
        self
    }

    pub fn with_scan_coinbase_transactions(mut self, scan: bool) -> Self {
        self.scan_coinbase_transactions = scan;
        self
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn address_codec(&self) -> AddressCodec {
        AddressCodec::new(self.address_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.address_codec().standard_length(), 99);
        assert_eq!(config.maturity_window, 10);
        assert_eq!(config.kdf, KdfParams::default());
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_address_prefix(8411)
            .with_decimal_places(8, "DEG")
            .with_blocks_per_daemon_request(0);
        assert_eq!(config.address_codec().standard_length(), 97);
        assert_eq!(config.ticker, "DEG");
        assert_eq!(config.blocks_per_daemon_request, 1);
    }
}
