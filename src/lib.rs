//! Synchronization engine for CryptoNote wallets.
//!
//! Derives keys and addresses, scans a daemon's blocks for owned outputs and spends, keeps
//! per-subwallet balances and transactions, and stores the whole wallet encrypted.

pub mod address;
pub mod config;
pub mod crypto;
pub mod daemon;
pub mod utils;
pub mod wallet;

pub use config::{Config, KdfParams};
pub use wallet::{WalletBackend, WalletError};
