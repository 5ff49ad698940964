//! Wallet engine.
//!
//! [`WalletBackend`] is the entry point. It ties together key derivation, subwallet bookkeeping,
//! the transaction ledger, chain scanning and encrypted persistence.

pub mod backend;
pub mod keys;
pub mod ledger;
pub mod persistence;
pub mod state;
pub mod subwallets;
pub mod sync;
pub mod types;

pub use backend::WalletBackend;
pub use keys::{Seed, WalletKeys, generate_random_seed};
pub use ledger::{Balance, Transaction, Transfer};
pub use sync::{SyncEvent, SyncState, SyncStatus};
pub use types::*;
