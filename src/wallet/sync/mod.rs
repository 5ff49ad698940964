//! Wallet Synchronization Module
//!
//! This module provides the logic and services for scanning the chain into a wallet. It is composed
//! of several submodules, each responsible for a specific aspect of the sync process:
//!
//! - `orchestrator`: The `WalletSynchronizer`, which runs the scan loop and commits blocks.
//! - `events`: Event types and handler traits used to report what the scan found.
//! - `progress_tracker`: Counts processed blocks and found transactions and notices gaps.
//! - `status`: Known block hashes used to resume scanning and detect reorganisations.
//! - `strategies`: Block-fetching strategies and their configuration.
//! - `transaction_processor`: Matches outputs and key images in a block against the subwallets.
//!
//! Scanning fetches blocks without holding the wallet lock and commits each batch atomically, so
//! queries and mutations from the application always see a consistent wallet.

/// Event system for decoupled communication during sync
pub mod events;
/// Main coordinator for the wallet sync process
pub mod orchestrator;
/// Tracks synchronization progress and statistics
pub mod progress_tracker;
/// Known block hashes and checkpoints
pub mod status;
/// Pluggable block-fetching strategies
pub mod strategies;
/// Output and spend detection
pub mod transaction_processor;

pub use events::SyncEvent;
pub use orchestrator::*;
pub use status::{BlockCheckpoint, SynchronizationStatus};
