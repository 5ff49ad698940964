//! Progress tracking for wallet synchronization.
//!
//! This module provides the `SyncProgressTracker`, which records the blocks processed during a
//! sync session, counts the wallet transactions found in them, and notices gaps in the block
//! heights served by the daemon.

use tracing::{info, warn};

/// Service for tracking synchronization progress
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
    /// The highest block height we've processed
    highest_processed_height: u64,
    /// Height of the previously processed block
    last_height: Option<u64>,
    /// Starting height for this sync session
    start_height: u64,
    blocks_processed: usize,
    transactions_found: usize,
    /// Non-contiguous jumps seen in served block heights
    gaps: Vec<(u64, u64)>,
    /// Last height at which we logged progress
    last_logged_height: u64,
}

impl SyncProgressTracker {
    pub fn new(start_height: u64) -> Self {
        Self {
            highest_processed_height: start_height,
            last_height: None,
            start_height,
            blocks_processed: 0,
            transactions_found: 0,
            gaps: Vec::new(),
            last_logged_height: start_height,
        }
    }

    /// Record a processed block and the number of wallet transactions found in it.
    pub fn record_block(&mut self, height: u64, transactions_found: usize) {
        if let Some(last) = self.last_height {
            if height > last + 1 {
                self.gaps.push((last, height));
            }
        }
        self.last_height = Some(height);
        self.highest_processed_height = self.highest_processed_height.max(height);
        self.blocks_processed += 1;
        self.transactions_found += transactions_found;
    }

    /// Forget the current position after a rollback; counters are kept.
    pub fn record_rewind(&mut self, height: u64) {
        self.last_height = Some(height);
        self.highest_processed_height = height;
    }

    pub fn is_sync_complete(&self, network_height: u64) -> bool {
        self.highest_processed_height >= network_height
    }

    /// Log progress every 1000 blocks or when forced.
    pub fn log_progress(&mut self, force: bool) {
        let blocks_since_last_log = self
            .highest_processed_height
            .saturating_sub(self.last_logged_height);
        let should_log = force || blocks_since_last_log >= 1000;

        if should_log && self.blocks_processed > 0 {
            info!(
                "Sync progress: {} blocks processed, {} transactions found, up to height {}",
                self.blocks_processed, self.transactions_found, self.highest_processed_height
            );
            self.last_logged_height = self.highest_processed_height;
        }
    }

    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            start_height: self.start_height,
            highest_processed_height: self.highest_processed_height,
            blocks_processed: self.blocks_processed,
            transactions_found: self.transactions_found,
            gaps: self.gaps.clone(),
        }
    }

    /// Warn about every gap seen in this session.
    pub fn report_gaps(&self) {
        for (start, end) in &self.gaps {
            warn!("Gap detected: missing blocks between {} and {}", start, end);
        }
    }
}

/// Statistics about the sync progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub start_height: u64,
    pub highest_processed_height: u64,
    pub blocks_processed: usize,
    pub transactions_found: usize,
    pub gaps: Vec<(u64, u64)>,
}

impl SyncStats {
    /// Get a human-readable summary of the sync statistics
    pub fn summary(&self) -> String {
        format!(
            "Sync from {} to {}: {} blocks, {} transactions{}",
            self.start_height,
            self.highest_processed_height,
            self.blocks_processed,
            self.transactions_found,
            if self.gaps.is_empty() {
                String::new()
            } else {
                format!(" ({} gaps)", self.gaps.len())
            }
        )
    }
}
