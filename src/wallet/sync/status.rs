//! Known block hashes used to resume scanning and to detect chain reorganisations.

use serde::{Deserialize, Serialize};

/// A block hash kept permanently at a fixed interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCheckpoint {
    pub height: u64,
    pub hash: String,
}

/// Field order is the serialized order and part of the wallet file format.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynchronizationStatus {
    /// Newest first
    block_hash_checkpoints: Vec<BlockCheckpoint>,
    /// Newest first; entry `i` is the hash at `last_known_block_height - i`
    last_known_block_hashes: Vec<String>,
    last_known_block_height: u64,
}

impl SynchronizationStatus {
    pub fn new(start_height: u64) -> Self {
        Self {
            block_hash_checkpoints: Vec::new(),
            last_known_block_hashes: Vec::new(),
            last_known_block_height: start_height.saturating_sub(1),
        }
    }

    pub fn last_known_block_height(&self) -> u64 {
        self.last_known_block_height
    }

    pub fn known_hash(&self, height: u64) -> Option<&str> {
        if height > self.last_known_block_height {
            return None;
        }
        let offset = (self.last_known_block_height - height) as usize;
        self.last_known_block_hashes
            .get(offset)
            .map(String::as_str)
            .or_else(|| {
                self.block_hash_checkpoints
                    .iter()
                    .find(|c| c.height == height)
                    .map(|c| c.hash.as_str())
            })
    }

    /// Newest-first hashes of blocks below `start_height`, for the daemon to find the fork point.
    pub fn checkpoints_below(&self, start_height: u64) -> Vec<String> {
        let recent = self
            .last_known_block_hashes
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                self.last_known_block_height
                    .checked_sub(*i as u64)
                    .is_some_and(|height| height < start_height)
            })
            .map(|(_, hash)| hash.clone());

        let permanent = self
            .block_hash_checkpoints
            .iter()
            .filter(|c| c.height < start_height)
            .map(|c| c.hash.clone());

        let mut hashes: Vec<String> = Vec::new();
        for hash in recent.chain(permanent) {
            if !hashes.contains(&hash) {
                hashes.push(hash);
            }
        }
        hashes
    }

    /// Remembers the hash of a processed block.
    pub fn record_block(
        &mut self,
        height: u64,
        hash: &str,
        max_hashes: usize,
        checkpoint_interval: u64,
    ) {
        if !self.last_known_block_hashes.is_empty() {
            if height <= self.last_known_block_height {
                return;
            }
            if height != self.last_known_block_height + 1 {
                self.last_known_block_hashes.clear();
            }
        }

        self.last_known_block_hashes.insert(0, hash.to_string());
        self.last_known_block_hashes.truncate(max_hashes.max(1));
        self.last_known_block_height = height;

        if checkpoint_interval > 0
            && height % checkpoint_interval == 0
            && !self.block_hash_checkpoints.iter().any(|c| c.height == height)
        {
            self.block_hash_checkpoints.insert(
                0,
                BlockCheckpoint {
                    height,
                    hash: hash.to_string(),
                },
            );
        }
    }

    /// Forgets every hash above `height`.
    pub fn rewind(&mut self, height: u64) {
        if height < self.last_known_block_height {
            let dropped = ((self.last_known_block_height - height) as usize)
                .min(self.last_known_block_hashes.len());
            self.last_known_block_hashes.drain(..dropped);
            self.last_known_block_height = height;
        }
        self.block_hash_checkpoints.retain(|c| c.height <= height);
    }

    pub fn reset(&mut self, start_height: u64) {
        *self = Self::new(start_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_with(heights: std::ops::RangeInclusive<u64>) -> SynchronizationStatus {
        let mut status = SynchronizationStatus::new(*heights.start());
        for height in heights {
            status.record_block(height, &format!("h{}", height), 5, 10);
        }
        status
    }

    #[test]
    fn test_keeps_newest_hashes() {
        let status = status_with(1..=12);
        assert_eq!(status.last_known_block_height(), 12);
        assert_eq!(status.known_hash(12), Some("h12"));
        assert_eq!(status.known_hash(8), Some("h8"));
        assert_eq!(status.known_hash(7), None);
        // permanent checkpoint
        assert_eq!(status.known_hash(10), Some("h10"));
        assert_eq!(status.checkpoints_below(13), vec!["h12", "h11", "h10", "h9", "h8"]);
    }

    #[test]
    fn test_checkpoints_below_start_height_only() {
        let status = status_with(1..=12);
        assert_eq!(status.checkpoints_below(10), vec!["h9", "h8"]);
        assert!(status.checkpoints_below(0).is_empty());
    }

    #[test]
    fn test_rewind_truncates() {
        let mut status = status_with(1..=12);
        status.rewind(9);
        assert_eq!(status.last_known_block_height(), 9);
        assert_eq!(status.known_hash(9), Some("h9"));
        assert_eq!(status.known_hash(10), None);

        status.rewind(2);
        assert_eq!(status.last_known_block_height(), 2);
        assert_eq!(status.known_hash(2), None);

        status.record_block(3, "x3", 5, 10);
        assert_eq!(status.known_hash(3), Some("x3"));
    }

    #[test]
    fn test_non_contiguous_block_restarts_list() {
        let mut status = status_with(1..=3);
        status.record_block(7, "h7", 5, 10);
        assert_eq!(status.known_hash(3), None);
        assert_eq!(status.known_hash(7), Some("h7"));
    }
}
