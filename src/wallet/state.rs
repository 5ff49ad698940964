use crate::wallet::subwallets::SubWallets;
use crate::wallet::sync::SynchronizationStatus;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Everything a wallet owns, guarded by one lock shared by the scan task and API calls.
#[derive(Debug, Clone)]
pub struct WalletState {
    pub sub_wallets: SubWallets,
    pub sync_status: SynchronizationStatus,
    pub start_timestamp: u64,
    pub start_height: u64,
    /// Bumped by every mutation that invalidates an in-flight scan
    pub epoch: u64,
}

impl WalletState {
    pub fn new(sub_wallets: SubWallets, start_height: u64, start_timestamp: u64) -> Self {
        Self {
            sub_wallets,
            sync_status: SynchronizationStatus::new(start_height),
            start_timestamp,
            start_height,
            epoch: 0,
        }
    }

    pub fn rewind(&mut self, height: u64) {
        self.sub_wallets.rewind(height);
        self.sync_status.rewind(height);
        self.epoch += 1;
    }

    pub fn reset(&mut self, start_height: u64, start_timestamp: u64) {
        self.sub_wallets.reset(start_height, start_timestamp);
        self.sync_status.reset(start_height);
        self.start_height = start_height;
        self.start_timestamp = start_timestamp;
        self.epoch += 1;
    }

    /// Marks in-flight scans stale without changing any data.
    pub fn invalidate(&mut self) {
        self.epoch += 1;
    }
}

/// Locks the shared state, recovering the guard if a previous holder panicked.
pub(crate) fn lock_state(state: &Mutex<WalletState>) -> MutexGuard<'_, WalletState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
