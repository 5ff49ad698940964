//! Wallet synchronizer and integration point for all sync services.
//!
//! This module defines the `WalletSynchronizer`, which scans the daemon's blocks into the shared
//! wallet state. It owns the block-fetching strategy, the transaction processor and the event
//! dispatcher, and runs either as a background task (`start`/`stop`) or in the foreground
//! (`sync_to_latest`).
//!
//! The synchronizer is responsible for:
//! - Building each block request from the lowest subwallet scan height and the known block hashes
//! - Fetching blocks without holding the state lock, then committing them under it
//! - Detecting chain reorganisations and rewinding before applying a replacement block
//! - Tracking connectivity and sync status and turning both into events
//!
//! Every mutation that makes an in-flight batch meaningless (rewind, reset, node swap, subwallet
//! import) bumps the state epoch, and a batch fetched under an older epoch is discarded.

use crate::config::Config;
use crate::daemon::{Daemon, DaemonEvent, GetBlocksRequest};
use crate::wallet::WalletError;
use crate::wallet::state::{WalletState, lock_state};
use crate::wallet::sync::{
    events::{
        BroadcastHandler, EventDispatcher, LoggingHandler, SyncEvent, SyncEventHandler,
        transaction_events,
    },
    progress_tracker::{SyncProgressTracker, SyncStats},
    strategies::{AdaptiveBatchSync, SyncConfig, SyncStrategy},
    transaction_processor::TransactionProcessor,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle of the background scan task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Stopped,
    Starting,
    Running,
}

/// Heights reported by [`WalletSynchronizer::get_sync_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    /// Lowest scan height over all subwallets
    pub wallet_height: u64,
    pub local_daemon_height: u64,
    pub network_height: u64,
}

struct SyncFlags {
    state: SyncState,
    synced: bool,
    connected: bool,
}

struct Worker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Result of one fetch-and-commit round.
#[derive(Debug, Default)]
struct PassOutcome {
    blocks: usize,
    caught_up: bool,
    /// The batch was fetched under an older epoch and dropped
    stale: bool,
    rewound: bool,
    /// Block 0 was committed, which leaves a fresh wallet's height unchanged
    scanned_genesis: bool,
    wallet_height: u64,
}

impl PassOutcome {
    fn advanced(&self, previous_height: u64) -> bool {
        self.rewound || self.scanned_genesis || self.wallet_height > previous_height
    }
}

pub struct WalletSynchronizer {
    config: Config,
    state: Arc<Mutex<WalletState>>,
    daemon: RwLock<Arc<dyn Daemon>>,
    /// Bumped by `swap_node` so the scan task resubscribes to the new daemon's events
    daemon_generation: AtomicU64,
    events: broadcast::Sender<SyncEvent>,
    processor: TransactionProcessor,
    strategy: tokio::sync::Mutex<Box<dyn SyncStrategy>>,
    dispatcher: tokio::sync::Mutex<EventDispatcher>,
    flags: Mutex<SyncFlags>,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl WalletSynchronizer {
    pub fn new(config: Config, state: Arc<Mutex<WalletState>>, daemon: Arc<dyn Daemon>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler(Box::new(LoggingHandler));
        dispatcher.register_handler(Box::new(BroadcastHandler::new(events.clone())));

        let strategy: Box<dyn SyncStrategy> =
            Box::new(AdaptiveBatchSync::new(SyncConfig::from(&config)));
        debug!("Using {} sync strategy", strategy.name());

        Self {
            processor: TransactionProcessor::new(config.crypto.clone()),
            config,
            state,
            daemon: RwLock::new(daemon),
            daemon_generation: AtomicU64::new(0),
            events,
            strategy: tokio::sync::Mutex::new(strategy),
            dispatcher: tokio::sync::Mutex::new(dispatcher),
            flags: Mutex::new(SyncFlags {
                state: SyncState::Stopped,
                synced: false,
                connected: true,
            }),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Adds a handler that receives every event after the built-in ones.
    pub async fn register_handler(&self, handler: Box<dyn SyncEventHandler>) {
        self.dispatcher.lock().await.register_handler(handler);
    }

    pub fn current_daemon(&self) -> Arc<dyn Daemon> {
        self.daemon
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sync_state(&self) -> SyncState {
        self.flags().state
    }

    pub fn get_sync_status(&self) -> SyncStatus {
        let wallet_height = lock_state(&self.state).sub_wallets.min_scan_height();
        let daemon = self.current_daemon();
        SyncStatus {
            wallet_height,
            local_daemon_height: daemon.local_daemon_block_count().saturating_sub(1),
            network_height: daemon.network_block_count().saturating_sub(1),
        }
    }

    /// Launches the background scan task. Does nothing while it is already starting or running.
    pub async fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            debug!("Synchronizer already started");
            return;
        }

        self.set_sync_state(SyncState::Starting);
        let (stop, stop_rx) = watch::channel(false);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run(stop_rx).await });
        *worker = Some(Worker { stop, handle });
        info!("Wallet synchronizer started");
    }

    /// Stops the background task and waits for it to finish. Committed progress is kept.
    pub async fn stop(&self) {
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            let _ = worker.stop.send(true);
            if let Err(e) = worker.handle.await {
                warn!("Sync task ended abnormally: {}", e);
            }
            info!("Wallet synchronizer stopped");
        }
        self.set_sync_state(SyncState::Stopped);
    }

    /// Asks the background task to stop without waiting for it.
    pub fn signal_stop(&self) {
        if let Ok(mut worker) = self.worker.try_lock() {
            if let Some(worker) = worker.take() {
                let _ = worker.stop.send(true);
            }
        }
    }

    /// Scans in the foreground until the wallet has caught up with the daemon.
    pub async fn sync_to_latest(&self) -> Result<SyncStats, WalletError> {
        let daemon = self.current_daemon();
        if daemon.network_block_count() == 0 {
            daemon.init().await?;
        }

        let start_height = lock_state(&self.state).sub_wallets.min_scan_height();
        let mut progress = SyncProgressTracker::new(start_height);
        info!("Starting wallet synchronization from height {}", start_height);

        let mut wallet_height = start_height;
        loop {
            let outcome = self.sync_pass(&mut progress).await?;
            if outcome.caught_up {
                break;
            }
            if !outcome.stale && !outcome.advanced(wallet_height) {
                warn!(
                    "Daemon returned no new blocks above height {}, stopping",
                    wallet_height
                );
                break;
            }
            wallet_height = outcome.wallet_height;
            progress.log_progress(false);
        }

        progress.log_progress(true);
        progress.report_gaps();
        let stats = progress.get_stats();
        info!("{}", stats.summary());
        Ok(stats)
    }

    /// Rolls the wallet back so every block above `height` is scanned again.
    pub async fn rewind(&self, height: u64) {
        let wallet_height = {
            let mut state = lock_state(&self.state);
            state.rewind(height);
            state.sub_wallets.min_scan_height()
        };
        let events = [SyncEvent::Rewind { height }, self.height_change(wallet_height)];
        self.dispatch(&events).await;
    }

    /// Drops every transaction and input and rescans from `scan_height`.
    pub async fn reset(&self, scan_height: u64, timestamp: u64) {
        let wallet_height = {
            let mut state = lock_state(&self.state);
            state.reset(scan_height, timestamp);
            state.sub_wallets.min_scan_height()
        };
        info!("Wallet reset to height {}", scan_height);
        self.dispatch(&[self.height_change(wallet_height)]).await;
    }

    /// Points the synchronizer at another daemon. Wallet state is untouched.
    pub async fn swap_node(&self, daemon: Arc<dyn Daemon>) {
        if let Err(e) = daemon.init().await {
            warn!("New daemon failed to initialise, scanning will retry: {}", e);
        }

        let connection = daemon.get_connection_info();
        *self.daemon.write().unwrap_or_else(PoisonError::into_inner) = daemon;
        self.daemon_generation.fetch_add(1, Ordering::SeqCst);
        lock_state(&self.state).invalidate();

        info!("Swapped daemon to {}:{}", connection.host, connection.port);
    }

    async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let mut generation = self.daemon_generation.load(Ordering::SeqCst);
        let daemon = self.current_daemon();
        let mut daemon_events = daemon.subscribe();
        let init = tokio::select! {
            biased;
            _ = stop.changed() => {
                self.set_sync_state(SyncState::Stopped);
                return;
            }
            result = daemon.init() => result,
        };
        if let Err(e) = init {
            warn!("Daemon initialisation failed, will retry: {}", e);
        }
        drop(daemon);

        let mut sync_tick = tokio::time::interval(self.config.sync_interval);
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut daemon_tick = tokio::time::interval(self.config.daemon_update_interval);
        daemon_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately and init just refreshed the daemon info
        daemon_tick.tick().await;

        let start_height = lock_state(&self.state).sub_wallets.min_scan_height();
        let mut progress = SyncProgressTracker::new(start_height);
        let mut network_count = self.current_daemon().network_block_count();
        self.set_sync_state(SyncState::Running);

        'run: loop {
            let current = self.daemon_generation.load(Ordering::SeqCst);
            if current != generation {
                generation = current;
                daemon_events = self.current_daemon().subscribe();
            }

            tokio::select! {
                biased;
                _ = stop.changed() => break 'run,
                event = daemon_events.recv() => match event {
                    Ok(event) => self.handle_daemon_event(event).await,
                    Err(RecvError::Lagged(missed)) => debug!("Missed {} daemon events", missed),
                    Err(RecvError::Closed) => {
                        generation = self.daemon_generation.load(Ordering::SeqCst);
                        daemon_events = self.current_daemon().subscribe();
                    }
                },
                _ = daemon_tick.tick() => {
                    let daemon = self.current_daemon();
                    match daemon.update_daemon_info().await {
                        Ok(()) => {
                            let count = daemon.network_block_count();
                            if count != network_count {
                                network_count = count;
                                let wallet_height =
                                    lock_state(&self.state).sub_wallets.min_scan_height();
                                self.dispatch(&[self.height_change(wallet_height)]).await;
                            }
                        }
                        Err(e) => warn!("Failed to update daemon info: {}", e),
                    }
                }
                _ = sync_tick.tick() => {
                    let mut wallet_height = lock_state(&self.state).sub_wallets.min_scan_height();
                    loop {
                        let result = tokio::select! {
                            biased;
                            _ = stop.changed() => break 'run,
                            result = self.sync_pass(&mut progress) => result,
                        };
                        match result {
                            Ok(outcome) if outcome.stale => continue,
                            Ok(outcome) if outcome.caught_up || !outcome.advanced(wallet_height) => break,
                            Ok(outcome) => {
                                wallet_height = outcome.wallet_height;
                                progress.log_progress(false);
                            }
                            Err(e) => {
                                warn!("Sync pass failed, retrying next tick: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
        }

        progress.log_progress(true);
        debug!("{}", progress.get_stats().summary());
        self.set_sync_state(SyncState::Stopped);
    }

    /// Fetches one batch and commits it. The state lock is never held across the fetch.
    async fn sync_pass(&self, progress: &mut SyncProgressTracker) -> Result<PassOutcome, WalletError> {
        let (request, epoch) = {
            let state = lock_state(&self.state);
            let min_scan_height = state.sub_wallets.min_scan_height();
            let start_timestamp = state.sub_wallets.min_start_timestamp();
            // scan height 0 is ambiguous until the genesis hash has been recorded
            let genesis_pending = state.sync_status.known_hash(0).is_none();
            let start_height = if min_scan_height == 0 && (start_timestamp > 0 || genesis_pending) {
                0
            } else {
                min_scan_height + 1
            };
            let request = GetBlocksRequest {
                block_hash_checkpoints: state.sync_status.checkpoints_below(start_height.max(1)),
                start_height,
                start_timestamp: if start_height == 0 { start_timestamp } else { 0 },
                ..Default::default()
            };
            (request, state.epoch)
        };

        let daemon = self.current_daemon();
        let fetched = {
            let mut strategy = self.strategy.lock().await;
            strategy.fetch_blocks(daemon.as_ref(), request).await
        };
        let blocks = match fetched {
            Ok(blocks) => {
                self.set_connected(true).await;
                blocks
            }
            Err(e) => {
                self.set_connected(false).await;
                return Err(e.into());
            }
        };

        let mut outcome = PassOutcome {
            blocks: blocks.len(),
            ..Default::default()
        };
        let mut events = Vec::new();
        {
            let mut state = lock_state(&self.state);
            if state.epoch != epoch {
                debug!("Wallet changed during fetch, discarding {} blocks", blocks.len());
                outcome.stale = true;
                return Ok(outcome);
            }

            for block in &blocks {
                let forked = state
                    .sync_status
                    .known_hash(block.block_height)
                    .is_some_and(|known| known != block.block_hash);
                if forked {
                    let height = block.block_height.saturating_sub(1);
                    warn!(
                        "Block {} at height {} replaces a known block, rewinding to {}",
                        block.block_hash, block.block_height, height
                    );
                    state.rewind(height);
                    progress.record_rewind(height);
                    outcome.rewound = true;
                    events.push(SyncEvent::Rewind { height });
                }

                let found = self.processor.process_block(&mut state.sub_wallets, block);
                let found_count = found.len();
                for transaction in found {
                    events.extend(transaction_events(&transaction));
                    state.sub_wallets.add_transaction(transaction);
                }

                state.sub_wallets.advance_scan_heights(block.block_height);
                state.sync_status.record_block(
                    block.block_height,
                    &block.block_hash,
                    self.config.last_known_block_hashes_size,
                    self.config.block_hash_checkpoints_interval,
                );
                progress.record_block(block.block_height, found_count);
                outcome.scanned_genesis |= block.block_height == 0;
            }

            outcome.wallet_height = state.sub_wallets.min_scan_height();
        }

        if outcome.blocks > 0 {
            events.push(self.height_change(outcome.wallet_height));
        }
        self.dispatch(&events).await;

        let network_count = daemon.network_block_count();
        outcome.caught_up =
            blocks.is_empty() || (network_count > 0 && outcome.wallet_height + 1 >= network_count);
        self.set_synced(outcome.caught_up).await;

        Ok(outcome)
    }

    async fn handle_daemon_event(&self, event: DaemonEvent) {
        match event {
            DaemonEvent::Connect => self.set_connected(true).await,
            DaemonEvent::Disconnect(reason) => {
                let changed = self.swap_connected(false);
                if changed {
                    self.dispatch(&[SyncEvent::Disconnect(reason)]).await;
                }
            }
        }
    }

    async fn set_connected(&self, connected: bool) {
        if self.swap_connected(connected) {
            let event = if connected {
                SyncEvent::Connect
            } else {
                SyncEvent::Disconnect("daemon request failed".to_string())
            };
            self.dispatch(&[event]).await;
        }
    }

    /// Returns whether the flag changed.
    fn swap_connected(&self, connected: bool) -> bool {
        std::mem::replace(&mut self.flags().connected, connected) != connected
    }

    async fn set_synced(&self, synced: bool) {
        let changed = std::mem::replace(&mut self.flags().synced, synced) != synced;
        if changed {
            let event = if synced {
                SyncEvent::Sync
            } else {
                SyncEvent::Desync
            };
            self.dispatch(&[event]).await;
        }
    }

    fn set_sync_state(&self, state: SyncState) {
        self.flags().state = state;
    }

    fn flags(&self) -> MutexGuard<'_, SyncFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn height_change(&self, wallet_height: u64) -> SyncEvent {
        let daemon = self.current_daemon();
        SyncEvent::HeightChange {
            wallet_height,
            local_daemon_height: daemon.local_daemon_block_count().saturating_sub(1),
            network_height: daemon.network_block_count().saturating_sub(1),
        }
    }

    async fn dispatch(&self, events: &[SyncEvent]) {
        if events.is_empty() {
            return;
        }
        self.dispatcher.lock().await.dispatch_all(events).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoProvider;
    use crate::daemon::{
        Block, DaemonConnection, DaemonError, InMemoryDaemon, Recipient, build_transaction,
    };
    use crate::wallet::subwallets::SubWallets;
    use std::time::Duration;

    struct Fixture {
        config: Config,
        daemon: Arc<InMemoryDaemon>,
        state: Arc<Mutex<WalletState>>,
        synchronizer: Arc<WalletSynchronizer>,
        recipient: Recipient,
    }

    fn fixture() -> Fixture {
        let config = Config::default()
            .with_sync_interval(Duration::from_millis(10))
            .with_blocks_per_daemon_request(4);
        let crypto = config.crypto.clone();
        let spend = crypto.sc_reduce32(&[31u8; 32]);
        let view = crypto.sc_reduce32(&[32u8; 32]);
        let sub_wallets = SubWallets::new(crypto.as_ref(), spend, view, 0, 0).unwrap();
        let state = Arc::new(Mutex::new(WalletState::new(sub_wallets, 0, 0)));
        let daemon = Arc::new(InMemoryDaemon::new("127.0.0.1", 11898));
        let synchronizer = Arc::new(WalletSynchronizer::new(
            config.clone(),
            state.clone(),
            daemon.clone(),
        ));
        let recipient = Recipient {
            public_spend_key: crypto.secret_key_to_public_key(&spend).unwrap(),
            public_view_key: crypto.secret_key_to_public_key(&view).unwrap(),
            amount: 0,
        };
        Fixture {
            config,
            daemon,
            state,
            synchronizer,
            recipient,
        }
    }

    fn pay(f: &Fixture, amount: u64) -> u64 {
        let crypto: &dyn CryptoProvider = f.config.crypto.as_ref();
        let tx = build_transaction(crypto, &[Recipient { amount, ..f.recipient }], &[], "").unwrap();
        f.daemon.push_block(vec![tx])
    }

    fn drain(receiver: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_sync_to_latest_finds_transactions() {
        let f = fixture();
        let mut receiver = f.synchronizer.subscribe();
        f.daemon.push_empty_blocks(3);
        let height = pay(&f, 500);
        f.daemon.push_empty_blocks(6);

        let stats = f.synchronizer.sync_to_latest().await.unwrap();
        assert_eq!(stats.transactions_found, 1);
        assert_eq!(stats.highest_processed_height, 10);

        let state = lock_state(&f.state);
        assert_eq!(state.sub_wallets.min_scan_height(), 10);
        assert_eq!(state.sub_wallets.transactions().len(), 1);
        assert_eq!(state.sub_wallets.transactions().iter().next().unwrap().block_height, height);
        drop(state);

        let events = drain(&mut receiver);
        assert!(events.iter().any(|e| matches!(e, SyncEvent::IncomingTransaction(_))));
        assert_eq!(events.last(), Some(&SyncEvent::Sync));
        assert_eq!(
            f.synchronizer.get_sync_status(),
            SyncStatus {
                wallet_height: 10,
                local_daemon_height: 10,
                network_height: 10,
            }
        );
    }

    #[tokio::test]
    async fn test_reorg_rewinds_and_drops_orphaned_transactions() {
        let f = fixture();
        f.daemon.push_empty_blocks(5);
        pay(&f, 700);
        f.daemon.push_empty_blocks(2);
        f.synchronizer.sync_to_latest().await.unwrap();
        assert_eq!(lock_state(&f.state).sub_wallets.transactions().len(), 1);

        let mut receiver = f.synchronizer.subscribe();
        f.daemon.replace_chain_from(6);
        f.daemon.push_empty_blocks(4);
        f.synchronizer.sync_to_latest().await.unwrap();

        let state = lock_state(&f.state);
        assert!(state.sub_wallets.transactions().is_empty());
        assert_eq!(state.sub_wallets.min_scan_height(), 9);
        assert_eq!(state.sync_status.known_hash(6), f.daemon.block_hash(6).as_deref());
        drop(state);

        assert!(drain(&mut receiver).contains(&SyncEvent::Rewind { height: 5 }));
    }

    #[tokio::test]
    async fn test_rewind_then_rescan_restores_state() {
        let f = fixture();
        pay(&f, 100);
        f.daemon.push_empty_blocks(3);
        pay(&f, 200);
        f.synchronizer.sync_to_latest().await.unwrap();
        let before = lock_state(&f.state).sub_wallets.clone();

        f.synchronizer.rewind(2).await;
        assert_eq!(lock_state(&f.state).sub_wallets.transactions().len(), 1);

        f.synchronizer.sync_to_latest().await.unwrap();
        assert_eq!(lock_state(&f.state).sub_wallets, before);
    }

    #[tokio::test]
    async fn test_background_task_syncs_and_stops() {
        let f = fixture();
        let mut receiver = f.synchronizer.subscribe();
        f.daemon.push_empty_blocks(9);
        pay(&f, 42);

        f.synchronizer.start().await;
        f.synchronizer.start().await;

        let synced = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(SyncEvent::Sync) = receiver.recv().await {
                    break;
                }
            }
        })
        .await;
        assert!(synced.is_ok());
        assert_eq!(f.synchronizer.sync_state(), SyncState::Running);

        f.synchronizer.stop().await;
        assert_eq!(f.synchronizer.sync_state(), SyncState::Stopped);

        let height = lock_state(&f.state).sub_wallets.min_scan_height();
        assert_eq!(height, 10);
        f.daemon.push_empty_blocks(5);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(lock_state(&f.state).sub_wallets.min_scan_height(), height);
    }

    #[tokio::test]
    async fn test_offline_daemon_reports_disconnect_and_keeps_state() {
        let f = fixture();
        f.daemon.push_empty_blocks(3);
        f.synchronizer.sync_to_latest().await.unwrap();
        let mut receiver = f.synchronizer.subscribe();

        f.daemon.set_offline(true);
        f.daemon.push_empty_blocks(3);
        assert!(f.synchronizer.sync_to_latest().await.is_err());
        assert_eq!(lock_state(&f.state).sub_wallets.min_scan_height(), 3);
        assert!(matches!(receiver.try_recv(), Ok(SyncEvent::Disconnect(_))));

        f.daemon.set_offline(false);
        f.synchronizer.sync_to_latest().await.unwrap();
        assert_eq!(lock_state(&f.state).sub_wallets.min_scan_height(), 6);
        assert!(drain(&mut receiver).contains(&SyncEvent::Connect));
    }

    #[tokio::test]
    async fn test_swap_node_keeps_wallet_state() {
        let f = fixture();
        pay(&f, 300);
        f.synchronizer.sync_to_latest().await.unwrap();
        let before = lock_state(&f.state).sub_wallets.clone();

        let other = Arc::new(InMemoryDaemon::new("node.example", 443).with_ssl(true));
        f.synchronizer.swap_node(other).await;

        assert_eq!(lock_state(&f.state).sub_wallets, before);
        let connection = f.synchronizer.current_daemon().get_connection_info();
        assert_eq!(connection.host, "node.example");
        assert!(connection.ssl);
    }

    #[tokio::test]
    async fn test_overflowing_amounts_are_dropped_without_failing_sync() {
        let f = fixture();
        let crypto: &dyn CryptoProvider = f.config.crypto.as_ref();
        let huge = Recipient {
            amount: u64::MAX,
            ..f.recipient
        };
        let tx = build_transaction(crypto, &[huge, huge], &[], "").unwrap();
        f.daemon.push_block(vec![tx]);
        pay(&f, 25);

        f.synchronizer.sync_to_latest().await.unwrap();

        let state = lock_state(&f.state);
        assert_eq!(state.sub_wallets.min_scan_height(), 2);
        assert_eq!(state.sub_wallets.transactions().len(), 1);
        assert_eq!(state.sub_wallets.transactions().iter().next().unwrap().amount(), 25);
    }

    #[tokio::test]
    async fn test_genesis_block_is_scanned_once() {
        let f = fixture();
        f.daemon.push_empty_blocks(2);

        let stats = f.synchronizer.sync_to_latest().await.unwrap();
        assert_eq!(stats.blocks_processed, 3);
        assert_eq!(
            lock_state(&f.state).sync_status.known_hash(0),
            f.daemon.block_hash(0).as_deref()
        );

        f.daemon.push_empty_blocks(1);
        let stats = f.synchronizer.sync_to_latest().await.unwrap();
        assert_eq!(stats.blocks_processed, 1);
        assert_eq!(lock_state(&f.state).sub_wallets.min_scan_height(), 3);
    }

    /// Reports a dropped connection while initialising, then behaves like the wrapped chain.
    struct ReconnectingDaemon {
        chain: InMemoryDaemon,
        events: broadcast::Sender<DaemonEvent>,
    }

    #[async_trait::async_trait]
    impl Daemon for ReconnectingDaemon {
        async fn init(&self) -> Result<(), DaemonError> {
            let _ = self
                .events
                .send(DaemonEvent::Disconnect("handshake reset".to_string()));
            self.chain.init().await
        }

        async fn update_daemon_info(&self) -> Result<(), DaemonError> {
            self.chain.update_daemon_info().await
        }

        async fn get_wallet_sync_data(
            &self,
            request: &GetBlocksRequest,
        ) -> Result<Vec<Block>, DaemonError> {
            self.chain.get_wallet_sync_data(request).await
        }

        fn get_node_fee(&self) -> (String, u64) {
            self.chain.get_node_fee()
        }

        fn get_connection_info(&self) -> DaemonConnection {
            self.chain.get_connection_info()
        }

        fn local_daemon_block_count(&self) -> u64 {
            self.chain.local_daemon_block_count()
        }

        fn network_block_count(&self) -> u64 {
            self.chain.network_block_count()
        }

        fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
            self.events.subscribe()
        }
    }

    #[tokio::test]
    async fn test_disconnect_during_startup_is_forwarded() {
        let f = fixture();
        let chain = InMemoryDaemon::new("127.0.0.1", 11898);
        chain.push_empty_blocks(3);
        let (events, _) = broadcast::channel(16);
        let daemon = Arc::new(ReconnectingDaemon { chain, events });
        let synchronizer = Arc::new(WalletSynchronizer::new(
            f.config.clone(),
            f.state.clone(),
            daemon,
        ));
        let mut receiver = synchronizer.subscribe();

        synchronizer.start().await;
        let reconnected = tokio::time::timeout(Duration::from_secs(5), async {
            let mut seen = Vec::new();
            loop {
                match receiver.recv().await {
                    Ok(SyncEvent::Connect) => {
                        seen.push(SyncEvent::Connect);
                        break seen;
                    }
                    Ok(event @ SyncEvent::Disconnect(_)) => seen.push(event),
                    Ok(_) => {}
                    Err(_) => break seen,
                }
            }
        })
        .await;
        synchronizer.stop().await;

        assert_eq!(
            reconnected.unwrap(),
            vec![
                SyncEvent::Disconnect("handshake reset".to_string()),
                SyncEvent::Connect
            ]
        );
    }
}
