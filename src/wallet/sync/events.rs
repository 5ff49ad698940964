//! Event system for wallet synchronization.
//!
//! This module defines the events emitted while a wallet scans the chain, the handler trait that
//! consumes them, and the dispatcher that fans each event out to every registered handler.
//! Scanning code never talks to subscribers directly; it produces [`SyncEvent`]s and lets the
//! dispatcher deliver them, so logging and application notifications stay independent.

use crate::wallet::ledger::Transaction;
use crate::wallet::WalletError;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events that occur during wallet synchronization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A transaction involving the wallet was found
    Transaction(Transaction),
    /// A transaction with a positive net amount was found
    IncomingTransaction(Transaction),
    /// A transaction with a negative net amount was found
    OutgoingTransaction(Transaction),
    /// Wallet or daemon heights moved
    HeightChange {
        wallet_height: u64,
        local_daemon_height: u64,
        network_height: u64,
    },
    /// The wallet caught up with the network
    Sync,
    /// The wallet fell behind the network
    Desync,
    /// The daemon became reachable again
    Connect,
    /// The daemon became unreachable
    Disconnect(String),
    /// Wallet state was rolled back to `height`
    Rewind { height: u64 },
}

/// Events announcing a newly found transaction.
pub fn transaction_events(transaction: &Transaction) -> Vec<SyncEvent> {
    let mut events = vec![SyncEvent::Transaction(transaction.clone())];
    match transaction.amount() {
        amount if amount > 0 => events.push(SyncEvent::IncomingTransaction(transaction.clone())),
        amount if amount < 0 => events.push(SyncEvent::OutgoingTransaction(transaction.clone())),
        _ => {}
    }
    events
}

/// Trait for handling sync events.
///
/// Implementors receive all sync events and can perform side effects or state updates.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
    /// Handle a sync event.
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in registration order and a failing handler does not stop the others.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
        self.handlers.push(handler);
    }

    /// Dispatch an event to all registered handlers.
    pub async fn dispatch(&mut self, event: &SyncEvent) {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(event).await {
                tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
            }
        }
    }

    pub async fn dispatch_all(&mut self, events: &[SyncEvent]) {
        for event in events {
            self.dispatch(event).await;
        }
    }
}

/// Logs every event at a level matching its importance.
pub struct LoggingHandler;

#[async_trait::async_trait]
impl SyncEventHandler for LoggingHandler {
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletError> {
        match event {
            SyncEvent::Transaction(tx) => info!(
                "Found transaction {} at height {} (amount {})",
                tx.hash,
                tx.block_height,
                tx.amount()
            ),
            SyncEvent::HeightChange {
                wallet_height,
                network_height,
                ..
            } => debug!("Wallet height {} / network height {}", wallet_height, network_height),
            SyncEvent::Sync => info!("Wallet is synced"),
            SyncEvent::Desync => info!("Wallet is no longer synced"),
            SyncEvent::Connect => info!("Daemon connection restored"),
            SyncEvent::Disconnect(reason) => warn!("Daemon connection lost: {}", reason),
            SyncEvent::Rewind { height } => info!("Wallet rewound to height {}", height),
            SyncEvent::IncomingTransaction(_) | SyncEvent::OutgoingTransaction(_) => {}
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LoggingHandler"
    }
}

/// Forwards events to application subscribers.
pub struct BroadcastHandler {
    sender: broadcast::Sender<SyncEvent>,
}

impl BroadcastHandler {
    pub fn new(sender: broadcast::Sender<SyncEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait::async_trait]
impl SyncEventHandler for BroadcastHandler {
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletError> {
        // no subscribers is not an error
        let _ = self.sender.send(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "BroadcastHandler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PublicKey;
    use crate::wallet::ledger::Transfer;

    struct FailingHandler;

    #[async_trait::async_trait]
    impl SyncEventHandler for FailingHandler {
        async fn handle(&mut self, _event: &SyncEvent) -> Result<(), WalletError> {
            Err(WalletError::InvalidPassword)
        }

        fn name(&self) -> &'static str {
            "FailingHandler"
        }
    }

    fn transaction(amount: i64) -> Transaction {
        Transaction {
            transfers: vec![Transfer {
                public_key: PublicKey([1; 32]),
                amount,
            }],
            hash: "aa".to_string(),
            fee: 0,
            block_height: 1,
            timestamp: 0,
            payment_id: String::new(),
            unlock_time: 0,
            is_coinbase_transaction: false,
        }
    }

    #[test]
    fn test_transaction_events_direction() {
        let incoming = transaction_events(&transaction(5));
        assert!(matches!(incoming[1], SyncEvent::IncomingTransaction(_)));

        let outgoing = transaction_events(&transaction(-5));
        assert!(matches!(outgoing[1], SyncEvent::OutgoingTransaction(_)));

        assert_eq!(transaction_events(&transaction(0)).len(), 1);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let (sender, mut receiver) = broadcast::channel(8);
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler(Box::new(FailingHandler));
        dispatcher.register_handler(Box::new(BroadcastHandler::new(sender)));

        dispatcher.dispatch(&SyncEvent::Sync).await;
        assert_eq!(receiver.try_recv(), Ok(SyncEvent::Sync));
    }
}
