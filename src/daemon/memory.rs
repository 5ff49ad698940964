//! Scripted in-memory chain implementing [`Daemon`].
//!
//! Used for offline runs and tests. Blocks are appended with [`InMemoryDaemon::push_block`],
//! reorganised with [`InMemoryDaemon::replace_chain_from`], and connectivity can be toggled with
//! [`InMemoryDaemon::set_offline`]. The helpers at the bottom build outputs that really belong to a
//! given key pair, so wallets scanning this chain run the full derivation path.

use super::types::*;
use super::Daemon;
use crate::crypto::{CryptoError, CryptoProvider, KeyImage, PublicKey, SecretKey, keccak256};

use rand::Rng;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};

const GENESIS_TIMESTAMP: u64 = 1_500_000_000;
const BLOCK_TIME: u64 = 30;
const DEFAULT_BLOCK_COUNT: u64 = 100;

#[derive(Debug)]
struct MemoryChain {
    blocks: Vec<Block>,
    initialized: bool,
    offline: bool,
    connected: bool,
    fee: (String, u64),
    daemon_type: DaemonType,
    ssl: bool,
    /// Bumped on every reorg so replacement blocks get fresh hashes
    generation: u64,
}

pub struct InMemoryDaemon {
    host: String,
    port: u16,
    chain: RwLock<MemoryChain>,
    events: broadcast::Sender<DaemonEvent>,
}

impl InMemoryDaemon {
    /// Creates a chain holding only the genesis block at height 0.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let (events, _) = broadcast::channel(16);
        let genesis = Block {
            block_hash: hex::encode(keccak256(b"genesis")),
            block_height: 0,
            block_timestamp: GENESIS_TIMESTAMP,
            coinbase_transaction: None,
            transactions: Vec::new(),
        };

        Self {
            host: host.into(),
            port,
            chain: RwLock::new(MemoryChain {
                blocks: vec![genesis],
                initialized: false,
                offline: false,
                connected: true,
                fee: (String::new(), 0),
                daemon_type: DaemonType::ConventionalDaemon,
                ssl: false,
                generation: 0,
            }),
            events,
        }
    }

    pub fn with_daemon_type(self, daemon_type: DaemonType) -> Self {
        self.write().daemon_type = daemon_type;
        self
    }

    pub fn with_ssl(self, ssl: bool) -> Self {
        self.write().ssl = ssl;
        self
    }

    /// Fee reported once the daemon has been initialised.
    pub fn with_fee(self, address: impl Into<String>, amount: u64) -> Self {
        self.write().fee = (address.into(), amount);
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryChain> {
        self.chain.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryChain> {
        self.chain.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Height of the newest block.
    pub fn tip_height(&self) -> u64 {
        self.read().blocks.len() as u64 - 1
    }

    pub fn block_hash(&self, height: u64) -> Option<String> {
        self.read()
            .blocks
            .get(height as usize)
            .map(|b| b.block_hash.clone())
    }

    /// Appends a block with the given transactions and returns its height.
    pub fn push_block(&self, transactions: Vec<RawTransaction>) -> u64 {
        self.push_full_block(None, transactions)
    }

    pub fn push_coinbase_block(&self, coinbase: RawCoinbaseTransaction) -> u64 {
        self.push_full_block(Some(coinbase), Vec::new())
    }

    /// Appends `count` empty blocks and returns the new tip height.
    pub fn push_empty_blocks(&self, count: u64) -> u64 {
        for _ in 0..count {
            self.push_full_block(None, Vec::new());
        }
        self.tip_height()
    }

    fn push_full_block(
        &self,
        coinbase_transaction: Option<RawCoinbaseTransaction>,
        transactions: Vec<RawTransaction>,
    ) -> u64 {
        let mut chain = self.write();
        let height = chain.blocks.len() as u64;
        let previous = chain
            .blocks
            .last()
            .map(|b| b.block_hash.clone())
            .unwrap_or_default();

        let mut preimage = previous.into_bytes();
        preimage.extend_from_slice(&height.to_le_bytes());
        preimage.extend_from_slice(&chain.generation.to_le_bytes());
        if let Some(coinbase) = &coinbase_transaction {
            preimage.extend_from_slice(coinbase.hash.as_bytes());
        }
        for tx in &transactions {
            preimage.extend_from_slice(tx.hash.as_bytes());
        }

        chain.blocks.push(Block {
            block_hash: hex::encode(keccak256(&preimage)),
            block_height: height,
            block_timestamp: GENESIS_TIMESTAMP + height * BLOCK_TIME,
            coinbase_transaction,
            transactions,
        });
        height
    }

    /// Drops every block at or above `height`, emulating a chain reorganisation. New blocks pushed
    /// afterwards get hashes distinct from the dropped ones.
    pub fn replace_chain_from(&self, height: u64) {
        let mut chain = self.write();
        let keep = (height.max(1) as usize).min(chain.blocks.len());
        chain.blocks.truncate(keep);
        chain.generation += 1;
        info!("Reorganised in-memory chain from height {}", height);
    }

    /// Simulates losing or regaining the connection to the node.
    pub fn set_offline(&self, offline: bool) {
        let changed = {
            let mut chain = self.write();
            chain.offline = offline;
            std::mem::replace(&mut chain.connected, !offline) == offline
        };
        if changed {
            let event = if offline {
                DaemonEvent::Disconnect("daemon is offline".to_string())
            } else {
                DaemonEvent::Connect
            };
            let _ = self.events.send(event);
        }
    }

    fn start_height(chain: &MemoryChain, request: &GetBlocksRequest) -> u64 {
        let from_checkpoint = request.block_hash_checkpoints.iter().find_map(|hash| {
            chain
                .blocks
                .iter()
                .find(|b| &b.block_hash == hash)
                .map(|b| b.block_height + 1)
        });

        if let Some(height) = from_checkpoint {
            return height;
        }
        if request.start_height == 0 && request.start_timestamp > 0 {
            return chain
                .blocks
                .iter()
                .find(|b| b.block_timestamp >= request.start_timestamp)
                .map(|b| b.block_height)
                .unwrap_or(chain.blocks.len() as u64);
        }
        request.start_height
    }
}

#[async_trait::async_trait]
impl Daemon for InMemoryDaemon {
    async fn init(&self) -> Result<(), DaemonError> {
        let offline = self.read().offline;
        if offline {
            let error = DaemonError::ConnectError {
                host: self.host.clone(),
                port: self.port,
                reason: "daemon is offline".to_string(),
            };
            let was_connected = std::mem::replace(&mut self.write().connected, false);
            if was_connected {
                let _ = self.events.send(DaemonEvent::Disconnect(error.to_string()));
            }
            return Err(error);
        }
        self.write().initialized = true;
        Ok(())
    }

    async fn update_daemon_info(&self) -> Result<(), DaemonError> {
        let mut chain = self.write();
        if chain.offline {
            return Err(DaemonError::Offline);
        }
        chain.initialized = true;
        Ok(())
    }

    async fn get_wallet_sync_data(
        &self,
        request: &GetBlocksRequest,
    ) -> Result<Vec<Block>, DaemonError> {
        let chain = self.read();
        if chain.offline {
            return Err(DaemonError::Offline);
        }

        let start = Self::start_height(&chain, request);
        let count = if request.block_count == 0 {
            DEFAULT_BLOCK_COUNT
        } else {
            request.block_count
        };

        let blocks: Vec<Block> = chain
            .blocks
            .iter()
            .skip(start as usize)
            .take(count as usize)
            .map(|block| {
                let mut block = block.clone();
                if request.skip_coinbase_transactions {
                    block.coinbase_transaction = None;
                }
                block
            })
            .collect();

        debug!("Serving {} blocks from height {}", blocks.len(), start);
        Ok(blocks)
    }

    fn get_node_fee(&self) -> (String, u64) {
        let chain = self.read();
        if chain.initialized {
            chain.fee.clone()
        } else {
            (String::new(), 0)
        }
    }

    fn get_connection_info(&self) -> DaemonConnection {
        let chain = self.read();
        DaemonConnection {
            host: self.host.clone(),
            port: self.port,
            daemon_type: chain.daemon_type,
            daemon_type_determined: chain.initialized,
            ssl: chain.ssl,
            ssl_determined: chain.initialized,
        }
    }

    fn local_daemon_block_count(&self) -> u64 {
        let chain = self.read();
        if chain.initialized {
            chain.blocks.len() as u64
        } else {
            0
        }
    }

    fn network_block_count(&self) -> u64 {
        self.local_daemon_block_count()
    }

    fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.events.subscribe()
    }
}

/// Destination of a scripted output.
#[derive(Debug, Clone, Copy)]
pub struct Recipient {
    pub public_spend_key: PublicKey,
    pub public_view_key: PublicKey,
    pub amount: u64,
}

fn random_transaction_key(crypto: &dyn CryptoProvider) -> Result<(SecretKey, PublicKey), CryptoError> {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes[..]);
    let secret = crypto.sc_reduce32(&bytes);
    Ok((secret, crypto.secret_key_to_public_key(&secret)?))
}

fn build_outputs(
    crypto: &dyn CryptoProvider,
    transaction_secret_key: &SecretKey,
    recipients: &[Recipient],
) -> Result<Vec<KeyOutput>, CryptoError> {
    recipients
        .iter()
        .enumerate()
        .map(|(index, recipient)| {
            // 8·r·A == 8·a·R
            let derivation =
                crypto.generate_key_derivation(&recipient.public_view_key, transaction_secret_key)?;
            let key =
                crypto.derive_public_key(&derivation, index as u64, &recipient.public_spend_key)?;
            Ok(KeyOutput {
                key: key.to_hex(),
                amount: recipient.amount,
                global_index: None,
            })
        })
        .collect()
}

/// Builds a transaction paying `recipients`, spending the given key images.
pub fn build_transaction(
    crypto: &dyn CryptoProvider,
    recipients: &[Recipient],
    spent: &[KeyInput],
    payment_id: &str,
) -> Result<RawTransaction, CryptoError> {
    let (secret, public) = random_transaction_key(crypto)?;
    let outputs = build_outputs(crypto, &secret, recipients)?;

    let mut preimage = public.0.to_vec();
    for input in spent {
        preimage.extend_from_slice(input.key_image.as_bytes());
    }

    Ok(RawTransaction {
        outputs,
        hash: hex::encode(keccak256(&preimage)),
        transaction_public_key: public.to_hex(),
        unlock_time: 0,
        payment_id: payment_id.to_string(),
        key_inputs: spent.to_vec(),
    })
}

pub fn build_coinbase_transaction(
    crypto: &dyn CryptoProvider,
    recipients: &[Recipient],
) -> Result<RawCoinbaseTransaction, CryptoError> {
    let (secret, public) = random_transaction_key(crypto)?;
    Ok(RawCoinbaseTransaction {
        outputs: build_outputs(crypto, &secret, recipients)?,
        hash: hex::encode(keccak256(&public.0)),
        transaction_public_key: public.to_hex(),
        unlock_time: 0,
    })
}

/// Key image of output `output_index` of a transaction, as the owner of the keys would compute it.
pub fn output_key_image(
    crypto: &dyn CryptoProvider,
    transaction_public_key: &str,
    output_key: &str,
    output_index: u64,
    private_view_key: &SecretKey,
    private_spend_key: &SecretKey,
) -> Result<KeyImage, CryptoError> {
    let transaction_public_key: PublicKey = transaction_public_key.parse()?;
    let output_key: PublicKey = output_key.parse()?;
    let derivation = crypto.generate_key_derivation(&transaction_public_key, private_view_key)?;
    let ephemeral = crypto.derive_secret_key(&derivation, output_index, private_spend_key)?;
    crypto.generate_key_image(&output_key, &ephemeral)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Provider;

    fn request(start_height: u64, block_count: u64) -> GetBlocksRequest {
        GetBlocksRequest {
            start_height,
            block_count,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_heights_before_and_after_init() {
        let daemon = InMemoryDaemon::new("127.0.0.1", 11898).with_fee("TRTLfee", 10);
        daemon.push_empty_blocks(9);

        assert_eq!(daemon.network_block_count(), 0);
        assert_eq!(daemon.get_node_fee(), (String::new(), 0));

        daemon.init().await.unwrap();
        assert_eq!(daemon.network_block_count(), 10);
        assert_eq!(daemon.get_node_fee(), ("TRTLfee".to_string(), 10));
        assert!(daemon.get_connection_info().daemon_type_determined);
    }

    #[tokio::test]
    async fn test_serves_batches_from_start_height() {
        let daemon = InMemoryDaemon::new("127.0.0.1", 11898);
        daemon.push_empty_blocks(20);

        let blocks = daemon.get_wallet_sync_data(&request(5, 4)).await.unwrap();
        let heights: Vec<u64> = blocks.iter().map(|b| b.block_height).collect();
        assert_eq!(heights, vec![5, 6, 7, 8]);

        let tail = daemon.get_wallet_sync_data(&request(19, 100)).await.unwrap();
        assert_eq!(tail.len(), 2);
    }

    #[tokio::test]
    async fn test_checkpoint_resolves_fork_point() {
        let daemon = InMemoryDaemon::new("127.0.0.1", 11898);
        daemon.push_empty_blocks(10);
        let stale_tip = daemon.block_hash(10).unwrap();
        let common = daemon.block_hash(7).unwrap();

        daemon.replace_chain_from(8);
        daemon.push_empty_blocks(5);
        assert_ne!(daemon.block_hash(10).unwrap(), stale_tip);

        let mut req = request(11, 100);
        req.block_hash_checkpoints = vec![stale_tip, common];
        let blocks = daemon.get_wallet_sync_data(&req).await.unwrap();
        assert_eq!(blocks[0].block_height, 8);
    }

    #[tokio::test]
    async fn test_start_timestamp_used_when_height_zero() {
        let daemon = InMemoryDaemon::new("127.0.0.1", 11898);
        daemon.push_empty_blocks(10);

        let mut req = request(0, 100);
        req.start_timestamp = GENESIS_TIMESTAMP + 4 * BLOCK_TIME;
        let blocks = daemon.get_wallet_sync_data(&req).await.unwrap();
        assert_eq!(blocks[0].block_height, 4);
    }

    #[tokio::test]
    async fn test_offline_switch_emits_events() {
        let daemon = InMemoryDaemon::new("127.0.0.1", 11898);
        let mut events = daemon.subscribe();

        daemon.set_offline(true);
        assert!(matches!(
            daemon.get_wallet_sync_data(&request(0, 1)).await,
            Err(DaemonError::Offline)
        ));
        assert!(daemon.init().await.is_err());
        daemon.set_offline(false);

        assert!(matches!(events.try_recv(), Ok(DaemonEvent::Disconnect(_))));
        assert_eq!(events.try_recv(), Ok(DaemonEvent::Connect));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_built_outputs_belong_to_recipient() {
        let crypto = Ed25519Provider::new();
        let spend = crypto.sc_reduce32(&[3u8; 32]);
        let view = crypto.sc_reduce32(&[4u8; 32]);
        let recipient = Recipient {
            public_spend_key: crypto.secret_key_to_public_key(&spend).unwrap(),
            public_view_key: crypto.secret_key_to_public_key(&view).unwrap(),
            amount: 55,
        };

        let tx = build_transaction(&crypto, &[recipient], &[], "").unwrap();
        let tx_public: PublicKey = tx.transaction_public_key.parse().unwrap();
        let output_key: PublicKey = tx.outputs[0].key.parse().unwrap();
        let derivation = crypto.generate_key_derivation(&tx_public, &view).unwrap();
        let underived = crypto
            .underive_public_key(&derivation, 0, &output_key)
            .unwrap();
        assert_eq!(underived, recipient.public_spend_key);
    }
}
