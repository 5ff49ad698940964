//! Wallet backend.
//!
//! `WalletBackend` is the aggregate root applications talk to. It owns the shared wallet state,
//! the synchronizer that scans into it and the persistence service that saves it. Every query and
//! mutation goes through the same state lock the scan task commits under, so callers always observe
//! heights, transactions and balances that belong together.

use crate::address::{AddressCodec, validate_address};
use crate::config::Config;
use crate::crypto::{CryptoProvider, PublicKey, SecretKey};
use crate::daemon::{Daemon, DaemonConnection};
use crate::utils::unix_timestamp;
use crate::wallet::WalletError;
use crate::wallet::keys::{
    Seed, generate_random_seed, private_keys_are_deterministic, seed_to_keys,
};
use crate::wallet::ledger::{Balance, Transaction};
use crate::wallet::persistence::{WalletPersistence, from_canonical_str, to_canonical_string};
use crate::wallet::state::{WalletState, lock_state};
use crate::wallet::subwallets::{SubWallet, SubWallets};
use crate::wallet::sync::events::SyncEventHandler;
use crate::wallet::sync::progress_tracker::SyncStats;
use crate::wallet::sync::{SyncEvent, SyncState, SyncStatus, WalletSynchronizer};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};

pub struct WalletBackend {
    config: Config,
    codec: AddressCodec,
    public_view_key: PublicKey,
    state: Arc<Mutex<WalletState>>,
    synchronizer: Arc<WalletSynchronizer>,
    persistence: WalletPersistence,
}

fn primary(sub_wallets: &SubWallets) -> Result<&SubWallet, WalletError> {
    sub_wallets.primary().ok_or(WalletError::AddressNotInWallet)
}

impl WalletBackend {
    fn from_state(
        config: Config,
        daemon: Arc<dyn Daemon>,
        state: WalletState,
    ) -> Result<Self, WalletError> {
        let public_view_key = config
            .crypto
            .secret_key_to_public_key(state.sub_wallets.private_view_key())?;
        let state = Arc::new(Mutex::new(state));
        let synchronizer = Arc::new(WalletSynchronizer::new(
            config.clone(),
            state.clone(),
            daemon,
        ));

        Ok(Self {
            codec: config.address_codec(),
            persistence: WalletPersistence::new(config.kdf),
            public_view_key,
            state,
            synchronizer,
            config,
        })
    }

    /// A new wallet from a random seed. Only blocks mined from now on are scanned.
    pub fn create(config: Config, daemon: Arc<dyn Daemon>) -> Result<Self, WalletError> {
        let keys = seed_to_keys(config.crypto.as_ref(), &generate_random_seed());
        let timestamp = unix_timestamp();
        let sub_wallets = SubWallets::new(
            config.crypto.as_ref(),
            keys.private_spend_key,
            keys.private_view_key,
            0,
            timestamp,
        )?;
        info!("Created new wallet");
        Self::from_state(config, daemon, WalletState::new(sub_wallets, 0, timestamp))
    }

    pub fn import_from_seed(
        config: Config,
        daemon: Arc<dyn Daemon>,
        scan_height: u64,
        mnemonic_seed: &str,
    ) -> Result<Self, WalletError> {
        let seed = Seed::from_mnemonic(mnemonic_seed)?;
        let keys = seed_to_keys(config.crypto.as_ref(), &seed);
        let sub_wallets = SubWallets::new(
            config.crypto.as_ref(),
            keys.private_spend_key,
            keys.private_view_key,
            scan_height,
            0,
        )?;
        info!("Imported wallet from mnemonic seed, scanning from height {}", scan_height);
        Self::from_state(config, daemon, WalletState::new(sub_wallets, scan_height, 0))
    }

    pub fn import_from_keys(
        config: Config,
        daemon: Arc<dyn Daemon>,
        scan_height: u64,
        private_view_key: &str,
        private_spend_key: &str,
    ) -> Result<Self, WalletError> {
        let private_view_key: SecretKey = private_view_key.parse()?;
        let private_spend_key: SecretKey = private_spend_key.parse()?;
        let sub_wallets = SubWallets::new(
            config.crypto.as_ref(),
            private_spend_key,
            private_view_key,
            scan_height,
            0,
        )?;
        info!("Imported wallet from keys, scanning from height {}", scan_height);
        Self::from_state(config, daemon, WalletState::new(sub_wallets, scan_height, 0))
    }

    /// A view-only wallet for `address`. The private view key must belong to the address.
    pub fn import_view_wallet(
        config: Config,
        daemon: Arc<dyn Daemon>,
        scan_height: u64,
        private_view_key: &str,
        address: &str,
    ) -> Result<Self, WalletError> {
        let codec = config.address_codec();
        validate_address(&codec, address, false)?;
        let decoded = codec.decode(address)?;

        let private_view_key: SecretKey = private_view_key.parse()?;
        if config.crypto.secret_key_to_public_key(&private_view_key)? != decoded.public_view_key {
            return Err(WalletError::InvalidKeyFormat(
                "private view key does not belong to the address".to_string(),
            ));
        }

        let sub_wallets = SubWallets::new_view_wallet(
            config.crypto.as_ref(),
            private_view_key,
            decoded.public_spend_key,
            scan_height,
            0,
        )?;
        info!("Imported view wallet, scanning from height {}", scan_height);
        Self::from_state(config, daemon, WalletState::new(sub_wallets, scan_height, 0))
    }

    /// Opens a wallet from its unencrypted canonical JSON.
    pub fn load_from_json(
        config: Config,
        daemon: Arc<dyn Daemon>,
        json: &str,
    ) -> Result<Self, WalletError> {
        Self::from_state(config, daemon, from_canonical_str(json)?)
    }

    pub fn open_from_encrypted_string(
        config: Config,
        daemon: Arc<dyn Daemon>,
        data: &str,
        password: &str,
    ) -> Result<Self, WalletError> {
        let state = WalletPersistence::decrypt_from_str(data, password)?;
        Self::from_state(config, daemon, state)
    }

    pub async fn open_from_file(
        config: Config,
        daemon: Arc<dyn Daemon>,
        path: impl AsRef<Path>,
        password: &str,
    ) -> Result<Self, WalletError> {
        let state = WalletPersistence::new(config.kdf)
            .load(path.as_ref(), password)
            .await?;
        Self::from_state(config, daemon, state)
    }

    fn state(&self) -> MutexGuard<'_, WalletState> {
        lock_state(&self.state)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn to_json_string(&self) -> Result<String, WalletError> {
        to_canonical_string(&self.state())
    }

    pub fn encrypt_wallet_to_string(&self, password: &str) -> Result<String, WalletError> {
        let state = self.state();
        self.persistence.encrypt_to_string(&state, password)
    }

    pub async fn save_wallet_to_file(
        &self,
        path: impl AsRef<Path>,
        password: &str,
    ) -> Result<(), WalletError> {
        let snapshot = self.state().clone();
        self.persistence.save(path.as_ref(), &snapshot, password).await
    }

    /// Starts scanning in the background.
    pub async fn start(&self) {
        self.synchronizer.start().await;
    }

    /// Stops the background scan. Progress committed so far is kept.
    pub async fn stop(&self) {
        self.synchronizer.stop().await;
    }

    /// Scans in the foreground until the wallet reaches the daemon's tip.
    pub async fn sync_to_latest(&self) -> Result<SyncStats, WalletError> {
        self.synchronizer.sync_to_latest().await
    }

    pub async fn rewind(&self, height: u64) {
        info!("Rewinding wallet to height {}", height);
        self.synchronizer.rewind(height).await;
    }

    pub async fn reset(&self, scan_height: u64, timestamp: u64) {
        self.synchronizer.reset(scan_height, timestamp).await;
    }

    pub async fn swap_node(&self, daemon: Arc<dyn Daemon>) {
        self.synchronizer.swap_node(daemon).await;
    }

    pub fn sync_state(&self) -> SyncState {
        self.synchronizer.sync_state()
    }

    pub fn get_sync_status(&self) -> SyncStatus {
        self.synchronizer.get_sync_status()
    }

    /// Fee address and amount of the current node, `("", 0)` until it has been reached.
    pub fn get_node_fee(&self) -> (String, u64) {
        self.synchronizer.current_daemon().get_node_fee()
    }

    pub fn get_daemon_connection_info(&self) -> DaemonConnection {
        self.synchronizer.current_daemon().get_connection_info()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.synchronizer.subscribe()
    }

    pub async fn register_handler(&self, handler: Box<dyn SyncEventHandler>) {
        self.synchronizer.register_handler(handler).await;
    }

    /// Unlocked and locked balance of the whole wallet.
    pub fn get_balance(&self) -> Balance {
        self.state()
            .sub_wallets
            .balance(None, self.config.maturity_window, unix_timestamp())
    }

    /// Balance of the given addresses, all of which must belong to this wallet.
    pub fn get_balance_for<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Balance, WalletError> {
        let keys = addresses
            .iter()
            .map(|address| self.owned_spend_key(address.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self
            .state()
            .sub_wallets
            .balance(Some(&keys), self.config.maturity_window, unix_timestamp()))
    }

    pub fn get_num_transactions(&self) -> usize {
        self.state().sub_wallets.transactions().len()
    }

    /// All transactions, oldest first.
    pub fn get_transactions(&self) -> Vec<Transaction> {
        self.state().sub_wallets.transactions().iter().cloned().collect()
    }

    pub fn get_transaction(&self, hash: &str) -> Option<Transaction> {
        self.state().sub_wallets.transactions().get(hash).cloned()
    }

    fn address_for(&self, public_spend_key: &PublicKey) -> Result<String, WalletError> {
        Ok(self.codec.encode(public_spend_key, &self.public_view_key)?)
    }

    /// Public spend key behind `address`, if the address is a standard address of this wallet.
    fn owned_spend_key(&self, address: &str) -> Result<PublicKey, WalletError> {
        validate_address(&self.codec, address, false)?;
        let decoded = self.codec.decode(address)?;
        if decoded.public_view_key != self.public_view_key
            || !self.state().sub_wallets.contains(&decoded.public_spend_key)
        {
            return Err(WalletError::AddressNotInWallet);
        }
        Ok(decoded.public_spend_key)
    }

    pub fn get_primary_address(&self) -> Result<String, WalletError> {
        let public_spend_key = *primary(&self.state().sub_wallets)?.public_spend_key();
        self.address_for(&public_spend_key)
    }

    /// Addresses of every subwallet, primary first.
    pub fn get_addresses(&self) -> Result<Vec<String>, WalletError> {
        let keys: Vec<PublicKey> = self
            .state()
            .sub_wallets
            .iter()
            .map(|s| *s.public_spend_key())
            .collect();
        keys.iter().map(|key| self.address_for(key)).collect()
    }

    /// Private spend and view key of the primary address.
    ///
    /// View wallets report [`SecretKey::NULL`] as the spend key.
    pub fn get_primary_address_private_keys(&self) -> Result<(SecretKey, SecretKey), WalletError> {
        let state = self.state();
        let spend = *primary(&state.sub_wallets)?.private_spend_key();
        Ok((spend, *state.sub_wallets.private_view_key()))
    }

    pub fn get_private_view_key(&self) -> SecretKey {
        *self.state().sub_wallets.private_view_key()
    }

    pub fn is_view_wallet(&self) -> bool {
        self.state().sub_wallets.is_view_wallet()
    }

    /// Public and private spend key of `address`.
    pub fn get_spend_keys(&self, address: &str) -> Result<(PublicKey, SecretKey), WalletError> {
        let public_spend_key = self.owned_spend_key(address)?;
        let state = self.state();
        let sub_wallet = state
            .sub_wallets
            .get(&public_spend_key)
            .ok_or(WalletError::AddressNotInWallet)?;
        Ok((public_spend_key, *sub_wallet.private_spend_key()))
    }

    pub fn get_mnemonic_seed(&self) -> Result<String, WalletError> {
        let address = self.get_primary_address()?;
        self.get_mnemonic_seed_for_address(&address)
    }

    /// 25-word seed restoring `address`. Only the primary address of a deterministic wallet has one.
    pub fn get_mnemonic_seed_for_address(&self, address: &str) -> Result<String, WalletError> {
        let public_spend_key = self.owned_spend_key(address)?;
        let state = self.state();
        let sub_wallet = state
            .sub_wallets
            .get(&public_spend_key)
            .ok_or(WalletError::AddressNotInWallet)?;

        let private_spend_key = sub_wallet.private_spend_key();
        if private_spend_key.is_null()
            || !sub_wallet.is_primary_address()
            || !private_keys_are_deterministic(
                self.config.crypto.as_ref(),
                private_spend_key,
                state.sub_wallets.private_view_key(),
            )
        {
            return Err(WalletError::KeysNotDeterministic);
        }

        Ok(Seed::from_bytes(private_spend_key.0).to_mnemonic().join(" "))
    }

    /// Derives the next subwallet. It only scans blocks the wallet has not reached yet.
    pub fn add_subwallet(&self) -> Result<String, WalletError> {
        let public_spend_key = {
            let mut state = self.state();
            let scan_height = state.sub_wallets.min_scan_height();
            let start_height = if scan_height == 0 { 0 } else { scan_height + 1 };
            let start_timestamp = state.sub_wallets.min_start_timestamp();
            state
                .sub_wallets
                .add_subwallet(self.config.crypto.as_ref(), start_height, start_timestamp)?
        };
        self.address_for(&public_spend_key)
    }

    /// Adds a spend key scanned from `scan_height`, or from the genesis block when `None`.
    pub fn import_subwallet(
        &self,
        private_spend_key: &str,
        scan_height: Option<u64>,
    ) -> Result<String, WalletError> {
        let private_spend_key: SecretKey = private_spend_key.parse()?;
        let start_height = scan_height.unwrap_or(0);
        let public_spend_key = {
            let mut state = self.state();
            let key = state.sub_wallets.import_subwallet(
                self.config.crypto.as_ref(),
                private_spend_key,
                start_height,
            )?;
            state.invalidate();
            key
        };
        debug!("Imported subwallet scanning from height {}", start_height);
        self.address_for(&public_spend_key)
    }

    pub fn import_view_subwallet(
        &self,
        public_spend_key: &str,
        scan_height: Option<u64>,
    ) -> Result<String, WalletError> {
        let public_spend_key: PublicKey = public_spend_key.parse()?;
        {
            let mut state = self.state();
            state
                .sub_wallets
                .import_view_subwallet(public_spend_key, scan_height.unwrap_or(0))?;
            state.invalidate();
        }
        self.address_for(&public_spend_key)
    }

    pub fn delete_subwallet(&self, address: &str) -> Result<(), WalletError> {
        let public_spend_key = self.owned_spend_key(address)?;
        self.state().sub_wallets.delete_subwallet(&public_spend_key)
    }

    /// Number of subwallets, primary included.
    pub fn get_wallet_count(&self) -> usize {
        self.state().sub_wallets.count()
    }

    pub fn create_integrated_address(
        &self,
        address: &str,
        payment_id: &str,
    ) -> Result<String, WalletError> {
        Ok(self.codec.create_integrated_address(address, payment_id)?)
    }
}

impl Drop for WalletBackend {
    fn drop(&mut self) {
        self.synchronizer.signal_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdfParams;
    use crate::daemon::{InMemoryDaemon, KeyInput, Recipient, build_transaction, output_key_image};
    use std::time::Duration;

    const SEED_WORDS: &str = "skulls woozy ouch summon gifts huts waffle ourselves obtains hexagon tadpoles hacksaw dormant hence abort listen history atom cadets stylishly snout vegan girth guest history";
    const SEED_ADDRESS: &str = "TRTLv1s9JQeHAJFoHvcqVBPyHYom2ynKeK6dpYptbp8gQNzdzE73ZDkNmNurqfhhcMSUXpS1ZGEJKiKJUcPCyw7vYaCc354DCN1";
    const INDEPENDENT_VIEW: &str = "1f3f6c220dd9f97619dbf44d967f79f3041b9b1c63da2c895f980f1411d5d704";
    const INDEPENDENT_SPEND: &str = "55e0aa4ca65c0ae016c7364eec313f56fc162901ead0e38a9f846686ac78560f";
    const INDEPENDENT_ADDRESS: &str = "TRTLv41arQbNqvP1x4MuTVFxqVydgF2PBatbBKdER2LP6uH56q3s4EbEaCRGvRc8uXEeoz5PaR5EgDZd1FTbCeVeYFqjbj5LyQQ";

    fn config() -> Config {
        Config::default()
            .with_sync_interval(Duration::from_millis(10))
            .with_kdf(KdfParams {
                memory_kib: 64,
                iterations: 1,
                parallelism: 1,
            })
    }

    fn daemon() -> Arc<InMemoryDaemon> {
        Arc::new(InMemoryDaemon::new("127.0.0.1", 11898))
    }

    fn key_wallet(daemon: Arc<InMemoryDaemon>) -> WalletBackend {
        WalletBackend::import_from_keys(config(), daemon, 0, INDEPENDENT_VIEW, INDEPENDENT_SPEND)
            .unwrap()
    }

    #[test]
    fn test_seed_restore() {
        let wallet = WalletBackend::import_from_seed(config(), daemon(), 0, SEED_WORDS).unwrap();
        let (spend, view) = wallet.get_primary_address_private_keys().unwrap();
        assert_eq!(
            spend.to_hex(),
            "d61a57a59318d70ff77cc7f8ad7f62887c828da1d5d3f3b0d2f7d3fa596c2904"
        );
        assert_eq!(
            view.to_hex(),
            "688e5229df6463ec4c27f6ee11c3f1d3d4b4d2480c0aabe64fb807182cfdc801"
        );
        assert_eq!(wallet.get_primary_address().unwrap(), SEED_ADDRESS);
    }

    #[test]
    fn test_key_restore_gives_back_the_seed() {
        let wallet = WalletBackend::import_from_keys(
            config(),
            daemon(),
            0,
            "688e5229df6463ec4c27f6ee11c3f1d3d4b4d2480c0aabe64fb807182cfdc801",
            "d61a57a59318d70ff77cc7f8ad7f62887c828da1d5d3f3b0d2f7d3fa596c2904",
        )
        .unwrap();
        assert_eq!(wallet.get_mnemonic_seed().unwrap(), SEED_WORDS);
    }

    #[test]
    fn test_independent_keys_have_no_seed() {
        let wallet = key_wallet(daemon());
        assert_eq!(wallet.get_primary_address().unwrap(), INDEPENDENT_ADDRESS);
        assert!(matches!(
            wallet.get_mnemonic_seed(),
            Err(WalletError::KeysNotDeterministic)
        ));
    }

    #[test]
    fn test_view_wallet_has_null_spend_key() {
        let address = "TRTLuybJFCU8BjP18bH3VZCNAu1fZ2r3d85SsU2w3VnJAHoRfnzLKgtTK2b58nfwDu59hKxwVuSMhTN31gmUW8nN9aoAN9N8Qyb";
        let wallet = WalletBackend::import_view_wallet(
            config(),
            daemon(),
            0,
            "3c6cfe7a29a371278abd9f5725a3d2af5eb73d88b4ed9b8d6c2ff993bbc4c20a",
            address,
        )
        .unwrap();

        let (spend, _) = wallet.get_primary_address_private_keys().unwrap();
        assert_eq!(spend.to_hex(), "0".repeat(64));
        assert!(wallet.is_view_wallet());
        assert_eq!(wallet.get_primary_address().unwrap(), address);
        assert!(matches!(
            wallet.get_mnemonic_seed(),
            Err(WalletError::KeysNotDeterministic)
        ));
        assert!(matches!(
            wallet.add_subwallet(),
            Err(WalletError::IllegalViewWalletOperation)
        ));

        let mismatched =
            WalletBackend::import_view_wallet(config(), daemon(), 0, INDEPENDENT_VIEW, address);
        assert!(matches!(mismatched, Err(WalletError::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_mnemonic_seed_for_address() {
        let wallet = WalletBackend::create(config(), daemon()).unwrap();
        assert!(matches!(
            wallet.get_mnemonic_seed_for_address(""),
            Err(WalletError::AddressWrongLength)
        ));
        assert!(matches!(
            wallet.get_mnemonic_seed_for_address(SEED_ADDRESS),
            Err(WalletError::AddressNotInWallet)
        ));

        let primary = wallet.get_primary_address().unwrap();
        let seed = wallet.get_mnemonic_seed_for_address(&primary).unwrap();
        assert_eq!(seed.split(' ').count(), 25);

        let subwallet = wallet.add_subwallet().unwrap();
        assert!(matches!(
            wallet.get_mnemonic_seed_for_address(&subwallet),
            Err(WalletError::KeysNotDeterministic)
        ));
    }

    #[test]
    fn test_import_subwallet_twice() {
        let wallet = key_wallet(daemon());
        let key = "c93d9e2e71ea018e7b0cec89c260f2d00d3f88ede16b3532f4ae04596ab38001";

        let address = wallet.import_subwallet(key, None).unwrap();
        assert_eq!(
            address,
            "TRTLuxZPMVRHTq27oJFmwzd85wVr2ddhM2gqXcDAp1NiDKjCMwBT98BEaCRGvRc8uXEeoz5PaR5EgDZd1FTbCeVeYFqjbp6Wx2H"
        );
        let again = wallet.import_subwallet(key, None);
        assert_eq!(again.unwrap_err().code(), "SUBWALLET_ALREADY_EXISTS");
        assert_eq!(wallet.get_wallet_count(), 2);

        let (public, private) = wallet.get_spend_keys(&address).unwrap();
        assert_eq!(private.to_hex(), key);
        assert_eq!(wallet.get_addresses().unwrap()[1], address);
        assert_eq!(
            public,
            wallet.config().crypto.secret_key_to_public_key(&private).unwrap()
        );
    }

    #[test]
    fn test_add_and_delete_subwallets() {
        let wallet = WalletBackend::create(config(), daemon()).unwrap();
        let primary = wallet.get_primary_address().unwrap();
        let mut added = Vec::new();
        for expected in 2..=4 {
            added.push(wallet.add_subwallet().unwrap());
            assert_eq!(wallet.get_wallet_count(), expected);
        }
        assert_eq!(wallet.get_addresses().unwrap().len(), 4);

        wallet.delete_subwallet(&added[1]).unwrap();
        assert_eq!(wallet.get_wallet_count(), 3);
        assert!(matches!(
            wallet.delete_subwallet(&primary),
            Err(WalletError::CannotDeletePrimaryAddress)
        ));
        assert!(matches!(
            wallet.get_balance_for(&[added[1].as_str()]),
            Err(WalletError::AddressNotInWallet)
        ));
    }

    #[test]
    fn test_address_prefix_is_per_wallet() {
        let wallet = WalletBackend::import_from_keys(
            config().with_address_prefix(8411),
            daemon(),
            0,
            INDEPENDENT_VIEW,
            INDEPENDENT_SPEND,
        )
        .unwrap();
        assert_eq!(
            wallet.get_primary_address().unwrap(),
            "dg5NZstxyAegrTA1Z771tPZaf13V6YHAjUjAieQfjwCb6P1eYHuMmwRcDcQ1eAs41sQrh98FjBXn257HZzh2CCwE2spKE2gmA"
        );
    }

    #[test]
    fn test_create_integrated_address() {
        let wallet = key_wallet(daemon());
        let payment_id = "b23df6e84c1dd619d3601a28e5948d92a0d096aea1621969c591a90e986794a0";
        let integrated = wallet
            .create_integrated_address(INDEPENDENT_ADDRESS, payment_id)
            .unwrap();
        assert!(integrated.len() > INDEPENDENT_ADDRESS.len());
        assert_eq!(
            integrated,
            wallet
                .create_integrated_address(INDEPENDENT_ADDRESS, payment_id)
                .unwrap()
        );

        assert!(wallet.create_integrated_address(INDEPENDENT_ADDRESS, "").is_err());
        assert!(wallet.create_integrated_address("", payment_id).is_err());
    }

    #[test]
    fn test_status_before_start() {
        let wallet = WalletBackend::create(config(), daemon()).unwrap();
        assert_eq!(
            wallet.get_sync_status(),
            SyncStatus {
                wallet_height: 0,
                local_daemon_height: 0,
                network_height: 0,
            }
        );
        assert_eq!(wallet.get_node_fee(), (String::new(), 0));
        assert_eq!(wallet.sync_state(), SyncState::Stopped);
    }

    #[test]
    fn test_json_round_trip() {
        let wallet = WalletBackend::create(config(), daemon()).unwrap();
        wallet.add_subwallet().unwrap();
        let json = wallet.to_json_string().unwrap();

        let loaded = WalletBackend::load_from_json(config(), daemon(), &json).unwrap();
        assert_eq!(loaded.to_json_string().unwrap(), json);
    }

    #[tokio::test]
    async fn test_encrypted_round_trips() {
        let wallet = WalletBackend::create(config(), daemon()).unwrap();
        let json = wallet.to_json_string().unwrap();
        let dir = tempfile::tempdir().unwrap();

        for password in ["", "hunter2", "пароль", "كلمة المرور", "👛🔐✨", "密碼 パスワード"] {
            let sealed = wallet.encrypt_wallet_to_string(password).unwrap();
            let opened =
                WalletBackend::open_from_encrypted_string(config(), daemon(), &sealed, password)
                    .unwrap();
            assert_eq!(opened.to_json_string().unwrap(), json);

            let path = dir.path().join("wallet.bin");
            wallet.save_wallet_to_file(&path, password).await.unwrap();
            let opened = WalletBackend::open_from_file(config(), daemon(), &path, password)
                .await
                .unwrap();
            assert_eq!(opened.to_json_string().unwrap(), json);
        }

        let sealed = wallet.encrypt_wallet_to_string("right").unwrap();
        let wrong = WalletBackend::open_from_encrypted_string(config(), daemon(), &sealed, "wrong");
        assert_eq!(wrong.err().map(|e| e.code()), Some("INVALID_PASSWORD"));

        let missing =
            WalletBackend::open_from_file(config(), daemon(), dir.path().join("none"), "").await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_rewind_restores_earlier_balance() {
        let daemon = daemon();
        let wallet = key_wallet(daemon.clone());
        let crypto = wallet.config().crypto.clone();
        let (spend, view) = wallet.get_primary_address_private_keys().unwrap();
        let me = Recipient {
            public_spend_key: crypto.secret_key_to_public_key(&spend).unwrap(),
            public_view_key: crypto.secret_key_to_public_key(&view).unwrap(),
            amount: 0,
        };
        let stranger = Recipient {
            public_spend_key: crypto.secret_key_to_public_key(&crypto.sc_reduce32(&[7u8; 32])).unwrap(),
            public_view_key: crypto.secret_key_to_public_key(&crypto.sc_reduce32(&[8u8; 32])).unwrap(),
            amount: 0,
        };

        daemon.push_empty_blocks(99);
        let incoming =
            build_transaction(crypto.as_ref(), &[Recipient { amount: 1234, ..me }], &[], "").unwrap();
        let key_image = output_key_image(
            crypto.as_ref(),
            &incoming.transaction_public_key,
            &incoming.outputs[0].key,
            0,
            &view,
            &spend,
        )
        .unwrap();
        assert_eq!(daemon.push_block(vec![incoming]), 100);

        daemon.push_empty_blocks(99);
        let outgoing = build_transaction(
            crypto.as_ref(),
            &[Recipient { amount: 246, ..me }, Recipient { amount: 900, ..stranger }],
            &[KeyInput { amount: 1234, key_image: key_image.to_hex() }],
            "",
        )
        .unwrap();
        assert_eq!(daemon.push_block(vec![outgoing]), 200);

        daemon.push_empty_blocks(99);
        let later =
            build_transaction(crypto.as_ref(), &[Recipient { amount: 167, ..me }], &[], "").unwrap();
        assert_eq!(daemon.push_block(vec![later]), 300);
        daemon.push_empty_blocks(5);

        wallet.sync_to_latest().await.unwrap();
        assert_eq!(wallet.get_sync_status().wallet_height, 305);
        assert_eq!(wallet.get_num_transactions(), 3);
        assert_eq!(
            wallet.get_balance(),
            Balance {
                unlocked: 246,
                locked: 167,
            }
        );
        let transactions = wallet.get_transactions();
        let outgoing = &transactions[1];
        assert_eq!(outgoing.fee, 88);
        assert_eq!(outgoing.amount(), 246 - 1234);
        assert_eq!(wallet.get_transaction(&outgoing.hash).as_ref(), Some(outgoing));

        let mut events = wallet.subscribe();
        wallet.rewind(150).await;
        assert_eq!(wallet.get_num_transactions(), 1);
        assert_eq!(
            wallet.get_balance(),
            Balance {
                unlocked: 1234,
                locked: 0,
            }
        );
        assert_eq!(events.try_recv().unwrap(), SyncEvent::Rewind { height: 150 });

        wallet.sync_to_latest().await.unwrap();
        assert_eq!(wallet.get_num_transactions(), 3);
        assert_eq!(
            wallet.get_balance_for(&[INDEPENDENT_ADDRESS]).unwrap(),
            Balance {
                unlocked: 246,
                locked: 167,
            }
        );
    }

    #[tokio::test]
    async fn test_swap_node_preserves_state() {
        let first = daemon();
        let wallet = key_wallet(first.clone());
        first.push_empty_blocks(12);
        wallet.sync_to_latest().await.unwrap();
        let json = wallet.to_json_string().unwrap();

        let second = Arc::new(
            InMemoryDaemon::new("node.example", 443)
                .with_ssl(true)
                .with_fee("TRTLfee", 10),
        );
        second.push_empty_blocks(20);
        wallet.swap_node(second.clone()).await;

        assert_eq!(wallet.to_json_string().unwrap(), json);
        let connection = wallet.get_daemon_connection_info();
        assert_eq!(connection.host, "node.example");
        assert_eq!(connection.port, 443);
        assert!(connection.ssl);
        assert_eq!(wallet.get_node_fee(), ("TRTLfee".to_string(), 10));
    }

    #[tokio::test]
    async fn test_background_sync_and_reset() {
        let daemon = daemon();
        let wallet = key_wallet(daemon.clone());
        daemon.push_empty_blocks(4);
        let crypto = wallet.config().crypto.clone();
        let (spend, view) = wallet.get_primary_address_private_keys().unwrap();
        let me = Recipient {
            public_spend_key: crypto.secret_key_to_public_key(&spend).unwrap(),
            public_view_key: crypto.secret_key_to_public_key(&view).unwrap(),
            amount: 75,
        };
        daemon.push_block(vec![build_transaction(crypto.as_ref(), &[me], &[], "").unwrap()]);

        let mut events = wallet.subscribe();
        wallet.start().await;
        let found = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(SyncEvent::IncomingTransaction(tx)) = events.recv().await {
                    break tx;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(found.amount(), 75);
        wallet.stop().await;
        assert_eq!(wallet.get_num_transactions(), 1);

        wallet.reset(3, 0).await;
        assert_eq!(wallet.get_num_transactions(), 0);
        assert_eq!(wallet.get_sync_status().wallet_height, 2);
        wallet.sync_to_latest().await.unwrap();
        assert_eq!(wallet.get_num_transactions(), 1);
    }
}
