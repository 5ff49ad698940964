//! Subwallet management.
//!
//! A wallet holds one shared view key and any number of spend keys ("subwallets"). Each subwallet
//! tracks its own scan height and the inputs it owns; the transaction ledger is shared.

use crate::crypto::{CryptoProvider, KeyImage, PublicKey, SecretKey};
use crate::wallet::keys::generate_deterministic_subwallet_key;
use crate::wallet::ledger::{Balance, Transaction, TransactionInput, TransactionLedger};
use crate::wallet::types::WalletError;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One spend key of the wallet and the outputs it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubWallet {
    pub(crate) public_spend_key: PublicKey,
    /// [`SecretKey::NULL`] for view-only subwallets
    pub(crate) private_spend_key: SecretKey,
    /// Blocks older than this timestamp are skipped, 0 disables the check
    pub(crate) sync_start_timestamp: u64,
    pub(crate) sync_start_height: u64,
    /// Height of the last block processed for this subwallet
    pub(crate) scan_height: u64,
    pub(crate) is_primary_address: bool,
    pub(crate) unspent_inputs: Vec<TransactionInput>,
    pub(crate) spent_inputs: Vec<TransactionInput>,
}

impl SubWallet {
    fn new(
        public_spend_key: PublicKey,
        private_spend_key: SecretKey,
        start_height: u64,
        start_timestamp: u64,
        is_primary_address: bool,
    ) -> Self {
        Self {
            public_spend_key,
            private_spend_key,
            sync_start_timestamp: start_timestamp,
            sync_start_height: start_height,
            scan_height: start_height.saturating_sub(1),
            is_primary_address,
            unspent_inputs: Vec::new(),
            spent_inputs: Vec::new(),
        }
    }

    pub fn public_spend_key(&self) -> &PublicKey {
        &self.public_spend_key
    }

    pub fn private_spend_key(&self) -> &SecretKey {
        &self.private_spend_key
    }

    pub fn scan_height(&self) -> u64 {
        self.scan_height
    }

    pub fn is_primary_address(&self) -> bool {
        self.is_primary_address
    }

    /// Whether a block still needs scanning for this subwallet. Block 0 is wanted until the
    /// subwallet has moved past it.
    pub fn wants_block(&self, height: u64, timestamp: u64) -> bool {
        (height > self.scan_height || (height == 0 && self.scan_height == 0))
            && (self.sync_start_timestamp == 0 || timestamp >= self.sync_start_timestamp)
    }

    pub fn balance(&self, maturity_window: u64, now: u64) -> Balance {
        self.unspent_inputs
            .iter()
            .fold(Balance::default(), |mut balance, input| {
                if input.is_unlocked(self.scan_height, maturity_window, now) {
                    balance.unlocked = balance.unlocked.saturating_add(input.amount);
                } else {
                    balance.locked = balance.locked.saturating_add(input.amount);
                }
                balance
            })
    }

    fn rewind(&mut self, height: u64) {
        self.scan_height = self.scan_height.min(height);

        let (returned, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.spent_inputs)
            .into_iter()
            .partition(|input| input.spend_height > height);
        self.spent_inputs = kept;
        self.unspent_inputs
            .extend(returned.into_iter().map(|mut input| {
                input.spend_height = 0;
                input
            }));

        self.unspent_inputs.retain(|input| input.block_height <= height);
        self.spent_inputs.retain(|input| input.block_height <= height);
        self.unspent_inputs.sort_by_key(|input| input.block_height);
    }
}

/// All subwallets of a wallet plus the shared ledger.
///
/// Field order is the serialized order and part of the wallet file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubWallets {
    public_spend_keys: Vec<PublicKey>,
    #[serde(rename = "subWallet")]
    sub_wallets: Vec<SubWallet>,
    transactions: TransactionLedger,
    private_view_key: SecretKey,
    is_view_wallet: bool,
}

impl SubWallets {
    /// A wallet whose primary subwallet holds `private_spend_key`.
    pub fn new(
        crypto: &dyn CryptoProvider,
        private_spend_key: SecretKey,
        private_view_key: SecretKey,
        start_height: u64,
        start_timestamp: u64,
    ) -> Result<Self, WalletError> {
        let public_spend_key = crypto.secret_key_to_public_key(&private_spend_key)?;
        crypto.secret_key_to_public_key(&private_view_key)?;

        Ok(Self {
            public_spend_keys: vec![public_spend_key],
            sub_wallets: vec![SubWallet::new(
                public_spend_key,
                private_spend_key,
                start_height,
                start_timestamp,
                true,
            )],
            transactions: TransactionLedger::default(),
            private_view_key,
            is_view_wallet: false,
        })
    }

    /// A view-only wallet watching `public_spend_key`.
    pub fn new_view_wallet(
        crypto: &dyn CryptoProvider,
        private_view_key: SecretKey,
        public_spend_key: PublicKey,
        start_height: u64,
        start_timestamp: u64,
    ) -> Result<Self, WalletError> {
        crypto.secret_key_to_public_key(&private_view_key)?;

        Ok(Self {
            public_spend_keys: vec![public_spend_key],
            sub_wallets: vec![SubWallet::new(
                public_spend_key,
                SecretKey::NULL,
                start_height,
                start_timestamp,
                true,
            )],
            transactions: TransactionLedger::default(),
            private_view_key,
            is_view_wallet: true,
        })
    }

    /// Checks the invariants a freshly deserialized wallet must hold.
    pub fn validate(&self) -> Result<(), WalletError> {
        let keys: Vec<PublicKey> = self.sub_wallets.iter().map(|s| s.public_spend_key).collect();
        if keys != self.public_spend_keys {
            return Err(WalletError::WalletFileCorrupted(
                "public spend keys do not match subwallets".to_string(),
            ));
        }
        if self.sub_wallets.iter().filter(|s| s.is_primary_address).count() != 1 {
            return Err(WalletError::WalletFileCorrupted(
                "wallet must have exactly one primary subwallet".to_string(),
            ));
        }
        Ok(())
    }

    pub fn private_view_key(&self) -> &SecretKey {
        &self.private_view_key
    }

    pub fn is_view_wallet(&self) -> bool {
        self.is_view_wallet
    }

    pub fn count(&self) -> usize {
        self.sub_wallets.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubWallet> {
        self.sub_wallets.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut SubWallet> {
        self.sub_wallets.iter_mut()
    }

    pub fn primary(&self) -> Option<&SubWallet> {
        self.sub_wallets.iter().find(|s| s.is_primary_address)
    }

    pub fn get(&self, public_spend_key: &PublicKey) -> Option<&SubWallet> {
        self.sub_wallets
            .iter()
            .find(|s| &s.public_spend_key == public_spend_key)
    }

    pub fn contains(&self, public_spend_key: &PublicKey) -> bool {
        self.public_spend_keys.contains(public_spend_key)
    }

    pub fn transactions(&self) -> &TransactionLedger {
        &self.transactions
    }

    /// Lowest scan height over all subwallets.
    pub fn min_scan_height(&self) -> u64 {
        self.sub_wallets
            .iter()
            .map(|s| s.scan_height)
            .min()
            .unwrap_or(0)
    }

    /// Lowest non-zero start timestamp, used when no subwallet has a start height.
    pub fn min_start_timestamp(&self) -> u64 {
        self.sub_wallets
            .iter()
            .filter(|s| s.scan_height == 0)
            .map(|s| s.sync_start_timestamp)
            .min()
            .unwrap_or(0)
    }

    fn insert(&mut self, sub_wallet: SubWallet) -> Result<PublicKey, WalletError> {
        let key = sub_wallet.public_spend_key;
        if self.contains(&key) {
            return Err(WalletError::SubWalletAlreadyExists);
        }
        self.public_spend_keys.push(key);
        self.sub_wallets.push(sub_wallet);
        info!("Added subwallet {}", key);
        Ok(key)
    }

    /// Derives the next subwallet from the primary spend key.
    pub fn add_subwallet(
        &mut self,
        crypto: &dyn CryptoProvider,
        start_height: u64,
        start_timestamp: u64,
    ) -> Result<PublicKey, WalletError> {
        if self.is_view_wallet {
            return Err(WalletError::IllegalViewWalletOperation);
        }
        let primary = self
            .primary()
            .map(|s| s.private_spend_key)
            .ok_or(WalletError::AddressNotInWallet)?;

        for index in 1u64.. {
            let private_spend_key = generate_deterministic_subwallet_key(crypto, &primary, index);
            let public_spend_key = crypto.secret_key_to_public_key(&private_spend_key)?;
            if self.contains(&public_spend_key) {
                continue;
            }
            debug!("Derived subwallet at index {}", index);
            return self.insert(SubWallet::new(
                public_spend_key,
                private_spend_key,
                start_height,
                start_timestamp,
                false,
            ));
        }
        Err(WalletError::SubWalletAlreadyExists)
    }

    pub fn import_subwallet(
        &mut self,
        crypto: &dyn CryptoProvider,
        private_spend_key: SecretKey,
        start_height: u64,
    ) -> Result<PublicKey, WalletError> {
        if self.is_view_wallet {
            return Err(WalletError::IllegalViewWalletOperation);
        }
        let public_spend_key = crypto.secret_key_to_public_key(&private_spend_key)?;
        self.insert(SubWallet::new(
            public_spend_key,
            private_spend_key,
            start_height,
            0,
            false,
        ))
    }

    pub fn import_view_subwallet(
        &mut self,
        public_spend_key: PublicKey,
        start_height: u64,
    ) -> Result<PublicKey, WalletError> {
        if !self.is_view_wallet {
            return Err(WalletError::IllegalNonViewWalletOperation);
        }
        self.insert(SubWallet::new(
            public_spend_key,
            SecretKey::NULL,
            start_height,
            0,
            false,
        ))
    }

    /// Removes a subwallet with its inputs and its share of the ledger.
    pub fn delete_subwallet(&mut self, public_spend_key: &PublicKey) -> Result<(), WalletError> {
        let position = self
            .sub_wallets
            .iter()
            .position(|s| &s.public_spend_key == public_spend_key)
            .ok_or(WalletError::AddressNotInWallet)?;
        if self.sub_wallets[position].is_primary_address {
            return Err(WalletError::CannotDeletePrimaryAddress);
        }

        self.sub_wallets.remove(position);
        self.public_spend_keys.retain(|k| k != public_spend_key);
        self.transactions.remove_transfers_for(public_spend_key);
        info!("Deleted subwallet {}", public_spend_key);
        Ok(())
    }

    /// Balance of the given subwallets, or of all of them.
    pub fn balance(
        &self,
        public_spend_keys: Option<&[PublicKey]>,
        maturity_window: u64,
        now: u64,
    ) -> Balance {
        self.sub_wallets
            .iter()
            .filter(|s| public_spend_keys.is_none_or(|keys| keys.contains(&s.public_spend_key)))
            .fold(Balance::default(), |mut total, s| {
                total += s.balance(maturity_window, now);
                total
            })
    }

    pub fn rewind(&mut self, height: u64) {
        for sub_wallet in &mut self.sub_wallets {
            sub_wallet.rewind(height);
        }
        self.transactions.rewind(height);
    }

    /// Forgets every input and transaction and restarts all subwallets from `start_height`.
    pub fn reset(&mut self, start_height: u64, start_timestamp: u64) {
        for sub_wallet in &mut self.sub_wallets {
            sub_wallet.scan_height = start_height.saturating_sub(1);
            sub_wallet.sync_start_height = start_height;
            sub_wallet.sync_start_timestamp = start_timestamp;
            sub_wallet.unspent_inputs.clear();
            sub_wallet.spent_inputs.clear();
        }
        self.transactions.clear();
    }

    pub(crate) fn store_input(&mut self, public_spend_key: &PublicKey, input: TransactionInput) {
        if let Some(sub_wallet) = self
            .sub_wallets
            .iter_mut()
            .find(|s| &s.public_spend_key == public_spend_key)
        {
            let duplicate = sub_wallet
                .unspent_inputs
                .iter()
                .chain(sub_wallet.spent_inputs.iter())
                .any(|existing| existing.key == input.key);
            if !duplicate {
                sub_wallet.unspent_inputs.push(input);
            }
        }
    }

    /// Marks the input with `key_image` spent at `height` and returns its owner and amount.
    ///
    /// Only subwallets that still scan `height` are considered.
    pub(crate) fn mark_spent(
        &mut self,
        key_image: &KeyImage,
        height: u64,
        timestamp: u64,
    ) -> Option<(PublicKey, u64)> {
        for sub_wallet in &mut self.sub_wallets {
            if !sub_wallet.wants_block(height, timestamp) {
                continue;
            }
            if let Some(position) = sub_wallet
                .unspent_inputs
                .iter()
                .position(|input| input.key_image.as_ref() == Some(key_image))
            {
                let mut input = sub_wallet.unspent_inputs.remove(position);
                input.spend_height = height;
                let amount = input.amount;
                sub_wallet.spent_inputs.push(input);
                return Some((sub_wallet.public_spend_key, amount));
            }
        }
        None
    }

    pub(crate) fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.add(transaction);
    }

    /// Moves every subwallet still below `height` up to it.
    pub(crate) fn advance_scan_heights(&mut self, height: u64) {
        for sub_wallet in &mut self.sub_wallets {
            if sub_wallet.scan_height < height {
                sub_wallet.scan_height = height;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Provider;

    fn wallet(crypto: &Ed25519Provider) -> SubWallets {
        let spend = crypto.sc_reduce32(&[7u8; 32]);
        let view = crypto.sc_reduce32(&[8u8; 32]);
        SubWallets::new(crypto, spend, view, 0, 0).unwrap()
    }

    fn input(height: u64, amount: u64, image: u8) -> TransactionInput {
        TransactionInput {
            key_image: Some(KeyImage([image; 32])),
            amount,
            block_height: height,
            transaction_public_key: PublicKey([1; 32]),
            transaction_index: 0,
            global_output_index: None,
            key: PublicKey([image; 32]),
            spend_height: 0,
            unlock_time: 0,
            parent_transaction_hash: format!("{:02x}", image),
        }
    }

    #[test]
    fn test_add_subwallet_increments_count() {
        let crypto = Ed25519Provider::new();
        let mut wallets = wallet(&crypto);
        for _ in 0..5 {
            wallets.add_subwallet(&crypto, 0, 0).unwrap();
        }
        assert_eq!(wallets.count(), 6);
        assert!(wallets.validate().is_ok());
    }

    #[test]
    fn test_duplicate_import_rejected() {
        let crypto = Ed25519Provider::new();
        let mut wallets = wallet(&crypto);
        let key = crypto.sc_reduce32(&[9u8; 32]);

        wallets.import_subwallet(&crypto, key, 10).unwrap();
        assert!(matches!(
            wallets.import_subwallet(&crypto, key, 10),
            Err(WalletError::SubWalletAlreadyExists)
        ));
        assert_eq!(wallets.count(), 2);
    }

    #[test]
    fn test_view_wallet_restrictions() {
        let crypto = Ed25519Provider::new();
        let view = crypto.sc_reduce32(&[8u8; 32]);
        let mut wallets =
            SubWallets::new_view_wallet(&crypto, view, PublicKey([5; 32]), 0, 0).unwrap();

        assert!(matches!(
            wallets.add_subwallet(&crypto, 0, 0),
            Err(WalletError::IllegalViewWalletOperation)
        ));
        assert!(wallets.import_view_subwallet(PublicKey([6; 32]), 0).is_ok());
        assert_eq!(wallets.primary().unwrap().private_spend_key().to_hex(), "0".repeat(64));
    }

    #[test]
    fn test_primary_cannot_be_deleted() {
        let crypto = Ed25519Provider::new();
        let mut wallets = wallet(&crypto);
        let primary = *wallets.primary().unwrap().public_spend_key();
        let added = wallets.add_subwallet(&crypto, 0, 0).unwrap();

        assert!(matches!(
            wallets.delete_subwallet(&primary),
            Err(WalletError::CannotDeletePrimaryAddress)
        ));
        wallets.delete_subwallet(&added).unwrap();
        assert_eq!(wallets.count(), 1);
    }

    #[test]
    fn test_rewind_restores_spent_inputs() {
        let crypto = Ed25519Provider::new();
        let mut wallets = wallet(&crypto);
        let primary = *wallets.primary().unwrap().public_spend_key();

        wallets.store_input(&primary, input(100, 1234, 1));
        wallets.advance_scan_heights(199);
        assert_eq!(
            wallets.mark_spent(&KeyImage([1; 32]), 200, 0),
            Some((primary, 1234))
        );
        wallets.store_input(&primary, input(200, 246, 2));
        wallets.advance_scan_heights(305);
        assert_eq!(wallets.balance(None, 10, 0).unlocked, 246);

        wallets.rewind(150);
        let balance = wallets.balance(None, 10, 0);
        assert_eq!(balance, Balance { unlocked: 1234, locked: 0 });
        assert_eq!(wallets.min_scan_height(), 150);
    }

    #[test]
    fn test_import_height_sets_scan_window() {
        let crypto = Ed25519Provider::new();
        let mut wallets = wallet(&crypto);
        wallets.advance_scan_heights(500);
        let key = crypto.sc_reduce32(&[11u8; 32]);
        let public = wallets.import_subwallet(&crypto, key, 300).unwrap();

        assert_eq!(wallets.min_scan_height(), 299);
        let imported = wallets.get(&public).unwrap();
        assert!(imported.wants_block(300, 0));
        assert!(!wallets.primary().unwrap().wants_block(300, 0));
    }
}
