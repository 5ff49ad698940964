//! Transaction records, owned inputs and balance accounting.
//!
//! Balances are never stored. They are recomputed from the owned inputs every time, so a rewind
//! is reflected immediately and identically to the state originally held at that height.

use crate::crypto::{KeyImage, PublicKey};

use serde::{Deserialize, Serialize};

/// Unlock times below this value are block heights, at or above it unix timestamps.
pub const UNLOCK_TIME_TIMESTAMP_THRESHOLD: u64 = 500_000_000;

/// Net effect of a transaction on one subwallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
	pub public_key: PublicKey,
	pub amount: i64,
}

/// A transaction that moved funds into or out of the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
	/// Per-subwallet attribution, ordered by public spend key
	pub transfers: Vec<Transfer>,
	pub hash: String,
	pub fee: u64,
	pub block_height: u64,
	pub timestamp: u64,
	#[serde(rename = "paymentID")]
	pub payment_id: String,
	pub unlock_time: u64,
	pub is_coinbase_transaction: bool,
}

impl Transaction {
	/// Signed sum of all transfers.
	pub fn amount(&self) -> i64 {
		self.transfers
			.iter()
			.fold(0i64, |total, t| total.saturating_add(t.amount))
	}

	pub fn transfer_for(&self, public_spend_key: &PublicKey) -> Option<i64> {
		self.transfers
			.iter()
			.find(|t| &t.public_key == public_spend_key)
			.map(|t| t.amount)
	}

	fn merge_transfers(&mut self, transfers: Vec<Transfer>) {
		for transfer in transfers {
			match self.transfers.iter_mut().find(|t| t.public_key == transfer.public_key) {
				Some(existing) => existing.amount = transfer.amount,
				None => self.transfers.push(transfer),
			}
		}
		self.transfers.sort_by(|a, b| a.public_key.cmp(&b.public_key));
	}
}

/// An output owned by one of the wallet's subwallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
	/// Absent for view-only subwallets, which cannot detect spends
	pub key_image: Option<KeyImage>,
	pub amount: u64,
	pub block_height: u64,
	pub transaction_public_key: PublicKey,
	/// Index of the output within its transaction
	pub transaction_index: u64,
	pub global_output_index: Option<u64>,
	pub key: PublicKey,
	/// Height of the block that spent this input, 0 while unspent
	pub spend_height: u64,
	pub unlock_time: u64,
	pub parent_transaction_hash: String,
}

impl TransactionInput {
	pub fn is_unlocked(&self, current_height: u64, maturity_window: u64, now: u64) -> bool {
		is_input_unlocked(
			self.unlock_time,
			self.block_height,
			current_height,
			maturity_window,
			now,
		)
	}
}

/// True once an input has matured past `maturity_window` blocks and its unlock time has passed.
pub fn is_input_unlocked(
	unlock_time: u64,
	block_height: u64,
	current_height: u64,
	maturity_window: u64,
	now: u64,
) -> bool {
	if current_height < block_height.saturating_add(maturity_window) {
		return false;
	}
	if unlock_time < UNLOCK_TIME_TIMESTAMP_THRESHOLD {
		current_height >= unlock_time
	} else {
		now >= unlock_time
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balance {
	pub unlocked: u64,
	pub locked: u64,
}

impl Balance {
	pub fn total(&self) -> u64 {
		self.unlocked.saturating_add(self.locked)
	}
}

impl std::ops::AddAssign for Balance {
	fn add_assign(&mut self, other: Self) {
		self.unlocked = self.unlocked.saturating_add(other.unlocked);
		self.locked = self.locked.saturating_add(other.locked);
	}
}

/// Height-ordered collection of the wallet's transactions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionLedger {
	transactions: Vec<Transaction>,
}

impl TransactionLedger {
	/// Inserts `transaction` in height order. A transaction already present (same hash) has the
	/// new transfers merged into it instead.
	pub fn add(&mut self, mut transaction: Transaction) {
		if let Some(existing) = self.transactions.iter_mut().find(|t| t.hash == transaction.hash) {
			existing.merge_transfers(transaction.transfers);
			return;
		}
		transaction.transfers.sort_by(|a, b| a.public_key.cmp(&b.public_key));
		let position = self
			.transactions
			.partition_point(|t| t.block_height <= transaction.block_height);
		self.transactions.insert(position, transaction);
	}

	pub fn get(&self, hash: &str) -> Option<&Transaction> {
		self.transactions.iter().find(|t| t.hash == hash)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
		self.transactions.iter()
	}

	pub fn len(&self) -> usize {
		self.transactions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.transactions.is_empty()
	}

	/// Drops every transaction above `height`.
	pub fn rewind(&mut self, height: u64) {
		self.transactions.retain(|t| t.block_height <= height);
	}

	/// Removes a subwallet's attribution. Transactions left without transfers are dropped.
	pub fn remove_transfers_for(&mut self, public_spend_key: &PublicKey) {
		for transaction in &mut self.transactions {
			transaction
				.transfers
				.retain(|t| &t.public_key != public_spend_key);
		}
		self.transactions.retain(|t| !t.transfers.is_empty());
	}

	pub fn clear(&mut self) {
		self.transactions.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn transaction(hash: &str, height: u64, transfers: &[(u8, i64)]) -> Transaction {
		Transaction {
			transfers: transfers
				.iter()
				.map(|(key, amount)| Transfer {
					public_key: PublicKey([*key; 32]),
					amount: *amount,
				})
				.collect(),
			hash: hash.to_string(),
			fee: 0,
			block_height: height,
			timestamp: 0,
			payment_id: String::new(),
			unlock_time: 0,
			is_coinbase_transaction: false,
		}
	}

	#[test]
	fn test_unlock_rules() {
		assert!(!is_input_unlocked(0, 100, 105, 10, 0));
		assert!(is_input_unlocked(0, 100, 110, 10, 0));
		// height-based unlock time
		assert!(!is_input_unlocked(150, 100, 120, 10, 0));
		assert!(is_input_unlocked(150, 100, 150, 10, 0));
		// timestamp-based unlock time
		assert!(!is_input_unlocked(1_600_000_000, 100, 200, 10, 1_599_999_999));
		assert!(is_input_unlocked(1_600_000_000, 100, 200, 10, 1_600_000_000));
	}

	#[test]
	fn test_ledger_keeps_height_order_and_merges() {
		let mut ledger = TransactionLedger::default();
		ledger.add(transaction("b", 200, &[(1, 5)]));
		ledger.add(transaction("c", 300, &[(1, 7)]));
		ledger.add(transaction("a", 100, &[(2, 3)]));
		ledger.add(transaction("b", 200, &[(2, -4)]));

		let hashes: Vec<&str> = ledger.iter().map(|t| t.hash.as_str()).collect();
		assert_eq!(hashes, vec!["a", "b", "c"]);
		assert_eq!(ledger.len(), 3);
		assert_eq!(ledger.get("b").unwrap().amount(), 1);
		assert_eq!(ledger.get("b").unwrap().transfer_for(&PublicKey([2; 32])), Some(-4));
	}

	#[test]
	fn test_rewind_and_remove_transfers() {
		let mut ledger = TransactionLedger::default();
		ledger.add(transaction("a", 100, &[(1, 3)]));
		ledger.add(transaction("b", 200, &[(1, 5), (2, 6)]));
		ledger.add(transaction("c", 300, &[(2, 7)]));

		ledger.remove_transfers_for(&PublicKey([2; 32]));
		assert_eq!(ledger.len(), 2);
		assert_eq!(ledger.get("b").unwrap().amount(), 5);

		ledger.rewind(150);
		assert_eq!(ledger.len(), 1);
		assert!(ledger.get("a").is_some());
	}
}
