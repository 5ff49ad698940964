use crate::crypto::{CryptoProvider, KeyDerivation, KeyImage, PublicKey, SecretKey};
use crate::daemon::{Block, KeyOutput};
use crate::wallet::ledger::{Transaction, TransactionInput, Transfer};
use crate::wallet::subwallets::SubWallets;

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Transaction fields shared by coinbase and regular transactions.
struct ScannedTransaction<'a> {
	hash: &'a str,
	transaction_public_key: &'a str,
	outputs: &'a [KeyOutput],
	unlock_time: u64,
	payment_id: &'a str,
	is_coinbase: bool,
}

/// Finds the wallet's outputs and spends in daemon blocks.
#[derive(Clone)]
pub struct TransactionProcessor {
	crypto: Arc<dyn CryptoProvider>,
}

impl TransactionProcessor {
	pub fn new(crypto: Arc<dyn CryptoProvider>) -> Self {
		Self { crypto }
	}

	/// Scan one block for every subwallet that has not processed it yet, storing owned inputs
	/// and returning the resulting transactions. Scan heights are left to the caller.
	pub fn process_block(&self, wallets: &mut SubWallets, block: &Block) -> Vec<Transaction> {
		if !wallets
			.iter()
			.any(|s| s.wants_block(block.block_height, block.block_timestamp))
		{
			return Vec::new();
		}

		let mut found = Vec::new();

		if let Some(coinbase) = &block.coinbase_transaction {
			let scanned = ScannedTransaction {
				hash: &coinbase.hash,
				transaction_public_key: &coinbase.transaction_public_key,
				outputs: &coinbase.outputs,
				unlock_time: coinbase.unlock_time,
				payment_id: "",
				is_coinbase: true,
			};
			if let Some(tx) = self.process_transaction(wallets, block, &scanned, &[]) {
				found.push(tx);
			}
		}

		for raw in &block.transactions {
			let scanned = ScannedTransaction {
				hash: &raw.hash,
				transaction_public_key: &raw.transaction_public_key,
				outputs: &raw.outputs,
				unlock_time: raw.unlock_time,
				payment_id: &raw.payment_id,
				is_coinbase: false,
			};
			let spent: Vec<(String, u64)> = raw
				.key_inputs
				.iter()
				.map(|input| (input.key_image.clone(), input.amount))
				.collect();
			if let Some(tx) = self.process_transaction(wallets, block, &scanned, &spent) {
				found.push(tx);
			}
		}

		if !found.is_empty() {
			debug!(
				"Found {} wallet transactions in block {}",
				found.len(),
				block.block_height
			);
		}
		found
	}

	fn process_transaction(
		&self,
		wallets: &mut SubWallets,
		block: &Block,
		tx: &ScannedTransaction<'_>,
		spent: &[(String, u64)],
	) -> Option<Transaction> {
		let Some(output_total) = tx
			.outputs
			.iter()
			.try_fold(0u64, |total, o| total.checked_add(o.amount))
		else {
			warn!("Dropping transaction {}: output amounts overflow", tx.hash);
			return None;
		};
		let Some(input_total) = spent
			.iter()
			.try_fold(0u64, |total, (_, amount)| total.checked_add(*amount))
		else {
			warn!("Dropping transaction {}: input amounts overflow", tx.hash);
			return None;
		};

		let owned = self.scan_outputs(wallets, block, tx);

		let mut transfers: BTreeMap<PublicKey, i64> = BTreeMap::new();
		for (owner, input) in &owned {
			let credited = i64::try_from(input.amount)
				.ok()
				.and_then(|amount| transfers.get(owner).copied().unwrap_or(0).checked_add(amount));
			let Some(credited) = credited else {
				warn!("Dropping transaction {}: received amount does not fit a transfer", tx.hash);
				return None;
			};
			transfers.insert(*owner, credited);
		}

		for (owner, input) in owned {
			wallets.store_input(&owner, input);
		}

		if !wallets.is_view_wallet() {
			for (key_image, _) in spent {
				let key_image: KeyImage = match key_image.parse() {
					Ok(key_image) => key_image,
					Err(e) => {
						warn!("Skipping malformed key image in transaction {}: {}", tx.hash, e);
						continue;
					}
				};
				if let Some((owner, amount)) =
					wallets.mark_spent(&key_image, block.block_height, block.block_timestamp)
				{
					let debit = i64::try_from(amount).unwrap_or(i64::MAX);
					let entry = transfers.entry(owner).or_default();
					*entry = entry.saturating_sub(debit);
				}
			}
		}

		if transfers.is_empty() {
			return None;
		}

		let fee = if tx.is_coinbase {
			0
		} else {
			input_total.saturating_sub(output_total)
		};

		Some(Transaction {
			transfers: transfers
				.into_iter()
				.map(|(public_key, amount)| Transfer { public_key, amount })
				.collect(),
			hash: tx.hash.to_string(),
			fee,
			block_height: block.block_height,
			timestamp: block.block_timestamp,
			payment_id: tx.payment_id.to_string(),
			unlock_time: tx.unlock_time,
			is_coinbase_transaction: tx.is_coinbase,
		})
	}

	/// Outputs of `tx` owned by a subwallet that still scans this block.
	fn scan_outputs(
		&self,
		wallets: &SubWallets,
		block: &Block,
		tx: &ScannedTransaction<'_>,
	) -> Vec<(PublicKey, TransactionInput)> {
		let transaction_public_key: PublicKey = match tx.transaction_public_key.parse() {
			Ok(key) => key,
			Err(e) => {
				warn!("Skipping transaction {} with malformed public key: {}", tx.hash, e);
				return Vec::new();
			}
		};

		let derivation = match self
			.crypto
			.generate_key_derivation(&transaction_public_key, wallets.private_view_key())
		{
			Ok(derivation) => derivation,
			Err(e) => {
				warn!("Skipping transaction {}: {}", tx.hash, e);
				return Vec::new();
			}
		};

		let candidates: Vec<(PublicKey, SecretKey)> = wallets
			.iter()
			.filter(|s| s.wants_block(block.block_height, block.block_timestamp))
			.map(|s| (*s.public_spend_key(), *s.private_spend_key()))
			.collect();

		let mut owned = Vec::new();
		for (index, output) in tx.outputs.iter().enumerate() {
			let output_key: PublicKey = match output.key.parse() {
				Ok(key) => key,
				Err(e) => {
					warn!("Skipping malformed output {} of {}: {}", index, tx.hash, e);
					continue;
				}
			};

			let Ok(spend_key) =
				self.crypto
					.underive_public_key(&derivation, index as u64, &output_key)
			else {
				continue;
			};

			let Some((owner, private_spend_key)) =
				candidates.iter().find(|(public, _)| *public == spend_key)
			else {
				continue;
			};

			let key_image = self.key_image(
				&derivation,
				index as u64,
				&output_key,
				private_spend_key,
				tx.hash,
			);

			owned.push((
				*owner,
				TransactionInput {
					key_image,
					amount: output.amount,
					block_height: block.block_height,
					transaction_public_key,
					transaction_index: index as u64,
					global_output_index: output.global_index,
					key: output_key,
					spend_height: 0,
					unlock_time: tx.unlock_time,
					parent_transaction_hash: tx.hash.to_string(),
				},
			));
		}
		owned
	}

	fn key_image(
		&self,
		derivation: &KeyDerivation,
		output_index: u64,
		output_key: &PublicKey,
		private_spend_key: &SecretKey,
		hash: &str,
	) -> Option<KeyImage> {
		if private_spend_key.is_null() {
			return None;
		}
		let result = self
			.crypto
			.derive_secret_key(derivation, output_index, private_spend_key)
			.and_then(|ephemeral| self.crypto.generate_key_image(output_key, &ephemeral));
		match result {
			Ok(key_image) => Some(key_image),
			Err(e) => {
				warn!("Could not compute key image for output {} of {}: {}", output_index, hash, e);
				None
			}
		}
	}
}
