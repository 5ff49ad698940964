//!
//! CryptoNote address encoding.
//!
//! An address is `varint(prefix) ‖ public spend key ‖ public view key ‖ checksum`, written in
//! Monero-style block base58. Integrated addresses insert the 64 ASCII characters of a hex
//! payment ID between the prefix and the keys.

/// Address and payment ID validators returning wallet error kinds
pub mod validate;

pub use validate::{validate_address, validate_addresses, validate_payment_id};

use crate::crypto::{PublicKey, keccak256, read_varint, write_varint};
use crate::utils::is_hex64;

use thiserror::Error;

const KEY_SIZE: usize = 32;
const CHECKSUM_SIZE: usize = 4;
const PAYMENT_ID_SIZE: usize = 64;

/// Encoded length of a trailing partial base58 block, indexed by its byte count.
const PARTIAL_BLOCK_LENGTHS: [usize; 8] = [0, 2, 3, 5, 6, 7, 9, 10];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
	#[error("Address is the wrong length ({0} characters)")]
	WrongLength(usize),
	#[error("Address is not valid base58")]
	NotBase58,
	#[error("Address prefix {actual} does not match the network prefix {expected}")]
	WrongPrefix { expected: u64, actual: u64 },
	#[error("Address checksum does not match")]
	InvalidChecksum,
	#[error("Payment ID is the wrong length ({0} characters)")]
	PaymentIdWrongLength(usize),
	#[error("Payment ID is not a hex string")]
	PaymentIdInvalid,
}

/// The key pair, and for integrated addresses the payment ID, carried by an address string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
	pub public_spend_key: PublicKey,
	pub public_view_key: PublicKey,
	pub payment_id: Option<String>,
}

/// Encoder and decoder bound to one network prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressCodec {
	prefix: u64,
	prefix_size: usize,
}

impl AddressCodec {
	pub fn new(prefix: u64) -> Self {
		let mut buf = Vec::new();
		write_varint(&mut buf, prefix);
		Self {
			prefix,
			prefix_size: buf.len(),
		}
	}

	pub fn prefix(&self) -> u64 {
		self.prefix
	}

	fn encoded_length(bytes: usize) -> usize {
		(bytes / 8) * 11 + PARTIAL_BLOCK_LENGTHS[bytes % 8]
	}

	/// Character count of a standard address on this network.
	pub fn standard_length(&self) -> usize {
		Self::encoded_length(self.prefix_size + 2 * KEY_SIZE + CHECKSUM_SIZE)
	}

	/// Character count of an integrated address on this network.
	pub fn integrated_length(&self) -> usize {
		Self::encoded_length(self.prefix_size + PAYMENT_ID_SIZE + 2 * KEY_SIZE + CHECKSUM_SIZE)
	}

	fn encode_raw(&self, payment_id: Option<&str>, spend: &PublicKey, view: &PublicKey) -> Result<String, AddressError> {
		let mut data = Vec::with_capacity(self.prefix_size + PAYMENT_ID_SIZE + 2 * KEY_SIZE + CHECKSUM_SIZE);
		write_varint(&mut data, self.prefix);
		if let Some(payment_id) = payment_id {
			data.extend_from_slice(payment_id.as_bytes());
		}
		data.extend_from_slice(spend.as_bytes());
		data.extend_from_slice(view.as_bytes());

		let checksum = keccak256(&data);
		data.extend_from_slice(&checksum[..CHECKSUM_SIZE]);

		base58_monero::encode(&data).map_err(|_| AddressError::NotBase58)
	}

	pub fn encode(&self, public_spend_key: &PublicKey, public_view_key: &PublicKey) -> Result<String, AddressError> {
		self.encode_raw(None, public_spend_key, public_view_key)
	}

	pub fn encode_integrated(
		&self,
		public_spend_key: &PublicKey,
		public_view_key: &PublicKey,
		payment_id: &str,
	) -> Result<String, AddressError> {
		check_payment_id(payment_id)?;
		self.encode_raw(Some(payment_id), public_spend_key, public_view_key)
	}

	pub fn decode(&self, address: &str) -> Result<DecodedAddress, AddressError> {
		let length = address.chars().count();
		if length != self.standard_length() && length != self.integrated_length() {
			return Err(AddressError::WrongLength(length));
		}

		let data = base58_monero::decode(address).map_err(|_| AddressError::NotBase58)?;
		let (prefix, prefix_size) = read_varint(&data).ok_or(AddressError::NotBase58)?;
		if prefix != self.prefix {
			return Err(AddressError::WrongPrefix {
				expected: self.prefix,
				actual: prefix,
			});
		}

		if data.len() < prefix_size + 2 * KEY_SIZE + CHECKSUM_SIZE {
			return Err(AddressError::WrongLength(length));
		}

		let (body, checksum) = data.split_at(data.len() - CHECKSUM_SIZE);
		if keccak256(body)[..CHECKSUM_SIZE] != *checksum {
			return Err(AddressError::InvalidChecksum);
		}

		let payload = &body[prefix_size..];
		let (payment_id, keys) = match payload.len() {
			n if n == 2 * KEY_SIZE => (None, payload),
			n if n == PAYMENT_ID_SIZE + 2 * KEY_SIZE => {
				let (id, keys) = payload.split_at(PAYMENT_ID_SIZE);
				let id = std::str::from_utf8(id).map_err(|_| AddressError::PaymentIdInvalid)?;
				check_payment_id(id)?;
				(Some(id.to_string()), keys)
			}
			_ => return Err(AddressError::WrongLength(length)),
		};

		let mut spend = [0u8; KEY_SIZE];
		let mut view = [0u8; KEY_SIZE];
		spend.copy_from_slice(&keys[..KEY_SIZE]);
		view.copy_from_slice(&keys[KEY_SIZE..]);

		Ok(DecodedAddress {
			public_spend_key: PublicKey(spend),
			public_view_key: PublicKey(view),
			payment_id,
		})
	}

	/// Embeds `payment_id` into a standard `address`. Both must be well formed; an empty
	/// address or payment ID is an error.
	pub fn create_integrated_address(&self, address: &str, payment_id: &str) -> Result<String, AddressError> {
		check_payment_id(payment_id)?;
		let decoded = self.decode(address)?;
		if decoded.payment_id.is_some() {
			return Err(AddressError::WrongLength(address.chars().count()));
		}
		self.encode_integrated(&decoded.public_spend_key, &decoded.public_view_key, payment_id)
	}
}

fn check_payment_id(payment_id: &str) -> Result<(), AddressError> {
	if payment_id.len() != PAYMENT_ID_SIZE {
		return Err(AddressError::PaymentIdWrongLength(payment_id.len()));
	}
	if !is_hex64(payment_id) {
		return Err(AddressError::PaymentIdInvalid);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	const DEFAULT_PREFIX: u64 = 3914525;

	const PRIMARY: &str = "TRTLv2Fyavy8CXG8BPEbNeCHFZ1fuDCYCZ3vW5H5LXN4K2M2MHUpTENip9bbavpHvvPwb4NDkBWrNgURAd5DB38FHXWZyoBh4wW";
	const PAYMENT_ID: &str = "b23df6e84c1dd619d3601a28e5948d92a0d096aea1621969c591a90e986794a0";
	const INTEGRATED: &str = "TRTLuyzDT8wJ6bAmnmBLyRHmBNrRrafuR9G3bJTNzPiTAS4xKDQKHd9Aa2sF2q22DF9EXi5HNpZGcHGBwqgVAqc2AZxUBMMSegm8CXG8BPEbNeCHFZ1fuDCYCZ3vW5H5LXN4K2M2MHUpTENip9bbavpHvvPwb4NDkBWrNgURAd5DB38FHXWZyhJk2yR";

	#[test]
	fn test_lengths() {
		let codec = AddressCodec::new(DEFAULT_PREFIX);
		assert_eq!(codec.standard_length(), 99);
		assert_eq!(codec.integrated_length(), 187);
	}

	#[test]
	fn test_decode_encode_roundtrip() {
		let codec = AddressCodec::new(DEFAULT_PREFIX);
		let decoded = codec.decode(PRIMARY).unwrap();
		assert_eq!(decoded.payment_id, None);
		assert_eq!(
			codec
				.encode(&decoded.public_spend_key, &decoded.public_view_key)
				.unwrap(),
			PRIMARY
		);
	}

	#[test]
	fn test_create_integrated_address() {
		let codec = AddressCodec::new(DEFAULT_PREFIX);
		let integrated = codec.create_integrated_address(PRIMARY, PAYMENT_ID).unwrap();
		assert_eq!(integrated, INTEGRATED);

		let decoded = codec.decode(&integrated).unwrap();
		let standard = codec.decode(PRIMARY).unwrap();
		assert_eq!(decoded.payment_id.as_deref(), Some(PAYMENT_ID));
		assert_eq!(decoded.public_spend_key, standard.public_spend_key);
		assert_eq!(decoded.public_view_key, standard.public_view_key);
	}

	#[test]
	fn test_create_integrated_address_rejects_empty_inputs() {
		let codec = AddressCodec::new(DEFAULT_PREFIX);
		assert_eq!(
			codec.create_integrated_address(PRIMARY, ""),
			Err(AddressError::PaymentIdWrongLength(0))
		);
		assert_eq!(
			codec.create_integrated_address("", PAYMENT_ID),
			Err(AddressError::WrongLength(0))
		);
		assert_eq!(
			codec.create_integrated_address(PRIMARY, &"x".repeat(64)),
			Err(AddressError::PaymentIdInvalid)
		);
	}

	#[test]
	fn test_prefix_changes_address_not_keys() {
		let turtle = AddressCodec::new(DEFAULT_PREFIX);
		let other = AddressCodec::new(8411);
		let spend: PublicKey = "ff9b6e048297ee435d6219005974c2c8df620a4aca9ca5c4e13f071823482029"
			.parse()
			.unwrap();
		let decoded = turtle
			.decode("TRTLv41arQbNqvP1x4MuTVFxqVydgF2PBatbBKdER2LP6uH56q3s4EbEaCRGvRc8uXEeoz5PaR5EgDZd1FTbCeVeYFqjbj5LyQQ")
			.unwrap();
		assert_eq!(decoded.public_spend_key, spend);

		let rewritten = other
			.encode(&decoded.public_spend_key, &decoded.public_view_key)
			.unwrap();
		assert_eq!(
			rewritten,
			"dg5NZstxyAegrTA1Z771tPZaf13V6YHAjUjAieQfjwCb6P1eYHuMmwRcDcQ1eAs41sQrh98FjBXn257HZzh2CCwE2spKE2gmA"
		);
		assert_eq!(other.decode(&rewritten).unwrap(), decoded);
	}

	#[test]
	fn test_decode_errors() {
		let codec = AddressCodec::new(DEFAULT_PREFIX);
		assert_eq!(codec.decode("TRTL"), Err(AddressError::WrongLength(4)));

		let mut bad_symbol = PRIMARY.to_string();
		bad_symbol.replace_range(10..11, "0");
		assert_eq!(codec.decode(&bad_symbol), Err(AddressError::NotBase58));

		let mut bad_checksum = PRIMARY.to_string();
		bad_checksum.replace_range(98..99, if PRIMARY.ends_with('W') { "X" } else { "W" });
		assert!(matches!(
			codec.decode(&bad_checksum),
			Err(AddressError::InvalidChecksum) | Err(AddressError::NotBase58)
		));
	}
}
