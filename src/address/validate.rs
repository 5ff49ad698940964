use super::AddressCodec;
use crate::utils::is_hex64;
use crate::wallet::WalletError;

pub fn validate_address(
	codec: &AddressCodec,
	address: &str,
	integrated_allowed: bool,
) -> Result<(), WalletError> {
	let decoded = codec.decode(address)?;
	if decoded.payment_id.is_some() && !integrated_allowed {
		return Err(WalletError::AddressIsIntegrated);
	}
	Ok(())
}

/// Validates each address in turn, stopping at the first failure.
pub fn validate_addresses<S: AsRef<str>>(
	codec: &AddressCodec,
	addresses: &[S],
	integrated_allowed: bool,
) -> Result<(), WalletError> {
	addresses
		.iter()
		.try_for_each(|address| validate_address(codec, address.as_ref(), integrated_allowed))
}

pub fn validate_payment_id(payment_id: &str, allow_empty: bool) -> Result<(), WalletError> {
	if payment_id.is_empty() && allow_empty {
		return Ok(());
	}
	if payment_id.len() != 64 {
		return Err(WalletError::PaymentIdWrongLength);
	}
	if !is_hex64(payment_id) {
		return Err(WalletError::PaymentIdInvalid);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	const ADDRESS: &str = "TRTLv2Fyavy8CXG8BPEbNeCHFZ1fuDCYCZ3vW5H5LXN4K2M2MHUpTENip9bbavpHvvPwb4NDkBWrNgURAd5DB38FHXWZyoBh4wW";
	const INTEGRATED: &str = "TRTLuyzDT8wJ6bAmnmBLyRHmBNrRrafuR9G3bJTNzPiTAS4xKDQKHd9Aa2sF2q22DF9EXi5HNpZGcHGBwqgVAqc2AZxUBMMSegm8CXG8BPEbNeCHFZ1fuDCYCZ3vW5H5LXN4K2M2MHUpTENip9bbavpHvvPwb4NDkBWrNgURAd5DB38FHXWZyhJk2yR";

	#[test]
	fn test_validate_address() {
		let codec = AddressCodec::new(3914525);
		assert!(validate_address(&codec, ADDRESS, false).is_ok());
		assert!(validate_address(&codec, INTEGRATED, true).is_ok());
		assert!(matches!(
			validate_address(&codec, INTEGRATED, false),
			Err(WalletError::AddressIsIntegrated)
		));
		assert!(matches!(
			validate_address(&codec, "", true),
			Err(WalletError::AddressWrongLength)
		));
	}

	#[test]
	fn test_validate_addresses_reports_first_failure() {
		let codec = AddressCodec::new(3914525);
		assert!(validate_addresses(&codec, &[ADDRESS, INTEGRATED], true).is_ok());
		let err = validate_addresses(&codec, &[ADDRESS, "TRTLshort"], true).unwrap_err();
		assert_eq!(err.code(), "ADDRESS_WRONG_LENGTH");
	}

	#[test]
	fn test_validate_payment_id() {
		assert!(validate_payment_id("", true).is_ok());
		assert_eq!(
			validate_payment_id("", false).unwrap_err().code(),
			"PAYMENT_ID_WRONG_LENGTH"
		);
		assert_eq!(
			validate_payment_id(&"z".repeat(64), false).unwrap_err().code(),
			"PAYMENT_ID_INVALID"
		);
		assert!(validate_payment_id(&"0".repeat(64), false).is_ok());
	}
}
