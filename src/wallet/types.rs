use crate::address::AddressError;
use crate::crypto::CryptoError;
use crate::daemon::DaemonError;
use crate::wallet::keys::MnemonicError;

/// Error kinds surfaced by the wallet API.
///
/// Every variant maps to a stable code string via [`WalletError::code`], so callers can match
/// on the kind without parsing messages.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
	#[error("The address given is the wrong length")]
	AddressWrongLength,

	#[error("The address given is not a valid base58 string")]
	AddressNotBase58,

	#[error("The address given has the wrong network prefix")]
	AddressWrongPrefix,

	#[error("The address given is not a valid address")]
	AddressNotValid,

	#[error("Integrated addresses are not allowed here")]
	AddressIsIntegrated,

	#[error("The address given does not exist in the wallet container")]
	AddressNotInWallet,

	#[error("The payment ID given is the wrong length")]
	PaymentIdWrongLength,

	#[error("The payment ID given is not a hex string")]
	PaymentIdInvalid,

	#[error("Invalid mnemonic seed: {0}")]
	InvalidMnemonic(#[from] MnemonicError),

	#[error("The key given is not a valid key: {0}")]
	InvalidKeyFormat(String),

	#[error("This wallet's keys are not deterministic, so no mnemonic seed can be generated")]
	KeysNotDeterministic,

	#[error("This subwallet already exists in the wallet container")]
	SubWalletAlreadyExists,

	#[error("The primary address of a wallet cannot be deleted")]
	CannotDeletePrimaryAddress,

	#[error("This operation is not possible on a view-only wallet")]
	IllegalViewWalletOperation,

	#[error("This operation is only possible on a view-only wallet")]
	IllegalNonViewWalletOperation,

	#[error("The password given is incorrect")]
	InvalidPassword,

	#[error("The data given is not a wallet file")]
	NotAWalletFile,

	#[error("The wallet file is corrupted: {0}")]
	WalletFileCorrupted(String),

	#[error("Unsupported wallet file format version {0}")]
	UnsupportedWalletFileFormatVersion(u32),

	#[error("Failed to encrypt wallet: {0}")]
	EncryptionFailed(String),

	#[error("Daemon error: {0}")]
	Daemon(#[from] DaemonError),

	#[error("Crypto error: {0}")]
	Crypto(CryptoError),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

impl WalletError {
	pub fn code(&self) -> &'static str {
		match self {
			WalletError::AddressWrongLength => "ADDRESS_WRONG_LENGTH",
			WalletError::AddressNotBase58 => "ADDRESS_NOT_BASE58",
			WalletError::AddressWrongPrefix => "ADDRESS_WRONG_PREFIX",
			WalletError::AddressNotValid => "ADDRESS_NOT_VALID",
			WalletError::AddressIsIntegrated => "ADDRESS_IS_INTEGRATED",
			WalletError::AddressNotInWallet => "ADDRESS_NOT_IN_WALLET",
			WalletError::PaymentIdWrongLength => "PAYMENT_ID_WRONG_LENGTH",
			WalletError::PaymentIdInvalid => "PAYMENT_ID_INVALID",
			WalletError::InvalidMnemonic(_) => "INVALID_MNEMONIC",
			WalletError::InvalidKeyFormat(_) => "INVALID_KEY_FORMAT",
			WalletError::KeysNotDeterministic => "KEYS_NOT_DETERMINISTIC",
			WalletError::SubWalletAlreadyExists => "SUBWALLET_ALREADY_EXISTS",
			WalletError::CannotDeletePrimaryAddress => "CANNOT_DELETE_PRIMARY_ADDRESS",
			WalletError::IllegalViewWalletOperation => "ILLEGAL_VIEW_WALLET_OPERATION",
			WalletError::IllegalNonViewWalletOperation => "ILLEGAL_NON_VIEW_WALLET_OPERATION",
			WalletError::InvalidPassword => "INVALID_PASSWORD",
			WalletError::NotAWalletFile => "NOT_A_WALLET_FILE",
			WalletError::WalletFileCorrupted(_) => "WALLET_FILE_CORRUPTED",
			WalletError::UnsupportedWalletFileFormatVersion(_) => "UNSUPPORTED_WALLET_FILE_FORMAT_VERSION",
			WalletError::EncryptionFailed(_) => "ENCRYPTION_FAILED",
			WalletError::Daemon(_) => "CONNECT_ERROR",
			WalletError::Crypto(_) => "CRYPTO_ERROR",
			WalletError::Io(_) => "IO_ERROR",
		}
	}
}

impl From<AddressError> for WalletError {
	fn from(error: AddressError) -> Self {
		match error {
			AddressError::WrongLength(_) => WalletError::AddressWrongLength,
			AddressError::NotBase58 => WalletError::AddressNotBase58,
			AddressError::WrongPrefix { .. } => WalletError::AddressWrongPrefix,
			AddressError::InvalidChecksum => WalletError::AddressNotValid,
			AddressError::PaymentIdWrongLength(_) => WalletError::PaymentIdWrongLength,
			AddressError::PaymentIdInvalid => WalletError::PaymentIdInvalid,
		}
	}
}

impl From<CryptoError> for WalletError {
	fn from(error: CryptoError) -> Self {
		match error {
			CryptoError::InvalidHex(msg) => WalletError::InvalidKeyFormat(msg),
			CryptoError::InvalidScalar => WalletError::InvalidKeyFormat(error.to_string()),
			other => WalletError::Crypto(other),
		}
	}
}
