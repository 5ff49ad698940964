//! Canonical JSON form of a wallet.
//!
//! Field order follows struct declaration order and the output is indented with four spaces, so
//! parsing a canonical string and serializing it again yields the same bytes.

use crate::crypto::SecretKey;
use crate::wallet::WalletError;
use crate::wallet::state::WalletState;
use crate::wallet::subwallets::SubWallets;
use crate::wallet::sync::SynchronizationStatus;

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

pub const WALLET_FILE_FORMAT_VERSION: u32 = 0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletFile {
    pub wallet_file_format_version: u32,
    pub sub_wallets: SubWallets,
    pub wallet_synchronizer: SynchronizerFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynchronizerFile {
    pub start_timestamp: u64,
    pub start_height: u64,
    pub private_view_key: SecretKey,
    pub transaction_synchronizer_status: SynchronizationStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionProbe {
    wallet_file_format_version: u32,
}

impl WalletFile {
    pub fn from_state(state: &WalletState) -> Self {
        Self {
            wallet_file_format_version: WALLET_FILE_FORMAT_VERSION,
            sub_wallets: state.sub_wallets.clone(),
            wallet_synchronizer: SynchronizerFile {
                start_timestamp: state.start_timestamp,
                start_height: state.start_height,
                private_view_key: *state.sub_wallets.private_view_key(),
                transaction_synchronizer_status: state.sync_status.clone(),
            },
        }
    }

    pub fn into_state(self) -> Result<WalletState, WalletError> {
        self.sub_wallets.validate()?;
        if &self.wallet_synchronizer.private_view_key != self.sub_wallets.private_view_key() {
            return Err(WalletError::WalletFileCorrupted(
                "synchronizer and subwallets disagree on the private view key".to_string(),
            ));
        }

        Ok(WalletState {
            sub_wallets: self.sub_wallets,
            sync_status: self.wallet_synchronizer.transaction_synchronizer_status,
            start_timestamp: self.wallet_synchronizer.start_timestamp,
            start_height: self.wallet_synchronizer.start_height,
            epoch: 0,
        })
    }
}

pub fn to_canonical_string(state: &WalletState) -> Result<String, WalletError> {
    let file = WalletFile::from_state(state);
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    file.serialize(&mut serializer)
        .map_err(|e| WalletError::WalletFileCorrupted(e.to_string()))?;
    String::from_utf8(out).map_err(|e| WalletError::WalletFileCorrupted(e.to_string()))
}

pub fn from_canonical_str(json: &str) -> Result<WalletState, WalletError> {
    let probe: VersionProbe =
        serde_json::from_str(json).map_err(|e| WalletError::WalletFileCorrupted(e.to_string()))?;
    if probe.wallet_file_format_version != WALLET_FILE_FORMAT_VERSION {
        return Err(WalletError::UnsupportedWalletFileFormatVersion(
            probe.wallet_file_format_version,
        ));
    }

    let file: WalletFile =
        serde_json::from_str(json).map_err(|e| WalletError::WalletFileCorrupted(e.to_string()))?;
    file.into_state()
}
