use cryptonote_wallet_sync::config::Config;
use cryptonote_wallet_sync::crypto::CryptoProvider;
use cryptonote_wallet_sync::daemon::{Daemon, HttpDaemon, InMemoryDaemon, Recipient, build_transaction};
use cryptonote_wallet_sync::utils::pretty_print_amount;
use cryptonote_wallet_sync::wallet::{WalletBackend, WalletError};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Scripted chain used when no daemon is configured.
fn demo_daemon() -> Arc<InMemoryDaemon> {
	let daemon = Arc::new(InMemoryDaemon::new("127.0.0.1", 11898));
	daemon.push_empty_blocks(20);
	daemon
}

fn fund_demo_wallet(config: &Config, daemon: &InMemoryDaemon, wallet: &WalletBackend) -> Result<(), WalletError> {
	let crypto: &dyn CryptoProvider = config.crypto.as_ref();
	let (spend, view) = wallet.get_primary_address_private_keys()?;
	let recipient = Recipient {
		public_spend_key: crypto.secret_key_to_public_key(&spend)?,
		public_view_key: crypto.secret_key_to_public_key(&view)?,
		amount: 12345607,
	};
	daemon.push_block(vec![build_transaction(crypto, &[recipient], &[], "")?]);
	daemon.push_empty_blocks(config.maturity_window);
	Ok(())
}

async fn open_or_create(
	config: &Config,
	daemon: Arc<dyn Daemon>,
	path: Option<&PathBuf>,
	password: &str,
) -> Result<WalletBackend, WalletError> {
	match path {
		Some(path) if path.exists() => {
			info!("Opening wallet {:?}", path);
			WalletBackend::open_from_file(config.clone(), daemon, path, password).await
		}
		_ => WalletBackend::create(config.clone(), daemon),
	}
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.init();

	let config = Config::default();
	let wallet_path = std::env::var("WALLET_FILE").ok().map(PathBuf::from);
	let password = std::env::var("WALLET_PASSWORD").unwrap_or_default();

	let mut demo = None;
	let daemon: Arc<dyn Daemon> = match std::env::var("WALLET_DAEMON_HOST") {
		Ok(host) => {
			let port = std::env::var("WALLET_DAEMON_PORT")
				.ok()
				.and_then(|port| port.parse().ok())
				.unwrap_or(11898);
			match HttpDaemon::with_timeout(host, port, config.daemon_request_timeout) {
				Ok(daemon) => Arc::new(daemon),
				Err(e) => {
					error!("Failed to create daemon client: {}", e);
					return;
				}
			}
		}
		Err(_) => {
			info!("WALLET_DAEMON_HOST is not set, scanning a scripted chain");
			let daemon = demo_daemon();
			demo = Some(daemon.clone());
			daemon
		}
	};

	let wallet = match open_or_create(&config, daemon, wallet_path.as_ref(), &password).await {
		Ok(wallet) => wallet,
		Err(e) => {
			error!("Failed to open wallet: {} ({})", e, e.code());
			return;
		}
	};

	match wallet.get_primary_address() {
		Ok(address) => info!("Primary address: {}", address),
		Err(e) => warn!("Failed to encode primary address: {}", e),
	}

	if let Some(daemon) = &demo {
		// scripted blocks predate the wallet's creation time
		wallet.reset(0, 0).await;
		if let Err(e) = fund_demo_wallet(&config, daemon, &wallet) {
			error!("Failed to script demo transaction: {}", e);
			return;
		}
	}

	if let Err(e) = wallet.sync_to_latest().await {
		error!("Failed to sync wallet: {}", e);
		return;
	}

	let balance = wallet.get_balance();
	info!(
		"Balance: {} unlocked, {} locked, {} transactions",
		pretty_print_amount(balance.unlocked as i64, config.decimal_places, &config.ticker),
		pretty_print_amount(balance.locked as i64, config.decimal_places, &config.ticker),
		wallet.get_num_transactions()
	);

	if let Some(path) = &wallet_path {
		if let Err(e) = wallet.save_wallet_to_file(path, &password).await {
			error!("Failed to save wallet: {}", e);
		}
	}
}
