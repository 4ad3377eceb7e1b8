use std::env;

use batch_client::{Connection, SignedConnection};
use clap::Parser;
use once_cell::sync::Lazy;

use crate::accounts::{recipient_account, sender_keys};

static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(|| {
    let unparsed = env::var("E2E_CONFIG").unwrap_or_default();
    let unparsed = format!("e2e {unparsed}");
    Config::parse_from(unparsed.split_whitespace())
});

pub fn setup_test() -> &'static Config {
    let _ = env_logger::builder().is_test(true).try_init();
    &GLOBAL_CONFIG
}

#[derive(Debug, Parser, Clone)]
#[clap(version = "1.0")]
pub struct Config {
    /// WS endpoint address of the node to connect to
    #[clap(long, default_value = "ws://127.0.0.1:9944")]
    pub node: String,

    /// Seed value of the account funding the batches
    #[clap(long, default_value = "//Alice")]
    pub sender_seed: String,

    /// Seed value of the account receiving the transfers
    #[clap(long, default_value = "//Bob")]
    pub recipient_seed: String,

    /// Number of transfers in a batch
    #[clap(long, default_value = "100")]
    pub batch_size: usize,

    /// Amount sent by a single transfer
    #[clap(long, default_value = "12345")]
    pub amount: u128,
}

impl Config {
    pub async fn create_connection(&self) -> Connection {
        Connection::new(&self.node).await
    }

    /// Get a `SignedConnection` where the signer is the sender account.
    pub async fn create_sender_connection(&self) -> SignedConnection {
        SignedConnection::new(&self.node, sender_keys(self)).await
    }

    pub fn recipient(&self) -> batch_client::AccountId {
        recipient_account(self)
    }
}
