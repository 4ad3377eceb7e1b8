use std::str::FromStr;

use batch_client::{pallets::utility::BatchMode, Balance, TxStatus};
use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[clap(version = "1.0")]
pub struct Config {
    /// WS endpoint address of the node to connect to
    #[clap(long, default_value = "ws://127.0.0.1:9944")]
    pub node: String,

    /// Seed of the account which signs and pays for the batch
    #[clap(long, default_value = "//Alice")]
    pub sender_seed: String,

    /// Receiver of every transfer: either a seed (e.g. `//Bob`) or an SS58 address
    #[clap(long, default_value = "//Bob")]
    pub recipient: String,

    /// Amount sent by each of the transfers
    #[clap(long, default_value = "12345")]
    pub amount: Balance,

    /// How many identical transfers to put into the batch
    #[clap(long, default_value = "100", parse(try_from_str = parse_batch_size))]
    pub batch_size: usize,

    /// Utility call wrapping the transfers: `batch`, `batch-all` or `force-batch`
    #[clap(long, default_value = "batch")]
    pub batch_mode: BatchMode,

    /// Balances call used for each transfer, e.g. `transfer_keep_alive`
    #[clap(long, default_value = "transfer_allow_death")]
    pub transfer_call: String,

    /// Status of the batch to wait for before exiting: `in-block` or `finalized`
    #[clap(long, default_value = "in-block")]
    pub wait_for: WaitFor,

    /// How many more times to try connecting to the node, a second apart, before giving up
    #[clap(long, default_value = "10")]
    pub connection_retries: u32,
}

/// Last status the sender follows the batch to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WaitFor {
    InBlock,
    Finalized,
}

impl FromStr for WaitFor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-block" | "in_block" => Ok(WaitFor::InBlock),
            "finalized" => Ok(WaitFor::Finalized),
            _ => Err(format!(
                "unknown status `{s}`, expected `in-block` or `finalized`"
            )),
        }
    }
}

impl From<WaitFor> for TxStatus {
    fn from(wait_for: WaitFor) -> Self {
        match wait_for {
            WaitFor::InBlock => TxStatus::InBlock,
            WaitFor::Finalized => TxStatus::Finalized,
        }
    }
}

fn parse_batch_size(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err(String::from("batch has to contain at least one transfer")),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        Config::try_parse_from(std::iter::once("batch-sender").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_describe_the_dev_chain_batch() {
        let config = parse(&[]).expect("defaults should parse");

        assert_eq!(config.node, "ws://127.0.0.1:9944");
        assert_eq!(config.sender_seed, "//Alice");
        assert_eq!(config.recipient, "//Bob");
        assert_eq!(config.amount, 12345);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.batch_mode, BatchMode::Batch);
        assert_eq!(config.transfer_call, "transfer_allow_death");
        assert_eq!(config.wait_for, WaitFor::InBlock);
        assert_eq!(config.connection_retries, 10);
    }

    #[test]
    fn options_override_defaults() {
        let config = parse(&[
            "--node",
            "wss://ws.example.net:443",
            "--recipient",
            "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty",
            "--amount",
            "1000000000000",
            "--batch-size",
            "7",
            "--batch-mode",
            "batch-all",
            "--wait-for",
            "finalized",
        ])
        .expect("options should parse");

        assert_eq!(config.node, "wss://ws.example.net:443");
        assert_eq!(
            config.recipient,
            "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty"
        );
        assert_eq!(config.amount, 1_000_000_000_000);
        assert_eq!(config.batch_size, 7);
        assert_eq!(config.batch_mode, BatchMode::BatchAll);
        assert_eq!(TxStatus::from(config.wait_for), TxStatus::Finalized);
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(parse(&["--batch-size", "0"]).is_err());
    }

    #[test]
    fn unknown_statuses_and_modes_are_rejected() {
        assert!(parse(&["--wait-for", "ready"]).is_err());
        assert!(parse(&["--batch-mode", "sequential"]).is_err());
    }
}
