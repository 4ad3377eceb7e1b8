mod config;

use std::env;

use anyhow::Result;
use batch_client::{
    account_from_seed_or_address, hash_to_hex,
    pallets::{
        balances::Transfer,
        utility::{TransferBatch, UtilityApi},
    },
    try_keypair_from_string, Connection, SignedConnection, SignedConnectionApi, TxStatus,
};
use clap::Parser;
use log::info;

use crate::config::{Config, WaitFor};

#[tokio::main]
async fn main() -> Result<()> {
    init_env();

    let config = Config::parse();
    info!("Starting batch sender with config {:#?}", &config);

    let Config {
        node,
        sender_seed,
        recipient,
        amount,
        batch_size,
        batch_mode,
        transfer_call,
        wait_for,
        connection_retries,
    } = config;

    // fail fast on malformed seeds, before touching the network
    let sender = try_keypair_from_string(&sender_seed)?;
    let recipient = account_from_seed_or_address(&recipient)?;

    let connection = Connection::try_new_with_retries(&node, connection_retries).await?;
    let connection = SignedConnection::from_connection(connection, sender);

    let transfer = Transfer::with_call_name(recipient, amount, transfer_call);
    let batch = TransferBatch::repeated(transfer, batch_size, batch_mode);
    info!(
        "Sending a batch of {} transfers of {} from {}",
        batch.len(),
        amount,
        connection.account_id()
    );

    let mut statuses = connection.submit_batch(batch).await?;
    info!("Batch submitted with tx hash {}", hash_to_hex(&statuses.tx_hash()));

    let included = statuses.wait_for(TxStatus::InBlock).await?;
    println!("included in {}", hash_to_hex(&included.block_hash));

    if wait_for == WaitFor::Finalized {
        let finalized = statuses.wait_for(wait_for.into()).await?;
        info!("finalized in {}", hash_to_hex(&finalized.block_hash));
    }

    Ok(())
}

fn init_env() {
    if env::var(env_logger::DEFAULT_FILTER_ENV).is_err() {
        env::set_var(env_logger::DEFAULT_FILTER_ENV, "warn");
    }
    env_logger::init();
}
