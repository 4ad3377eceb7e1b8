use std::time::Duration;

use anyhow::anyhow;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use subxt::{
    blocks::ExtrinsicEvents,
    config::Hasher,
    dynamic::{self, DecodedValue, Value},
    rpc::types::ChainBlockExtrinsic,
    tx::TxPayload,
    Config,
};

use crate::{
    status::StatusStream, AccountId, BlockHash, ChainConfig, KeyPair, SubxtClient, TxHash,
};

/// Capable of communicating with a live chain.
#[derive(Clone)]
pub struct Connection {
    client: SubxtClient,
}

/// Any connection that is signed by some key.
#[derive(Clone)]
pub struct SignedConnection {
    connection: Connection,
    signer: KeyPair,
}

/// Castability to a plain connection.
pub trait AsConnection {
    /// Allows cast to [`Connection`] reference
    fn as_connection(&self) -> &Connection;
}

/// Castability to a signed connection.
pub trait AsSigned {
    /// Allows cast to [`SignedConnection`] reference
    fn as_signed(&self) -> &SignedConnection;
}

/// Any connection should be able to request storage and inspect blocks.
#[async_trait::async_trait]
pub trait ConnectionApi: Sync {
    /// Retrieves a decoded storage value stored under given key, or `None` if there is no value.
    /// * `pallet` - name of the pallet owning the storage item, e.g. `System`
    /// * `entry` - name of the storage item, e.g. `Account`
    /// * `keys` - keys of a storage map, empty for plain storage values
    /// * `at` - optional block hash to query state from, the best block by default
    ///
    /// # Examples
    /// ```ignore
    ///     let account = Value::from_bytes(&account_id);
    ///     get_storage_value("System", "Account", vec![account], None).await
    /// ```
    async fn get_storage_value(
        &self,
        pallet: &str,
        entry: &str,
        keys: Vec<Value>,
        at: Option<BlockHash>,
    ) -> anyhow::Result<Option<DecodedValue>>;

    /// Checks whether block `block` contains an extrinsic with hash `tx`.
    async fn block_contains_extrinsic(&self, block: BlockHash, tx: TxHash) -> anyhow::Result<bool>;

    /// Returns the hash of the parent of block `block`.
    async fn parent_hash(&self, block: BlockHash) -> anyhow::Result<BlockHash>;

    /// Returns the hash of the genesis block of the chain.
    fn genesis_hash(&self) -> BlockHash;
}

/// Data regarding submitted transaction.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct TxInfo {
    /// Hash of the block containing tx.
    pub block_hash: BlockHash,
    /// Hash of the transaction itself.
    pub tx_hash: TxHash,
}

impl From<ExtrinsicEvents<ChainConfig>> for TxInfo {
    fn from(ee: ExtrinsicEvents<ChainConfig>) -> Self {
        Self {
            block_hash: ee.block_hash(),
            tx_hash: ee.extrinsic_hash(),
        }
    }
}

/// Signed connection should be able to send transactions to chain
#[async_trait::async_trait]
pub trait SignedConnectionApi: ConnectionApi {
    /// Signs and submits a transaction, returning the stream of its statuses.
    /// * `tx` - encoded transaction payload
    /// # Returns
    /// A [`StatusStream`] which yields every status the node reports for the transaction.
    async fn submit_and_watch<Call: TxPayload + Send + Sync>(
        &self,
        tx: Call,
    ) -> anyhow::Result<StatusStream>;

    /// Returns account id which signs this connection
    fn account_id(&self) -> &AccountId;

    /// Returns a [`KeyPair`] which signs this connection
    fn signer(&self) -> &KeyPair;
}

impl AsConnection for Connection {
    fn as_connection(&self) -> &Connection {
        self
    }
}

impl<S: AsSigned> AsConnection for S {
    fn as_connection(&self) -> &Connection {
        &self.as_signed().connection
    }
}

impl AsSigned for SignedConnection {
    fn as_signed(&self) -> &SignedConnection {
        self
    }
}

#[async_trait::async_trait]
impl<C: AsConnection + Sync> ConnectionApi for C {
    async fn get_storage_value(
        &self,
        pallet: &str,
        entry: &str,
        keys: Vec<Value>,
        at: Option<BlockHash>,
    ) -> anyhow::Result<Option<DecodedValue>> {
        info!(target: "batch-client", "accessing storage at {}::{} at block {:?}", pallet, entry, at);
        let address = dynamic::storage(pallet, entry, keys);
        let storage = match at {
            Some(block) => self.as_connection().as_client().storage().at(block),
            None => self.as_connection().as_client().storage().at_latest().await?,
        };

        match storage.fetch(&address).await? {
            Some(thunk) => Ok(Some(thunk.to_value()?)),
            None => Ok(None),
        }
    }

    async fn block_contains_extrinsic(&self, block: BlockHash, tx: TxHash) -> anyhow::Result<bool> {
        let block = self
            .as_connection()
            .as_client()
            .rpc()
            .block(Some(block))
            .await?
            .ok_or_else(|| anyhow!("Failed to fetch block {:?}.", block))?;

        Ok(block
            .block
            .extrinsics
            .iter()
            .any(|extrinsic| is_extrinsic(extrinsic, tx)))
    }

    async fn parent_hash(&self, block: BlockHash) -> anyhow::Result<BlockHash> {
        self.as_connection()
            .as_client()
            .rpc()
            .header(Some(block))
            .await?
            .map(|header| header.parent_hash)
            .ok_or_else(|| anyhow!("Failed to fetch header of block {:?}.", block))
    }

    fn genesis_hash(&self) -> BlockHash {
        self.as_connection().as_client().genesis_hash()
    }
}

#[async_trait::async_trait]
impl<S: AsSigned + Sync> SignedConnectionApi for S {
    async fn submit_and_watch<Call: TxPayload + Send + Sync>(
        &self,
        tx: Call,
    ) -> anyhow::Result<StatusStream> {
        match tx.validation_details() {
            Some(details) => {
                info!(target: "batch-client", "Sending extrinsic {}.{}", details.pallet_name, details.call_name)
            }
            None => info!(target: "batch-client", "Sending extrinsic signed by {}", self.account_id()),
        }

        let progress = self
            .as_connection()
            .as_client()
            .tx()
            .sign_and_submit_then_watch_default(&tx, &self.as_signed().signer().inner)
            .await
            .map_err(|e| anyhow!("Failed to submit transaction: {:?}", e))?;

        Ok(StatusStream::watch(progress))
    }

    fn account_id(&self) -> &AccountId {
        self.as_signed().signer().account_id()
    }

    fn signer(&self) -> &KeyPair {
        &self.as_signed().signer
    }
}

impl Connection {
    const DEFAULT_RETRIES: u32 = 10;
    const RETRY_WAIT_SECS: u64 = 1;

    /// Creates new connection from a given url.
    /// By default, it tries to connect 10 times, waiting 1 second between each unsuccessful attempt.
    /// * `address` - address in websocket format, e.g. `ws://127.0.0.1:9944`
    ///
    /// # Panic
    /// Panics when no attempt succeeds, see [`Connection::try_new_with_retries`] for a fallible
    /// version.
    pub async fn new(address: &str) -> Connection {
        Self::try_new_with_retries(address, Self::DEFAULT_RETRIES)
            .await
            .expect("Connection should be created")
    }

    /// Creates new connection from a given url and given number of connection attempts.
    /// Returns the error of the last attempt if none of them succeeds.
    /// * `address` - address in websocket format, e.g. `ws://127.0.0.1:9944`; `ws://` is assumed
    /// when no protocol is given
    /// * `retries` - number of connection attempts made after the first one fails
    pub async fn try_new_with_retries(address: &str, mut retries: u32) -> anyhow::Result<Connection> {
        let address = ensure_protocol(address);
        loop {
            let client = SubxtClient::from_url(&address).await;
            match (retries, client) {
                (_, Ok(client)) => return Ok(Connection { client }),
                (0, Err(e)) => {
                    return Err(anyhow!("Failed to connect to {}: {:?}", address, e));
                }
                (_, Err(e)) => {
                    warn!(target: "batch-client",
                        "Can't connect to {} because {:?}, will try again in {}s",
                        address, e, Self::RETRY_WAIT_SECS);
                    tokio::time::sleep(Duration::from_secs(Self::RETRY_WAIT_SECS)).await;
                    retries -= 1;
                }
            }
        }
    }

    /// Casts self to the underlying RPC client.
    pub fn as_client(&self) -> &SubxtClient {
        &self.client
    }
}

impl SignedConnection {
    /// Creates new signed connection from a given url.
    /// * `address` - address in websocket format, e.g. `ws://127.0.0.1:9944`
    /// * `signer` - a [`KeyPair`] of signing account
    pub async fn new(address: &str, signer: KeyPair) -> Self {
        Self::from_connection(Connection::new(address).await, signer)
    }

    /// Creates new signed connection from existing [`Connection`] object.
    /// * `connection` - existing connection
    /// * `signer` - a [`KeyPair`] of signing account
    pub fn from_connection(connection: Connection, signer: KeyPair) -> Self {
        Self { connection, signer }
    }
}

/// The node serves extrinsics without their length prefix, while transaction hashes are taken
/// over the prefixed encoding.
fn is_extrinsic(extrinsic: &ChainBlockExtrinsic, tx: TxHash) -> bool {
    <ChainConfig as Config>::Hasher::hash_of(&extrinsic.0) == tx
}

enum Protocol {
    Ws,
    Wss,
}

impl Protocol {
    fn prefix(&self) -> &'static str {
        match self {
            Protocol::Ws => "ws://",
            Protocol::Wss => "wss://",
        }
    }
}

/// Unless `address` already contains protocol, we prepend to it `ws://`.
fn ensure_protocol(address: &str) -> String {
    if address.starts_with(Protocol::Ws.prefix()) || address.starts_with(Protocol::Wss.prefix()) {
        return address.to_string();
    }
    format!("{}{}", Protocol::Ws.prefix(), address)
}
