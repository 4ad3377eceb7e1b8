#![warn(missing_docs)]
//! API for submitting batched balance transfers to a Substrate chain.
//!
//! [`Connection`] talks to a node, [`SignedConnection`] additionally signs and submits
//! extrinsics. Pallet-specific calls live in [`pallets`], and every submission reports its
//! progress through a [`StatusStream`].

use std::str::FromStr;

use anyhow::anyhow;
use subxt::{
    ext::sp_core::{sr25519, Pair},
    tx::PairSigner,
    OnlineClient, PolkadotConfig,
};

pub use crate::{
    connections::{
        AsConnection, AsSigned, Connection, ConnectionApi, SignedConnection, SignedConnectionApi,
        TxInfo,
    },
    status::{StatusStream, SubmissionError, SubmissionStatus},
};
pub use subxt::ext::sp_core;

mod connections;
/// Any pallet-specific API.
pub mod pallets;
mod status;

/// Chain configuration the client is built for.
pub type ChainConfig = PolkadotConfig;
/// An alias for an account id type.
pub type AccountId = subxt::utils::AccountId32;
/// An alias for a balance type.
pub type Balance = u128;
/// An alias for a hash type.
pub type BlockHash = subxt::utils::H256;
/// An alias for a transaction hash type.
pub type TxHash = subxt::utils::H256;
/// An alias for a client type.
pub type SubxtClient = OnlineClient<ChainConfig>;
/// An alias for the raw sr25519 key pair.
pub type RawKeyPair = sr25519::Pair;

/// A [`RawKeyPair`] able to sign extrinsics for [`ChainConfig`].
pub struct KeyPair {
    inner: PairSigner<ChainConfig, RawKeyPair>,
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        KeyPair::new(self.signer().clone())
    }
}

impl KeyPair {
    /// Constructs a new KeyPair from a [`RawKeyPair`].
    pub fn new(keypair: RawKeyPair) -> Self {
        KeyPair {
            inner: PairSigner::new(keypair),
        }
    }

    /// Returns a reference to the inner [`RawKeyPair`].
    pub fn signer(&self) -> &RawKeyPair {
        self.inner.signer()
    }

    /// Returns corresponding [`AccountId`].
    pub fn account_id(&self) -> &AccountId {
        self.inner.account_id()
    }
}

/// When submitting a transaction, wait for given status before proceeding.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TxStatus {
    /// A tx must be included in some block.
    InBlock,
    /// A tx must be included in some finalized block.
    Finalized,
    /// A tx must be successfully submitted.
    Submitted,
}

/// Derives a [`KeyPair`] from a seed string, e.g. `//Alice`, a mnemonic or a raw hex seed.
pub fn try_keypair_from_string(seed: &str) -> anyhow::Result<KeyPair> {
    let pair = sr25519::Pair::from_string(seed, None)
        .map_err(|e| anyhow!("Can't create pair from seed value: {:?}", e))?;

    Ok(KeyPair::new(pair))
}

/// `panic`able version of [`try_keypair_from_string`].
pub fn keypair_from_string(seed: &str) -> KeyPair {
    try_keypair_from_string(seed).expect("Can't create pair from seed value")
}

/// Reads an account either as an SS58 address or as a seed string the account is derived from.
pub fn account_from_seed_or_address(value: &str) -> anyhow::Result<AccountId> {
    match AccountId::from_str(value) {
        Ok(account) => Ok(account),
        Err(_) => try_keypair_from_string(value).map(|keypair| keypair.account_id().clone()),
    }
}

/// Full, `0x`-prefixed hex representation of a hash.
pub fn hash_to_hex(hash: &BlockHash) -> String {
    format!("0x{}", hex::encode(hash.as_bytes()))
}
