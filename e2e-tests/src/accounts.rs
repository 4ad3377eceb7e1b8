use batch_client::{keypair_from_string, AccountId, KeyPair};
use rand::Rng;

use crate::config::Config;

pub fn sender_keys(config: &Config) -> KeyPair {
    keypair_from_string(&config.sender_seed)
}

pub fn recipient_account(config: &Config) -> AccountId {
    keypair_from_string(&config.recipient_seed)
        .account_id()
        .clone()
}

/// Derives a test account based on a randomized string. The chain has never seen it, so it holds
/// no funds.
pub fn random_account() -> KeyPair {
    keypair_from_string(&format!(
        "//TestAccount/{}",
        rand::thread_rng().gen::<u128>()
    ))
}
