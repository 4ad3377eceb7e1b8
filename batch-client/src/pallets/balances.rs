use subxt::{dynamic::Value, ext::scale_value::At};

use crate::{AccountId, Balance, BlockHash, ConnectionApi};

/// Balances call used for transfers unless specified otherwise. It is the current name of the
/// historical `transfer` call, which kills the sender account if it drops below the existential
/// deposit.
pub const DEFAULT_TRANSFER_CALL: &str = "transfer_allow_death";

/// A single `Balances` transfer of `value` to `dest`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transfer {
    /// Receiving account.
    pub dest: AccountId,
    /// Transferred amount.
    pub value: Balance,
    call_name: String,
}

impl Transfer {
    /// Transfer made with [`DEFAULT_TRANSFER_CALL`].
    pub fn new(dest: AccountId, value: Balance) -> Self {
        Self::with_call_name(dest, value, DEFAULT_TRANSFER_CALL)
    }

    /// Transfer made with a given call of the balances pallet, e.g. `transfer_keep_alive`.
    pub fn with_call_name(dest: AccountId, value: Balance, call_name: impl Into<String>) -> Self {
        Transfer {
            dest,
            value,
            call_name: call_name.into(),
        }
    }

    /// Name of the balances pallet call.
    pub fn call_name(&self) -> &str {
        &self.call_name
    }

    /// The transfer as a runtime call, suitable for nesting in other calls like batches.
    pub fn call_value(&self) -> Value {
        Value::unnamed_variant(
            "Balances",
            [Value::unnamed_variant(self.call_name.clone(), self.fields())],
        )
    }

    fn fields(&self) -> Vec<Value> {
        vec![
            Value::unnamed_variant("Id", [Value::from_bytes(self.dest.0)]),
            Value::u128(self.value),
        ]
    }
}

/// Pallet balances read-only api.
#[async_trait::async_trait]
pub trait BalanceApi {
    /// Returns free balance of the account at the given block, 0 for accounts unknown to the chain.
    /// * `account` - account to query
    /// * `at` - optional hash of a block to query state from
    async fn free_balance(&self, account: &AccountId, at: Option<BlockHash>)
        -> anyhow::Result<Balance>;
}

#[async_trait::async_trait]
impl<C: ConnectionApi> BalanceApi for C {
    async fn free_balance(
        &self,
        account: &AccountId,
        at: Option<BlockHash>,
    ) -> anyhow::Result<Balance> {
        let info = self
            .get_storage_value(
                "System",
                "Account",
                vec![Value::from_bytes(account.0)],
                at,
            )
            .await?;

        // Account may have not been initialized yet or reaped due to the lack of funds.
        Ok(info
            .as_ref()
            .at("data")
            .at("free")
            .and_then(|free| free.as_u128())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair_from_string;

    #[test]
    fn transfer_call_is_nested_in_balances() {
        let bob = keypair_from_string("//Bob").account_id().clone();
        let transfer = Transfer::new(bob.clone(), 12345);

        assert_eq!(
            transfer.call_value(),
            Value::unnamed_variant(
                "Balances",
                [Value::unnamed_variant(
                    "transfer_allow_death",
                    [
                        Value::unnamed_variant("Id", [Value::from_bytes(bob.0)]),
                        Value::u128(12345),
                    ]
                )]
            )
        );
    }

    #[test]
    fn call_name_can_be_changed() {
        let bob = keypair_from_string("//Bob").account_id().clone();
        let transfer = Transfer::with_call_name(bob, 1, "transfer_keep_alive");

        assert_eq!(transfer.call_name(), "transfer_keep_alive");
        assert_ne!(transfer.call_value(), Transfer::new(transfer.dest.clone(), 1).call_value());
    }
}
