use std::{fmt, iter::repeat, str::FromStr};

use log::info;
use subxt::{
    dynamic::{self, Value},
    tx::TxPayload,
};

use crate::{pallets::balances::Transfer, SignedConnectionApi, StatusStream};

/// Which call of the utility pallet wraps the batched calls.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BatchMode {
    /// `batch`: calls are executed until the first failure.
    #[default]
    Batch,
    /// `batch_all`: either all calls succeed or the whole batch is reverted.
    BatchAll,
    /// `force_batch`: every call is executed, failures are skipped.
    ForceBatch,
}

impl BatchMode {
    /// Name of the corresponding call in the utility pallet.
    pub fn call_name(&self) -> &'static str {
        match self {
            BatchMode::Batch => "batch",
            BatchMode::BatchAll => "batch_all",
            BatchMode::ForceBatch => "force_batch",
        }
    }
}

impl FromStr for BatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch" => Ok(BatchMode::Batch),
            "batch-all" | "batch_all" => Ok(BatchMode::BatchAll),
            "force-batch" | "force_batch" => Ok(BatchMode::ForceBatch),
            _ => Err(format!(
                "unknown batch mode `{s}`, expected one of: batch, batch-all, force-batch"
            )),
        }
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.call_name())
    }
}

/// An ordered list of transfers submitted as a single utility batch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferBatch {
    transfers: Vec<Transfer>,
    mode: BatchMode,
}

impl TransferBatch {
    /// Batch of the given transfers.
    pub fn new(transfers: Vec<Transfer>, mode: BatchMode) -> Self {
        TransferBatch { transfers, mode }
    }

    /// Batch of `count` copies of the same transfer.
    pub fn repeated(transfer: Transfer, count: usize, mode: BatchMode) -> Self {
        Self::new(repeat(transfer).take(count).collect(), mode)
    }

    /// Batched transfers, in order of execution.
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Number of batched transfers.
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    /// Whether there are no transfers in the batch.
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Utility call wrapping the transfers.
    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    /// The batched transfers as runtime calls.
    pub fn calls(&self) -> Vec<Value> {
        self.transfers.iter().map(Transfer::call_value).collect()
    }

    /// The whole batch as a runtime call.
    pub fn call_value(&self) -> Value {
        Value::unnamed_variant(
            "Utility",
            [Value::unnamed_variant(
                self.mode.call_name(),
                [Value::unnamed_composite(self.calls())],
            )],
        )
    }

    /// The whole batch as an extrinsic payload.
    pub fn into_payload(self) -> impl TxPayload + Send + Sync {
        dynamic::tx(
            "Utility",
            self.mode.call_name(),
            vec![Value::unnamed_composite(self.calls())],
        )
    }
}

/// Pallet utility api.
#[async_trait::async_trait]
pub trait UtilityApi {
    /// Submits a batch of transfers and returns the stream of its statuses, leaving it up to the
    /// caller how long to follow the batch.
    async fn submit_batch(&self, batch: TransferBatch) -> anyhow::Result<StatusStream>;
}

#[async_trait::async_trait]
impl<S: SignedConnectionApi> UtilityApi for S {
    async fn submit_batch(&self, batch: TransferBatch) -> anyhow::Result<StatusStream> {
        info!(target: "batch-client", "submitting {} of {} calls", batch.mode(), batch.len());

        self.submit_and_watch(batch.into_payload()).await
    }
}
