use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{stream::BoxStream, Stream, StreamExt};
use log::{debug, warn};
use subxt::tx::{TxInBlock, TxProgress, TxStatus as ProgressStatus};
use thiserror::Error;

use crate::{BlockHash, ChainConfig, SubxtClient, TxHash, TxInfo, TxStatus};

/// Progress of a submitted extrinsic, as reported by the node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmissionStatus {
    /// Waiting in the pool for another transaction to be included first.
    Future,
    /// Ready to be included in a block.
    Ready,
    /// Broadcast to the given number of peers.
    Broadcast(usize),
    /// Included in a block of the best chain.
    InBlock(TxInfo),
    /// The block containing the extrinsic is no longer in the best chain.
    Retracted(BlockHash),
    /// The block containing the extrinsic was not finalized in time.
    FinalityTimeout(BlockHash),
    /// Included in a finalized block.
    Finalized(TxInfo),
    /// Replaced by another extrinsic with the same sender and nonce.
    Usurped(TxHash),
    /// Dropped from the pool, e.g. because the pool is full.
    Dropped,
    /// Declared invalid by the node.
    Invalid,
}

impl SubmissionStatus {
    async fn from_progress(
        status: ProgressStatus<ChainConfig, SubxtClient>,
    ) -> anyhow::Result<Self> {
        Ok(match status {
            ProgressStatus::Future => Self::Future,
            ProgressStatus::Ready => Self::Ready,
            ProgressStatus::Broadcast(peers) => Self::Broadcast(peers.len()),
            ProgressStatus::InBlock(in_block) => Self::InBlock(confirm_inclusion(in_block).await?),
            ProgressStatus::Retracted(block) => Self::Retracted(block),
            ProgressStatus::FinalityTimeout(block) => Self::FinalityTimeout(block),
            ProgressStatus::Finalized(in_block) => {
                Self::Finalized(confirm_inclusion(in_block).await?)
            }
            ProgressStatus::Usurped(tx) => Self::Usurped(tx),
            ProgressStatus::Dropped => Self::Dropped,
            ProgressStatus::Invalid => Self::Invalid,
        })
    }

    /// The error this status ends the submission with, if the status is terminal.
    pub fn rejection(&self) -> Option<SubmissionError> {
        match self {
            Self::Dropped => Some(SubmissionError::Dropped),
            Self::Invalid => Some(SubmissionError::Invalid),
            Self::Usurped(tx) => Some(SubmissionError::Usurped(*tx)),
            Self::FinalityTimeout(block) => Some(SubmissionError::FinalityTimeout(*block)),
            _ => None,
        }
    }
}

/// Ways a submission can end without reaching the awaited status.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SubmissionError {
    /// The node dropped the extrinsic from its pool.
    #[error("transaction was dropped from the pool")]
    Dropped,
    /// The node declared the extrinsic invalid.
    #[error("transaction is invalid")]
    Invalid,
    /// Another extrinsic took the place of this one.
    #[error("transaction was usurped by {0:?}")]
    Usurped(TxHash),
    /// The containing block was not finalized in time.
    #[error("finality timed out for block {0:?}")]
    FinalityTimeout(BlockHash),
    /// The batch was included, but one of its calls failed and the rest were skipped.
    #[error("batch included in block {block_hash:?} was interrupted")]
    BatchInterrupted {
        /// Hash of the block containing the batch.
        block_hash: BlockHash,
    },
    /// The node stopped reporting statuses before the awaited one.
    #[error("status stream ended before the transaction reached {0:?}")]
    StreamEnded(TxStatus),
}

/// Stream of [`SubmissionStatus`]es of a single extrinsic.
///
/// The stream can be consumed directly, or through [`StatusStream::wait_for`], which may be
/// called repeatedly, e.g. first for [`TxStatus::InBlock`] and then for [`TxStatus::Finalized`].
pub struct StatusStream {
    tx_hash: TxHash,
    finalized: Option<TxInfo>,
    inner: BoxStream<'static, anyhow::Result<SubmissionStatus>>,
}

impl StatusStream {
    /// Wraps a stream of statuses reported for the extrinsic with hash `tx_hash`.
    pub fn new<S>(tx_hash: TxHash, statuses: S) -> Self
    where
        S: Stream<Item = anyhow::Result<SubmissionStatus>> + Send + 'static,
    {
        StatusStream {
            tx_hash,
            finalized: None,
            inner: statuses.boxed(),
        }
    }

    pub(crate) fn watch(progress: TxProgress<ChainConfig, SubxtClient>) -> Self {
        let tx_hash = progress.extrinsic_hash();
        let statuses = progress.then(|status| async move {
            match status {
                Ok(status) => SubmissionStatus::from_progress(status).await,
                Err(e) => Err(e.into()),
            }
        });

        Self::new(tx_hash, statuses)
    }

    /// Hash of the watched extrinsic.
    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Consumes statuses until the extrinsic reaches `target`.
    ///
    /// A finalized block satisfies [`TxStatus::InBlock`] as well. Terminal statuses
    /// (see [`SubmissionStatus::rejection`]) end waiting with a [`SubmissionError`], and so does
    /// the end of the stream. [`TxStatus::Submitted`] returns right away with a default block
    /// hash.
    pub async fn wait_for(&mut self, target: TxStatus) -> anyhow::Result<TxInfo> {
        match target {
            TxStatus::Submitted => {
                return Ok(TxInfo {
                    block_hash: Default::default(),
                    tx_hash: self.tx_hash,
                })
            }
            TxStatus::InBlock | TxStatus::Finalized => {
                if let Some(info) = self.finalized {
                    return Ok(info);
                }
            }
        }

        while let Some(status) = self.next().await {
            let status = status?;
            debug!(target: "batch-client", "tx {:?} status: {:?}", self.tx_hash, status);

            match status {
                SubmissionStatus::InBlock(info) if target == TxStatus::InBlock => return Ok(info),
                SubmissionStatus::Finalized(info) => {
                    self.finalized = Some(info);
                    return Ok(info);
                }
                SubmissionStatus::Retracted(block) => {
                    warn!(target: "batch-client", "tx {:?} was retracted from block {:?}", self.tx_hash, block)
                }
                status => {
                    if let Some(rejection) = status.rejection() {
                        return Err(rejection.into());
                    }
                }
            }
        }

        Err(SubmissionError::StreamEnded(target).into())
    }
}

impl Stream for StatusStream {
    type Item = anyhow::Result<SubmissionStatus>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

fn is_batch_interrupted(pallet: &str, variant: &str) -> bool {
    pallet == "Utility" && variant == "BatchInterrupted"
}

async fn confirm_inclusion(
    in_block: TxInBlock<ChainConfig, SubxtClient>,
) -> anyhow::Result<TxInfo> {
    let events = in_block.wait_for_success().await?;
    let interrupted = events
        .iter()
        .flatten()
        .any(|event| is_batch_interrupted(event.pallet_name(), event.variant_name()));

    if interrupted {
        let block_hash = events.block_hash();
        warn!(target: "batch-client", "batch {:?} included in block {:?} was interrupted", events.extrinsic_hash(), block_hash);
        return Err(SubmissionError::BatchInterrupted { block_hash }.into());
    }

    Ok(events.into())
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    fn info(block: u8) -> TxInfo {
        TxInfo {
            block_hash: BlockHash::repeat_byte(block),
            tx_hash: TxHash::repeat_byte(0xee),
        }
    }

    fn statuses(statuses: Vec<SubmissionStatus>) -> StatusStream {
        StatusStream::new(
            TxHash::repeat_byte(0xee),
            stream::iter(statuses.into_iter().map(Ok)),
        )
    }

    fn submission_error(result: anyhow::Result<TxInfo>) -> SubmissionError {
        result
            .expect_err("waiting should fail")
            .downcast::<SubmissionError>()
            .expect("error should be a submission error")
    }

    #[tokio::test]
    async fn in_block_does_not_wait_for_finalization() {
        let mut stream = statuses(vec![
            SubmissionStatus::Ready,
            SubmissionStatus::Broadcast(3),
            SubmissionStatus::InBlock(info(1)),
            SubmissionStatus::Finalized(info(1)),
        ]);

        assert_eq!(stream.wait_for(TxStatus::InBlock).await.unwrap(), info(1));
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            SubmissionStatus::Finalized(info(1))
        );
    }

    #[tokio::test]
    async fn finalized_is_awaited_after_in_block() {
        let mut stream = statuses(vec![
            SubmissionStatus::InBlock(info(1)),
            SubmissionStatus::Finalized(info(1)),
        ]);

        assert_eq!(stream.wait_for(TxStatus::InBlock).await.unwrap(), info(1));
        assert_eq!(stream.wait_for(TxStatus::Finalized).await.unwrap(), info(1));
    }

    #[tokio::test]
    async fn finalized_satisfies_in_block() {
        let mut stream = statuses(vec![
            SubmissionStatus::Ready,
            SubmissionStatus::Finalized(info(2)),
        ]);

        assert_eq!(stream.wait_for(TxStatus::InBlock).await.unwrap(), info(2));
        assert_eq!(stream.wait_for(TxStatus::Finalized).await.unwrap(), info(2));
    }

    #[tokio::test]
    async fn retracted_block_is_not_terminal() {
        let mut stream = statuses(vec![
            SubmissionStatus::InBlock(info(1)),
            SubmissionStatus::Retracted(BlockHash::repeat_byte(1)),
            SubmissionStatus::InBlock(info(2)),
            SubmissionStatus::Finalized(info(2)),
        ]);

        assert_eq!(stream.wait_for(TxStatus::Finalized).await.unwrap(), info(2));
    }

    #[tokio::test]
    async fn in_block_after_retraction_resolves() {
        let mut stream = statuses(vec![
            SubmissionStatus::Ready,
            SubmissionStatus::Retracted(BlockHash::repeat_byte(1)),
            SubmissionStatus::InBlock(info(2)),
        ]);

        assert_eq!(stream.wait_for(TxStatus::InBlock).await.unwrap(), info(2));
    }

    #[tokio::test]
    async fn finality_timeout_is_rejected() {
        let mut stream = statuses(vec![
            SubmissionStatus::InBlock(info(1)),
            SubmissionStatus::FinalityTimeout(BlockHash::repeat_byte(1)),
        ]);

        assert_eq!(stream.wait_for(TxStatus::InBlock).await.unwrap(), info(1));
        assert_eq!(
            submission_error(stream.wait_for(TxStatus::Finalized).await),
            SubmissionError::FinalityTimeout(BlockHash::repeat_byte(1))
        );
    }

    #[tokio::test]
    async fn invalid_transaction_is_rejected() {
        let mut stream = statuses(vec![SubmissionStatus::Invalid]);

        assert_eq!(
            submission_error(stream.wait_for(TxStatus::InBlock).await),
            SubmissionError::Invalid
        );
    }

    #[tokio::test]
    async fn dropped_and_usurped_transactions_are_rejected() {
        let mut dropped = statuses(vec![SubmissionStatus::Ready, SubmissionStatus::Dropped]);
        let mut usurped = statuses(vec![SubmissionStatus::Usurped(TxHash::repeat_byte(7))]);

        assert_eq!(
            submission_error(dropped.wait_for(TxStatus::InBlock).await),
            SubmissionError::Dropped
        );
        assert_eq!(
            submission_error(usurped.wait_for(TxStatus::Finalized).await),
            SubmissionError::Usurped(TxHash::repeat_byte(7))
        );
    }

    #[tokio::test]
    async fn ended_stream_is_reported() {
        let mut stream = statuses(vec![SubmissionStatus::Future, SubmissionStatus::Ready]);

        assert_eq!(
            submission_error(stream.wait_for(TxStatus::InBlock).await),
            SubmissionError::StreamEnded(TxStatus::InBlock)
        );
    }

    #[tokio::test]
    async fn stream_errors_are_propagated() {
        let mut stream = StatusStream::new(
            TxHash::zero(),
            stream::iter(vec![
                Ok(SubmissionStatus::Ready),
                Err(anyhow::anyhow!("connection lost")),
            ]),
        );

        let error = stream.wait_for(TxStatus::InBlock).await.unwrap_err();
        assert_eq!(error.to_string(), "connection lost");
    }

    #[tokio::test]
    async fn submitted_returns_tx_hash_right_away() {
        let mut stream = statuses(vec![]);

        let info = stream.wait_for(TxStatus::Submitted).await.unwrap();
        assert_eq!(info.tx_hash, TxHash::repeat_byte(0xee));
        assert_eq!(info.block_hash, BlockHash::default());
    }

    #[test]
    fn only_utility_batch_interrupted_counts() {
        assert!(is_batch_interrupted("Utility", "BatchInterrupted"));
        assert!(!is_batch_interrupted("Utility", "BatchCompleted"));
        assert!(!is_batch_interrupted("Balances", "BatchInterrupted"));
    }
}
