use std::time::Duration;

use alloy::{
    eips::BlockId,
    primitives::{Address, Bytes, TxKind},
    providers::Provider,
    rpc::types::{Filter, TransactionRequest},
};
use async_trait::async_trait;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use super::{LogSource, Reader, Subscription, TopicFilter, Unsubscribe, Writer};
use crate::{
    error::BindingError,
    types::{LogRange, RawLog, SigContext, TxHandle},
};

const DEFAULT_MAX_BLOCK_RANGE: u64 = 1000;
const DEFAULT_CHANNEL_SIZE: usize = 1024;

/// Transport backed by an alloy [`Provider`].
///
/// Signing is delegated to the provider's wallet filler, so the provider
/// should be built with a wallet to submit transactions.
///
/// Logs are backfilled with `eth_getLogs` in chunks of at most
/// `max_block_range` blocks, then tailed by polling block by block against
/// the chain head with the provider's poll interval. It is recommended to
/// set up the provider with [`alloy::transports::layers::RetryBackoffLayer`],
/// the subscription fails on the first transport error.
#[derive(Clone, Debug)]
pub struct ProviderTransport<P> {
    provider: P,
    max_block_range: u64,
    channel_size: usize,
    default_sender: Option<Address>,
}

impl<P: Provider + Clone + 'static> ProviderTransport<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            channel_size: DEFAULT_CHANNEL_SIZE,
            default_sender: None,
        }
    }

    /// Upper bound of blocks per `eth_getLogs` request during backfill.
    pub fn with_max_block_range(mut self, max_block_range: u64) -> Self {
        self.max_block_range = max_block_range.max(1);
        self
    }

    /// Number of raw logs buffered per subscription.
    pub fn with_channel_size(mut self, channel_size: usize) -> Self {
        self.channel_size = channel_size.max(1);
        self
    }

    /// Sender used when the signing context does not select one.
    pub fn with_default_sender(mut self, sender: Address) -> Self {
        self.default_sender = Some(sender);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn sender(&self, sig: &SigContext) -> Result<Address, BindingError> {
        if let Some(from) = sig.from.or(self.default_sender) {
            return Ok(from);
        }
        self.provider
            .get_accounts()
            .await?
            .first()
            .copied()
            .ok_or_else(|| BindingError::SigRejected("no sender account available".to_string()))
    }

    fn prepare(&self, mut tx: TransactionRequest, sig: &SigContext) -> TransactionRequest {
        if let Some(from) = sig.from.or(self.default_sender) {
            tx.from = Some(from);
        }
        if !sig.value.is_zero() {
            tx.value = Some(sig.value);
        }
        if sig.gas_limit.is_some() {
            tx.gas = sig.gas_limit;
        }
        if sig.nonce.is_some() {
            tx.nonce = sig.nonce;
        }
        tx
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> Reader for ProviderTransport<P> {
    async fn read(
        &self,
        target: Address,
        data: Bytes,
        block: BlockId,
        from: Option<Address>,
    ) -> Result<Bytes, BindingError> {
        let mut tx = TransactionRequest::default().to(target).input(data.into());
        if let Some(from) = from.or(self.default_sender) {
            tx.from = Some(from);
        }
        Ok(self.provider.call(tx).block(block).await?)
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> Writer for ProviderTransport<P> {
    async fn submit(
        &self,
        tx: TransactionRequest,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        let tx = self.prepare(tx, sig);
        let pending = self.provider.send_transaction(tx).await?;
        Ok(TxHandle(*pending.tx_hash()))
    }

    async fn deploy(
        &self,
        code: Bytes,
        sig: &SigContext,
    ) -> Result<(TxHandle, Address), BindingError> {
        let sender = self.sender(sig).await?;
        let nonce = match sig.nonce {
            Some(nonce) => nonce,
            None => self.provider.get_transaction_count(sender).pending().await?,
        };
        let mut tx = self.prepare(TransactionRequest::default().input(code.into()), sig);
        tx.to = Some(TxKind::Create);
        tx.from = Some(sender);
        tx.nonce = Some(nonce);

        let pending = self.provider.send_transaction(tx).await?;
        Ok((TxHandle(*pending.tx_hash()), sender.create(nonce)))
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> LogSource for ProviderTransport<P> {
    async fn subscribe(
        &self,
        range: LogRange,
        address: Address,
        topics: TopicFilter,
    ) -> Result<Subscription, BindingError> {
        let (logs_tx, logs) = mpsc::channel(self.channel_size);
        let (err_tx, errors) = oneshot::channel();
        let poller = LogPoller {
            provider: self.provider.clone(),
            filter: topics.apply(Filter::new().address(address)),
            range,
            max_block_range: self.max_block_range,
            poll_interval: self.provider.client().poll_interval(),
        };
        let task = tokio::spawn(poller.run(logs_tx));
        let abort = task.abort_handle();
        tokio::spawn(supervise(task, err_tx, address));
        Ok(Subscription {
            logs,
            errors,
            unsubscribe: Unsubscribe::new(move || abort.abort()),
        })
    }
}

/// Reports how the poller ended: a failure or a panic as
/// [`BindingError::SubscriptionLost`], completion and abort by dropping `err_tx`.
async fn supervise(
    task: JoinHandle<Result<(), BindingError>>,
    err_tx: oneshot::Sender<BindingError>,
    address: Address,
) {
    let cause = match task.await {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err.to_string(),
        Err(err) if err.is_cancelled() => return,
        Err(err) => format!("log poller panicked: {err}"),
    };
    tracing::warn!(%address, %cause, "log subscription failed");
    _ = err_tx.send(BindingError::SubscriptionLost { cause });
}

struct LogPoller<P> {
    provider: P,
    filter: Filter,
    range: LogRange,
    max_block_range: u64,
    poll_interval: Duration,
}

impl<P: Provider> LogPoller<P> {
    /// Delivers logs until the range is exhausted or the consumer is gone.
    async fn run(self, logs_tx: mpsc::Sender<RawLog>) -> Result<(), BindingError> {
        let last = self.range.to_block.unwrap_or(u64::MAX);
        let mut next = self.range.from_block;
        while next <= last {
            // Some nodes answer with an empty log list instead of an error for
            // blocks not produced yet, so the range is clamped to the chain head.
            let head = self.provider.get_block_number().await?;
            let to = last
                .min(head)
                .min(next.saturating_add(self.max_block_range - 1));
            if to < next {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let filter = self.filter.clone().from_block(next).to_block(to);
            let logs = self.provider.get_logs(&filter).await?;
            tracing::trace!(from = next, to, count = logs.len(), "fetched logs");
            for log in logs {
                if log.removed {
                    continue;
                }
                if logs_tx.send(RawLog::from(log)).await.is_err() {
                    return Ok(());
                }
            }
            match to.checked_add(1) {
                Some(n) => next = n,
                None => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_poller_panic_is_reported() {
        let (err_tx, errors) = oneshot::channel();
        let task: JoinHandle<Result<(), BindingError>> =
            tokio::spawn(async { panic!("node sent garbage") });
        supervise(task, err_tx, Address::ZERO).await;

        match errors.await {
            Ok(BindingError::SubscriptionLost { cause }) => assert!(cause.contains("panicked")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poller_failure_is_reported() {
        let (err_tx, errors) = oneshot::channel();
        let task = tokio::spawn(async { Err(BindingError::transport("connection reset")) });
        supervise(task, err_tx, Address::ZERO).await;

        assert_eq!(
            errors.await.unwrap(),
            BindingError::SubscriptionLost {
                cause: BindingError::transport("connection reset").to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_poller_completion_and_abort_end_cleanly() {
        let (err_tx, errors) = oneshot::channel();
        let task = tokio::spawn(async { Ok(()) });
        supervise(task, err_tx, Address::ZERO).await;
        assert!(errors.await.is_err());

        let (err_tx, errors) = oneshot::channel();
        let task = tokio::spawn(std::future::pending::<Result<(), BindingError>>());
        task.abort();
        supervise(task, err_tx, Address::ZERO).await;
        assert!(errors.await.is_err());
    }
}
