//! Testing environments and utilities.
//!
//! [`MockTransport`] serves canned read results, records submitted
//! transactions and hands out scripted log subscriptions, so every
//! operation of a bound instance can be driven without a node.
//!
//! [`TestNode`] spins up an Anvil instance and binds a [`crate::transport::ProviderTransport`]
//! to it. [`TestNode::deploy_log_emitter`] deploys a minimal contract that
//! emits whatever topics and value it is called with, which is enough to
//! exercise log backfill and tailing against a real node.
//!

mod node;

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use alloy::{
    eips::BlockId,
    primitives::{Address, Bytes, Selector, TxHash, U256, address, keccak256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};

use crate::{
    codec::{self, Value},
    error::BindingError,
    schema::MethodSpec,
    transport::{Handles, LogSource, Reader, Subscription, TopicFilter, Unsubscribe, Writer},
    types::{LogRange, RawLog, SigContext, TxHandle},
};

pub use node::{LogEmitter, TestNode};

/// Sender of mock transactions when the signing context selects none.
pub const DEFAULT_SENDER: Address = address!("0x5e00000000000000000000000000000000000001");

/// Canned outcome of a read.
#[derive(Clone, Debug)]
pub enum MockRead {
    Return(Bytes),
    Revert(Bytes),
    Fail(String),
    /// Never answers, for cancellation.
    Hang,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRead {
    pub target: Address,
    pub data: Bytes,
    pub block: BlockId,
    pub from: Option<Address>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedTx {
    pub hash: TxHash,
    pub nonce: u64,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub from: Address,
}

#[derive(Clone, Debug)]
pub struct RecordedSubscription {
    pub range: LogRange,
    pub address: Address,
    pub topics: TopicFilter,
    released: Arc<AtomicUsize>,
}

impl RecordedSubscription {
    /// Number of times the subscription was released.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// Log source side of a scripted subscription.
#[derive(Debug)]
pub struct MockSubscription {
    logs: mpsc::Sender<RawLog>,
    errors: oneshot::Sender<BindingError>,
}

impl MockSubscription {
    /// Delivers a log, returns `false` once the consumer is gone.
    pub async fn send(&self, log: RawLog) -> bool {
        self.logs.send(log).await.is_ok()
    }

    /// Ends the subscription cleanly.
    pub fn complete(self) {}

    /// Ends the subscription with `err`.
    pub fn fail(self, err: BindingError) {
        _ = self.errors.send(err);
    }
}

struct Scripted {
    logs: mpsc::Receiver<RawLog>,
    errors: oneshot::Receiver<BindingError>,
}

/// In-memory transport implementing all capabilities.
#[derive(Default, derive_more::Debug)]
pub struct MockTransport {
    reads: DashMap<Selector, MockRead>,
    read_log: Mutex<Vec<RecordedRead>>,
    submitted: Mutex<Vec<RecordedTx>>,
    reject_signatures: AtomicBool,
    hang_writes: AtomicBool,
    nonce: AtomicU64,
    #[debug(skip)]
    scripted: Mutex<VecDeque<Scripted>>,
    subscriptions: Mutex<Vec<RecordedSubscription>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Handles serving every capability from `transport`.
    pub fn handles(self: &Arc<Self>) -> Handles {
        Handles::full(self.clone())
    }

    /// Answers reads of `selector` with `outcome`.
    pub fn on_call(&self, selector: Selector, outcome: MockRead) {
        self.reads.insert(selector, outcome);
    }

    /// Answers reads of `method` with the encoding of `outputs`.
    pub fn returns(&self, method: &MethodSpec, outputs: &[Value]) -> Result<(), BindingError> {
        let data = codec::encode(&method.outputs, outputs)?;
        self.on_call(method.selector, MockRead::Return(data.into()));
        Ok(())
    }

    pub fn reads(&self) -> Vec<RecordedRead> {
        lock(&self.read_log).clone()
    }

    pub fn submitted(&self) -> Vec<RecordedTx> {
        lock(&self.submitted).clone()
    }

    /// Makes the signer decline every subsequent transaction.
    pub fn reject_signatures(&self, reject: bool) {
        self.reject_signatures.store(reject, Ordering::SeqCst);
    }

    /// Makes every subsequent transaction hang, for cancellation.
    pub fn hang_writes(&self, hang: bool) {
        self.hang_writes.store(hang, Ordering::SeqCst);
    }

    /// Queues a subscription for the next [`LogSource::subscribe`] call
    /// and returns its source side.
    pub fn script_subscription(&self, capacity: usize) -> MockSubscription {
        let (logs_tx, logs) = mpsc::channel(capacity.max(1));
        let (err_tx, errors) = oneshot::channel();
        lock(&self.scripted).push_back(Scripted { logs, errors });
        MockSubscription {
            logs: logs_tx,
            errors: err_tx,
        }
    }

    /// Queues a subscription delivering `logs` and completing.
    pub fn script_logs(&self, logs: Vec<RawLog>) {
        let sub = self.script_subscription(logs.len());
        for log in logs {
            // Capacity covers all logs.
            _ = sub.logs.try_send(log);
        }
        sub.complete();
    }

    pub fn subscriptions(&self) -> Vec<RecordedSubscription> {
        lock(&self.subscriptions).clone()
    }

    async fn sign(
        &self,
        tx: TransactionRequest,
        sig: &SigContext,
    ) -> Result<RecordedTx, BindingError> {
        if self.hang_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.reject_signatures.load(Ordering::SeqCst) {
            return Err(BindingError::SigRejected("declined by signer".to_string()));
        }
        let nonce = sig
            .nonce
            .unwrap_or_else(|| self.nonce.fetch_add(1, Ordering::SeqCst));
        Ok(RecordedTx {
            hash: keccak256(nonce.to_be_bytes()),
            nonce,
            to: tx.to.and_then(|to| to.to().copied()),
            data: tx.input.input().cloned().unwrap_or_default(),
            value: sig.value,
            from: sig.from.unwrap_or(DEFAULT_SENDER),
        })
    }
}

#[async_trait]
impl Reader for MockTransport {
    async fn read(
        &self,
        target: Address,
        data: Bytes,
        block: BlockId,
        from: Option<Address>,
    ) -> Result<Bytes, BindingError> {
        lock(&self.read_log).push(RecordedRead {
            target,
            data: data.clone(),
            block,
            from,
        });
        let selector = data
            .get(..4)
            .map(Selector::from_slice)
            .ok_or_else(|| BindingError::transport("call data without selector"))?;
        let outcome = self.reads.get(&selector).map(|r| r.value().clone());
        match outcome {
            Some(MockRead::Return(data)) => Ok(data),
            Some(MockRead::Revert(data)) => Err(BindingError::ContractReverted { data }),
            Some(MockRead::Fail(cause)) => Err(BindingError::TransportFailure { cause }),
            Some(MockRead::Hang) => std::future::pending().await,
            None => Err(BindingError::transport(format!(
                "no canned result for selector {selector}"
            ))),
        }
    }
}

#[async_trait]
impl Writer for MockTransport {
    async fn submit(
        &self,
        tx: TransactionRequest,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        let recorded = self.sign(tx, sig).await?;
        let hash = recorded.hash;
        lock(&self.submitted).push(recorded);
        Ok(TxHandle(hash))
    }

    async fn deploy(
        &self,
        code: Bytes,
        sig: &SigContext,
    ) -> Result<(TxHandle, Address), BindingError> {
        let tx = TransactionRequest::default().input(code.into());
        let recorded = self.sign(tx, sig).await?;
        let address = recorded.from.create(recorded.nonce);
        let hash = recorded.hash;
        lock(&self.submitted).push(recorded);
        Ok((TxHandle(hash), address))
    }
}

#[async_trait]
impl LogSource for MockTransport {
    async fn subscribe(
        &self,
        range: LogRange,
        address: Address,
        topics: TopicFilter,
    ) -> Result<Subscription, BindingError> {
        let scripted = lock(&self.scripted)
            .pop_front()
            .ok_or_else(|| BindingError::transport("no scripted subscription"))?;
        let released = Arc::new(AtomicUsize::new(0));
        lock(&self.subscriptions).push(RecordedSubscription {
            range,
            address,
            topics,
            released: released.clone(),
        });
        Ok(Subscription {
            logs: scripted.logs,
            errors: scripted.errors,
            unsubscribe: Unsubscribe::new(move || {
                released.fetch_add(1, Ordering::SeqCst);
            }),
        })
    }
}
