//! Transport capabilities consumed by a bound instance.
//!
//! The core never talks to a node directly. It reads through a [`Reader`],
//! submits transactions through a [`Writer`] and subscribes to contract logs
//! through a [`LogSource`]. Implementations must be safe for concurrent use,
//! every operation of a bound instance issues its own transport request.
//!
//! [`ProviderTransport`] implements all three capabilities on top of an
//! alloy [`alloy::providers::Provider`], see [`crate::testing::MockTransport`]
//! for the in-memory one.

mod provider;

use std::{fmt, sync::Arc};

use alloy::{
    eips::BlockId,
    primitives::{Address, B256, Bytes},
    rpc::types::{Filter, TransactionRequest},
};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::{
    error::{BindingError, Capability},
    types::{LogRange, RawLog, SigContext, TxHandle},
};

pub use provider::ProviderTransport;

/// Read primitive: executes a call without changing the state.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Executes `data` against `target` at the given block and returns the
    /// raw result, or [`BindingError::ContractReverted`] with the revert payload.
    async fn read(
        &self,
        target: Address,
        data: Bytes,
        block: BlockId,
        from: Option<Address>,
    ) -> Result<Bytes, BindingError>;
}

/// Write primitive: signs and submits transactions.
#[async_trait]
pub trait Writer: Send + Sync {
    /// Signs `tx` by the signing context and submits it.
    async fn submit(&self, tx: TransactionRequest, sig: &SigContext)
    -> Result<TxHandle, BindingError>;

    /// Submits a contract-creation transaction carrying `code` and returns its
    /// handle with the address the contract is created at.
    async fn deploy(
        &self,
        code: Bytes,
        sig: &SigContext,
    ) -> Result<(TxHandle, Address), BindingError>;
}

/// Log primitive: backfills and tails contract logs.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Subscribes to logs of `address` matching `topics` in `range`.
    ///
    /// Logs are delivered block-ascending, and log-index-ascending within a block.
    /// Historical ranges complete once the last block is delivered, open ranges
    /// keep tailing the chain until unsubscribed or failed.
    async fn subscribe(
        &self,
        range: LogRange,
        address: Address,
        topics: TopicFilter,
    ) -> Result<Subscription, BindingError>;
}

/// Raw log subscription handed out by a [`LogSource`].
///
/// The log source drops the error sender without sending on clean completion,
/// sends the cause on failure.
#[derive(Debug)]
pub struct Subscription {
    pub logs: mpsc::Receiver<RawLog>,
    pub errors: oneshot::Receiver<BindingError>,
    pub unsubscribe: Unsubscribe,
}

/// Releases the transport resources of a subscription.
pub struct Unsubscribe(Box<dyn FnOnce() + Send>);

impl Unsubscribe {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn call(self) {
        (self.0)()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unsubscribe")
    }
}

/// Constraint on a single topic position.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum TopicSlot {
    #[default]
    Any,
    /// Matches any of the values.
    OneOf(Vec<B256>),
}

impl TopicSlot {
    pub fn matches(&self, topic: Option<&B256>) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(values) => topic.is_some_and(|t| values.contains(t)),
        }
    }
}

/// Positional topic filter, at most 4 slots.
///
/// For non-anonymous events slot 0 holds the event topic, the following slots
/// correspond to the indexed fields in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TopicFilter(Vec<TopicSlot>);

impl TopicFilter {
    pub const MAX_SLOTS: usize = 4;

    pub fn new(slots: Vec<TopicSlot>) -> Result<Self, BindingError> {
        if slots.len() > Self::MAX_SLOTS {
            return Err(BindingError::TypeMismatch(format!(
                "topic filter has {} slots, at most {} allowed",
                slots.len(),
                Self::MAX_SLOTS
            )));
        }
        Ok(Self(slots))
    }

    pub fn slots(&self) -> &[TopicSlot] {
        &self.0
    }

    pub fn matches(&self, topics: &[B256]) -> bool {
        self.0
            .iter()
            .enumerate()
            .all(|(i, slot)| slot.matches(topics.get(i)))
    }

    /// Applies the filter to the topic positions of a node log filter.
    pub fn apply(&self, mut filter: Filter) -> Filter {
        for (i, slot) in self.0.iter().enumerate() {
            if let TopicSlot::OneOf(values) = slot {
                filter.topics[i] = values.clone().into();
            }
        }
        filter
    }
}

/// Transport handles of a bound instance, any of them may be absent.
#[derive(Clone, Default, derive_more::Debug)]
pub struct Handles {
    #[debug("{}", reader.is_some())]
    pub reader: Option<Arc<dyn Reader>>,
    #[debug("{}", writer.is_some())]
    pub writer: Option<Arc<dyn Writer>>,
    #[debug("{}", logs.is_some())]
    pub logs: Option<Arc<dyn LogSource>>,
}

impl Handles {
    /// All capabilities served by one transport.
    pub fn full<T: Reader + Writer + LogSource + 'static>(transport: Arc<T>) -> Self {
        Self {
            reader: Some(transport.clone()),
            writer: Some(transport.clone()),
            logs: Some(transport),
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn Reader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn Writer>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn with_logs(mut self, logs: Arc<dyn LogSource>) -> Self {
        self.logs = Some(logs);
        self
    }

    pub(crate) fn reader(&self) -> Result<&Arc<dyn Reader>, BindingError> {
        self.reader
            .as_ref()
            .ok_or(BindingError::CapabilityMissing(Capability::Read))
    }

    pub(crate) fn writer(&self) -> Result<&Arc<dyn Writer>, BindingError> {
        self.writer
            .as_ref()
            .ok_or(BindingError::CapabilityMissing(Capability::Write))
    }

    pub(crate) fn logs(&self) -> Result<&Arc<dyn LogSource>, BindingError> {
        self.logs
            .as_ref()
            .ok_or(BindingError::CapabilityMissing(Capability::Logs))
    }
}

#[cfg(test)]
mod tests {
    use alloy::rpc::types::{FilterSet, Topic};

    use super::*;

    #[test]
    fn test_topic_filter_matching() {
        let filter = TopicFilter::new(vec![
            TopicSlot::OneOf(vec![B256::repeat_byte(1)]),
            TopicSlot::Any,
            TopicSlot::OneOf(vec![B256::repeat_byte(3), B256::repeat_byte(4)]),
        ])
        .unwrap();
        assert!(filter.matches(&[B256::repeat_byte(1), B256::ZERO, B256::repeat_byte(4)]));
        assert!(!filter.matches(&[B256::repeat_byte(1), B256::ZERO, B256::repeat_byte(5)]));
        assert!(!filter.matches(&[B256::repeat_byte(1), B256::ZERO]));
        assert!(TopicFilter::default().matches(&[]));
    }

    #[test]
    fn test_topic_filter_limit() {
        assert!(TopicFilter::new(vec![TopicSlot::Any; 5]).is_err());
    }

    #[test]
    fn test_apply_to_node_filter() {
        let filter = TopicFilter::new(vec![
            TopicSlot::OneOf(vec![B256::repeat_byte(1)]),
            TopicSlot::Any,
            TopicSlot::OneOf(vec![B256::repeat_byte(3)]),
        ])
        .unwrap()
        .apply(Filter::new().address(Address::ZERO));
        assert_eq!(filter.topics[0], Topic::from(vec![B256::repeat_byte(1)]));
        assert_eq!(filter.topics[1], FilterSet::default());
        assert_eq!(filter.topics[2], Topic::from(vec![B256::repeat_byte(3)]));
    }

    #[test]
    fn test_missing_capabilities() {
        let handles = Handles::default();
        assert_eq!(
            handles.reader().err(),
            Some(BindingError::CapabilityMissing(Capability::Read))
        );
        assert_eq!(
            handles.logs().err(),
            Some(BindingError::CapabilityMissing(Capability::Logs))
        );
    }
}
