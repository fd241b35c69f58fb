use alloy::{
    primitives::{Address, B256, BlockHash, Bytes, TxHash},
    rpc::types::Log,
};

use crate::{
    codec::{FromValue, Value},
    error::BindingError,
};

/// Log record as delivered by the log source, kept verbatim
/// alongside every decoded event.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub block_hash: Option<BlockHash>,
    pub log_index: Option<u64>,
    pub tx_hash: Option<TxHash>,
    pub tx_index: Option<u64>,
}

impl RawLog {
    pub fn new(address: Address, topics: Vec<B256>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
            ..Default::default()
        }
    }

    pub fn at(mut self, block_number: u64, log_index: u64) -> Self {
        self.block_number = Some(block_number);
        self.log_index = Some(log_index);
        self
    }

    pub fn in_tx(mut self, tx_hash: TxHash, tx_index: u64) -> Self {
        self.tx_hash = Some(tx_hash);
        self.tx_index = Some(tx_index);
        self
    }

    /// Position of the log in chain history, if known.
    pub fn position(&self) -> Option<(u64, u64)> {
        Some((self.block_number?, self.log_index?))
    }
}

impl From<Log> for RawLog {
    fn from(log: Log) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number,
            block_hash: log.block_hash,
            log_index: log.log_index,
            tx_hash: log.transaction_hash,
            tx_index: log.transaction_index,
        }
    }
}

/// Decoded event fields in declaration order.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self(fields)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Converts the field `name` into a native type.
    pub fn decode<T: FromValue>(&self, name: &str) -> Result<T, BindingError> {
        self.get(name)
            .ok_or_else(|| BindingError::TypeMismatch(format!("missing field `{name}`")))?
            .to()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Decoded event along with the raw log it was decoded from.
#[derive(Clone, Debug, PartialEq)]
pub struct Event<T> {
    pub(crate) record: T,
    pub(crate) raw: RawLog,
}

impl<T> Event<T> {
    pub(crate) fn new(record: T, raw: RawLog) -> Self {
        Self { record, raw }
    }

    pub fn record(&self) -> &T {
        &self.record
    }

    pub fn into_record(self) -> T {
        self.record
    }

    pub fn raw(&self) -> &RawLog {
        &self.raw
    }

    pub fn block_number(&self) -> Option<u64> {
        self.raw.block_number
    }

    pub fn log_index(&self) -> Option<u64> {
        self.raw.log_index
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        self.raw.tx_hash
    }
}
