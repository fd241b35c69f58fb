mod cancel;
mod event;

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    primitives::{Address, TxHash, U256},
};

pub use cancel::CancelToken;
pub(crate) use cancel::with_cancel;
pub use event::*;

/// Handle of a submitted transaction, as issued by the write transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxHandle(pub TxHash);

impl TxHandle {
    pub fn tx_hash(&self) -> TxHash {
        self.0
    }
}

/// Options of a read-only call.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    /// Caller address the call is simulated from.
    pub from: Option<Address>,

    /// Block the call is executed at (default: latest).
    pub block: Option<BlockId>,

    /// Token abandoning the outstanding request once fired.
    pub cancel: Option<CancelToken>,
}

impl CallContext {
    pub fn at_block(mut self, block: BlockId) -> Self {
        self.block = Some(block);
        self
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn block_id(&self) -> BlockId {
        self.block
            .unwrap_or(BlockId::Number(BlockNumberOrTag::Latest))
    }
}

/// Transaction-signing context, opaque to the core and interpreted
/// by the write transport.
#[derive(Clone, Debug, Default)]
pub struct SigContext {
    /// Sender, selects the signer (default: transport's default sender).
    pub from: Option<Address>,

    /// Native value attached to the transaction.
    pub value: U256,

    pub gas_limit: Option<u64>,

    pub nonce: Option<u64>,

    /// Token abandoning the outstanding request once fired.
    pub cancel: Option<CancelToken>,
}

impl SigContext {
    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Block range of a log subscription, bounds are inclusive.
/// Open end means live tailing after the backfill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LogRange {
    pub from_block: u64,
    pub to_block: Option<u64>,
}

impl LogRange {
    pub fn historical(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block: Some(to_block),
        }
    }

    pub fn live(from_block: u64) -> Self {
        Self {
            from_block,
            to_block: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.to_block.is_none()
    }
}
