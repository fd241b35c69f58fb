//! Security token SDK.
//!
//! # Overview
//!
//! Client-side bindings for a permissioned security token contract family:
//! a fungible token with issuance and redemption, a pluggable compliance
//! service and a document registry.
//!
//! A contract is described by its [`schema::Schema`], parsed from a JSON
//! interface document. [`instance::BoundInstance`] pairs a schema with an
//! address and a set of [`transport::Handles`] and dispatches read-only
//! calls, signed transactions and log subscriptions through them, encoding
//! arguments and decoding results with [`codec`].
//!
//! Log subscriptions are consumed as [`stream::EventStream`]s, which deliver
//! decoded events in chain order until the range is exhausted, the source
//! fails or the stream is closed.
//!
//! [`token::SecurityToken`] and [`token::ComplianceService`] wrap bound
//! instances of the bundled [`abi`] documents with typed methods and events.
//!
//! Use [`transport::ProviderTransport`] to talk to a node through an alloy
//! provider.
//!
//! See `./tests` for examples.
//!
//! # Limitations/follow-ups
//!
//! * Logs are polled with `eth_getLogs`, subscriptions over WebSocket are
//!   not used.
//!
//! * Reorged logs are skipped, already delivered events are not retracted.
//!
//! # Testing
//!
//! [`testing`] module provides an in-memory transport with canned results
//! and scripted subscriptions, and a local Anvil node environment.
//!

pub mod abi;
pub mod codec;
pub mod deploy;
pub mod error;
pub mod instance;
pub mod num;
pub mod schema;
pub mod stream;
pub mod testing;
pub mod token;
pub mod transport;
pub mod types;

use alloy::primitives::Address;

pub use error::BindingError;
pub use instance::{BoundInstance, Session};
pub use schema::Schema;
pub use stream::{EventFilter, EventStream};
pub use token::{ComplianceService, SecurityToken};

#[derive(Clone, Debug)]
/// Chain and address a token is deployed at.
pub struct Deployment {
    chain_id: u64,
    token: Address,
    deployed_at_block: u64,
}

impl Deployment {
    pub fn new(chain_id: u64, token: Address, deployed_at_block: u64) -> Self {
        Self {
            chain_id,
            token,
            deployed_at_block,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn token(&self) -> Address {
        self.token
    }

    /// First block worth scanning for token logs.
    pub fn deployed_at_block(&self) -> u64 {
        self.deployed_at_block
    }
}
