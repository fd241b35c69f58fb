//! Configuration for the security token CLI.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): connection details, keys
//! - CLI arguments: the action to perform

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use fastnum::{UD256, decimal::Context};

/// Environment configuration (connection details, credentials).
#[derive(Debug, serde::Deserialize)]
pub struct EnvConfig {
    /// Chain ID the token is deployed on
    pub chain_id: u64,

    /// Security token contract address
    pub token_address: String,

    /// Block number when the token was deployed
    #[serde(default)]
    pub deployed_at_block: u64,

    /// RPC URL for the node
    pub node_rpc_url: String,

    /// Private key for signing transactions, required by `transfer`
    pub private_key: Option<String>,

    /// Optional timeout for operations (default: 30s)
    pub timeout_seconds: Option<u64>,
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Parse the token address.
    pub fn token_address(&self) -> Result<Address, alloy::primitives::hex::FromHexError> {
        self.token_address.parse()
    }
}

/// CLI arguments.
#[derive(Debug, Parser)]
#[command(name = "sectoken")]
#[command(about = "Inspect and operate a security token")]
pub struct CliConfig {
    /// Abandon the operation after this many seconds
    /// (overrides TIMEOUT_SECONDS)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print selectors and topics of the contract family, works offline
    Selectors,

    /// Print token metadata and compliance service
    Info,

    /// Print balance of an account
    Balance {
        /// Account address
        owner: String,
    },

    /// List documents of the registry
    Documents,

    /// Print token events, backfilling from the deployment block
    Watch {
        /// Event name, e.g. "Transfer"
        #[arg(long, default_value = "Transfer")]
        event: String,

        /// First block (default: DEPLOYED_AT_BLOCK)
        #[arg(long)]
        from_block: Option<u64>,

        /// Last block, tails the chain when not set
        #[arg(long)]
        to_block: Option<u64>,
    },

    /// Transfer tokens signed with PRIVATE_KEY
    Transfer {
        /// Recipient address
        to: String,

        /// Amount in token units, e.g. "12.5"
        amount: String,
    },
}

impl Command {
    /// Whether the command needs no node connection.
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Selectors)
    }
}

/// Parses a decimal token amount.
pub fn parse_amount(amount: &str) -> Result<UD256, ConfigError> {
    UD256::from_str(amount, Context::default())
        .map_err(|_| ConfigError::InvalidAmount(amount.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("PRIVATE_KEY is required to sign transactions")]
    MissingPrivateKey,

    #[error("Node is on chain {got}, expected {expected}")]
    ChainMismatch { expected: u64, got: u64 },
}
