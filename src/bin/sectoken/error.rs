//! Error types for the security token CLI.

use sectoken_sdk::error::BindingError;

use crate::config::ConfigError;

/// Main error type for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Environment configuration error: {0}")]
    EnvConfig(#[from] envy::Error),

    #[error("Alloy signer error: {0}")]
    AlloySigner(#[from] alloy::signers::local::LocalSignerError),

    #[error("Alloy pending transaction error: {0}")]
    AlloyPendingTransaction(#[from] alloy::providers::PendingTransactionError),

    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(#[from] url::ParseError),

    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] alloy::primitives::hex::FromHexError),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}

impl Error {
    /// Maps cancellation by the timeout token to [`Error::Timeout`].
    pub fn timed_out(err: BindingError, seconds: u64) -> Self {
        match err {
            BindingError::Cancelled => Self::Timeout(seconds),
            err => Self::Binding(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
