//! Security token CLI.
//!
//! This binary inspects a deployed security token, prints its events and
//! submits transfers.

mod client;
mod config;
mod error;

use alloy::{network::EthereumWallet, primitives::Address, signers::local::PrivateKeySigner};
use clap::Parser;
use sectoken_sdk::{Deployment, abi, schema::Schema};
use std::{process::exit, time::Duration};
use tracing::error;
use url::Url;

use client::TokenClient;
use config::{CliConfig, Command, EnvConfig};
use error::Result;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli_config = CliConfig::parse();

    // Set up logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if cli_config.command.is_offline() {
        if let Err(e) = print_selectors() {
            eprintln!("Failed to load contract schemas: {}", e);
            exit(1);
        }
        return;
    }

    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    // Parse environment configuration
    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };

    // Parse token address
    let token_address: Address = match env_config.token_address() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Invalid token address: {}", e);
            exit(1);
        }
    };

    // Parse private key
    let wallet = match env_config.private_key.as_deref().map(str::parse::<PrivateKeySigner>) {
        Some(Ok(key)) => Some(EthereumWallet::new(key)),
        Some(Err(e)) => {
            eprintln!("Invalid private key: {}", e);
            exit(1);
        }
        None => None,
    };

    // Parse RPC URL
    let node_url = match Url::parse(&env_config.node_rpc_url) {
        Ok(url) => url,
        Err(e) => {
            eprintln!("Invalid RPC URL: {}", e);
            exit(1);
        }
    };

    let deployment = Deployment::new(
        env_config.chain_id,
        token_address,
        env_config.deployed_at_block,
    );

    // Default timeout is 30 seconds
    let timeout = Duration::from_secs(
        cli_config
            .timeout
            .or(env_config.timeout_seconds)
            .unwrap_or(30),
    );

    let client = match TokenClient::try_new(node_url, wallet, deployment, timeout).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            exit(1);
        }
    };

    if let Err(e) = run(&client, cli_config.command).await {
        error!(%e, "Command failed");
        exit(1);
    }
}

async fn run(client: &TokenClient, command: Command) -> Result<()> {
    match command {
        Command::Selectors => print_selectors(),
        Command::Info => client.info().await,
        Command::Balance { owner } => client.balance(owner.parse()?).await,
        Command::Documents => client.documents().await,
        Command::Watch {
            event,
            from_block,
            to_block,
        } => client.watch(&event, from_block, to_block).await,
        Command::Transfer { to, amount } => {
            client
                .transfer(to.parse()?, config::parse_amount(&amount)?)
                .await
        }
    }
}

fn print_selectors() -> Result<()> {
    for (contract, schema) in [
        ("SecurityToken", abi::security_token()?),
        ("ComplianceService", abi::compliance_service()?),
    ] {
        println!("{contract}");
        print_schema(&schema);
        println!();
    }
    Ok(())
}

fn print_schema(schema: &Schema) {
    for method in schema.methods() {
        println!("  {}  {}", method.selector, method.signature);
    }
    for event in schema.events() {
        println!("  {}  {}", event.topic0, event.signature);
    }
    for error in schema.errors() {
        println!("  {}  error {}", error.selector, error.signature);
    }
}
