//! Token client executing the CLI commands.

use std::{sync::Arc, time::Duration};

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::Address,
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::client::RpcClient,
};
use fastnum::UD256;
use sectoken_sdk::{
    BindingError, Deployment, SecurityToken,
    num::Converter,
    stream::EventFilter,
    token::TokenEvent,
    transport::{Handles, ProviderTransport},
    types::{CallContext, CancelToken, LogRange, SigContext},
};
use tracing::{debug, info};
use url::Url;

use crate::{
    config::ConfigError,
    error::{Error, Result},
};

/// Security token client.
#[derive(Debug)]
pub struct TokenClient {
    provider: DynProvider,
    token: SecurityToken,
    deployment: Deployment,
    sender: Option<Address>,
    timeout: Duration,
}

impl TokenClient {
    /// Connects to the node and checks it serves the configured chain.
    pub async fn try_new(
        node_url: Url,
        wallet: Option<EthereumWallet>,
        deployment: Deployment,
        timeout: Duration,
    ) -> Result<Self> {
        let rpc_client = RpcClient::new_http(node_url);
        let sender = wallet.as_ref().map(|w| w.default_signer().address());
        let provider = match wallet {
            Some(wallet) => DynProvider::new(
                ProviderBuilder::new()
                    .wallet(wallet)
                    .connect_client(rpc_client),
            ),
            None => DynProvider::new(ProviderBuilder::new().connect_client(rpc_client)),
        };

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(BindingError::from)?;
        if chain_id != deployment.chain_id() {
            return Err(ConfigError::ChainMismatch {
                expected: deployment.chain_id(),
                got: chain_id,
            }
            .into());
        }

        let mut transport = ProviderTransport::new(provider.clone());
        if let Some(sender) = sender {
            transport = transport.with_default_sender(sender);
        }
        let token = SecurityToken::new(
            deployment.token(),
            Handles::full(Arc::new(transport)),
        )?;
        debug!(token = %deployment.token(), chain_id, ?sender, "Connected");

        Ok(Self {
            provider,
            token,
            deployment,
            sender,
            timeout,
        })
    }

    /// Token firing once the configured timeout elapses.
    fn deadline(&self) -> CancelToken {
        let cancel = CancelToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            let timeout = self.timeout;
            async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            }
        });
        cancel
    }

    fn call_context(&self) -> CallContext {
        CallContext::default().with_cancel(self.deadline())
    }

    fn timed_out(&self, err: BindingError) -> Error {
        Error::timed_out(err, self.timeout.as_secs())
    }

    async fn converter(&self, ctx: &CallContext) -> Result<Converter> {
        self.token
            .converter(ctx)
            .await
            .map_err(|e| self.timed_out(e))
    }

    pub async fn info(&self) -> Result<()> {
        let ctx = self.call_context();
        let read = async {
            let name = self.token.name(&ctx).await?;
            let symbol = self.token.symbol(&ctx).await?;
            let decimals = self.token.decimals(&ctx).await?;
            let total_supply = self.token.total_supply(&ctx).await?;
            let issuable = self.token.is_issuable(&ctx).await?;
            let service = self.token.compliance_service(&ctx).await?;
            let version = self.token.compliance_service_version(&ctx).await?;
            Ok::<_, BindingError>((name, symbol, decimals, total_supply, issuable, service, version))
        };
        let (name, symbol, decimals, total_supply, issuable, service, version) =
            read.await.map_err(|e| self.timed_out(e))?;
        let total_supply: UD256 = Converter::new(decimals).from_unsigned(total_supply)?;

        println!("token:              {}", self.deployment.token());
        println!("name:               {name}");
        println!("symbol:             {symbol}");
        println!("decimals:           {decimals}");
        println!("total supply:       {total_supply}");
        println!("issuable:           {issuable}");
        println!("compliance service: {service} (version {version})");
        Ok(())
    }

    pub async fn balance(&self, owner: Address) -> Result<()> {
        let ctx = self.call_context();
        let converter = self.converter(&ctx).await?;
        let raw = self
            .token
            .balance_of(owner, &ctx)
            .await
            .map_err(|e| self.timed_out(e))?;
        let balance: UD256 = converter.from_unsigned(raw)?;
        println!("{owner}: {balance}");
        Ok(())
    }

    pub async fn documents(&self) -> Result<()> {
        let ctx = self.call_context();
        let names = self
            .token
            .get_all_documents(&ctx)
            .await
            .map_err(|e| self.timed_out(e))?;
        if names.is_empty() {
            println!("no documents");
        }
        for name in names {
            let doc = self
                .token
                .get_document(name, &ctx)
                .await
                .map_err(|e| self.timed_out(e))?;
            println!(
                "{}  {}  hash={}  modified={}",
                doc.name, doc.uri, doc.document_hash, doc.last_modified
            );
        }
        Ok(())
    }

    /// Prints events until the range is exhausted or the timeout fires.
    pub async fn watch(
        &self,
        event: &str,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> Result<()> {
        let from_block = from_block.unwrap_or(self.deployment.deployed_at_block());
        let range = LogRange {
            from_block,
            to_block,
        };
        info!(event, from_block, ?to_block, "Watching token events");

        let mut stream = self
            .token
            .instance()
            .watch::<TokenEvent>(event, &EventFilter::new(), range)
            .await?;
        let deadline = self.deadline();
        let handle = stream.handle();
        tokio::spawn(async move {
            deadline.cancelled().await;
            handle.close();
        });

        let mut count = 0usize;
        while let Some(event) = stream.next().await? {
            count += 1;
            info!(
                block = ?event.block_number(),
                log_index = ?event.log_index(),
                tx_hash = ?event.tx_hash(),
                event = ?event.record(),
                "Event"
            );
        }
        info!(count, "Stream ended");
        Ok(())
    }

    /// Transfers `amount` token units and waits for the receipt.
    pub async fn transfer(&self, to: Address, amount: UD256) -> Result<()> {
        let from = self.sender.ok_or(ConfigError::MissingPrivateKey)?;
        let ctx = self.call_context();
        let converter = self.converter(&ctx).await?;
        let value = converter.to_unsigned(amount)?;

        let sig = SigContext::default()
            .from(from)
            .with_cancel(self.deadline());
        let handle = self
            .token
            .transfer(to, value, &sig)
            .await
            .map_err(|e| self.timed_out(e))?;
        info!(%from, %to, %amount, tx_hash = %handle.tx_hash(), "Transfer submitted");

        let receipt = PendingTransactionBuilder::<Ethereum>::new(
            self.provider.root().clone(),
            handle.tx_hash(),
        )
        .with_timeout(Some(self.timeout))
        .get_receipt()
        .await?;
        info!(
            block = ?receipt.block_number,
            success = receipt.status(),
            "Transfer mined"
        );
        Ok(())
    }
}
