use std::{sync::Arc, time::Duration};

use alloy::{
    network::Ethereum,
    node_bindings::{Anvil, AnvilInstance},
    primitives::{Address, B256, U256, hex},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::client::RpcClient,
};

use crate::{
    codec::Value,
    deploy,
    instance::BoundInstance,
    schema::Schema,
    transport::{Handles, ProviderTransport},
    types::{SigContext, TxHandle},
};

const CHAIN_ID: u64 = 1337;
const POLL_INTERVAL_MS: u64 = 50;

/// Creation code of a contract emitting `LOG3` with the first three
/// calldata words (after the selector) as topics and the rest as data.
const LOG_EMITTER_CODE: [u8; 34] =
    hex!("601780600b6000396000f3604435602435600435606436038060646000376000a300");

const LOG_EMITTER_SCHEMA: &str = r#"[{"type":"function","name":"emit","stateMutability":"nonpayable",
    "inputs":[{"name":"topic0","type":"bytes32"},{"name":"topic1","type":"bytes32"},
    {"name":"topic2","type":"bytes32"},{"name":"value","type":"uint256"}],"outputs":[]}]"#;

/// Anvil node with a provider transport signing with its first account.
#[derive(Debug)]
pub struct TestNode {
    pub chain_id: u64,
    pub provider: DynProvider,
    pub transport: Arc<ProviderTransport<DynProvider>>,
    pub sender: Address,
    anvil: AnvilInstance,
}

/// Contract emitting arbitrary three-topic logs.
#[derive(Debug)]
pub struct LogEmitter {
    pub instance: BoundInstance,
}

impl TestNode {
    pub async fn new() -> Self {
        let anvil = Anvil::new().chain_id(CHAIN_ID).try_spawn().unwrap();
        let client = RpcClient::builder().http(anvil.endpoint_url());
        client.set_poll_interval(Duration::from_millis(POLL_INTERVAL_MS));
        let provider = DynProvider::new(
            ProviderBuilder::new()
                .wallet(anvil.wallet().unwrap())
                .connect_client(client),
        );
        let sender = anvil.addresses()[0];
        let transport = Arc::new(
            ProviderTransport::new(provider.clone())
                .with_max_block_range(4)
                .with_default_sender(sender),
        );
        Self {
            chain_id: CHAIN_ID,
            provider,
            transport,
            sender,
            anvil,
        }
    }

    pub fn rpc_url(&self) -> String {
        self.anvil.endpoint()
    }

    pub fn handles(&self) -> Handles {
        Handles::full(self.transport.clone())
    }

    pub async fn block_number(&self) -> u64 {
        self.provider.get_block_number().await.unwrap()
    }

    /// Waits for the transaction to be mined, returns its block.
    pub async fn mined(&self, handle: TxHandle) -> u64 {
        PendingTransactionBuilder::<Ethereum>::new(self.provider.root().clone(), handle.tx_hash())
            .get_receipt()
            .await
            .unwrap()
            .block_number
            .unwrap()
    }

    pub async fn deploy_log_emitter(&self) -> LogEmitter {
        let schema = Arc::new(Schema::parse(LOG_EMITTER_SCHEMA).unwrap());
        let (instance, handle) = deploy::deploy(
            schema,
            &LOG_EMITTER_CODE,
            &[],
            &SigContext::default(),
            self.handles(),
        )
        .await
        .unwrap();
        self.mined(handle).await;
        LogEmitter { instance }
    }
}

impl LogEmitter {
    pub fn address(&self) -> Address {
        self.instance.address()
    }

    /// Emits a log with `topics` and the `value` word as data.
    pub async fn emit(&self, topics: [B256; 3], value: U256) -> TxHandle {
        let args: Vec<Value> = topics
            .into_iter()
            .map(Value::from)
            .chain([value.into()])
            .collect();
        self.instance
            .transact("emit", &args, &SigContext::default())
            .await
            .unwrap()
    }
}
