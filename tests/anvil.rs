use alloy::primitives::{Address, B256, U256, address};
use sectoken_sdk::{
    BoundInstance, SecurityToken,
    codec::Value,
    error::BindingError,
    stream::EventFilter,
    testing::{LogEmitter, TestNode},
    token::{self, Transfer},
    types::{CallContext, LogRange},
};

const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");
const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

/// Binds the token schema to the emitter, so its logs decode as token events.
fn token_at(node: &TestNode, emitter: &LogEmitter) -> SecurityToken {
    SecurityToken::from_instance(BoundInstance::new(
        emitter.address(),
        token::schema().unwrap(),
        node.handles(),
    ))
}

async fn emit_transfer(node: &TestNode, emitter: &LogEmitter, from: Address, value: u64) -> u64 {
    let topic0 = token::schema().unwrap().event("Transfer").unwrap().topic0;
    let handle = emitter
        .emit([topic0, from.into_word(), BOB.into_word()], U256::from(value))
        .await;
    node.mined(handle).await
}

/// Backfills logs spanning several `eth_getLogs` chunks.
#[tokio::test]
#[ignore = "requires anvil"]
async fn test_backfill_in_chunks() {
    let node = TestNode::new().await;
    let emitter = node.deploy_log_emitter().await;
    let token = token_at(&node, &emitter);

    let first = emit_transfer(&node, &emitter, ALICE, 0).await;
    let mut last = first;
    for value in 1..6 {
        last = emit_transfer(&node, &emitter, ALICE, value).await;
    }
    assert!(last - first >= 5);

    let events = token
        .instance()
        .filter_historical::<Transfer>("Transfer", &EventFilter::new(), first, last)
        .await
        .unwrap();
    let values: Vec<_> = events.iter().map(|e| e.record().value).collect();
    assert_eq!(values, (0..6).map(U256::from).collect::<Vec<_>>());
    assert!(events.iter().all(|e| e.record().from == ALICE));
    assert!(events.windows(2).all(|w| w[0].block_number() < w[1].block_number()));
}

/// Filters by an indexed field, then tails new blocks.
#[tokio::test]
#[ignore = "requires anvil"]
async fn test_filter_and_tail() {
    let node = TestNode::new().await;
    let emitter = node.deploy_log_emitter().await;
    let token = token_at(&node, &emitter);
    let from_block = node.block_number().await;

    emit_transfer(&node, &emitter, ALICE, 1).await;
    emit_transfer(&node, &emitter, BOB, 2).await;

    let mut stream = token
        .watch::<Transfer>(&EventFilter::new().eq("from", BOB), LogRange::live(from_block))
        .await
        .unwrap();
    let event = stream.next().await.unwrap().unwrap();
    assert_eq!(event.record().value, U256::from(2));

    emit_transfer(&node, &emitter, ALICE, 3).await;
    let block = emit_transfer(&node, &emitter, BOB, 4).await;
    let event = stream.next().await.unwrap().unwrap();
    assert_eq!(event.record().value, U256::from(4));
    assert_eq!(event.block_number(), Some(block));

    stream.close();
    assert!(stream.next().await.unwrap().is_none());
}

/// Reads through the provider transport.
#[tokio::test]
#[ignore = "requires anvil"]
async fn test_provider_reads() {
    let node = TestNode::new().await;
    let emitter = node.deploy_log_emitter().await;

    // The emitter returns no data, which decodes as an empty tuple.
    let args: [Value; 4] = [
        B256::ZERO.into(),
        B256::ZERO.into(),
        B256::ZERO.into(),
        U256::ZERO.into(),
    ];
    assert_eq!(
        emitter
            .instance
            .call("emit", &args, &CallContext::default())
            .await
            .unwrap(),
        vec![]
    );

    // No contract at the address: the empty result does not decode.
    let token = SecurityToken::new(ALICE, node.handles()).unwrap();
    assert!(matches!(
        token.balance_of(BOB, &CallContext::default()).await,
        Err(BindingError::CodecMalformed(_))
    ));
}
