use std::{sync::Arc, time::Duration};

use alloy::primitives::{Address, Bytes, U256, address};
use futures::StreamExt;
use sectoken_sdk::{
    EventStream, SecurityToken,
    codec,
    error::BindingError,
    stream::EventFilter,
    testing::MockTransport,
    token::Transfer,
    types::{Fields, LogRange, RawLog},
};
use tokio_test::assert_ok;

const TOKEN: Address = address!("0x7070000000000000000000000000000000000007");
const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");
const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

fn setup() -> (Arc<MockTransport>, SecurityToken) {
    let mock = MockTransport::new();
    let token = SecurityToken::new(TOKEN, mock.handles()).unwrap();
    (mock, token)
}

fn transfer_log(token: &SecurityToken, block: u64, index: u64, value: u64) -> RawLog {
    let event = token.instance().schema().event("Transfer").unwrap();
    let (topics, data) =
        codec::encode_log(event, &[ALICE.into(), BOB.into(), U256::from(value).into()]).unwrap();
    RawLog::new(TOKEN, topics, data).at(block, index)
}

async fn watch(token: &SecurityToken, range: LogRange) -> EventStream<Transfer> {
    token.watch(&EventFilter::new(), range).await.unwrap()
}

fn lost() -> BindingError {
    BindingError::SubscriptionLost {
        cause: "node went away".to_string(),
    }
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (mock, token) = setup();
    let _source = mock.script_subscription(4);
    let stream = watch(&token, LogRange::live(0)).await;

    stream.close();
    stream.close();
    assert!(stream.is_closed());
    assert_eq!(mock.subscriptions()[0].released(), 1);

    drop(stream);
    assert_eq!(mock.subscriptions()[0].released(), 1);
}

#[tokio::test]
async fn test_next_after_close() {
    let (mock, token) = setup();
    let source = mock.script_subscription(4);
    let mut stream = watch(&token, LogRange::live(0)).await;
    assert!(source.send(transfer_log(&token, 1, 0, 1)).await);

    stream.close();
    assert!(assert_ok!(stream.next().await).is_none());
    assert!(assert_ok!(stream.next().await).is_none());
    assert_eq!(stream.restart().await, Err(BindingError::Cancelled));
}

#[tokio::test]
async fn test_drains_buffered_logs_after_completion() {
    let (mock, token) = setup();
    let source = mock.script_subscription(4);
    let mut stream = watch(&token, LogRange::historical(0, 10)).await;

    for (block, value) in [(1, 10), (2, 20), (2, 30)] {
        assert!(source.send(transfer_log(&token, block, value, value)).await);
    }
    source.complete();

    let mut values = vec![];
    while let Some(event) = stream.next().await.unwrap() {
        values.push(event.record().value);
    }
    assert_eq!(values, vec![U256::from(10), U256::from(20), U256::from(30)]);
    assert!(stream.next().await.unwrap().is_none());
    assert_eq!(stream.error(), None);
    assert_eq!(mock.subscriptions()[0].released(), 1);
}

#[tokio::test]
async fn test_error_is_latched() {
    let (mock, token) = setup();
    let source = mock.script_subscription(4);
    let mut stream = watch(&token, LogRange::live(0)).await;

    assert!(source.send(transfer_log(&token, 1, 0, 5)).await);
    let event = stream.next().await.unwrap().unwrap();
    assert_eq!(event.record().value, U256::from(5));

    source.fail(lost());
    assert_eq!(stream.next().await.unwrap_err(), lost());
    assert_eq!(stream.next().await.unwrap_err(), lost());
    assert_eq!(stream.error(), Some(&lost()));
    assert_eq!(mock.subscriptions()[0].released(), 1);
}

#[tokio::test]
async fn test_undecodable_log_fails_stream() {
    let (mock, token) = setup();
    let source = mock.script_subscription(4);
    let mut stream = watch(&token, LogRange::live(0)).await;

    let mut log = transfer_log(&token, 1, 0, 5);
    log.data = Bytes::from_static(&[0; 16]);
    assert!(source.send(log).await);

    assert!(matches!(
        stream.next().await,
        Err(BindingError::CodecMalformed(_))
    ));
    assert!(matches!(
        stream.next().await,
        Err(BindingError::CodecMalformed(_))
    ));
}

#[tokio::test]
async fn test_restart_resumes_after_last_delivered() {
    let (mock, token) = setup();
    let first = mock.script_subscription(4);
    let mut stream = watch(&token, LogRange::live(3)).await;

    assert!(first.send(transfer_log(&token, 5, 0, 1)).await);
    assert_eq!(stream.next().await.unwrap().unwrap().record().value, U256::from(1));
    assert!(first.send(transfer_log(&token, 5, 1, 2)).await);
    assert_eq!(stream.next().await.unwrap().unwrap().record().value, U256::from(2));
    first.fail(lost());
    assert_eq!(stream.next().await.unwrap_err(), lost());

    // The new source replays the last block.
    mock.script_logs(vec![
        transfer_log(&token, 5, 0, 1),
        transfer_log(&token, 5, 1, 2),
        transfer_log(&token, 6, 0, 3),
    ]);
    stream.restart().await.unwrap();
    assert_eq!(stream.error(), None);

    let subscriptions = mock.subscriptions();
    assert_eq!(subscriptions.len(), 2);
    assert_eq!(subscriptions[1].range, LogRange::live(5));
    assert_eq!(subscriptions[1].topics, subscriptions[0].topics);

    let event = stream.next().await.unwrap().unwrap();
    assert_eq!(event.record().value, U256::from(3));
    assert_eq!((event.block_number(), event.log_index()), (Some(6), Some(0)));
    assert!(stream.next().await.unwrap().is_none());

    assert_eq!(subscriptions[0].released(), 1);
    assert_eq!(subscriptions[1].released(), 1);
}

#[tokio::test]
async fn test_delivers_in_order_as_futures_stream() {
    let (mock, token) = setup();
    let logs: Vec<_> = (0..5).map(|i| transfer_log(&token, 10 + i / 2, i % 2, i)).collect();
    mock.script_logs(logs.clone());

    let events: Vec<_> = watch(&token, LogRange::historical(10, 12))
        .await
        .into_stream()
        .collect()
        .await;
    assert_eq!(events.len(), 5);
    for (event, log) in events.into_iter().zip(logs) {
        let event = event.unwrap();
        assert_eq!(event.raw(), &log);
        assert_eq!(event.record().from, ALICE);
        assert_eq!(event.record().to, BOB);
    }
}

#[tokio::test]
async fn test_futures_stream_ends_after_error() {
    let (mock, token) = setup();
    let source = mock.script_subscription(1);
    source.fail(lost());

    let events: Vec<_> = watch(&token, LogRange::live(0))
        .await
        .into_stream()
        .collect()
        .await;
    assert_eq!(events.len(), 1);
    assert!(events[0].is_err());
}

#[tokio::test]
async fn test_handle_close_wakes_pending_next() {
    let (mock, token) = setup();
    let _source = mock.script_subscription(4);
    let mut stream = watch(&token, LogRange::live(0)).await;
    let handle = stream.handle();

    let pending = tokio::spawn(async move { stream.next().await.map(|e| e.is_some()) });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!pending.is_finished());

    handle.close();
    assert_eq!(pending.await.unwrap(), Ok(false));
    assert!(handle.is_closed());
    assert_eq!(mock.subscriptions()[0].released(), 1);
}

#[tokio::test]
async fn test_tails_live_logs() {
    let (mock, token) = setup();
    let source = mock.script_subscription(1);
    let mut stream = watch(&token, LogRange::live(0)).await;

    let producer = tokio::spawn({
        let logs: Vec<_> = (0..3).map(|i| transfer_log(&token, i, 0, i)).collect();
        async move {
            for log in logs {
                tokio::time::sleep(Duration::from_millis(5)).await;
                if !source.send(log).await {
                    return;
                }
            }
            source.complete();
        }
    });

    for i in 0..3 {
        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.record().value, U256::from(i));
    }
    assert!(stream.next().await.unwrap().is_none());
    producer.await.unwrap();
}

#[tokio::test]
async fn test_drop_releases_subscription() {
    let (mock, token) = setup();
    let _source = mock.script_subscription(4);
    let stream = watch(&token, LogRange::live(0)).await;
    let handle = stream.handle();

    drop(stream);
    assert_eq!(mock.subscriptions()[0].released(), 1);
    // Closing through a surviving handle releases nothing twice.
    handle.close();
    assert_eq!(mock.subscriptions()[0].released(), 1);
}

#[tokio::test]
async fn test_untyped_stream_and_filter() {
    let (mock, token) = setup();
    mock.script_logs(vec![transfer_log(&token, 1, 0, 7)]);

    let mut stream = token
        .instance()
        .watch::<Fields>("Transfer", &EventFilter::new().eq("to", BOB), LogRange::historical(0, 1))
        .await
        .unwrap();
    let event = stream.next().await.unwrap().unwrap();
    assert_eq!(event.record().decode::<U256>("value").unwrap(), U256::from(7));
    assert_eq!(event.record().decode::<Address>("to").unwrap(), BOB);

    let topics = &mock.subscriptions()[0].topics;
    assert!(topics.matches(&event.raw().topics));

    assert_eq!(
        token
            .instance()
            .watch::<Fields>("Transfer", &EventFilter::new().eq("value", U256::ZERO), LogRange::live(0))
            .await
            .unwrap_err(),
        BindingError::TypeMismatch("field `value` of Transfer is not indexed".to_string())
    );
    assert!(matches!(
        token
            .instance()
            .watch::<Fields>("Mint", &EventFilter::new(), LogRange::live(0))
            .await,
        Err(BindingError::UnknownEvent(_))
    ));
}

#[tokio::test]
async fn test_filter_historical() {
    let (mock, token) = setup();
    mock.script_logs(vec![transfer_log(&token, 3, 0, 1), transfer_log(&token, 4, 2, 2)]);

    let events = token
        .instance()
        .filter_historical::<Transfer>("Transfer", &EventFilter::new(), 3, 4)
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].log_index(), Some(2));
    assert_eq!(mock.subscriptions()[0].range, LogRange::historical(3, 4));
}
