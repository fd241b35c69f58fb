//! Typed event streams over raw log subscriptions.
//!
//! [`EventStream`] bridges a [`crate::transport::Subscription`] into an
//! in-order sequence of decoded [`Event`]s:
//!
//! * while the source is streaming, [`EventStream::next`] waits for either
//!   a log or a failure of the source;
//! * once the source completes, the logs already buffered are drained
//!   without waiting, then the stream ends;
//! * a source failure or an undecodable log is latched and returned by every
//!   subsequent [`EventStream::next`] until the stream is closed.
//!
//! The subscription is released exactly once, on close, on the terminal
//! error, on completion, or when the stream is dropped.

use std::{
    marker::PhantomData,
    sync::{Arc, Mutex, PoisonError},
};

use alloy::primitives::Address;
use futures::{Stream, stream};
use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    codec::{self, Value, encode_topic},
    error::BindingError,
    schema::EventSpec,
    transport::{LogSource, Subscription, TopicFilter, TopicSlot, Unsubscribe},
    types::{Event, Fields, LogRange, RawLog},
};

/// Decodes an event record from the fields of a log.
pub trait DecodeEvent: Sized + Send + 'static {
    fn decode(event: &EventSpec, fields: Fields) -> Result<Self, BindingError>;
}

/// Event record bound to an event name of the schema.
pub trait NamedEvent: DecodeEvent {
    const NAME: &'static str;
}

impl DecodeEvent for Fields {
    fn decode(_event: &EventSpec, fields: Fields) -> Result<Self, BindingError> {
        Ok(fields)
    }
}

/// Values to match per indexed field; fields left out match any value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventFilter {
    values: Vec<(String, Vec<Value>)>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches logs whose `field` equals `value`.
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.any_of(field, [value.into()])
    }

    /// Matches logs whose `field` equals any of `values`.
    pub fn any_of(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        let values = values.into_iter().map(Into::into);
        match self.values.iter_mut().find(|(name, _)| name == field) {
            Some((_, existing)) => existing.extend(values),
            None => self.values.push((field.to_string(), values.collect())),
        }
        self
    }

    /// Builds the positional topic filter of `event`.
    ///
    /// The filter holds one slot per topic position: the event topic
    /// (unless anonymous), then the indexed fields in declaration order.
    pub fn topics(&self, event: &EventSpec) -> Result<TopicFilter, BindingError> {
        for (name, _) in &self.values {
            match event.fields.iter().find(|f| &f.name == name) {
                Some(field) if field.indexed => {}
                Some(_) => {
                    return Err(BindingError::TypeMismatch(format!(
                        "field `{name}` of {} is not indexed",
                        event.name
                    )));
                }
                None => {
                    return Err(BindingError::TypeMismatch(format!(
                        "{} has no field `{name}`",
                        event.name
                    )));
                }
            }
        }

        let mut slots = vec![];
        if !event.anonymous {
            slots.push(TopicSlot::OneOf(vec![event.topic0]));
        }
        for field in event.indexed() {
            let slot = match self.values.iter().find(|(name, _)| name == &field.name) {
                Some((_, values)) if !values.is_empty() => TopicSlot::OneOf(
                    values
                        .iter()
                        .map(|v| encode_topic(&field.ty, v))
                        .collect::<Result<_, _>>()?,
                ),
                _ => TopicSlot::Any,
            };
            slots.push(slot);
        }
        TopicFilter::new(slots)
    }
}

#[derive(Debug)]
enum State {
    Streaming,
    Draining,
    End,
    Failed(BindingError),
}

/// State shared with [`StreamHandle`]s.
#[derive(Debug)]
struct Shared {
    unsubscribe: Mutex<Option<Unsubscribe>>,
    closed: watch::Sender<bool>,
}

impl Shared {
    fn new(unsubscribe: Unsubscribe) -> Self {
        Self {
            unsubscribe: Mutex::new(Some(unsubscribe)),
            closed: watch::channel(false).0,
        }
    }

    fn release(&self) {
        let unsubscribe = self
            .unsubscribe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(unsubscribe) = unsubscribe {
            unsubscribe.call();
            tracing::debug!("log subscription released");
        }
    }

    fn close(&self) {
        self.closed.send_replace(true);
        self.release();
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn replace(&self, unsubscribe: Unsubscribe) {
        let previous = self
            .unsubscribe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(unsubscribe);
        if let Some(previous) = previous {
            previous.call();
        }
    }
}

/// Closes an [`EventStream`] from another task.
#[derive(Clone, Debug)]
pub struct StreamHandle(Arc<Shared>);

impl StreamHandle {
    /// Idempotent, a pending [`EventStream::next`] returns `Ok(None)`.
    pub fn close(&self) {
        self.0.close()
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// Lazy sequence of decoded events of one event type.
///
/// Single-consumer: [`EventStream::next`] takes `&mut self`, use
/// [`EventStream::handle`] to close the stream concurrently.
#[derive(derive_more::Debug)]
pub struct EventStream<T> {
    event: Arc<EventSpec>,
    address: Address,
    range: LogRange,
    topics: TopicFilter,
    #[debug(skip)]
    source: Arc<dyn LogSource>,
    logs: mpsc::Receiver<RawLog>,
    logs_open: bool,
    errors: Option<oneshot::Receiver<BindingError>>,
    closed: watch::Receiver<bool>,
    shared: Arc<Shared>,
    state: State,
    last_delivered: Option<(u64, u64)>,
    #[debug(skip)]
    _record: PhantomData<fn() -> T>,
}

impl<T: DecodeEvent> EventStream<T> {
    /// Subscribes to the logs of `event` emitted by `address`.
    pub(crate) async fn open(
        source: Arc<dyn LogSource>,
        event: Arc<EventSpec>,
        address: Address,
        topics: TopicFilter,
        range: LogRange,
    ) -> Result<Self, BindingError> {
        let subscription = source.subscribe(range, address, topics.clone()).await?;
        tracing::debug!(
            event = %event.signature,
            %address,
            from_block = range.from_block,
            to_block = ?range.to_block,
            "watching events"
        );
        let Subscription {
            logs,
            errors,
            unsubscribe,
        } = subscription;
        let shared = Arc::new(Shared::new(unsubscribe));
        Ok(Self {
            closed: shared.closed.subscribe(),
            event,
            address,
            range,
            topics,
            source,
            logs,
            logs_open: true,
            errors: Some(errors),
            shared,
            state: State::Streaming,
            last_delivered: None,
            _record: PhantomData,
        })
    }

    /// Returns the next event, `Ok(None)` once the stream is exhausted or
    /// closed, or the latched error.
    pub async fn next(&mut self) -> Result<Option<Event<T>>, BindingError> {
        loop {
            if self.shared.is_closed() {
                return Ok(None);
            }
            match &self.state {
                State::End => return Ok(None),
                State::Failed(err) => return Err(err.clone()),
                State::Draining => match self.logs.try_recv() {
                    Ok(log) => match self.accept(log) {
                        Some(res) => return res,
                        None => continue,
                    },
                    Err(_) => {
                        self.finish();
                        return Ok(None);
                    }
                },
                State::Streaming => {}
            }

            let Some(errors) = self.errors.as_mut() else {
                self.state = State::Draining;
                continue;
            };
            tokio::select! {
                biased;
                _ = closed_signal(&mut self.closed) => return Ok(None),
                res = errors => {
                    self.errors = None;
                    match res {
                        Ok(err) => return Err(self.fail(err)),
                        // Error sender dropped without a cause: clean completion.
                        Err(_) => self.state = State::Draining,
                    }
                }
                log = self.logs.recv(), if self.logs_open => match log {
                    Some(log) => {
                        if let Some(res) = self.accept(log) {
                            return res;
                        }
                    }
                    // Wait for the source to report how it ended.
                    None => self.logs_open = false,
                },
            }
        }
    }

    /// Releases the subscription, idempotent.
    ///
    /// Subsequent [`EventStream::next`] calls return `Ok(None)`.
    pub fn close(&self) {
        self.shared.close()
    }

    pub fn handle(&self) -> StreamHandle {
        StreamHandle(self.shared.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Error latched by the stream, if any.
    pub fn error(&self) -> Option<&BindingError> {
        match &self.state {
            State::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn event(&self) -> &EventSpec {
        &self.event
    }

    /// Re-subscribes after a failure, resuming from the block of the last
    /// delivered event and skipping the events delivered already.
    ///
    /// Fails with [`BindingError::Cancelled`] on a closed stream.
    pub async fn restart(&mut self) -> Result<(), BindingError> {
        if self.shared.is_closed() {
            return Err(BindingError::Cancelled);
        }
        let mut range = self.range;
        if let Some((block, _)) = self.last_delivered {
            range.from_block = range.from_block.max(block);
        }
        let Subscription {
            logs,
            errors,
            unsubscribe,
        } = self
            .source
            .subscribe(range, self.address, self.topics.clone())
            .await?;
        tracing::debug!(event = %self.event.signature, from_block = range.from_block, "stream restarted");
        self.shared.replace(unsubscribe);
        self.logs = logs;
        self.logs_open = true;
        self.errors = Some(errors);
        self.state = State::Streaming;
        Ok(())
    }

    /// Adapts the stream to [`futures::Stream`], ending after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Event<T>, BindingError>> {
        stream::unfold(Some(self), |stream| async move {
            let mut stream = stream?;
            match stream.next().await {
                Ok(Some(event)) => Some((Ok(event), Some(stream))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// Decodes a log, returns `None` for logs delivered before a restart.
    fn accept(&mut self, log: RawLog) -> Option<Result<Option<Event<T>>, BindingError>> {
        let position = log.position();
        if let (Some(pos), Some(last)) = (position, self.last_delivered) {
            if pos <= last {
                return None;
            }
        }
        let decoded = codec::decode_log(&self.event, &log.topics, &log.data)
            .and_then(|fields| T::decode(&self.event, fields));
        match decoded {
            Ok(record) => {
                tracing::trace!(
                    event = %self.event.name,
                    block = ?log.block_number,
                    log_index = ?log.log_index,
                    "event delivered"
                );
                if position.is_some() {
                    self.last_delivered = position;
                }
                Some(Ok(Some(Event::new(record, log))))
            }
            Err(err) => Some(Err(self.fail(err))),
        }
    }

    fn fail(&mut self, err: BindingError) -> BindingError {
        tracing::warn!(event = %self.event.name, %err, "event stream failed");
        self.state = State::Failed(err.clone());
        self.shared.release();
        err
    }

    fn finish(&mut self) {
        self.state = State::End;
        self.shared.release();
    }
}

async fn closed_signal(closed: &mut watch::Receiver<bool>) {
    // The sender is owned by the shared state, it outlives the receiver.
    _ = closed.wait_for(|closed| *closed).await;
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        self.shared.release();
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, B256, U256, address};

    use super::*;
    use crate::schema::Schema;

    fn transfer() -> EventSpec {
        Schema::parse(
            r#"[{"type":"event","name":"Transfer","inputs":[
                {"name":"from","type":"address","indexed":true},
                {"name":"to","type":"address","indexed":true},
                {"name":"value","type":"uint256","indexed":false}]}]"#,
        )
        .unwrap()
        .event("Transfer")
        .unwrap()
        .clone()
    }

    #[test]
    fn test_filter_positions() {
        let event = transfer();
        let aa = address!("0x00000000000000000000000000000000000000aa");
        let bb = address!("0x00000000000000000000000000000000000000bb");
        let topics = EventFilter::new()
            .any_of("from", [aa, bb])
            .topics(&event)
            .unwrap();
        assert_eq!(
            topics.slots(),
            &[
                TopicSlot::OneOf(vec![event.topic0]),
                TopicSlot::OneOf(vec![aa.into_word(), bb.into_word()]),
                TopicSlot::Any,
            ]
        );

        let topics = EventFilter::new().eq("to", bb).topics(&event).unwrap();
        assert_eq!(topics.slots()[1], TopicSlot::Any);
        assert_eq!(topics.slots()[2], TopicSlot::OneOf(vec![bb.into_word()]));

        let topics = EventFilter::new().topics(&event).unwrap();
        assert_eq!(topics.slots().len(), 3);
    }

    #[test]
    fn test_filter_rejects_unfilterable_fields() {
        let event = transfer();
        assert!(matches!(
            EventFilter::new().eq("value", U256::from(1)).topics(&event),
            Err(BindingError::TypeMismatch(_))
        ));
        assert!(matches!(
            EventFilter::new().eq("spender", Address::ZERO).topics(&event),
            Err(BindingError::TypeMismatch(_))
        ));
        assert!(matches!(
            EventFilter::new().eq("from", U256::from(1)).topics(&event),
            Err(BindingError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_filter_anonymous_event() {
        let schema = Schema::parse(
            r#"[{"type":"event","name":"Marker","anonymous":true,"inputs":[
                {"name":"id","type":"bytes32","indexed":true}]}]"#,
        )
        .unwrap();
        let event = schema.event("Marker").unwrap();
        let topics = EventFilter::new()
            .eq("id", Value::fixed_bytes(B256::repeat_byte(7)))
            .topics(event)
            .unwrap();
        assert_eq!(
            topics.slots(),
            &[TopicSlot::OneOf(vec![B256::repeat_byte(7)])]
        );
    }
}
