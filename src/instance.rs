//! Client-side handle to a deployed contract.

use std::sync::Arc;

use alloy::{
    primitives::{Address, Bytes},
    rpc::types::TransactionRequest,
};

use crate::{
    codec::{self, Value},
    error::{BindingError, RevertReason},
    schema::{EventSpec, MethodSpec, Schema},
    stream::{DecodeEvent, EventFilter, EventStream, NamedEvent},
    transport::Handles,
    types::{CallContext, Event, Fields, LogRange, RawLog, SigContext, TxHandle, with_cancel},
};

/// Contract address with its schema and transport handles.
///
/// Every operation issues its own transport request, so an instance may
/// be cloned and used by independent tasks concurrently.
#[derive(Clone, Debug)]
pub struct BoundInstance {
    address: Address,
    schema: Arc<Schema>,
    handles: Handles,
}

impl BoundInstance {
    pub fn new(address: Address, schema: Arc<Schema>, handles: Handles) -> Self {
        Self {
            address,
            schema,
            handles,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn handles(&self) -> &Handles {
        &self.handles
    }

    /// Pre-binds default call and signing contexts.
    pub fn session(&self, call: CallContext, sig: SigContext) -> Session {
        Session {
            instance: self.clone(),
            call,
            sig,
        }
    }

    /// Encodes the call payload of `method`, checking arity and types.
    pub fn encode_call(&self, method: &str, args: &[Value]) -> Result<Bytes, BindingError> {
        let method = self.schema.method(method)?;
        encode_args(method, args)
    }

    /// Executes a read-only call and decodes its outputs.
    pub async fn call(
        &self,
        method: &str,
        args: &[Value],
        ctx: &CallContext,
    ) -> Result<Vec<Value>, BindingError> {
        let spec = self.schema.method(method)?;
        let output = self.read(spec, args, ctx).await?;
        codec::decode(&spec.outputs, &output)
    }

    /// Executes a read-only call and returns its undecoded output.
    pub async fn call_raw(
        &self,
        method: &str,
        args: &[Value],
        ctx: &CallContext,
    ) -> Result<Bytes, BindingError> {
        let spec = self.schema.method(method)?;
        self.read(spec, args, ctx).await
    }

    async fn read(
        &self,
        method: &MethodSpec,
        args: &[Value],
        ctx: &CallContext,
    ) -> Result<Bytes, BindingError> {
        let data = encode_args(method, args)?;
        let reader = self.handles.reader()?;
        tracing::debug!(
            method = %method.signature,
            selector = %method.selector,
            contract = %self.address,
            block = ?ctx.block_id(),
            "call"
        );
        with_cancel(
            ctx.cancel.as_ref(),
            reader.read(self.address, data, ctx.block_id(), ctx.from),
        )
        .await
    }

    /// Signs and submits a state-changing call.
    pub async fn transact(
        &self,
        method: &str,
        args: &[Value],
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        let spec = self.schema.method(method)?;
        let data = encode_args(spec, args)?;
        let writer = self.handles.writer()?;
        tracing::debug!(
            method = %spec.signature,
            selector = %spec.selector,
            contract = %self.address,
            "transact"
        );
        let tx = TransactionRequest::default()
            .to(self.address)
            .input(data.into());
        with_cancel(sig.cancel.as_ref(), writer.submit(tx, sig)).await
    }

    /// Sends a transaction with empty call data, invoking the receive
    /// or fallback handler of the contract.
    pub async fn transfer_value(&self, sig: &SigContext) -> Result<TxHandle, BindingError> {
        if !self.schema.accepts_value() {
            return Err(BindingError::UnknownMethod("receive".to_string()));
        }
        let writer = self.handles.writer()?;
        tracing::debug!(contract = %self.address, value = %sig.value, "transfer value");
        let tx = TransactionRequest::default().to(self.address);
        with_cancel(sig.cancel.as_ref(), writer.submit(tx, sig)).await
    }

    /// Subscribes to the events `event` matching `filter` in `range`.
    pub async fn watch<T: DecodeEvent>(
        &self,
        event: &str,
        filter: &EventFilter,
        range: LogRange,
    ) -> Result<EventStream<T>, BindingError> {
        let spec = self.schema.event(event)?;
        let topics = filter.topics(spec)?;
        let source = self.handles.logs()?.clone();
        EventStream::open(source, Arc::new(spec.clone()), self.address, topics, range).await
    }

    /// Typed form of [`BoundInstance::watch`].
    pub async fn watch_event<E: NamedEvent>(
        &self,
        filter: &EventFilter,
        range: LogRange,
    ) -> Result<EventStream<E>, BindingError> {
        self.watch(E::NAME, filter, range).await
    }

    /// Collects the events `event` matching `filter` in the inclusive block range.
    pub async fn filter_historical<T: DecodeEvent>(
        &self,
        event: &str,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Event<T>>, BindingError> {
        let mut stream = self
            .watch(event, filter, LogRange::historical(from_block, to_block))
            .await?;
        let mut events = vec![];
        while let Some(event) = stream.next().await? {
            events.push(event);
        }
        Ok(events)
    }

    /// Decodes a log of the contract, resolving the event by its topic.
    pub fn parse_log(&self, log: &RawLog) -> Result<(&EventSpec, Fields), BindingError> {
        let spec = log
            .topics
            .first()
            .and_then(|topic| self.schema.event_by_topic(topic))
            .ok_or_else(|| {
                BindingError::UnknownEvent(format!(
                    "topic {}",
                    log.topics.first().copied().unwrap_or_default()
                ))
            })?;
        let fields = codec::decode_log(spec, &log.topics, &log.data)?;
        Ok((spec, fields))
    }

    /// Decodes a log as the event `event`.
    pub fn decode_log<T: DecodeEvent>(
        &self,
        event: &str,
        log: RawLog,
    ) -> Result<Event<T>, BindingError> {
        let spec = self.schema.event(event)?;
        let fields = codec::decode_log(spec, &log.topics, &log.data)?;
        Ok(Event::new(T::decode(spec, fields)?, log))
    }

    /// Decodes the revert payload carried by `err` against the standard
    /// error encodings and the errors of the schema.
    pub fn revert_reason(&self, err: &BindingError) -> Option<RevertReason> {
        err.revert_data()
            .map(|data| codec::decode_revert(data, Some(&self.schema)))
    }
}

fn encode_args(method: &MethodSpec, args: &[Value]) -> Result<Bytes, BindingError> {
    if args.len() != method.inputs.len() {
        return Err(BindingError::ArityMismatch {
            name: method.name.clone(),
            expected: method.inputs.len(),
            got: args.len(),
        });
    }
    codec::encode_call(method.selector, &method.inputs, args)
}

/// Bound instance with default call and signing contexts.
#[derive(Clone, Debug)]
pub struct Session {
    instance: BoundInstance,
    call: CallContext,
    sig: SigContext,
}

impl Session {
    pub fn instance(&self) -> &BoundInstance {
        &self.instance
    }

    pub fn call_context(&self) -> &CallContext {
        &self.call
    }

    pub fn sig_context(&self) -> &SigContext {
        &self.sig
    }

    pub async fn call(&self, method: &str, args: &[Value]) -> Result<Vec<Value>, BindingError> {
        self.instance.call(method, args, &self.call).await
    }

    pub async fn transact(&self, method: &str, args: &[Value]) -> Result<TxHandle, BindingError> {
        self.instance.transact(method, args, &self.sig).await
    }

    pub async fn transfer_value(&self) -> Result<TxHandle, BindingError> {
        self.instance.transfer_value(&self.sig).await
    }
}
