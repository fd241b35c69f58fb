//! Security token facade over [`BoundInstance`].
//!
//! Fungible token interface extended with issuance and redemption gated by
//! a compliance service, a versioned pointer to that service and a registry
//! of named documents.
//!
//! Every method is a thin wrapper encoding its arguments as [`Value`]s and
//! converting the decoded outputs, see [`BoundInstance`] for the semantics.

use std::sync::Arc;

use alloy::primitives::{Address, B256, Bytes, FixedBytes, U256};

use crate::{
    abi,
    codec::{FromValue, Value},
    deploy,
    error::BindingError,
    instance::BoundInstance,
    num,
    schema::EventSpec,
    stream::{DecodeEvent, EventFilter, EventStream, NamedEvent},
    transport::Handles,
    types::{CallContext, Fields, LogRange, RawLog, SigContext, TxHandle},
};

/// Constructor arguments of the security token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenParams {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub compliance_service: Address,
}

/// Outcome of a transfer pre-check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferCheck {
    pub allowed: bool,
    /// Status code, `0x51` for success by convention.
    pub code: FixedBytes<1>,
    /// Application specific reason.
    pub reason: B256,
}

/// Entry of the document registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub name: B256,
    pub uri: String,
    pub document_hash: B256,
    /// Timestamp of the last modification.
    pub last_modified: U256,
}

#[derive(Clone, Debug)]
pub struct SecurityToken {
    instance: BoundInstance,
}

impl SecurityToken {
    pub fn new(address: Address, handles: Handles) -> Result<Self, BindingError> {
        Ok(Self {
            instance: BoundInstance::new(address, abi::security_token()?, handles),
        })
    }

    /// Wraps an instance bound to the security token schema.
    pub fn from_instance(instance: BoundInstance) -> Self {
        Self { instance }
    }

    /// Deploys the token from its creation bytecode.
    pub async fn deploy(
        bytecode: &[u8],
        params: TokenParams,
        sig: &SigContext,
        handles: Handles,
    ) -> Result<(Self, TxHandle), BindingError> {
        let args: [Value; 4] = [
            params.name.into(),
            params.symbol.into(),
            U256::from(params.decimals).into(),
            params.compliance_service.into(),
        ];
        let (instance, handle) =
            deploy::deploy(abi::security_token()?, bytecode, &args, sig, handles).await?;
        Ok((Self { instance }, handle))
    }

    pub fn instance(&self) -> &BoundInstance {
        &self.instance
    }

    pub fn address(&self) -> Address {
        self.instance.address()
    }

    async fn read<T: FromValue>(
        &self,
        method: &str,
        args: &[Value],
        ctx: &CallContext,
    ) -> Result<T, BindingError> {
        let values = self.instance.call(method, args, ctx).await?;
        first(&values)?.to()
    }

    pub async fn name(&self, ctx: &CallContext) -> Result<String, BindingError> {
        self.read("name", &[], ctx).await
    }

    pub async fn symbol(&self, ctx: &CallContext) -> Result<String, BindingError> {
        self.read("symbol", &[], ctx).await
    }

    pub async fn decimals(&self, ctx: &CallContext) -> Result<u8, BindingError> {
        self.read("decimals", &[], ctx).await
    }

    /// Amount converter scaled by the token decimals.
    pub async fn converter(&self, ctx: &CallContext) -> Result<num::Converter, BindingError> {
        Ok(num::Converter::new(self.decimals(ctx).await?))
    }

    pub async fn total_supply(&self, ctx: &CallContext) -> Result<U256, BindingError> {
        self.read("totalSupply", &[], ctx).await
    }

    pub async fn balance_of(&self, owner: Address, ctx: &CallContext) -> Result<U256, BindingError> {
        self.read("balanceOf", &[owner.into()], ctx).await
    }

    pub async fn allowance(
        &self,
        owner: Address,
        spender: Address,
        ctx: &CallContext,
    ) -> Result<U256, BindingError> {
        self.read("allowance", &[owner.into(), spender.into()], ctx)
            .await
    }

    pub async fn transfer(
        &self,
        to: Address,
        value: U256,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        self.instance
            .transact("transfer", &[to.into(), value.into()], sig)
            .await
    }

    pub async fn approve(
        &self,
        spender: Address,
        value: U256,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        self.instance
            .transact("approve", &[spender.into(), value.into()], sig)
            .await
    }

    pub async fn transfer_from(
        &self,
        from: Address,
        to: Address,
        value: U256,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        self.instance
            .transact("transferFrom", &[from.into(), to.into(), value.into()], sig)
            .await
    }

    /// Whether new tokens can still be issued.
    pub async fn is_issuable(&self, ctx: &CallContext) -> Result<bool, BindingError> {
        self.read("isIssuable", &[], ctx).await
    }

    pub async fn issue(
        &self,
        holder: Address,
        value: U256,
        data: Bytes,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        self.instance
            .transact("issue", &[holder.into(), value.into(), data.into()], sig)
            .await
    }

    pub async fn redeem(
        &self,
        value: U256,
        data: Bytes,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        self.instance
            .transact("redeem", &[value.into(), data.into()], sig)
            .await
    }

    pub async fn redeem_from(
        &self,
        holder: Address,
        value: U256,
        data: Bytes,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        self.instance
            .transact("redeemFrom", &[holder.into(), value.into(), data.into()], sig)
            .await
    }

    /// Checks a transfer of the caller against the compliance rules
    /// without submitting it.
    pub async fn can_transfer(
        &self,
        to: Address,
        value: U256,
        data: Bytes,
        ctx: &CallContext,
    ) -> Result<TransferCheck, BindingError> {
        let values = self
            .instance
            .call("canTransfer", &[to.into(), value.into(), data.into()], ctx)
            .await?;
        match values.as_slice() {
            [allowed, code, reason] => Ok(TransferCheck {
                allowed: allowed.to()?,
                code: code.to()?,
                reason: reason.to()?,
            }),
            _ => Err(outputs_mismatch("canTransfer", 3, values.len())),
        }
    }

    pub async fn compliance_service(&self, ctx: &CallContext) -> Result<Address, BindingError> {
        self.read("complianceService", &[], ctx).await
    }

    /// Version of the compliance service pointer, bumped on every update.
    pub async fn compliance_service_version(
        &self,
        ctx: &CallContext,
    ) -> Result<U256, BindingError> {
        self.read("complianceServiceVersion", &[], ctx).await
    }

    /// Binds the compliance service the token currently points to,
    /// sharing the token's transport handles.
    pub async fn compliance(&self, ctx: &CallContext) -> Result<ComplianceService, BindingError> {
        let address = self.compliance_service(ctx).await?;
        ComplianceService::new(address, self.instance.handles().clone())
    }

    pub async fn set_compliance_service(
        &self,
        service: Address,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        self.instance
            .transact("setComplianceService", &[service.into()], sig)
            .await
    }

    pub async fn get_document(
        &self,
        name: B256,
        ctx: &CallContext,
    ) -> Result<Document, BindingError> {
        let values = self
            .instance
            .call("getDocument", &[name.into()], ctx)
            .await?;
        match values.as_slice() {
            [uri, document_hash, last_modified] => Ok(Document {
                name,
                uri: uri.to()?,
                document_hash: document_hash.to()?,
                last_modified: last_modified.to()?,
            }),
            _ => Err(outputs_mismatch("getDocument", 3, values.len())),
        }
    }

    pub async fn set_document(
        &self,
        name: B256,
        uri: &str,
        document_hash: B256,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        self.instance
            .transact(
                "setDocument",
                &[name.into(), uri.into(), document_hash.into()],
                sig,
            )
            .await
    }

    pub async fn remove_document(
        &self,
        name: B256,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        self.instance
            .transact("removeDocument", &[name.into()], sig)
            .await
    }

    /// Names of all registered documents.
    pub async fn get_all_documents(&self, ctx: &CallContext) -> Result<Vec<B256>, BindingError> {
        self.read("getAllDocuments", &[], ctx).await
    }

    /// Subscribes to one event type of the token.
    pub async fn watch<E: NamedEvent>(
        &self,
        filter: &EventFilter,
        range: LogRange,
    ) -> Result<EventStream<E>, BindingError> {
        self.instance.watch_event(filter, range).await
    }

    /// Decodes any log emitted by the token.
    pub fn parse_log(&self, log: &RawLog) -> Result<TokenEvent, BindingError> {
        let (spec, fields) = self.instance.parse_log(log)?;
        TokenEvent::decode(spec, fields)
    }
}

/// Compliance service consulted by the token on transfers and issuance.
#[derive(Clone, Debug)]
pub struct ComplianceService {
    instance: BoundInstance,
}

impl ComplianceService {
    pub fn new(address: Address, handles: Handles) -> Result<Self, BindingError> {
        Ok(Self {
            instance: BoundInstance::new(address, abi::compliance_service()?, handles),
        })
    }

    pub fn instance(&self) -> &BoundInstance {
        &self.instance
    }

    pub async fn version(&self, ctx: &CallContext) -> Result<U256, BindingError> {
        let values = self.instance.call("version", &[], ctx).await?;
        first(&values)?.to()
    }

    /// Status code of a transfer by `token`, `0x51` when allowed.
    pub async fn check(
        &self,
        token: Address,
        from: Address,
        to: Address,
        value: U256,
        ctx: &CallContext,
    ) -> Result<FixedBytes<1>, BindingError> {
        let values = self
            .instance
            .call(
                "check",
                &[token.into(), from.into(), to.into(), value.into()],
                ctx,
            )
            .await?;
        first(&values)?.to()
    }

    pub async fn is_issuance_allowed(
        &self,
        token: Address,
        to: Address,
        value: U256,
        ctx: &CallContext,
    ) -> Result<bool, BindingError> {
        let values = self
            .instance
            .call(
                "isIssuanceAllowed",
                &[token.into(), to.into(), value.into()],
                ctx,
            )
            .await?;
        first(&values)?.to()
    }

    pub async fn set_rule(
        &self,
        rule: B256,
        enabled: bool,
        sig: &SigContext,
    ) -> Result<TxHandle, BindingError> {
        self.instance
            .transact("setRule", &[rule.into(), enabled.into()], sig)
            .await
    }
}

fn first(values: &[Value]) -> Result<&Value, BindingError> {
    values
        .first()
        .ok_or_else(|| BindingError::malformed("empty call output"))
}

fn outputs_mismatch(method: &str, expected: usize, got: usize) -> BindingError {
    BindingError::malformed(format!("{method}: expected {expected} outputs, got {got}"))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Approval {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issued {
    pub operator: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redeemed {
    pub operator: Address,
    pub from: Address,
    pub value: U256,
    pub data: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentUpdated {
    pub name: B256,
    pub uri: String,
    pub document_hash: B256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRemoved {
    pub name: B256,
    pub uri: String,
    pub document_hash: B256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComplianceServiceUpdated {
    pub previous_service: Address,
    pub new_service: Address,
    pub version: U256,
}

macro_rules! token_event {
    ($ty:ident { $($field:ident: $name:literal),+ $(,)? }) => {
        impl DecodeEvent for $ty {
            fn decode(_event: &EventSpec, fields: Fields) -> Result<Self, BindingError> {
                Ok(Self {
                    $($field: fields.decode($name)?,)+
                })
            }
        }

        impl NamedEvent for $ty {
            const NAME: &'static str = stringify!($ty);
        }
    };
}

token_event!(Transfer { from: "from", to: "to", value: "value" });
token_event!(Approval { owner: "owner", spender: "spender", value: "value" });
token_event!(Issued { operator: "_operator", to: "_to", value: "_value", data: "_data" });
token_event!(Redeemed { operator: "_operator", from: "_from", value: "_value", data: "_data" });
token_event!(DocumentUpdated { name: "_name", uri: "_uri", document_hash: "_documentHash" });
token_event!(DocumentRemoved { name: "_name", uri: "_uri", document_hash: "_documentHash" });
token_event!(ComplianceServiceUpdated {
    previous_service: "previousService",
    new_service: "newService",
    version: "version",
});

/// Any event emitted by the security token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenEvent {
    Transfer(Transfer),
    Approval(Approval),
    Issued(Issued),
    Redeemed(Redeemed),
    DocumentUpdated(DocumentUpdated),
    DocumentRemoved(DocumentRemoved),
    ComplianceServiceUpdated(ComplianceServiceUpdated),
}

impl DecodeEvent for TokenEvent {
    fn decode(event: &EventSpec, fields: Fields) -> Result<Self, BindingError> {
        Ok(match event.name.as_str() {
            Transfer::NAME => Self::Transfer(Transfer::decode(event, fields)?),
            Approval::NAME => Self::Approval(Approval::decode(event, fields)?),
            Issued::NAME => Self::Issued(Issued::decode(event, fields)?),
            Redeemed::NAME => Self::Redeemed(Redeemed::decode(event, fields)?),
            DocumentUpdated::NAME => {
                Self::DocumentUpdated(DocumentUpdated::decode(event, fields)?)
            }
            DocumentRemoved::NAME => {
                Self::DocumentRemoved(DocumentRemoved::decode(event, fields)?)
            }
            ComplianceServiceUpdated::NAME => {
                Self::ComplianceServiceUpdated(ComplianceServiceUpdated::decode(event, fields)?)
            }
            other => return Err(BindingError::UnknownEvent(other.to_string())),
        })
    }
}

/// Schema shared by all security token instances, for callers building
/// [`BoundInstance`]s directly.
pub fn schema() -> Result<Arc<crate::schema::Schema>, BindingError> {
    abi::security_token()
}
