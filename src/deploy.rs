//! Contract deployment.

use std::sync::Arc;

use alloy::primitives::Bytes;

use crate::{
    codec::{self, Value},
    error::BindingError,
    instance::BoundInstance,
    schema::Schema,
    transport::Handles,
    types::{SigContext, TxHandle, with_cancel},
};

/// Builds the creation payload: `bytecode` followed by the constructor
/// arguments encoded as a tuple, with no selector.
pub fn encode_deploy(
    schema: &Schema,
    bytecode: &[u8],
    args: &[Value],
) -> Result<Bytes, BindingError> {
    let (types, expected) = match schema.constructor() {
        Some(ctor) => (ctor.inputs.as_slice(), ctor.inputs.len()),
        None => (&[][..], 0),
    };
    if args.len() != expected {
        return Err(BindingError::ArityMismatch {
            name: "constructor".to_string(),
            expected,
            got: args.len(),
        });
    }
    let mut code = bytecode.to_vec();
    code.extend(codec::encode(types, args)?);
    Ok(code.into())
}

/// Deploys the contract and binds an instance at the created address.
///
/// The address is reported by the write transport, the instance shares
/// `handles` for further operations.
pub async fn deploy(
    schema: Arc<Schema>,
    bytecode: &[u8],
    args: &[Value],
    sig: &SigContext,
    handles: Handles,
) -> Result<(BoundInstance, TxHandle), BindingError> {
    let code = encode_deploy(&schema, bytecode, args)?;
    let writer = handles.writer()?;
    tracing::debug!(code_len = code.len(), args = args.len(), "deploy");
    let (handle, address) = with_cancel(sig.cancel.as_ref(), writer.deploy(code, sig)).await?;
    tracing::debug!(%address, tx_hash = %handle.tx_hash(), "contract created");
    Ok((BoundInstance::new(address, schema, handles), handle))
}
