use alloy::primitives::{B256, Bytes, I256, U256, keccak256};

use super::Value;
use crate::{error::BindingError, schema::TypeSpec};

/// Encodes values as the tuple of the given types.
pub fn encode(types: &[TypeSpec], values: &[Value]) -> Result<Vec<u8>, BindingError> {
    encode_tuple(types, values)
}

/// Encodes a call payload: 4-byte selector followed by the argument tuple.
pub fn encode_call(
    selector: impl AsRef<[u8]>,
    types: &[TypeSpec],
    args: &[Value],
) -> Result<Bytes, BindingError> {
    let mut data = selector.as_ref().to_vec();
    data.extend(encode_tuple(types, args)?);
    Ok(data.into())
}

/// Encodes a value into a topic slot of an indexed event field.
///
/// Value types are carried verbatim, `string` and `bytes` as the hash of their
/// content, arrays and tuples as the hash of their padded in-place encoding.
pub fn encode_topic(ty: &TypeSpec, value: &Value) -> Result<B256, BindingError> {
    if ty.is_value_type() {
        return Ok(B256::from_slice(&encode_value(ty, value)?));
    }
    match (ty, value) {
        (TypeSpec::Bytes, Value::Bytes(b)) => Ok(keccak256(b)),
        (TypeSpec::String, Value::String(s)) => Ok(keccak256(s.as_bytes())),
        _ => {
            let mut buf = vec![];
            encode_in_place(ty, value, &mut buf)?;
            Ok(keccak256(buf))
        }
    }
}

fn encode_tuple(types: &[TypeSpec], values: &[Value]) -> Result<Vec<u8>, BindingError> {
    if types.len() != values.len() {
        return Err(BindingError::TypeMismatch(format!(
            "expected {} values, got {}",
            types.len(),
            values.len()
        )));
    }
    let head_len: usize = types.iter().map(TypeSpec::head_len).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = vec![];
    for (ty, value) in types.iter().zip(values) {
        if ty.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend(encode_value(ty, value)?);
        } else {
            head.extend(encode_value(ty, value)?);
        }
    }
    head.extend(tail);
    Ok(head)
}

fn encode_value(ty: &TypeSpec, value: &Value) -> Result<Vec<u8>, BindingError> {
    check_width(ty)?;
    match (ty, value) {
        (TypeSpec::Uint(bits), Value::Uint(v)) => {
            if v.bit_len() > *bits {
                return Err(BindingError::CodecRange(format!("{v} does not fit uint{bits}")));
            }
            Ok(v.to_be_bytes::<32>().to_vec())
        }
        (TypeSpec::Int(bits), Value::Int(v)) => {
            if !int_fits(*v, *bits) {
                return Err(BindingError::CodecRange(format!("{v} does not fit int{bits}")));
            }
            // Two's complement representation is sign-extended to 256 bits already.
            Ok(v.into_raw().to_be_bytes::<32>().to_vec())
        }
        (TypeSpec::Bool, Value::Bool(b)) => Ok(usize_word(*b as usize).to_vec()),
        (TypeSpec::Address, Value::Address(a)) => Ok(a.into_word().to_vec()),
        (TypeSpec::FixedBytes(len), Value::FixedBytes(b)) => {
            if b.len() != *len {
                return Err(BindingError::TypeMismatch(format!(
                    "expected bytes{len}, got {} bytes",
                    b.len()
                )));
            }
            let mut word = [0u8; 32];
            word[..*len].copy_from_slice(b);
            Ok(word.to_vec())
        }
        (TypeSpec::Bytes, Value::Bytes(b)) => Ok(encode_bytes(b)),
        (TypeSpec::String, Value::String(s)) => Ok(encode_bytes(s.as_bytes())),
        (TypeSpec::Array(inner), Value::Array(values)) => {
            let mut data = usize_word(values.len()).to_vec();
            data.extend(encode_tuple(&vec![(**inner).clone(); values.len()], values)?);
            Ok(data)
        }
        (TypeSpec::FixedArray(inner, len), Value::FixedArray(values)) => {
            if values.len() != *len {
                return Err(BindingError::TypeMismatch(format!(
                    "expected {len} elements, got {}",
                    values.len()
                )));
            }
            encode_tuple(&vec![(**inner).clone(); *len], values)
        }
        (TypeSpec::Tuple(types), Value::Tuple(values)) => encode_tuple(types, values),
        _ => Err(BindingError::TypeMismatch(format!(
            "expected {ty}, got {}",
            value.kind()
        ))),
    }
}

/// Padded in-place encoding used for hashing indexed reference types:
/// no offsets and no length prefixes.
fn encode_in_place(ty: &TypeSpec, value: &Value, out: &mut Vec<u8>) -> Result<(), BindingError> {
    match (ty, value) {
        (TypeSpec::Bytes, Value::Bytes(b)) => out.extend(padded(b)),
        (TypeSpec::String, Value::String(s)) => out.extend(padded(s.as_bytes())),
        (TypeSpec::Array(inner), Value::Array(values)) => {
            for v in values {
                encode_in_place(inner, v, out)?;
            }
        }
        (TypeSpec::FixedArray(inner, len), Value::FixedArray(values)) if values.len() == *len => {
            for v in values {
                encode_in_place(inner, v, out)?;
            }
        }
        (TypeSpec::Tuple(types), Value::Tuple(values)) if types.len() == values.len() => {
            for (t, v) in types.iter().zip(values) {
                encode_in_place(t, v, out)?;
            }
        }
        _ if ty.is_value_type() => out.extend(encode_value(ty, value)?),
        _ => {
            return Err(BindingError::TypeMismatch(format!(
                "expected {ty}, got {}",
                value.kind()
            )));
        }
    }
    Ok(())
}

/// Rejects integer and fixed bytes widths that have no type name.
pub(crate) fn check_width(ty: &TypeSpec) -> Result<(), BindingError> {
    let valid = match ty {
        TypeSpec::Uint(bits) | TypeSpec::Int(bits) => (8..=256).contains(bits) && bits % 8 == 0,
        TypeSpec::FixedBytes(len) => (1..=32).contains(len),
        _ => true,
    };
    if !valid {
        return Err(BindingError::TypeMismatch(format!("invalid width in {ty}")));
    }
    Ok(())
}

pub(crate) fn int_fits(v: I256, bits: usize) -> bool {
    if bits >= 256 {
        return true;
    }
    let high = v.asr(bits - 1);
    high == I256::ZERO || high == I256::MINUS_ONE
}

fn usize_word(v: usize) -> [u8; 32] {
    U256::from(v).to_be_bytes::<32>()
}

fn encode_bytes(b: &[u8]) -> Vec<u8> {
    let mut data = usize_word(b.len()).to_vec();
    data.extend(padded(b));
    data
}

fn padded(b: &[u8]) -> Vec<u8> {
    let mut data = b.to_vec();
    data.resize(b.len().div_ceil(32) * 32, 0);
    data
}
