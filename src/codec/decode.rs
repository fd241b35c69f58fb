use std::iter;

use alloy::primitives::{Address, B256, Bytes, I256, U256};

use super::{
    Value,
    encode::{check_width, int_fits},
};
use crate::{error::BindingError, schema::TypeSpec};

/// Decodes the tuple of the given types.
///
/// Decoding is strict: truncated input, out-of-range offsets and lengths,
/// dirty padding of narrow values and non-canonical booleans are rejected
/// with [`BindingError::CodecMalformed`]. So are inputs whose offsets alias
/// each other into decoding more words than `data` holds.
pub fn decode(types: &[TypeSpec], data: &[u8]) -> Result<Vec<Value>, BindingError> {
    let mut budget = data.len().div_ceil(32);
    decode_tuple(types, data, &mut budget)
}

/// Decodes a topic slot of an indexed event field.
///
/// Reference types are carried hashed and can not be recovered,
/// they decode to the 32-byte hash as [`Value::FixedBytes`].
pub fn decode_topic(ty: &TypeSpec, topic: &B256) -> Result<Value, BindingError> {
    if ty.is_value_type() {
        decode_word(ty, &topic.0)
    } else {
        Ok(Value::fixed_bytes(topic))
    }
}

/// Takes `words` from the number of words left to decode.
fn charge(budget: &mut usize, words: usize) -> Result<(), BindingError> {
    *budget = budget
        .checked_sub(words)
        .ok_or_else(|| BindingError::malformed("decoded size exceeds the input"))?;
    Ok(())
}

fn decode_tuple<'a>(
    types: impl IntoIterator<Item = &'a TypeSpec>,
    data: &[u8],
    budget: &mut usize,
) -> Result<Vec<Value>, BindingError> {
    let mut values = vec![];
    let mut pos = 0;
    for ty in types {
        if ty.is_dynamic() {
            charge(budget, 1)?;
            let offset = read_usize(data, pos)?;
            let tail = data.get(offset..).ok_or_else(|| {
                BindingError::malformed(format!(
                    "offset {offset} at {pos} outside of {} bytes",
                    data.len()
                ))
            })?;
            values.push(decode_dynamic(ty, tail, budget)?);
            pos += 32;
        } else {
            values.push(decode_static(ty, data, pos, budget)?);
            pos += ty.head_len();
        }
    }
    Ok(values)
}

fn decode_static(
    ty: &TypeSpec,
    data: &[u8],
    pos: usize,
    budget: &mut usize,
) -> Result<Value, BindingError> {
    match ty {
        TypeSpec::Tuple(types) => Ok(Value::Tuple(decode_tuple(
            types,
            slice_from(data, pos)?,
            budget,
        )?)),
        TypeSpec::FixedArray(inner, len) => Ok(Value::FixedArray(decode_tuple(
            iter::repeat_n(&**inner, *len),
            slice_from(data, pos)?,
            budget,
        )?)),
        _ => {
            charge(budget, 1)?;
            decode_word(ty, read_word(data, pos)?)
        }
    }
}

/// Decodes a dynamic value, `data` starting at its encoding.
fn decode_dynamic(ty: &TypeSpec, data: &[u8], budget: &mut usize) -> Result<Value, BindingError> {
    match ty {
        TypeSpec::Bytes => Ok(Value::Bytes(Bytes::copy_from_slice(read_content(
            data, budget,
        )?))),
        TypeSpec::String => {
            let content = read_content(data, budget)?;
            String::from_utf8(content.to_vec())
                .map(Value::String)
                .map_err(|e| BindingError::malformed(format!("invalid utf-8 string: {e}")))
        }
        TypeSpec::Array(inner) => {
            let len = read_usize(data, 0)?;
            let elems = &data[32..];
            // Every element occupies at least one word in the head.
            if len > elems.len() / 32 {
                return Err(BindingError::malformed(format!(
                    "array length {len} overruns {} bytes",
                    elems.len()
                )));
            }
            // Zero-width elements read nothing, count them instead.
            let width = if inner.head_len() == 0 { len } else { 0 };
            charge(budget, 1 + width)?;
            Ok(Value::Array(decode_tuple(
                iter::repeat_n(&**inner, len),
                elems,
                budget,
            )?))
        }
        TypeSpec::FixedArray(inner, len) => Ok(Value::FixedArray(decode_tuple(
            iter::repeat_n(&**inner, *len),
            data,
            budget,
        )?)),
        TypeSpec::Tuple(types) => Ok(Value::Tuple(decode_tuple(types, data, budget)?)),
        _ => {
            charge(budget, 1)?;
            decode_word(ty, read_word(data, 0)?)
        }
    }
}

fn decode_word(ty: &TypeSpec, word: &[u8; 32]) -> Result<Value, BindingError> {
    check_width(ty)?;
    match ty {
        TypeSpec::Uint(bits) => {
            let v = U256::from_be_slice(word);
            if v.bit_len() > *bits {
                return Err(BindingError::malformed(format!("{v} does not fit uint{bits}")));
            }
            Ok(Value::Uint(v))
        }
        TypeSpec::Int(bits) => {
            let v = I256::from_raw(U256::from_be_slice(word));
            if !int_fits(v, *bits) {
                return Err(BindingError::malformed(format!("{v} does not fit int{bits}")));
            }
            Ok(Value::Int(v))
        }
        TypeSpec::Bool => match U256::from_be_slice(word) {
            v if v.is_zero() => Ok(Value::Bool(false)),
            v if v == U256::from(1) => Ok(Value::Bool(true)),
            v => Err(BindingError::malformed(format!("invalid boolean {v}"))),
        },
        TypeSpec::Address => {
            if word[..12].iter().any(|b| *b != 0) {
                return Err(BindingError::malformed("dirty address padding"));
            }
            Ok(Value::Address(Address::from_slice(&word[12..])))
        }
        TypeSpec::FixedBytes(len) => {
            if word[*len..].iter().any(|b| *b != 0) {
                return Err(BindingError::malformed(format!("dirty bytes{len} padding")));
            }
            Ok(Value::fixed_bytes(&word[..*len]))
        }
        _ => Err(BindingError::malformed(format!("{ty} is not a single-word type"))),
    }
}

fn read_word(data: &[u8], pos: usize) -> Result<&[u8; 32], BindingError> {
    pos.checked_add(32)
        .and_then(|end| data.get(pos..end))
        .and_then(|word| word.try_into().ok())
        .ok_or_else(|| {
            BindingError::malformed(format!(
                "truncated data: need a word at {pos}, have {} bytes",
                data.len()
            ))
        })
}

/// Reads an offset or length word, bounded by the size of `data`.
fn read_usize(data: &[u8], pos: usize) -> Result<usize, BindingError> {
    let v = U256::from_be_slice(read_word(data, pos)?);
    if v > U256::from(data.len()) {
        return Err(BindingError::malformed(format!(
            "offset or length {v} at {pos} out of range of {} bytes",
            data.len()
        )));
    }
    Ok(v.as_limbs()[0] as usize)
}

/// Reads length-prefixed content of `bytes` and `string`.
fn read_content<'a>(data: &'a [u8], budget: &mut usize) -> Result<&'a [u8], BindingError> {
    let len = read_usize(data, 0)?;
    let content = data.get(32..32 + len).ok_or_else(|| {
        BindingError::malformed(format!(
            "declared length {len} overruns {} bytes",
            data.len() - 32
        ))
    })?;
    charge(budget, 1 + len.div_ceil(32))?;
    Ok(content)
}

fn slice_from(data: &[u8], pos: usize) -> Result<&[u8], BindingError> {
    data.get(pos..).ok_or_else(|| {
        BindingError::malformed(format!("truncated data at {pos} of {} bytes", data.len()))
    })
}
