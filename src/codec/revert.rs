use alloy::primitives::{Bytes, Selector};
use alloy_sol_types::{Panic, Revert, SolError};

use super::decode;
use crate::{
    error::RevertReason,
    schema::{Schema, TypeSpec},
    types::Fields,
};

/// Decodes a revert payload by the standard `Error(string)` and
/// `Panic(uint256)` encodings, then by the errors registered in the schema.
pub fn decode_revert(data: &[u8], schema: Option<&Schema>) -> RevertReason {
    let unknown = || RevertReason::Unknown(Bytes::copy_from_slice(data));
    if data.len() < 4 {
        return unknown();
    }
    let (selector, args) = data.split_at(4);
    let selector = Selector::from_slice(selector);

    if selector.0 == Revert::SELECTOR {
        return match decode(&[TypeSpec::String], args).as_deref() {
            Ok([value]) => value
                .as_str()
                .map(|s| RevertReason::Generic(s.to_string()))
                .unwrap_or_else(unknown),
            _ => unknown(),
        };
    }
    if selector.0 == Panic::SELECTOR {
        return match decode(&[TypeSpec::Uint(256)], args).as_deref() {
            Ok([value]) => value.as_uint().map(RevertReason::Panic).unwrap_or_else(unknown),
            _ => unknown(),
        };
    }
    let Some(error) = schema.and_then(|s| s.error_by_selector(selector)) else {
        return unknown();
    };
    match decode(&error.inputs, args) {
        Ok(values) => RevertReason::Known {
            name: error.name.clone(),
            args: Fields::new(error.input_names.iter().cloned().zip(values).collect()),
        },
        Err(_) => unknown(),
    }
}

/// Extracts the message of a standard `Error(string)` revert payload.
pub fn revert_message(data: &[u8]) -> Option<String> {
    match decode_revert(data, None) {
        RevertReason::Generic(msg) => Some(msg),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{U256, hex};

    use super::*;
    use crate::codec::{Value, encode_call};

    #[test]
    fn test_error_string() {
        let data = Revert {
            reason: "insufficient balance".to_string(),
        }
        .abi_encode();
        assert_eq!(&data[..4], &hex!("08c379a0"));
        assert_eq!(
            decode_revert(&data, None),
            RevertReason::Generic("insufficient balance".to_string())
        );
        assert_eq!(revert_message(&data).as_deref(), Some("insufficient balance"));
    }

    #[test]
    fn test_panic() {
        let data = Panic {
            code: U256::from(0x11),
        }
        .abi_encode();
        assert_eq!(decode_revert(&data, None), RevertReason::Panic(U256::from(0x11)));
        assert_eq!(revert_message(&data), None);
    }

    #[test]
    fn test_registered_error() {
        let schema = Schema::parse(
            r#"[{"type":"error","name":"InsufficientBalance","inputs":[
                {"name":"available","type":"uint256"},{"name":"required","type":"uint256"}]}]"#,
        )
        .unwrap();
        let error = &schema.errors()[0];
        let data = encode_call(
            error.selector,
            &error.inputs,
            &[U256::from(5).into(), U256::from(7).into()],
        )
        .unwrap();
        assert_eq!(
            decode_revert(&data, Some(&schema)),
            RevertReason::Known {
                name: "InsufficientBalance".to_string(),
                args: Fields::new(vec![
                    ("available".to_string(), Value::Uint(U256::from(5))),
                    ("required".to_string(), Value::Uint(U256::from(7))),
                ]),
            }
        );
        assert!(matches!(decode_revert(&data, None), RevertReason::Unknown(_)));
    }

    #[test]
    fn test_unknown_payloads() {
        assert_eq!(decode_revert(&[], None), RevertReason::Unknown(Bytes::new()));
        assert!(matches!(
            decode_revert(&hex!("08c379a0ffff"), None),
            RevertReason::Unknown(_)
        ));
    }
}
