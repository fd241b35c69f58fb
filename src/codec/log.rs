use alloy::primitives::{B256, Bytes};

use super::{decode, decode_topic, encode, encode_topic};
use crate::{error::BindingError, schema::EventSpec, types::Fields};

/// Decodes the fields of `event` from the log topics and data.
pub fn decode_log(event: &EventSpec, topics: &[B256], data: &[u8]) -> Result<Fields, BindingError> {
    let first = event.first_indexed_topic();
    if !event.anonymous && topics.first() != Some(&event.topic0) {
        return Err(BindingError::malformed(format!(
            "log topic-0 does not match event {}",
            event.signature
        )));
    }
    let expected = first + event.indexed().count();
    if topics.len() != expected {
        return Err(BindingError::malformed(format!(
            "event {} expects {expected} topics, got {}",
            event.signature,
            topics.len()
        )));
    }

    let mut indexed = topics[first..].iter();
    let mut non_indexed = decode(event.data_types(), data)?.into_iter();
    let mut fields = Vec::with_capacity(event.fields.len());
    for field in &event.fields {
        // Lengths were checked against the event layout above.
        let value = if field.indexed {
            indexed.next().map(|topic| decode_topic(&field.ty, topic))
        } else {
            non_indexed.next().map(Ok)
        };
        let value = value.ok_or_else(|| BindingError::malformed("event layout mismatch"))??;
        fields.push((field.name.clone(), value));
    }
    Ok(Fields::new(fields))
}

/// Encodes field values of `event` into log topics and data,
/// the way the contract emits them.
pub fn encode_log(
    event: &EventSpec,
    values: &[super::Value],
) -> Result<(Vec<B256>, Bytes), BindingError> {
    if values.len() != event.fields.len() {
        return Err(BindingError::ArityMismatch {
            name: event.name.clone(),
            expected: event.fields.len(),
            got: values.len(),
        });
    }
    let mut topics = vec![];
    if !event.anonymous {
        topics.push(event.topic0);
    }
    let mut data_values = vec![];
    for (field, value) in event.fields.iter().zip(values) {
        if field.indexed {
            topics.push(encode_topic(&field.ty, value)?);
        } else {
            data_values.push(value.clone());
        }
    }
    let data = encode(event.data_types(), &data_values)?;
    Ok((topics, data.into()))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{U256, address, keccak256};

    use super::*;
    use crate::{codec::Value, schema::Schema};

    fn schema() -> Schema {
        Schema::parse(
            r#"[{"type":"event","name":"Transfer","inputs":[
                    {"name":"from","type":"address","indexed":true},
                    {"name":"to","type":"address","indexed":true},
                    {"name":"value","type":"uint256","indexed":false}]},
                {"type":"event","name":"DocumentUpdated","inputs":[
                    {"name":"_name","type":"bytes32","indexed":true},
                    {"name":"_uri","type":"string","indexed":false},
                    {"name":"_documentHash","type":"bytes32","indexed":false}]},
                {"type":"event","name":"Tagged","inputs":[
                    {"name":"tag","type":"string","indexed":true},
                    {"name":"seq","type":"uint64","indexed":false}]}]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_decode_transfer() {
        let schema = schema();
        let event = schema.event("Transfer").unwrap();
        let from = address!("0x000000000000000000000000000000000000000a");
        let to = address!("0x000000000000000000000000000000000000000b");
        let topics = vec![event.topic0, from.into_word(), to.into_word()];
        let data = U256::from(42).to_be_bytes::<32>();

        let fields = decode_log(event, &topics, &data).unwrap();
        assert_eq!(fields.get("from"), Some(&Value::Address(from)));
        assert_eq!(fields.get("to"), Some(&Value::Address(to)));
        assert_eq!(fields.get("value"), Some(&Value::Uint(U256::from(42))));
        assert_eq!(
            fields.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            vec!["from", "to", "value"]
        );
    }

    #[test]
    fn test_decode_rejects_foreign_logs() {
        let schema = schema();
        let event = schema.event("Transfer").unwrap();
        let data = U256::from(42).to_be_bytes::<32>();

        let foreign = vec![B256::repeat_byte(1), B256::ZERO, B256::ZERO];
        assert!(matches!(
            decode_log(event, &foreign, &data),
            Err(BindingError::CodecMalformed(_))
        ));
        let short = vec![event.topic0, B256::ZERO];
        assert!(matches!(
            decode_log(event, &short, &data),
            Err(BindingError::CodecMalformed(_))
        ));
        let topics = vec![event.topic0, B256::ZERO, B256::ZERO];
        assert!(matches!(
            decode_log(event, &topics, &data[..16]),
            Err(BindingError::CodecMalformed(_))
        ));
    }

    #[test]
    fn test_encode_decode_mixed_layout() {
        let schema = schema();
        let event = schema.event("DocumentUpdated").unwrap();
        let values = vec![
            Value::fixed_bytes(B256::repeat_byte(0xd0)),
            "ipfs://prospectus".into(),
            Value::fixed_bytes(keccak256("prospectus")),
        ];
        let (topics, data) = encode_log(event, &values).unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[1], B256::repeat_byte(0xd0));
        let fields = decode_log(event, &topics, &data).unwrap();
        assert_eq!(fields.values().cloned().collect::<Vec<_>>(), values);
    }

    #[test]
    fn test_indexed_string_is_hashed() {
        let schema = schema();
        let event = schema.event("Tagged").unwrap();
        let (topics, data) = encode_log(event, &["series-a".into(), 7u64.into()]).unwrap();
        assert_eq!(topics[1], keccak256("series-a"));
        let fields = decode_log(event, &topics, &data).unwrap();
        assert_eq!(fields.get("tag"), Some(&Value::fixed_bytes(keccak256("series-a"))));
        assert_eq!(fields.get("seq"), Some(&Value::Uint(U256::from(7))));
    }
}
