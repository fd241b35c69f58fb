//! Contract schema: methods, events, errors and constructor of a contract,
//! parsed once from the JSON schema document and immutable afterwards.
//!
//! Selectors and event topics are derived from canonical signatures at parse time,
//! see [`crate::codec::selector`] and [`crate::codec::topic0`].

mod document;
mod types;

use std::collections::{HashMap, hash_map::Entry};

use alloy::primitives::{B256, Selector};

use crate::{codec, error::BindingError};
use document::{Document, EntryDoc, ParamDoc};

pub use types::TypeSpec;

/// State mutability of a method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

impl Mutability {
    /// Whether the method can not change the contract state.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Pure | Self::View)
    }

    fn parse(entry: &EntryDoc) -> Result<Self, BindingError> {
        match entry.state_mutability.as_deref() {
            Some("pure") => Ok(Self::Pure),
            Some("view") => Ok(Self::View),
            Some("nonpayable") => Ok(Self::NonPayable),
            Some("payable") => Ok(Self::Payable),
            Some(other) => Err(BindingError::SchemaInvalid(format!(
                "unknown state mutability `{other}`"
            ))),
            None if entry.constant == Some(true) => Ok(Self::View),
            None if entry.payable == Some(true) => Ok(Self::Payable),
            None => Ok(Self::NonPayable),
        }
    }
}

/// Public method of the contract.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSpec {
    pub name: String,
    pub signature: String,
    pub selector: Selector,
    pub inputs: Vec<TypeSpec>,
    pub input_names: Vec<String>,
    pub outputs: Vec<TypeSpec>,
    pub output_names: Vec<String>,
    pub mutability: Mutability,
}

/// Event field along with its indexing flag.
#[derive(Clone, Debug, PartialEq)]
pub struct EventField {
    pub name: String,
    pub ty: TypeSpec,
    pub indexed: bool,
}

/// Event emitted by the contract.
#[derive(Clone, Debug, PartialEq)]
pub struct EventSpec {
    pub name: String,
    pub signature: String,
    pub topic0: B256,
    pub anonymous: bool,
    pub fields: Vec<EventField>,
    data_types: Vec<TypeSpec>,
}

impl EventSpec {
    /// Indexed fields in declaration order.
    pub fn indexed(&self) -> impl Iterator<Item = &EventField> {
        self.fields.iter().filter(|f| f.indexed)
    }

    /// Types of non-indexed fields, forming the tuple carried in the log data.
    pub fn data_types(&self) -> &[TypeSpec] {
        &self.data_types
    }

    /// Index of the first topic slot carrying an indexed field.
    pub fn first_indexed_topic(&self) -> usize {
        if self.anonymous { 0 } else { 1 }
    }
}

/// Custom error the contract may revert with.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorSpec {
    pub name: String,
    pub signature: String,
    pub selector: Selector,
    pub inputs: Vec<TypeSpec>,
    pub input_names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstructorSpec {
    pub inputs: Vec<TypeSpec>,
    pub input_names: Vec<String>,
    pub mutability: Mutability,
}

/// Parsed public surface of a contract.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    methods: Vec<MethodSpec>,
    events: Vec<EventSpec>,
    errors: Vec<ErrorSpec>,
    constructor: Option<ConstructorSpec>,
    has_fallback: bool,
    has_receive: bool,
    method_index: HashMap<String, usize>,
    event_index: HashMap<String, usize>,
    selector_index: HashMap<Selector, usize>,
    topic_index: HashMap<B256, usize>,
}

impl Schema {
    /// Parses the JSON schema document: either an array of entries
    /// or a compiler artifact holding it under `abi`.
    pub fn parse(json: &str) -> Result<Self, BindingError> {
        let document: Document = serde_json::from_str(json)?;
        let mut schema = Self::default();
        for entry in document.into_entries() {
            schema.add_entry(entry)?;
        }
        Ok(schema)
    }

    fn add_entry(&mut self, entry: EntryDoc) -> Result<(), BindingError> {
        match entry.kind.as_str() {
            "function" => {
                let name = required_name(&entry)?;
                let (inputs, input_names) = params(&entry.inputs)?;
                let (outputs, output_names) = params(&entry.outputs)?;
                let signature = codec::signature(&name, &inputs);
                let method = MethodSpec {
                    selector: codec::selector(&signature),
                    signature,
                    inputs,
                    input_names,
                    outputs,
                    output_names,
                    mutability: Mutability::parse(&entry)?,
                    name,
                };
                self.check_unique(&method.name)?;
                let idx = self.methods.len();
                if self.selector_index.insert(method.selector, idx).is_some() {
                    return Err(BindingError::SchemaInvalid(format!(
                        "selector collision at `{}`",
                        method.signature
                    )));
                }
                self.method_index.insert(method.name.clone(), idx);
                self.methods.push(method);
            }
            "event" => {
                let name = required_name(&entry)?;
                let fields = entry
                    .inputs
                    .iter()
                    .map(|p| {
                        Ok(EventField {
                            name: p.name.clone(),
                            ty: TypeSpec::from_param(p)?,
                            indexed: p.indexed,
                        })
                    })
                    .collect::<Result<Vec<_>, BindingError>>()?;
                let max_indexed = if entry.anonymous { 4 } else { 3 };
                if fields.iter().filter(|f| f.indexed).count() > max_indexed {
                    return Err(BindingError::SchemaInvalid(format!(
                        "event `{name}` has more than {max_indexed} indexed fields"
                    )));
                }
                let types: Vec<_> = fields.iter().map(|f| f.ty.clone()).collect();
                let signature = codec::signature(&name, &types);
                let event = EventSpec {
                    topic0: codec::topic0(&signature),
                    signature,
                    anonymous: entry.anonymous,
                    data_types: fields
                        .iter()
                        .filter(|f| !f.indexed)
                        .map(|f| f.ty.clone())
                        .collect(),
                    fields,
                    name,
                };
                self.check_unique(&event.name)?;
                let idx = self.events.len();
                if !event.anonymous {
                    self.topic_index.insert(event.topic0, idx);
                }
                self.event_index.insert(event.name.clone(), idx);
                self.events.push(event);
            }
            "error" => {
                let name = required_name(&entry)?;
                let (inputs, input_names) = params(&entry.inputs)?;
                let signature = codec::signature(&name, &inputs);
                if self.errors.iter().any(|e| e.name == name) {
                    return Err(BindingError::SchemaInvalid(format!(
                        "duplicate error `{name}`"
                    )));
                }
                self.errors.push(ErrorSpec {
                    selector: codec::selector(&signature),
                    signature,
                    inputs,
                    input_names,
                    name,
                });
            }
            "constructor" => {
                if self.constructor.is_some() {
                    return Err(BindingError::SchemaInvalid(
                        "duplicate constructor".to_string(),
                    ));
                }
                let (inputs, input_names) = params(&entry.inputs)?;
                self.constructor = Some(ConstructorSpec {
                    inputs,
                    input_names,
                    mutability: Mutability::parse(&entry)?,
                });
            }
            "fallback" => self.has_fallback = true,
            "receive" => self.has_receive = true,
            other => {
                return Err(BindingError::SchemaInvalid(format!(
                    "unknown entry type `{other}`"
                )));
            }
        }
        Ok(())
    }

    /// Method and event names share one namespace.
    fn check_unique(&self, name: &str) -> Result<(), BindingError> {
        if self.method_index.contains_key(name) || self.event_index.contains_key(name) {
            return Err(BindingError::SchemaInvalid(format!(
                "name collision at `{name}`"
            )));
        }
        Ok(())
    }

    pub fn method(&self, name: &str) -> Result<&MethodSpec, BindingError> {
        self.method_index
            .get(name)
            .map(|idx| &self.methods[*idx])
            .ok_or_else(|| BindingError::UnknownMethod(name.to_string()))
    }

    pub fn method_by_selector(&self, selector: Selector) -> Option<&MethodSpec> {
        self.selector_index.get(&selector).map(|idx| &self.methods[*idx])
    }

    pub fn event(&self, name: &str) -> Result<&EventSpec, BindingError> {
        self.event_index
            .get(name)
            .map(|idx| &self.events[*idx])
            .ok_or_else(|| BindingError::UnknownEvent(name.to_string()))
    }

    pub fn event_by_topic(&self, topic0: &B256) -> Option<&EventSpec> {
        self.topic_index.get(topic0).map(|idx| &self.events[*idx])
    }

    pub fn error_by_selector(&self, selector: Selector) -> Option<&ErrorSpec> {
        self.errors.iter().find(|e| e.selector == selector)
    }

    pub fn methods(&self) -> &[MethodSpec] {
        &self.methods
    }

    pub fn events(&self) -> &[EventSpec] {
        &self.events
    }

    pub fn errors(&self) -> &[ErrorSpec] {
        &self.errors
    }

    pub fn constructor(&self) -> Option<&ConstructorSpec> {
        self.constructor.as_ref()
    }

    /// Whether the contract accepts plain value transfers.
    pub fn accepts_value(&self) -> bool {
        self.has_receive || self.has_fallback
    }
}

fn required_name(entry: &EntryDoc) -> Result<String, BindingError> {
    match entry.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(BindingError::SchemaInvalid(format!(
            "{} without a name",
            entry.kind
        ))),
    }
}

fn params(params: &[ParamDoc]) -> Result<(Vec<TypeSpec>, Vec<String>), BindingError> {
    let mut types = Vec::with_capacity(params.len());
    let mut names = Vec::with_capacity(params.len());
    let mut seen = HashMap::new();
    for (i, p) in params.iter().enumerate() {
        types.push(TypeSpec::from_param(p)?);
        // Unnamed parameters are addressed by position.
        let name = if p.name.is_empty() {
            format!("_{i}")
        } else {
            p.name.clone()
        };
        match seen.entry(name.clone()) {
            Entry::Occupied(_) => {
                return Err(BindingError::SchemaInvalid(format!(
                    "duplicate parameter `{name}`"
                )));
            }
            Entry::Vacant(v) => {
                v.insert(i);
            }
        }
        names.push(name);
    }
    Ok((types, names))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{b256, hex};

    use super::*;

    const ERC20: &str = r#"[
        {"type":"function","name":"balanceOf","stateMutability":"view",
         "inputs":[{"name":"owner","type":"address"}],
         "outputs":[{"name":"","type":"uint256"}]},
        {"type":"function","name":"transfer","stateMutability":"nonpayable",
         "inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}]},
        {"type":"event","name":"Transfer","anonymous":false,"inputs":[
         {"name":"from","type":"address","indexed":true},
         {"name":"to","type":"address","indexed":true},
         {"name":"value","type":"uint256","indexed":false}]},
        {"type":"constructor","stateMutability":"nonpayable",
         "inputs":[{"name":"supply","type":"uint256"}]},
        {"type":"error","name":"InsufficientBalance",
         "inputs":[{"name":"available","type":"uint256"},{"name":"required","type":"uint256"}]}
    ]"#;

    #[test]
    fn test_parse_erc20() {
        let schema = Schema::parse(ERC20).unwrap();

        let transfer = schema.method("transfer").unwrap();
        assert_eq!(transfer.signature, "transfer(address,uint256)");
        assert_eq!(transfer.selector, Selector::from(hex!("a9059cbb")));
        assert_eq!(transfer.mutability, Mutability::NonPayable);
        assert_eq!(transfer.outputs, vec![TypeSpec::Bool]);
        assert_eq!(
            schema.method_by_selector(Selector::from(hex!("a9059cbb"))),
            Some(transfer)
        );

        let balance_of = schema.method("balanceOf").unwrap();
        assert_eq!(balance_of.selector, Selector::from(hex!("70a08231")));
        assert!(balance_of.mutability.is_read_only());
        assert_eq!(balance_of.output_names, vec!["_0".to_string()]);

        let event = schema.event("Transfer").unwrap();
        assert_eq!(event.signature, "Transfer(address,address,uint256)");
        assert_eq!(
            event.topic0,
            b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
        );
        assert_eq!(event.indexed().count(), 2);
        assert_eq!(event.data_types(), &[TypeSpec::Uint(256)]);
        assert_eq!(schema.event_by_topic(&event.topic0), Some(event));

        assert_eq!(
            schema.constructor().unwrap().inputs,
            vec![TypeSpec::Uint(256)]
        );
        assert_eq!(schema.errors()[0].signature, "InsufficientBalance(uint256,uint256)");
        assert!(!schema.accepts_value());
    }

    #[test]
    fn test_parse_tuple_components() {
        let schema = Schema::parse(
            r#"[{"type":"function","name":"submit","stateMutability":"nonpayable",
                 "inputs":[{"name":"orders","type":"tuple[]","components":[
                    {"name":"id","type":"uint64"},
                    {"name":"legs","type":"tuple[2]","components":[
                        {"name":"asset","type":"address"},{"name":"amount","type":"int256"}]}]}],
                 "outputs":[]}]"#,
        )
        .unwrap();
        assert_eq!(
            schema.method("submit").unwrap().signature,
            "submit((uint64,(address,int256)[2])[])"
        );
    }

    #[test]
    fn test_artifact_and_legacy_mutability() {
        let schema = Schema::parse(
            r#"{"abi":[{"type":"function","name":"total","constant":true,"inputs":[],
                        "outputs":[{"name":"","type":"uint"}]},
                       {"type":"fallback","payable":true}],
                "bytecode":"0x00"}"#,
        )
        .unwrap();
        let total = schema.method("total").unwrap();
        assert_eq!(total.mutability, Mutability::View);
        assert_eq!(total.signature, "total()");
        assert_eq!(total.outputs, vec![TypeSpec::Uint(256)]);
        assert!(schema.accepts_value());
    }

    #[test]
    fn test_invalid_schemas() {
        for doc in [
            "not json",
            r#"[{"type":"function","name":"f","inputs":[{"name":"a","type":"uint7"}],"outputs":[]}]"#,
            r#"[{"type":"function","name":"f","inputs":[{"name":"a","type":"tuple"}],"outputs":[]}]"#,
            r#"[{"type":"function","name":"f","inputs":[{"name":"a","type":"uint256[[]"}],"outputs":[]}]"#,
            r#"[{"type":"function","name":"f","inputs":[],"outputs":[]},
                {"type":"function","name":"f","inputs":[{"name":"a","type":"bool"}],"outputs":[]}]"#,
            r#"[{"type":"function","name":"f","inputs":[],"outputs":[]},
                {"type":"event","name":"f","inputs":[]}]"#,
            r#"[{"type":"event","name":"E","inputs":[
                {"name":"a","type":"bool","indexed":true},{"name":"b","type":"bool","indexed":true},
                {"name":"c","type":"bool","indexed":true},{"name":"d","type":"bool","indexed":true}]}]"#,
            r#"[{"type":"function","inputs":[],"outputs":[]}]"#,
            r#"[{"type":"modifier","name":"m"}]"#,
            r#"[{"type":"function","name":"f","stateMutability":"sometimes","inputs":[],"outputs":[]}]"#,
        ] {
            assert!(
                matches!(Schema::parse(doc), Err(BindingError::SchemaInvalid(_))),
                "{doc} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_names() {
        let schema = Schema::parse(ERC20).unwrap();
        assert_eq!(
            schema.method("mint"),
            Err(BindingError::UnknownMethod("mint".to_string()))
        );
        assert_eq!(
            schema.event("Mint"),
            Err(BindingError::UnknownEvent("Mint".to_string()))
        );
    }
}
