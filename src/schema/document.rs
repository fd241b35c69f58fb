//! Serde model of the JSON schema document.

use serde::Deserialize;

/// Either a bare entry list or a compiler artifact carrying it under `abi`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Document {
    Entries(Vec<EntryDoc>),
    Artifact { abi: Vec<EntryDoc> },
}

impl Document {
    pub(crate) fn into_entries(self) -> Vec<EntryDoc> {
        match self {
            Self::Entries(entries) => entries,
            Self::Artifact { abi } => abi,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EntryDoc {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<ParamDoc>,
    #[serde(default)]
    pub outputs: Vec<ParamDoc>,
    pub state_mutability: Option<String>,
    /// Pre-0.5 compilers, superseded by `stateMutability`.
    pub constant: Option<bool>,
    pub payable: Option<bool>,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParamDoc {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub indexed: bool,
    pub components: Option<Vec<ParamDoc>>,
}

fn default_kind() -> String {
    "function".to_string()
}
