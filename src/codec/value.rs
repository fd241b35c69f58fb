use alloy::primitives::{Address, B256, Bytes, FixedBytes, I256, U256};

use crate::error::BindingError;

/// Typed value mirroring [`crate::schema::TypeSpec`].
///
/// Integers of every width are carried as 256-bit values and
/// range-checked against the declared width on encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Uint(U256),
    Int(I256),
    Bool(bool),
    Address(Address),
    /// Fixed byte array, its length must match the declared width.
    FixedBytes(Bytes),
    Bytes(Bytes),
    String(String),
    Tuple(Vec<Value>),
    Array(Vec<Value>),
    FixedArray(Vec<Value>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Address(_) => "address",
            Self::FixedBytes(_) => "fixed bytes",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
            Self::Tuple(_) => "tuple",
            Self::Array(_) => "array",
            Self::FixedArray(_) => "fixed array",
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Self::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<I256> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(v) => Some(*v),
            _ => None,
        }
    }

    /// Content of `bytes` and fixed byte array values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) | Self::FixedBytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_b256(&self) -> Option<B256> {
        match self {
            Self::FixedBytes(v) if v.len() == 32 => Some(B256::from_slice(v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Elements of tuples, arrays and fixed arrays.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Self::Tuple(v) | Self::Array(v) | Self::FixedArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn fixed_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self::FixedBytes(Bytes::copy_from_slice(bytes.as_ref()))
    }

    /// Converts the value into a native type, failing with
    /// [`BindingError::TypeMismatch`] on a different variant.
    pub fn to<T: FromValue>(&self) -> Result<T, BindingError> {
        T::from_value(self).ok_or_else(|| {
            BindingError::TypeMismatch(format!("expected {}, got {}", T::KIND, self.kind()))
        })
    }
}

/// Native type a decoded [`Value`] converts into.
pub trait FromValue: Sized {
    const KIND: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for U256 {
    const KIND: &'static str = "uint";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_uint()
    }
}

impl FromValue for u8 {
    const KIND: &'static str = "uint8";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_uint().and_then(|v| u8::try_from(v).ok())
    }
}

impl FromValue for u64 {
    const KIND: &'static str = "uint64";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_uint().and_then(|v| u64::try_from(v).ok())
    }
}

impl FromValue for I256 {
    const KIND: &'static str = "int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for bool {
    const KIND: &'static str = "bool";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for Address {
    const KIND: &'static str = "address";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_address()
    }
}

impl<const N: usize> FromValue for FixedBytes<N> {
    const KIND: &'static str = "fixed bytes";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::FixedBytes(v) if v.len() == N => Some(FixedBytes::from_slice(v)),
            _ => None,
        }
    }
}

impl FromValue for Bytes {
    const KIND: &'static str = "bytes";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bytes(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromValue for String {
    const KIND: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    const KIND: &'static str = "array";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(values) | Value::FixedArray(values) => {
                values.iter().map(T::from_value).collect()
            }
            _ => None,
        }
    }
}

impl From<U256> for Value {
    fn from(value: U256) -> Self {
        Self::Uint(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }
}

impl From<I256> for Value {
    fn from(value: I256) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Address> for Value {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

/// 32-byte words map to `bytes32`.
impl From<B256> for Value {
    fn from(value: B256) -> Self {
        Self::fixed_bytes(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
