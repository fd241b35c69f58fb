use std::{fmt, str::FromStr};

use itertools::Itertools;

use super::document::ParamDoc;
use crate::error::BindingError;

/// Type of a parameter in the calling convention.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeSpec {
    /// Unsigned integer of the given bit width (8..=256, multiple of 8).
    Uint(usize),
    /// Signed integer of the given bit width (8..=256, multiple of 8).
    Int(usize),
    Bool,
    Address,
    /// Fixed byte array of the given width (1..=32).
    FixedBytes(usize),
    Bytes,
    String,
    Tuple(Vec<TypeSpec>),
    Array(Box<TypeSpec>),
    FixedArray(Box<TypeSpec>, usize),
}

impl TypeSpec {
    /// Whether the encoding of the type has variable size and lives in the tail.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes | Self::String | Self::Array(_) => true,
            Self::FixedArray(inner, _) => inner.is_dynamic(),
            Self::Tuple(types) => types.iter().any(Self::is_dynamic),
            _ => false,
        }
    }

    /// Whether the type is a value type, i.e. carried verbatim
    /// when used as an indexed event field.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            Self::Uint(_) | Self::Int(_) | Self::Bool | Self::Address | Self::FixedBytes(_)
        )
    }

    /// Number of bytes the type occupies in the head of the enclosing tuple.
    pub fn head_len(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            Self::FixedArray(inner, len) => inner.head_len() * len,
            Self::Tuple(types) => types.iter().map(Self::head_len).sum(),
            _ => 32,
        }
    }

    /// Canonical type name as used in signatures.
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Parses a JSON schema parameter, resolving `tuple` against its components.
    pub(crate) fn from_param(param: &ParamDoc) -> Result<Self, BindingError> {
        let ty = param.ty.trim();
        let (base, suffixes) = split_array_suffixes(ty)?;
        let base = if base == "tuple" {
            let components = param.components.as_deref().ok_or_else(|| {
                BindingError::SchemaInvalid(format!("tuple `{}` without components", param.name))
            })?;
            Self::Tuple(
                components
                    .iter()
                    .map(Self::from_param)
                    .collect::<Result<_, _>>()?,
            )
        } else {
            parse_base(base)?
        };
        Ok(wrap_arrays(base, &suffixes))
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Int(bits) => write!(f, "int{bits}"),
            Self::Bool => write!(f, "bool"),
            Self::Address => write!(f, "address"),
            Self::FixedBytes(len) => write!(f, "bytes{len}"),
            Self::Bytes => write!(f, "bytes"),
            Self::String => write!(f, "string"),
            Self::Tuple(types) => write!(f, "({})", types.iter().join(",")),
            Self::Array(inner) => write!(f, "{inner}[]"),
            Self::FixedArray(inner, len) => write!(f, "{inner}[{len}]"),
        }
    }
}

/// Parses the textual notation, tuples written as `(t1,t2,...)`.
impl FromStr for TypeSpec {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (base, suffixes) = split_array_suffixes(s)?;
        let base = if let Some(inner) = base.strip_prefix('(') {
            let inner = inner
                .strip_suffix(')')
                .ok_or_else(|| invalid(format!("malformed nesting in `{s}`")))?;
            Self::Tuple(
                split_top_level(inner)?
                    .into_iter()
                    .map(Self::from_str)
                    .collect::<Result<_, _>>()?,
            )
        } else {
            parse_base(base)?
        };
        Ok(wrap_arrays(base, &suffixes))
    }
}

fn invalid(msg: String) -> BindingError {
    BindingError::SchemaInvalid(msg)
}

fn parse_base(s: &str) -> Result<TypeSpec, BindingError> {
    match s {
        "address" => return Ok(TypeSpec::Address),
        "bool" => return Ok(TypeSpec::Bool),
        "string" => return Ok(TypeSpec::String),
        "bytes" => return Ok(TypeSpec::Bytes),
        "uint" => return Ok(TypeSpec::Uint(256)),
        "int" => return Ok(TypeSpec::Int(256)),
        _ => {}
    }
    let width = |digits: &str| -> Option<usize> {
        (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .then(|| digits.parse().ok())
            .flatten()
    };
    if let Some(bits) = s.strip_prefix("uint").and_then(width) {
        return int_width(bits, s).map(TypeSpec::Uint);
    }
    if let Some(bits) = s.strip_prefix("int").and_then(width) {
        return int_width(bits, s).map(TypeSpec::Int);
    }
    if let Some(len) = s.strip_prefix("bytes").and_then(width) {
        if (1..=32).contains(&len) {
            return Ok(TypeSpec::FixedBytes(len));
        }
        return Err(invalid(format!("invalid fixed bytes width in `{s}`")));
    }
    Err(invalid(format!("unknown type `{s}`")))
}

fn int_width(bits: usize, s: &str) -> Result<usize, BindingError> {
    if bits > 0 && bits <= 256 && bits % 8 == 0 {
        Ok(bits)
    } else {
        Err(invalid(format!("invalid integer width in `{s}`")))
    }
}

/// Splits `T[2][]` into `T` and the array suffixes, innermost first.
fn split_array_suffixes(s: &str) -> Result<(&str, Vec<Option<usize>>), BindingError> {
    let mut suffixes = vec![];
    let mut rest = s;
    while let Some(stripped) = rest.strip_suffix(']') {
        let open = stripped
            .rfind('[')
            .ok_or_else(|| invalid(format!("malformed nesting in `{s}`")))?;
        let len = &stripped[open + 1..];
        if len.is_empty() {
            suffixes.push(None);
        } else {
            let len: usize = len
                .parse()
                .map_err(|_| invalid(format!("invalid array length in `{s}`")))?;
            if len == 0 {
                return Err(invalid(format!("zero-length array in `{s}`")));
            }
            suffixes.push(Some(len));
        }
        rest = &stripped[..open];
    }
    let is_tuple = rest.starts_with('(');
    if rest.is_empty() || (!is_tuple && (rest.contains('[') || rest.contains(']'))) {
        return Err(invalid(format!("malformed nesting in `{s}`")));
    }
    suffixes.reverse();
    Ok((rest, suffixes))
}

fn wrap_arrays(base: TypeSpec, suffixes: &[Option<usize>]) -> TypeSpec {
    suffixes.iter().fold(base, |inner, suffix| match suffix {
        Some(len) => TypeSpec::FixedArray(Box::new(inner), *len),
        None => TypeSpec::Array(Box::new(inner)),
    })
}

/// Splits tuple components on commas that are not nested in parentheses.
fn split_top_level(s: &str) -> Result<Vec<&str>, BindingError> {
    if s.trim().is_empty() {
        return Ok(vec![]);
    }
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| invalid(format!("malformed nesting in `({s})`")))?;
            }
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(invalid(format!("malformed nesting in `({s})`")));
    }
    parts.push(&s[start..]);
    Ok(parts)
}
