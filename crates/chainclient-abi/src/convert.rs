//! Textual arguments → typed ABI values.
//!
//! Arguments arrive as strings (from a CLI or a config file) or as lists of
//! strings for array parameters. Argument lines use `^` between arguments
//! and `[a,b,c]` for lists:
//!
//! ```text
//! 0xd9c9...A3F5^[1,2,3]^hello
//! ```

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_dyn_abi::Specifier;
use alloy_json_abi::Param;

use crate::error::AbiError;
use crate::value::{parse_scalar, AbiValue};

/// One textual argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgInput {
    Single(String),
    List(Vec<ArgInput>),
}

impl ArgInput {
    /// Parse one argument token: `[a,b]` is a list, `[]` an empty list,
    /// anything else a single value.
    pub fn parse(token: &str) -> Self {
        match token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            Some("") => Self::List(Vec::new()),
            Some(inner) => Self::List(inner.split(',').map(Self::from).collect()),
            None => Self::Single(token.to_string()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Single(s) => s.clone(),
            Self::List(items) => format!(
                "[{}]",
                items.iter().map(Self::describe).collect::<Vec<_>>().join(",")
            ),
        }
    }
}

impl From<&str> for ArgInput {
    fn from(s: &str) -> Self {
        Self::Single(s.to_string())
    }
}

impl From<String> for ArgInput {
    fn from(s: String) -> Self {
        Self::Single(s)
    }
}

impl<T: Into<ArgInput>> From<Vec<T>> for ArgInput {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Split a `^`-separated argument line. An empty line has no arguments.
pub fn parse_args(line: &str) -> Vec<ArgInput> {
    if line.is_empty() {
        return Vec::new();
    }
    line.split('^').map(ArgInput::parse).collect()
}

/// Convert a textual argument into a value of type `ty`.
///
/// - fixed arrays take up to `N` items; a single string fills the first
///   slot and missing slots are converted from `""`;
/// - dynamic arrays take any number of items, a single string is a
///   one-element array;
/// - `bytesN` copies the raw characters of the string, left-aligned;
/// - tuples take one list item per component;
/// - scalars parse decimal/`0x`-hex numbers, booleans, hex addresses and
///   hex byte strings. Empty numbers are zero.
pub fn convert(ty: &DynSolType, input: &ArgInput) -> Result<DynSolValue, AbiError> {
    let type_name = || ty.sol_type_name().into_owned();

    match ty {
        DynSolType::FixedArray(elem, len) => {
            let mut items: Vec<ArgInput> = match input {
                ArgInput::Single(s) if *len >= 1 => vec![ArgInput::Single(s.clone())],
                ArgInput::Single(_) => Vec::new(),
                ArgInput::List(list) => list.iter().take(*len).cloned().collect(),
            };
            items.resize(*len, ArgInput::Single(String::new()));
            let values = items
                .iter()
                .map(|item| convert(elem, item))
                .collect::<Result<_, _>>()?;
            Ok(DynSolValue::FixedArray(values))
        }
        DynSolType::Array(elem) => {
            let values = match input {
                ArgInput::Single(_) => vec![convert(elem, input)?],
                ArgInput::List(list) => list
                    .iter()
                    .map(|item| convert(elem, item))
                    .collect::<Result<_, _>>()?,
            };
            Ok(DynSolValue::Array(values))
        }
        DynSolType::Tuple(components) => match input {
            ArgInput::List(list) if list.len() == components.len() => {
                let values = components
                    .iter()
                    .zip(list)
                    .map(|(t, item)| convert(t, item))
                    .collect::<Result<_, _>>()?;
                Ok(DynSolValue::Tuple(values))
            }
            other => Err(AbiError::conversion(
                &other.describe(),
                type_name(),
                format!("expected a list of {} items", components.len()),
            )),
        },
        DynSolType::FixedBytes(size) => match input {
            ArgInput::Single(s) => fixed_bytes(*size, s),
            ArgInput::List(_) => Err(AbiError::conversion(&input.describe(), type_name(), "expected a string")),
        },
        scalar => match input {
            ArgInput::Single(s) => parse_scalar(scalar, s).map(AbiValue::into_dyn),
            ArgInput::List(_) => Err(AbiError::conversion(&input.describe(), type_name(), "expected a string")),
        },
    }
}

/// `bytesN` from the raw characters of `s`, truncated or zero-padded on the right.
fn fixed_bytes(size: usize, s: &str) -> Result<DynSolValue, AbiError> {
    if size == 0 || size > 32 {
        return Err(AbiError::UnsupportedType(format!("bytes{size}")));
    }
    let mut word = [0u8; 32];
    let raw = s.as_bytes();
    let n = raw.len().min(size);
    word[..n].copy_from_slice(&raw[..n]);
    Ok(DynSolValue::FixedBytes(word.into(), size))
}

/// Convenience: `convert_str("uint8[]", "[1,2,3]")`.
pub fn convert_str(ty: &str, value: &str) -> Result<DynSolValue, AbiError> {
    let parsed = DynSolType::parse(ty).map_err(|e| AbiError::UnsupportedType(format!("{ty}: {e}")))?;
    convert(&parsed, &ArgInput::parse(value))
}

/// Convert positional textual arguments for a parameter list.
///
/// Fails if fewer arguments than parameters are given; extra arguments are
/// ignored.
pub fn typed_params(
    label: &str,
    params: &[Param],
    args: &[ArgInput],
) -> Result<Vec<DynSolValue>, AbiError> {
    if params.len() > args.len() {
        return Err(AbiError::ArgCount {
            method: label.to_string(),
            expected: params.len(),
            got: args.len(),
        });
    }
    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param
                .resolve()
                .map_err(|e| AbiError::InvalidAbi(format!("{}: {e}", param.ty)))?;
            convert(&ty, arg)
        })
        .collect()
}
