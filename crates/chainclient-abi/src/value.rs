//! Field types and dynamically typed ABI values.
//!
//! [`FieldType`] mirrors alloy's `DynSolType`, except that tuples are
//! replaced by named [`StructDescriptor`]s. [`AbiValue`] is the matching
//! value type; struct values are [`StructInstance`]s so field names survive
//! decoding.

use std::fmt;
use std::sync::Arc;

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_json_abi::Param;
use alloy_primitives::{Address, B256, I256, U256};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::builder::{StructBuilder, StructDescriptor, StructInstance};
use crate::error::AbiError;

/// Type of one struct field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// A leaf Solidity type (never an array or tuple).
    Sol(DynSolType),
    Array(Box<FieldType>),
    FixedArray(Box<FieldType>, usize),
    Struct(Arc<StructDescriptor>),
}

impl FieldType {
    /// Build the field type of an ABI parameter, turning tuple components
    /// into nested descriptors.
    pub fn from_param(param: &Param) -> Result<Self, AbiError> {
        Self::from_parts(&param.ty, &param.components)
    }

    pub(crate) fn from_parts(ty: &str, components: &[Param]) -> Result<Self, AbiError> {
        if let Some(suffix) = ty.strip_prefix("tuple") {
            let nested = StructDescriptor::from_params(components)?;
            return wrap_dimensions(Self::Struct(Arc::new(nested)), suffix, ty);
        }
        let parsed = DynSolType::parse(ty)
            .map_err(|e| AbiError::InvalidAbi(format!("bad type `{ty}`: {e}")))?;
        Ok(Self::from_dyn(&parsed))
    }

    /// Convert an unnamed alloy type. Tuple components are named `Arg0`, `Arg1`, ...
    pub fn from_dyn(ty: &DynSolType) -> Self {
        match ty {
            DynSolType::Array(inner) => Self::Array(Box::new(Self::from_dyn(inner))),
            DynSolType::FixedArray(inner, len) => {
                Self::FixedArray(Box::new(Self::from_dyn(inner)), *len)
            }
            DynSolType::Tuple(types) => {
                let mut builder = StructBuilder::new();
                for (i, t) in types.iter().enumerate() {
                    builder.add_field(format!("Arg{i}"), Self::from_dyn(t), None);
                }
                Self::Struct(Arc::new(builder.build()))
            }
            other => Self::Sol(other.clone()),
        }
    }

    /// The alloy type used for encoding and decoding.
    pub fn to_dyn(&self) -> DynSolType {
        match self {
            Self::Sol(t) => t.clone(),
            Self::Array(inner) => DynSolType::Array(Box::new(inner.to_dyn())),
            Self::FixedArray(inner, len) => DynSolType::FixedArray(Box::new(inner.to_dyn()), *len),
            Self::Struct(desc) => desc.tuple_type(),
        }
    }

    /// Canonical Solidity spelling, e.g. `(uint256,address)[]`.
    pub fn type_name(&self) -> String {
        self.to_dyn().sol_type_name().into_owned()
    }
}

/// Apply `[N]` / `[]` suffixes left to right: `tuple[2][]` is a dynamic
/// array of two-element arrays.
fn wrap_dimensions(mut base: FieldType, mut rest: &str, full: &str) -> Result<FieldType, AbiError> {
    while !rest.is_empty() {
        let close = rest
            .strip_prefix('[')
            .and_then(|r| r.find(']').map(|i| i + 1))
            .ok_or_else(|| AbiError::InvalidAbi(format!("bad type `{full}`")))?;
        let inner = &rest[1..close];
        base = if inner.is_empty() {
            FieldType::Array(Box::new(base))
        } else {
            let len = inner
                .parse::<usize>()
                .map_err(|_| AbiError::InvalidAbi(format!("bad array size in `{full}`")))?;
            FieldType::FixedArray(Box::new(base), len)
        };
        rest = &rest[close + 1..];
    }
    Ok(base)
}

/// A decoded (or to-be-encoded) ABI value.
#[derive(Debug, Clone, PartialEq)]
pub enum AbiValue {
    Bool(bool),
    Int(I256, usize),
    Uint(U256, usize),
    Address(Address),
    /// Left-aligned word plus the declared size in bytes.
    FixedBytes(B256, usize),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
    FixedArray(Vec<AbiValue>),
    Struct(StructInstance),
}

impl AbiValue {
    /// Zero value of `ty`: `0`, `false`, the zero address, empty
    /// collections, zero-filled fixed arrays and structs.
    pub fn zero(ty: &FieldType) -> Self {
        match ty {
            FieldType::Sol(t) => match t {
                DynSolType::Bool => Self::Bool(false),
                DynSolType::Int(bits) => Self::Int(I256::ZERO, *bits),
                DynSolType::Uint(bits) => Self::Uint(U256::ZERO, *bits),
                DynSolType::Address => Self::Address(Address::ZERO),
                DynSolType::FixedBytes(size) => Self::FixedBytes(B256::ZERO, *size),
                DynSolType::String => Self::String(String::new()),
                _ => Self::Bytes(Vec::new()),
            },
            FieldType::Array(_) => Self::Array(Vec::new()),
            FieldType::FixedArray(inner, len) => {
                Self::FixedArray((0..*len).map(|_| Self::zero(inner)).collect())
            }
            FieldType::Struct(desc) => Self::Struct(desc.new_instance()),
        }
    }

    /// Returns `true` if this value can be stored in a field of type `ty`.
    pub fn conforms_to(&self, ty: &FieldType) -> bool {
        match (self, ty) {
            (Self::Bool(_), FieldType::Sol(DynSolType::Bool)) => true,
            (Self::Int(_, bits), FieldType::Sol(DynSolType::Int(want))) => bits == want,
            (Self::Uint(_, bits), FieldType::Sol(DynSolType::Uint(want))) => bits == want,
            (Self::Address(_), FieldType::Sol(DynSolType::Address)) => true,
            (Self::FixedBytes(_, size), FieldType::Sol(DynSolType::FixedBytes(want))) => {
                size == want
            }
            (Self::Bytes(_), FieldType::Sol(DynSolType::Bytes)) => true,
            (Self::String(_), FieldType::Sol(DynSolType::String)) => true,
            (Self::Array(items), FieldType::Array(inner)) => {
                items.iter().all(|v| v.conforms_to(inner))
            }
            (Self::FixedArray(items), FieldType::FixedArray(inner, len)) => {
                items.len() == *len && items.iter().all(|v| v.conforms_to(inner))
            }
            (Self::Struct(instance), FieldType::Struct(desc)) => {
                Arc::ptr_eq(instance.descriptor(), desc) || **instance.descriptor() == **desc
            }
            _ => false,
        }
    }

    /// Attach names to a decoded alloy value.
    pub fn from_dyn(value: DynSolValue, ty: &FieldType) -> Result<Self, AbiError> {
        let mismatch = || AbiError::Decode(format!("decoded value does not match {}", ty.type_name()));
        Ok(match (value, ty) {
            (DynSolValue::Tuple(values), FieldType::Struct(desc)) => {
                Self::Struct(StructInstance::from_values(desc, values)?)
            }
            (DynSolValue::Array(values), FieldType::Array(inner)) => Self::Array(
                values
                    .into_iter()
                    .map(|v| Self::from_dyn(v, inner))
                    .collect::<Result<_, _>>()?,
            ),
            (DynSolValue::FixedArray(values), FieldType::FixedArray(inner, _)) => Self::FixedArray(
                values
                    .into_iter()
                    .map(|v| Self::from_dyn(v, inner))
                    .collect::<Result<_, _>>()?,
            ),
            (DynSolValue::Bool(b), FieldType::Sol(_)) => Self::Bool(b),
            (DynSolValue::Int(i, bits), FieldType::Sol(_)) => Self::Int(i, bits),
            (DynSolValue::Uint(u, bits), FieldType::Sol(_)) => Self::Uint(u, bits),
            (DynSolValue::Address(a), FieldType::Sol(_)) => Self::Address(a),
            (DynSolValue::FixedBytes(word, size), FieldType::Sol(_)) => Self::FixedBytes(word, size),
            (DynSolValue::Bytes(b), FieldType::Sol(_)) => Self::Bytes(b),
            (DynSolValue::String(s), FieldType::Sol(_)) => Self::String(s),
            _ => return Err(mismatch()),
        })
    }

    /// Convert back into an alloy value for encoding.
    pub fn into_dyn(self) -> DynSolValue {
        match self {
            Self::Bool(b) => DynSolValue::Bool(b),
            Self::Int(i, bits) => DynSolValue::Int(i, bits),
            Self::Uint(u, bits) => DynSolValue::Uint(u, bits),
            Self::Address(a) => DynSolValue::Address(a),
            Self::FixedBytes(word, size) => DynSolValue::FixedBytes(word, size),
            Self::Bytes(b) => DynSolValue::Bytes(b),
            Self::String(s) => DynSolValue::String(s),
            Self::Array(items) => DynSolValue::Array(items.into_iter().map(Self::into_dyn).collect()),
            Self::FixedArray(items) => {
                DynSolValue::FixedArray(items.into_iter().map(Self::into_dyn).collect())
            }
            Self::Struct(instance) => instance.into_dyn_value(),
        }
    }

    /// JSON form: numbers that fit 64 bits stay numbers, larger ones become
    /// decimal strings; byte values are `0x`-hex.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i, _) => match i64::try_from(*i) {
                Ok(v) => Value::from(v),
                Err(_) => Value::String(i.to_string()),
            },
            Self::Uint(u, _) => match u64::try_from(*u) {
                Ok(v) => Value::from(v),
                Err(_) => Value::String(u.to_string()),
            },
            Self::Address(a) => Value::String(a.to_checksum(None)),
            Self::FixedBytes(word, size) => {
                Value::String(format!("0x{}", hex::encode(&word.0[..(*size).min(32)])))
            }
            Self::Bytes(b) => Value::String(format!("0x{}", hex::encode(b))),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) | Self::FixedArray(items) => {
                Value::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Struct(instance) => instance.to_json(),
        }
    }

    /// Parse the JSON form of a value of type `ty`. `null` yields the zero value.
    pub fn from_json(value: &Value, ty: &FieldType) -> Result<Self, AbiError> {
        if value.is_null() {
            return Ok(Self::zero(ty));
        }
        let bad = |reason: &str| AbiError::conversion(&value.to_string(), ty.type_name(), reason);

        match ty {
            FieldType::Struct(desc) => {
                let mut instance = desc.new_instance();
                instance.from_json(value)?;
                Ok(Self::Struct(instance))
            }
            FieldType::Array(inner) => {
                let items = value.as_array().ok_or_else(|| bad("expected a JSON array"))?;
                Ok(Self::Array(
                    items
                        .iter()
                        .map(|v| Self::from_json(v, inner))
                        .collect::<Result<_, _>>()?,
                ))
            }
            FieldType::FixedArray(inner, len) => {
                let items = value.as_array().ok_or_else(|| bad("expected a JSON array"))?;
                if items.len() > *len {
                    return Err(bad("too many elements"));
                }
                let mut out: Vec<Self> = items
                    .iter()
                    .map(|v| Self::from_json(v, inner))
                    .collect::<Result<_, _>>()?;
                out.resize_with(*len, || Self::zero(inner));
                Ok(Self::FixedArray(out))
            }
            FieldType::Sol(sol) => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) if *sol == DynSolType::Bool => return Ok(Self::Bool(*b)),
                    _ => return Err(bad("expected a string or number")),
                };
                parse_scalar(sol, &text)
            }
        }
    }
}

impl Serialize for AbiValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i, _) => write!(f, "{i}"),
            Self::Uint(u, _) => write!(f, "{u}"),
            Self::Address(a) => write!(f, "{}", a.to_checksum(None)),
            Self::String(s) => f.write_str(s),
            Self::FixedBytes(..) | Self::Bytes(_) | Self::Struct(_) => match self.to_json() {
                Value::String(s) => f.write_str(&s),
                other => write!(f, "{other}"),
            },
            Self::Array(items) | Self::FixedArray(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Parse the textual form of a leaf value.
pub(crate) fn parse_scalar(ty: &DynSolType, text: &str) -> Result<AbiValue, AbiError> {
    let name = || ty.sol_type_name().into_owned();
    let fail = |reason: String| AbiError::conversion(text, name(), reason);

    match ty {
        DynSolType::Bool => parse_bool(text).map(AbiValue::Bool).map_err(fail),
        DynSolType::Int(bits) => parse_int(text, *bits).map(|v| AbiValue::Int(v, *bits)).map_err(fail),
        DynSolType::Uint(bits) => parse_uint(text, *bits).map(|v| AbiValue::Uint(v, *bits)).map_err(fail),
        DynSolType::Address => parse_address(text).map(AbiValue::Address).map_err(fail),
        DynSolType::Bytes => parse_hex(text).map(AbiValue::Bytes).map_err(fail),
        DynSolType::String => Ok(AbiValue::String(text.to_string())),
        DynSolType::FixedBytes(size) => {
            let bytes = parse_hex(text).map_err(fail)?;
            if bytes.len() > *size {
                return Err(fail(format!("longer than {size} bytes")));
            }
            let mut word = B256::ZERO;
            word.0[..bytes.len()].copy_from_slice(&bytes);
            Ok(AbiValue::FixedBytes(word, *size))
        }
        _ => Err(AbiError::UnsupportedType(name())),
    }
}

/// Boolean spellings accepted on the command line.
pub(crate) fn parse_bool(s: &str) -> Result<bool, String> {
    match s {
        "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        _ => Err("invalid boolean".into()),
    }
}

/// Decimal or `0x`-hex unsigned integer that must fit in `bits`. Empty is zero.
pub(crate) fn parse_uint(s: &str, bits: usize) -> Result<U256, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(U256::ZERO);
    }
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(s, 10),
    }
    .map_err(|e| e.to_string())?;
    if value.bit_len() > bits {
        return Err(format!("value out of range for uint{bits}"));
    }
    Ok(value)
}

/// Decimal or `0x`-hex signed integer that must fit in `bits`. Empty is zero.
pub(crate) fn parse_int(s: &str, bits: usize) -> Result<I256, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(I256::ZERO);
    }
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if digits.is_empty() {
        return Err("missing digits".into());
    }
    let magnitude = parse_uint(digits, 256)?;
    let limit = U256::from(1u8) << (bits.clamp(1, 256) - 1);
    if negative {
        if magnitude > limit {
            return Err(format!("value out of range for int{bits}"));
        }
        Ok(I256::from_raw(magnitude.wrapping_neg()))
    } else {
        if magnitude >= limit {
            return Err(format!("value out of range for int{bits}"));
        }
        Ok(I256::from_raw(magnitude))
    }
}

/// Strict hex address, `0x` optional. Empty is the zero address.
pub(crate) fn parse_address(s: &str) -> Result<Address, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Address::ZERO);
    }
    let bytes = parse_hex(s)?;
    if bytes.len() != 20 {
        return Err(format!("expected 20 bytes, got {}", bytes.len()));
    }
    Ok(Address::from_slice(&bytes))
}

pub(crate) fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(digits).map_err(|e| e.to_string())
}
