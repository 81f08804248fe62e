use thiserror::Error;

/// Errors raised while building descriptors, converting arguments or
/// encoding/decoding ABI data.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("invalid ABI: {0}")]
    InvalidAbi(String),

    #[error("method `{0}` not found in ABI")]
    MethodNotFound(String),

    #[error("no event with topic {0} in ABI")]
    EventNotFound(String),

    #[error("`{method}` takes {expected} arguments, got {got}")]
    ArgCount {
        method: String,
        expected: usize,
        got: usize,
    },

    #[error("convert {value:?} to {ty} failed: {reason}")]
    Conversion {
        value: String,
        ty: String,
        reason: String,
    },

    #[error("unsupported ABI type: {0}")]
    UnsupportedType(String),

    #[error("value for `{field}` does not match type {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error("ABI decode failed: {0}")]
    Decode(String),

    #[error("ABI encode failed: {0}")]
    Encode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AbiError {
    pub(crate) fn conversion(value: &str, ty: impl Into<String>, reason: impl ToString) -> Self {
        Self::Conversion {
            value: value.to_string(),
            ty: ty.into(),
            reason: reason.to_string(),
        }
    }
}
