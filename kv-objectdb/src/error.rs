use std::time::Duration;

use crate::value::ValueKind;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Mapping error: {0}")]
    Mapping(String),
    #[error("Decode error on `{field}`: {source}")]
    Decode {
        field: String,
        #[source]
        source: DecodeError,
    },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    pub(crate) fn decode(field: impl Into<String>, source: DecodeError) -> Self {
        Error::Decode {
            field: field.into(),
            source,
        }
    }
}

/// 存储值与字段声明类型不一致
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("integer {value} out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },
    #[error("field `{field}`: {source}")]
    Field {
        field: String,
        source: Box<DecodeError>,
    },
    #[error("kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("TiKV error: {0}")]
    Tikv(#[from] tikv_client::Error),
    #[error("Prost error: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("Prost error: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
