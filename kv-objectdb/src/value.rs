use std::fmt;

use crate::{error::DecodeError, key::Key, record::Property};

/// 存储侧的原生值
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Double(f64),
    Boolean(bool),
    String(String),
    Key(Key),
    Entity(Vec<Property>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Integer,
    Double,
    Boolean,
    String,
    Key,
    Entity,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Integer => "integer",
            ValueKind::Double => "double",
            ValueKind::Boolean => "boolean",
            ValueKind::String => "string",
            ValueKind::Key => "key",
            ValueKind::Entity => "entity",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Integer(_) => ValueKind::Integer,
            Value::Double(_) => ValueKind::Double,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::String(_) => ValueKind::String,
            Value::Key(_) => ValueKind::Key,
            Value::Entity(_) => ValueKind::Entity,
        }
    }

    pub(crate) fn mismatch(&self, expected: ValueKind) -> DecodeError {
        DecodeError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

/// 字段类型与原生值之间的编解码。
///
/// 整数与浮点之间不做隐式转换。
pub trait FieldValue: Sized {
    const KIND: ValueKind;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, DecodeError>;
}

impl FieldValue for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Integer(v) => Ok(v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl FieldValue for i32 {
    const KIND: ValueKind = ValueKind::Integer;

    fn to_value(&self) -> Value {
        Value::Integer((*self).into())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Integer(v) => i32::try_from(v).map_err(|_| DecodeError::OutOfRange {
                value: v,
                target: "i32",
            }),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl FieldValue for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Double(v) => Ok(v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl FieldValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Boolean(v) => Ok(v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::String(v) => Ok(v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl FieldValue for Key {
    const KIND: ValueKind = ValueKind::Key;

    fn to_value(&self) -> Value {
        Value::Key(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Key(v) => Ok(v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
