//! TiKV 中记录的 protobuf 编码

use prost::{Message, Oneof};

use crate::{
    error::StoreError,
    key::{Id, Key, Kind},
    record::{Property, Record},
    value::Value,
};

#[derive(Clone, PartialEq, Message)]
pub struct KeyProto {
    #[prost(string, tag = "1")]
    pub kind: String,
    #[prost(oneof = "IdProto", tags = "2, 3")]
    pub id: Option<IdProto>,
    #[prost(message, optional, boxed, tag = "4")]
    pub parent: Option<Box<KeyProto>>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum IdProto {
    #[prost(int64, tag = "2")]
    IntId(i64),
    #[prost(string, tag = "3")]
    Name(String),
}

#[derive(Clone, PartialEq, Message)]
pub struct ValueProto {
    #[prost(oneof = "ValueKindProto", tags = "1, 2, 3, 4, 5, 6")]
    pub kind: Option<ValueKindProto>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum ValueKindProto {
    #[prost(int64, tag = "1")]
    Integer(i64),
    #[prost(double, tag = "2")]
    Double(f64),
    #[prost(bool, tag = "3")]
    Boolean(bool),
    #[prost(string, tag = "4")]
    Text(String),
    #[prost(message, tag = "5")]
    Key(KeyProto),
    #[prost(message, tag = "6")]
    Entity(EmbeddedProto),
}

#[derive(Clone, PartialEq, Message)]
pub struct PropertyProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<ValueProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EmbeddedProto {
    #[prost(message, repeated, tag = "1")]
    pub properties: Vec<PropertyProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EntityProto {
    #[prost(message, optional, tag = "1")]
    pub key: Option<KeyProto>,
    #[prost(message, repeated, tag = "2")]
    pub properties: Vec<PropertyProto>,
}

impl From<&Key> for KeyProto {
    fn from(key: &Key) -> Self {
        KeyProto {
            kind: key.kind().to_string(),
            id: Some(match key.id() {
                Id::Int(id) => IdProto::IntId(*id),
                Id::Name(name) => IdProto::Name(name.clone()),
            }),
            parent: key.parent().map(|parent| Box::new(KeyProto::from(parent))),
        }
    }
}

impl TryFrom<KeyProto> for Key {
    type Error = StoreError;

    fn try_from(proto: KeyProto) -> Result<Self, Self::Error> {
        let id = match proto.id {
            Some(IdProto::IntId(id)) => Id::Int(id),
            Some(IdProto::Name(name)) => Id::Name(name),
            None => {
                return Err(StoreError::InvalidRecord(format!(
                    "key of kind {} has no id",
                    proto.kind
                )));
            }
        };
        let key = Key::new(Kind::new(proto.kind), id);
        match proto.parent {
            Some(parent) => Ok(key.with_parent(Key::try_from(*parent)?)),
            None => Ok(key),
        }
    }
}

impl From<&Value> for ValueProto {
    fn from(value: &Value) -> Self {
        let kind = match value {
            Value::Null => None,
            Value::Integer(v) => Some(ValueKindProto::Integer(*v)),
            Value::Double(v) => Some(ValueKindProto::Double(*v)),
            Value::Boolean(v) => Some(ValueKindProto::Boolean(*v)),
            Value::String(v) => Some(ValueKindProto::Text(v.clone())),
            Value::Key(key) => Some(ValueKindProto::Key(key.into())),
            Value::Entity(properties) => Some(ValueKindProto::Entity(EmbeddedProto {
                properties: properties.iter().map(PropertyProto::from).collect(),
            })),
        };
        ValueProto { kind }
    }
}

impl TryFrom<ValueProto> for Value {
    type Error = StoreError;

    fn try_from(proto: ValueProto) -> Result<Self, Self::Error> {
        Ok(match proto.kind {
            None => Value::Null,
            Some(ValueKindProto::Integer(v)) => Value::Integer(v),
            Some(ValueKindProto::Double(v)) => Value::Double(v),
            Some(ValueKindProto::Boolean(v)) => Value::Boolean(v),
            Some(ValueKindProto::Text(v)) => Value::String(v),
            Some(ValueKindProto::Key(key)) => Value::Key(key.try_into()?),
            Some(ValueKindProto::Entity(embedded)) => Value::Entity(
                embedded
                    .properties
                    .into_iter()
                    .map(Property::try_from)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl From<&Property> for PropertyProto {
    fn from(property: &Property) -> Self {
        PropertyProto {
            name: property.name.clone(),
            value: Some((&property.value).into()),
        }
    }
}

impl TryFrom<PropertyProto> for Property {
    type Error = StoreError;

    fn try_from(proto: PropertyProto) -> Result<Self, Self::Error> {
        let value = match proto.value {
            Some(value) => value.try_into()?,
            None => Value::Null,
        };
        Ok(Property::new(proto.name, value))
    }
}

pub(crate) fn encode_record(record: &Record) -> Vec<u8> {
    EntityProto {
        key: Some(record.key().into()),
        properties: record.properties().iter().map(PropertyProto::from).collect(),
    }
    .encode_to_vec()
}

pub(crate) fn decode_record(data: &[u8]) -> Result<Record, StoreError> {
    let proto = EntityProto::decode(data)?;
    let Some(key) = proto.key else {
        return Err(StoreError::InvalidRecord("record without key".to_string()));
    };
    let properties = proto
        .properties
        .into_iter()
        .map(Property::try_from)
        .collect::<Result<_, _>>()?;
    Ok(Record::new(key.try_into()?, properties))
}
