use crate::{
    key::{Key, Kind},
    value::Value,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: Value,
}

impl Property {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// 一次持久化快照：key + 有序属性列表。构造后不再修改。
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    key: Key,
    properties: Vec<Property>,
}

impl Record {
    pub fn new(key: Key, properties: Vec<Property>) -> Self {
        Self { key, properties }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn kind(&self) -> &Kind {
        self.key.kind()
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    pub fn into_parts(self) -> (Key, Vec<Property>) {
        (self.key, self.properties)
    }
}
