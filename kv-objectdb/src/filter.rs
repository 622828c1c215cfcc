use std::collections::BTreeMap;

use crate::{
    record::Record,
    value::{FieldValue, Value},
};

/// 原生过滤条件树，仅支持相等与合取
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Equal { property: String, value: Value },
    And(Vec<Filter>),
}

impl Filter {
    pub fn equal(property: impl Into<String>, value: Value) -> Self {
        Filter::Equal {
            property: property.into(),
            value,
        }
    }

    /// 供没有原生谓词的后端在客户端求值。缺失的属性不匹配。
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Equal { property, value } => record.property(property) == Some(value),
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
        }
    }
}

/// 字段名 -> 期望值，按合取解释
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Constraints(BTreeMap<String, Value>);

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl FieldValue) -> Self {
        self.0.insert(field.into(), value.to_value());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Constraints {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// 字段名不做校验，直接交给存储
pub fn to_filter(constraints: &Constraints) -> Option<Filter> {
    let mut filters = constraints
        .iter()
        .map(|(field, value)| Filter::equal(field, value.clone()))
        .collect::<Vec<_>>();
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(Filter::And(filters)),
    }
}
