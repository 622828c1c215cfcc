use std::sync::Arc;

use crate::{
    Entity, Mapped,
    descriptor::{FieldRole, Registry, TypeDescriptor},
    error::{DecodeError, Error},
    key::{Id, Key, Kind},
    record::{Property, Record},
    value::{Value, ValueKind},
};

/// 对象与 Record 之间的转换
#[derive(Clone, Default)]
pub struct EntityMapper {
    registry: Arc<Registry>,
}

impl EntityMapper {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn kind_of<T: Entity>(&self) -> Result<Kind, Error> {
        Ok(self.registry.descriptor::<T>()?.kind().clone())
    }

    pub fn to_record<T: Entity>(&self, object: &T) -> Result<Record, Error> {
        let descriptor = self.registry.descriptor::<T>()?;
        let key = object_key_with(&descriptor, object)?;
        let properties = descriptor
            .properties()
            .map(|field| Property::new(field.name(), field.read(object)))
            .collect();
        Ok(Record::new(key, properties))
    }

    /// 只编码指定字段。标识与父字段总在 key 中，列出时忽略。
    pub fn to_partial_record<T: Entity>(
        &self,
        object: &T,
        field_names: &[&str],
    ) -> Result<Record, Error> {
        let descriptor = self.registry.descriptor::<T>()?;
        for name in field_names {
            if descriptor.field(name).is_none() {
                return Err(Error::Mapping(format!(
                    "{}: unknown field `{}`",
                    descriptor.kind(),
                    name
                )));
            }
        }

        let key = object_key_with(&descriptor, object)?;
        let properties = descriptor
            .properties()
            .filter(|field| field_names.contains(&field.name()))
            .map(|field| Property::new(field.name(), field.read(object)))
            .collect::<Vec<_>>();
        log::trace!("partial record {} with {} properties", key, properties.len());
        Ok(Record::new(key, properties))
    }

    pub fn object_key<T: Entity>(&self, object: &T) -> Result<Key, Error> {
        let descriptor = self.registry.descriptor::<T>()?;
        object_key_with(&descriptor, object)
    }

    /// 无父 key 的类型按 id 构造 key
    pub fn key_for<T: Entity>(&self, id: impl Into<Id>) -> Result<Key, Error> {
        Ok(Key::new(self.kind_of::<T>()?, id))
    }

    /// 记录不存在时返回 `None`，不是错误
    pub fn from_record<T: Entity>(&self, record: Option<Record>) -> Result<Option<T>, Error> {
        record.map(|record| self.decode(record)).transpose()
    }

    pub fn decode<T: Entity>(&self, record: Record) -> Result<T, Error> {
        let descriptor = self.registry.descriptor::<T>()?;
        if record.kind() != descriptor.kind() {
            return Err(Error::decode(
                "__key__",
                DecodeError::KindMismatch {
                    expected: descriptor.kind().to_string(),
                    found: record.kind().to_string(),
                },
            ));
        }

        let (key, properties) = record.into_parts();
        let mut object = T::default();
        for property in properties {
            // 未知属性直接忽略，兼容字段删除
            let Some(field) = descriptor
                .properties()
                .find(|field| field.name() == property.name)
            else {
                continue;
            };
            field
                .write(&mut object, property.value)
                .map_err(|e| Error::decode(property.name, e))?;
        }

        if let Some(field) = descriptor.id_field() {
            let value = match key.id() {
                Id::Int(id) => Value::Integer(*id),
                Id::Name(name) => Value::String(name.clone()),
            };
            field
                .write(&mut object, value)
                .map_err(|e| Error::decode(field.name(), e))?;
        }

        if let Some(field) = descriptor.parent_field() {
            let value = key
                .parent()
                .map(|parent| Value::Key(parent.clone()))
                .unwrap_or(Value::Null);
            field
                .write(&mut object, value)
                .map_err(|e| Error::decode(field.name(), e))?;
        }

        Ok(object)
    }

    /// 部分保存：在已存储的属性上覆盖新属性，生成新的 Record
    pub fn merge(existing: Option<Record>, partial: Record) -> Record {
        let Some(existing) = existing else {
            return partial;
        };
        let (_, mut properties) = existing.into_parts();
        let (key, updates) = partial.into_parts();
        for update in updates {
            match properties.iter_mut().find(|p| p.name == update.name) {
                Some(current) => current.value = update.value,
                None => properties.push(update),
            }
        }
        Record::new(key, properties)
    }
}

fn object_key_with<T: Entity>(descriptor: &TypeDescriptor<T>, object: &T) -> Result<Key, Error> {
    let key = Key::new(descriptor.kind().clone(), descriptor.id_of(object)?);
    let Some(field) = descriptor.parent_field() else {
        return Ok(key);
    };
    match field.read(object) {
        Value::Key(parent) => Ok(key.with_parent(parent)),
        Value::Null => Err(Error::Mapping(format!(
            "{}: parent `{}` is required for the key",
            descriptor.kind(),
            field.name()
        ))),
        other => Err(Error::Mapping(format!(
            "{}: parent `{}` resolved to {}",
            descriptor.kind(),
            field.name(),
            other.kind()
        ))),
    }
}

/// 嵌套对象编码为子结构
pub fn encode_embedded<T: Mapped>(object: &T) -> Value {
    Value::Entity(
        T::fields()
            .iter()
            .filter(|field| field.role() == FieldRole::Property)
            .map(|field| Property::new(field.name(), field.read(object)))
            .collect(),
    )
}

pub fn decode_embedded<T: Mapped>(value: Value) -> Result<T, DecodeError> {
    let properties = match value {
        Value::Entity(properties) => properties,
        other => return Err(other.mismatch(ValueKind::Entity)),
    };
    let fields = T::fields();
    let mut object = T::default();
    for property in properties {
        let Some(field) = fields.iter().find(|field| field.name() == property.name) else {
            continue;
        };
        field
            .write(&mut object, property.value)
            .map_err(|e| DecodeError::Field {
                field: property.name,
                source: Box::new(e),
            })?;
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Embedded;

    #[derive(Debug, Clone, Default, PartialEq, Embedded)]
    struct Location {
        city: String,
        lat: f64,
    }

    #[derive(Debug, Clone, Default, PartialEq, Entity)]
    struct UserDetail {
        id: i64,
        #[objectdb(rename = "screenName")]
        screen_name: String,
        protected: bool,
        followers: i32,
        location: Option<Location>,
        #[objectdb(skip)]
        cached: u8,
    }

    #[derive(Debug, Clone, Default, PartialEq, Entity)]
    #[objectdb(id_with = "key_id")]
    struct Follower {
        user_id: i64,
        follower_id: i64,
    }

    impl Follower {
        fn key_id(&self) -> Id {
            crate::composite_id(&[self.user_id, self.follower_id])
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Entity)]
    #[objectdb(kind = "Friend")]
    struct FriendRecord {
        #[objectdb(parent)]
        parent: Option<Key>,
        id: i64,
    }

    fn mapper() -> EntityMapper {
        EntityMapper::new(Arc::new(Registry::new()))
    }

    fn detail() -> UserDetail {
        UserDetail {
            id: 10,
            screen_name: "user1".into(),
            protected: true,
            followers: -3,
            location: Some(Location {
                city: "Äro".into(),
                lat: 0.1 + 0.2,
            }),
            cached: 0,
        }
    }

    #[test]
    fn round_trips_every_field() {
        let mapper = mapper();
        let record = mapper.to_record(&detail()).unwrap();

        assert_eq!(record.key(), &Key::new(Kind::from_static("UserDetail"), 10));
        assert_eq!(
            record.property("screenName"),
            Some(&Value::String("user1".into()))
        );
        assert_eq!(record.property("id"), None);
        assert_eq!(record.property("cached"), None);

        let decoded: UserDetail = mapper.decode(record).unwrap();
        assert_eq!(decoded, detail());
    }

    #[test]
    fn absent_record_is_none() {
        assert_eq!(mapper().from_record::<UserDetail>(None).unwrap(), None);
    }

    #[test]
    fn composite_identifier_from_accessor() {
        let mapper = mapper();
        let follower = Follower {
            user_id: 3,
            follower_id: 4,
        };
        let key = mapper.object_key(&follower).unwrap();
        assert_eq!(key.id(), &Id::Name("3:4".into()));

        let decoded: Follower = mapper.decode(mapper.to_record(&follower).unwrap()).unwrap();
        assert_eq!(decoded, follower);
    }

    #[test]
    fn parent_goes_into_key() {
        let mapper = mapper();
        let user = Key::new(Kind::from_static("User"), 1);
        let friend = FriendRecord {
            parent: Some(user.clone()),
            id: 4,
        };
        let record = mapper.to_record(&friend).unwrap();
        assert_eq!(record.kind().as_str(), "Friend");
        assert_eq!(record.key().parent(), Some(&user));
        assert!(record.properties().is_empty());

        let decoded: FriendRecord = mapper.decode(record).unwrap();
        assert_eq!(decoded, friend);
    }

    #[test]
    fn missing_parent_is_a_mapping_error() {
        let orphan = FriendRecord { parent: None, id: 4 };
        assert!(matches!(
            mapper().to_record(&orphan),
            Err(Error::Mapping(_))
        ));
    }

    #[test]
    fn partial_record_rejects_unknown_fields() {
        let mapper = mapper();
        let partial = mapper
            .to_partial_record(&detail(), &["protected", "id"])
            .unwrap();
        assert_eq!(partial.properties().len(), 1);
        assert_eq!(partial.property("protected"), Some(&Value::Boolean(true)));

        assert!(matches!(
            mapper.to_partial_record(&detail(), &["nope"]),
            Err(Error::Mapping(_))
        ));
    }

    #[test]
    fn merge_keeps_untouched_properties() {
        let mapper = mapper();
        let stored = mapper.to_record(&detail()).unwrap();
        let mut changed = detail();
        changed.followers = 99;
        changed.protected = false;
        let partial = mapper.to_partial_record(&changed, &["followers"]).unwrap();

        let merged: UserDetail = mapper
            .decode(EntityMapper::merge(Some(stored), partial))
            .unwrap();
        assert_eq!(merged.followers, 99);
        assert!(merged.protected);
        assert_eq!(merged.screen_name, "user1");
    }

    #[test]
    fn type_mismatch_names_the_field() {
        let mapper = mapper();
        let record = Record::new(
            Key::new(Kind::from_static("UserDetail"), 10),
            vec![Property::new("followers", Value::String("many".into()))],
        );
        match mapper.decode::<UserDetail>(record) {
            Err(Error::Decode { field, source }) => {
                assert_eq!(field, "followers");
                assert_eq!(
                    source,
                    DecodeError::TypeMismatch {
                        expected: ValueKind::Integer,
                        found: ValueKind::String,
                    }
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn wrong_key_type_for_identifier() {
        let record = Record::new(Key::new(Kind::from_static("UserDetail"), "ten"), vec![]);
        assert!(matches!(
            mapper().decode::<UserDetail>(record),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn nested_decode_errors_carry_the_path() {
        let err = decode_embedded::<Location>(Value::Entity(vec![Property::new(
            "lat",
            Value::Integer(1),
        )]))
        .unwrap_err();
        assert!(matches!(err, DecodeError::Field { ref field, .. } if field == "lat"));
    }

    #[derive(Debug, Clone, Default, PartialEq, Entity)]
    struct Goal {
        id: String,
        depth: i64,
    }

    #[test]
    fn record_of_another_kind_is_rejected() {
        let record = Record::new(Key::new(Kind::from_static("Friend"), 10), vec![]);
        match mapper().decode::<UserDetail>(record) {
            Err(Error::Decode { source, .. }) => assert_eq!(
                source,
                DecodeError::KindMismatch {
                    expected: "UserDetail".into(),
                    found: "Friend".into(),
                }
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_string_identifier_is_a_mapping_error() {
        let mapper = mapper();
        assert!(matches!(
            mapper.to_record(&Goal::default()),
            Err(Error::Mapping(_))
        ));
        let goal = Goal {
            id: "g1".into(),
            depth: 2,
        };
        assert_eq!(mapper.object_key(&goal).unwrap().id(), &Id::Name("g1".into()));
    }

    #[test]
    fn field_defs_describe_nested_and_reference_values() {
        let registry = Registry::new();
        let detail = registry.descriptor::<UserDetail>().unwrap();
        let location = detail.field("location").unwrap();
        assert!(location.is_nested());
        assert!(!location.is_reference());
        assert!(!detail.field("screenName").unwrap().is_nested());

        let friend = registry.descriptor::<FriendRecord>().unwrap();
        let parent = friend.parent_field().unwrap();
        assert!(parent.is_reference());
        assert_eq!(parent.role(), FieldRole::Parent);
    }
}
