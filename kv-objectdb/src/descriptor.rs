use std::{
    any::{Any, TypeId},
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{
    Entity,
    error::{DecodeError, Error},
    key::{Id, Kind},
    value::{Value, ValueKind},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRole {
    /// 标识字段，写入 key 而不是属性
    Id,
    /// 父 key 引用，写入 key 的祖先路径
    Parent,
    Property,
}

/// 字段描述：名称、角色、值类型以及读写函数
pub struct FieldDef<T> {
    name: &'static str,
    role: FieldRole,
    kind: ValueKind,
    get: fn(&T) -> Value,
    set: fn(&mut T, Value) -> Result<(), DecodeError>,
}

impl<T> Clone for FieldDef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldDef<T> {}

impl<T> fmt::Debug for FieldDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FieldDef {{ name: {}, role: {:?}, kind: {} }}",
            self.name, self.role, self.kind
        )
    }
}

impl<T> FieldDef<T> {
    pub fn new(
        name: &'static str,
        role: FieldRole,
        kind: ValueKind,
        get: fn(&T) -> Value,
        set: fn(&mut T, Value) -> Result<(), DecodeError>,
    ) -> Self {
        Self {
            name,
            role,
            kind,
            get,
            set,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn role(&self) -> FieldRole {
        self.role
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// 嵌套对象按值存储为子结构
    pub fn is_nested(&self) -> bool {
        self.kind == ValueKind::Entity
    }

    pub fn is_reference(&self) -> bool {
        self.kind == ValueKind::Key
    }

    pub fn read(&self, object: &T) -> Value {
        (self.get)(object)
    }

    pub fn write(&self, object: &mut T, value: Value) -> Result<(), DecodeError> {
        (self.set)(object, value)
    }
}

enum IdSource<T> {
    Field(usize),
    Accessor(fn(&T) -> Id),
}

/// 每个类型只计算一次的映射信息
pub struct TypeDescriptor<T> {
    kind: Kind,
    fields: Vec<FieldDef<T>>,
    id: IdSource<T>,
    parent: Option<usize>,
}

impl<T: Entity> TypeDescriptor<T> {
    pub fn build() -> Result<Self, Error> {
        let kind = T::kind();
        if kind.as_str().is_empty() || kind.as_str().contains(['/', '.']) {
            return Err(Error::Mapping(format!("invalid kind name {:?}", kind.as_str())));
        }

        let fields = T::fields();
        let mut names = HashSet::new();
        for field in &fields {
            if !names.insert(field.name()) {
                return Err(Error::Mapping(format!(
                    "{}: duplicate field `{}`",
                    kind,
                    field.name()
                )));
            }
        }

        let id_fields = positions(&fields, FieldRole::Id);
        let id = match (id_fields.as_slice(), T::id_accessor()) {
            (&[index], None) => {
                let field = &fields[index];
                if !matches!(field.kind(), ValueKind::Integer | ValueKind::String) {
                    return Err(Error::Mapping(format!(
                        "{}: identifier `{}` must be an integer or string, not {}",
                        kind,
                        field.name(),
                        field.kind()
                    )));
                }
                IdSource::Field(index)
            }
            (&[], Some(accessor)) => IdSource::Accessor(accessor),
            (&[], None) => {
                return Err(Error::Mapping(format!("{}: no identifier field", kind)));
            }
            _ => {
                return Err(Error::Mapping(format!(
                    "{}: more than one identifier",
                    kind
                )));
            }
        };

        let parent = match positions(&fields, FieldRole::Parent).as_slice() {
            &[] => None,
            &[index] if fields[index].kind() == ValueKind::Key => Some(index),
            &[index] => {
                return Err(Error::Mapping(format!(
                    "{}: parent `{}` must be a key reference",
                    kind,
                    fields[index].name()
                )));
            }
            _ => {
                return Err(Error::Mapping(format!("{}: more than one parent", kind)));
            }
        };

        log::trace!("built descriptor for {} with {} fields", kind, fields.len());

        Ok(Self {
            kind,
            fields,
            id,
            parent,
        })
    }
}

fn positions<T>(fields: &[FieldDef<T>], role: FieldRole) -> Vec<usize> {
    fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.role() == role)
        .map(|(i, _)| i)
        .collect()
}

impl<T> TypeDescriptor<T> {
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn fields(&self) -> &[FieldDef<T>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef<T>> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// 作为属性存储的字段
    pub fn properties(&self) -> impl Iterator<Item = &FieldDef<T>> {
        self.fields
            .iter()
            .filter(|f| f.role() == FieldRole::Property)
    }

    pub fn id_field(&self) -> Option<&FieldDef<T>> {
        match self.id {
            IdSource::Field(index) => Some(&self.fields[index]),
            IdSource::Accessor(_) => None,
        }
    }

    pub fn parent_field(&self) -> Option<&FieldDef<T>> {
        self.parent.map(|index| &self.fields[index])
    }

    pub fn id_of(&self, object: &T) -> Result<Id, Error> {
        let id = match &self.id {
            IdSource::Accessor(accessor) => accessor(object),
            IdSource::Field(index) => match self.fields[*index].read(object) {
                Value::Integer(id) => Id::Int(id),
                Value::String(name) => Id::Name(name),
                other => {
                    return Err(Error::Mapping(format!(
                        "{}: identifier resolved to {}",
                        self.kind,
                        other.kind()
                    )));
                }
            },
        };
        if id.as_name() == Some("") {
            return Err(Error::Mapping(format!("{}: empty identifier", self.kind)));
        }
        Ok(id)
    }
}

/// 类型描述缓存。每个类型首次访问时构建，之后只读。
#[derive(Default)]
pub struct Registry {
    descriptors: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor<T: Entity>(&self) -> Result<Arc<TypeDescriptor<T>>, Error> {
        // 描述信息插入后不再修改，锁中毒时直接恢复
        if let Some(found) = self
            .descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
        {
            return downcast::<T>(found.clone());
        }

        let mut descriptors = self
            .descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = descriptors.get(&TypeId::of::<T>()) {
            return downcast::<T>(found.clone());
        }
        let descriptor = Arc::new(TypeDescriptor::<T>::build()?);
        descriptors.insert(TypeId::of::<T>(), descriptor.clone());
        Ok(descriptor)
    }

    /// 预先构建并校验
    pub fn warm<T: Entity>(&self) -> Result<(), Error> {
        self.descriptor::<T>().map(|_| ())
    }

    pub fn len(&self) -> usize {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn downcast<T: Entity>(
    descriptor: Arc<dyn Any + Send + Sync>,
) -> Result<Arc<TypeDescriptor<T>>, Error> {
    descriptor
        .downcast::<TypeDescriptor<T>>()
        .map_err(|_| Error::Mapping(format!("descriptor type mismatch for {}", T::kind())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mapped, value::FieldValue};

    #[derive(Default)]
    struct NoId {
        name: String,
    }

    impl Mapped for NoId {
        fn fields() -> Vec<FieldDef<Self>> {
            vec![FieldDef::new(
                "name",
                FieldRole::Property,
                ValueKind::String,
                |e: &Self| e.name.to_value(),
                |e: &mut Self, v| {
                    e.name = FieldValue::from_value(v)?;
                    Ok(())
                },
            )]
        }
    }

    impl Entity for NoId {
        fn kind() -> Kind {
            Kind::from_static("NoId")
        }
    }

    #[derive(Default)]
    struct TwoIds {
        id: i64,
        other: i64,
    }

    impl Mapped for TwoIds {
        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::new(
                    "id",
                    FieldRole::Id,
                    ValueKind::Integer,
                    |e: &Self| e.id.to_value(),
                    |e: &mut Self, v| {
                        e.id = FieldValue::from_value(v)?;
                        Ok(())
                    },
                ),
                FieldDef::new(
                    "other",
                    FieldRole::Id,
                    ValueKind::Integer,
                    |e: &Self| e.other.to_value(),
                    |e: &mut Self, v| {
                        e.other = FieldValue::from_value(v)?;
                        Ok(())
                    },
                ),
            ]
        }
    }

    impl Entity for TwoIds {
        fn kind() -> Kind {
            Kind::from_static("TwoIds")
        }
    }

    #[derive(Default)]
    struct Cursor {
        id: i64,
        cursor: i64,
    }

    impl Mapped for Cursor {
        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::new(
                    "id",
                    FieldRole::Id,
                    ValueKind::Integer,
                    |e: &Self| e.id.to_value(),
                    |e: &mut Self, v| {
                        e.id = FieldValue::from_value(v)?;
                        Ok(())
                    },
                ),
                FieldDef::new(
                    "cursor",
                    FieldRole::Property,
                    ValueKind::Integer,
                    |e: &Self| e.cursor.to_value(),
                    |e: &mut Self, v| {
                        e.cursor = FieldValue::from_value(v)?;
                        Ok(())
                    },
                ),
            ]
        }
    }

    impl Entity for Cursor {
        fn kind() -> Kind {
            Kind::from_static("Cursor")
        }
    }

    #[test]
    fn rejects_missing_identifier() {
        let registry = Registry::new();
        assert!(matches!(
            registry.descriptor::<NoId>(),
            Err(Error::Mapping(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn rejects_duplicate_identifier() {
        assert!(matches!(
            Registry::new().descriptor::<TwoIds>(),
            Err(Error::Mapping(_))
        ));
    }

    #[test]
    fn caches_one_descriptor_per_type() {
        let registry = Registry::new();
        let first = registry.descriptor::<Cursor>().unwrap();
        let second = registry.descriptor::<Cursor>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        assert_eq!(first.kind().as_str(), "Cursor");
        assert_eq!(first.id_field().map(|f| f.name()), Some("id"));
        assert_eq!(
            first.properties().map(|f| f.name()).collect::<Vec<_>>(),
            vec!["cursor"]
        );
        assert_eq!(first.id_of(&Cursor { id: 7, cursor: 0 }).unwrap(), Id::Int(7));
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        let registry = Arc::new(Registry::new());
        let handles = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.descriptor::<Cursor>().unwrap())
            })
            .collect::<Vec<_>>();
        let descriptors = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>();
        assert!(descriptors.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[derive(Default, Entity)]
    #[objectdb(kind = "")]
    struct EmptyKind {
        id: i64,
    }

    #[derive(Default, Entity)]
    #[objectdb(kind = "users/active")]
    struct SlashKind {
        id: i64,
    }

    #[derive(Default, Entity)]
    #[objectdb(kind = "user.active")]
    struct DotKind {
        id: i64,
    }

    #[derive(Default, Entity)]
    struct RenameClash {
        id: i64,
        name: String,
        #[objectdb(rename = "name")]
        nickname: String,
    }

    #[derive(Default, Entity)]
    struct BoolId {
        id: bool,
    }

    #[derive(Default, Entity)]
    struct TwoParents {
        id: i64,
        #[objectdb(parent)]
        owner: Option<crate::Key>,
        #[objectdb(parent)]
        group: Option<crate::Key>,
    }

    #[derive(Default, Entity)]
    struct ScalarParent {
        id: i64,
        #[objectdb(parent)]
        owner: i64,
    }

    fn mapping_error<T: Entity>() -> String {
        match Registry::new().descriptor::<T>() {
            Err(Error::Mapping(message)) => message,
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("descriptor for {} should not build", T::kind()),
        }
    }

    #[test]
    fn rejects_invalid_kind_names() {
        assert!(mapping_error::<EmptyKind>().contains("invalid kind"));
        assert!(mapping_error::<SlashKind>().contains("users/active"));
        assert!(mapping_error::<DotKind>().contains("user.active"));
    }

    #[test]
    fn rejects_colliding_property_names() {
        assert!(mapping_error::<RenameClash>().contains("duplicate field `name`"));
    }

    #[test]
    fn rejects_non_scalar_identifier() {
        assert!(mapping_error::<BoolId>().contains("must be an integer or string"));
    }

    #[test]
    fn rejects_bad_parent_declarations() {
        assert!(mapping_error::<TwoParents>().contains("more than one parent"));
        assert!(mapping_error::<ScalarParent>().contains("must be a key reference"));
    }
}
