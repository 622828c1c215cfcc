use std::borrow::Cow;
use std::fmt;

/// 存储中的集合名，相当于表名
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kind(Cow<'static, str>);

impl Kind {
    pub const fn from_static(name: &'static str) -> Self {
        Kind(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Kind(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Kind {
    fn from(name: &'static str) -> Self {
        Kind::from_static(name)
    }
}

/// 记录标识：整数或字符串。整数排在字符串之前。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Id {
    Int(i64),
    Name(String),
}

impl Id {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Id::Int(id) => Some(*id),
            Id::Name(_) => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Id::Int(_) => None,
            Id::Name(name) => Some(name),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Int(id) => write!(f, "{}", id),
            Id::Name(name) => write!(f, "{:?}", name),
        }
    }
}

impl From<i64> for Id {
    fn from(id: i64) -> Self {
        Id::Int(id)
    }
}

impl From<i32> for Id {
    fn from(id: i32) -> Self {
        Id::Int(id.into())
    }
}

impl From<String> for Id {
    fn from(name: String) -> Self {
        Id::Name(name)
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Id::Name(name.to_string())
    }
}

/// 组合标识，例如 (user_id, follower_id) 关系记录。
///
/// `:` 不会出现在整数的十进制形式中，因此不同的组合不会冲突。
pub fn composite_id(parts: &[i64]) -> Id {
    Id::Name(
        parts
            .iter()
            .map(|part| part.to_string())
            .collect::<Vec<_>>()
            .join(":"),
    )
}

/// (kind, id) 对，可带父 key 构成祖先路径
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    kind: Kind,
    id: Id,
    parent: Option<Box<Key>>,
}

impl Key {
    pub fn new(kind: Kind, id: impl Into<Id>) -> Self {
        Self {
            kind,
            id: id.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: Key) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    /// 从根到自身的完整路径
    pub fn path(&self) -> Vec<&Key> {
        let mut path = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent() {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent() {
            write!(f, "{}/", parent)?;
        }
        write!(f, "{}({})", self.kind, self.id)
    }
}
