extern crate self as kv_objectdb;

mod bundle;
mod config;
pub mod consistency;
mod db;
mod descriptor;
mod error;
mod filter;
mod gateway;
mod key;
mod mapper;
pub mod memory;
mod proto;
mod record;
mod store;
pub mod tikv;
mod utils;
mod value;

pub use bundle::Bundle;
pub use config::{TikvConfig, WaitConfig};
pub use db::ObjectDb;
pub use descriptor::{FieldDef, FieldRole, Registry, TypeDescriptor};
pub use error::{DecodeError, Error, StoreError};
pub use filter::{Constraints, Filter, to_filter};
pub use gateway::StoreGateway;
pub use key::{Id, Key, Kind, composite_id};
pub use kv_objectdb_derive::{Embedded, Entity};
pub use mapper::{EntityMapper, decode_embedded, encode_embedded};
pub use record::{Property, Record};
pub use store::StoreClient;
pub use value::{FieldValue, Value, ValueKind};

#[doc(hidden)]
pub use inventory;

/// 可映射类型的字段描述表，由 `#[derive(Entity)]` / `#[derive(Embedded)]` 生成
pub trait Mapped: Default + Sized + 'static {
    fn fields() -> Vec<FieldDef<Self>>;
}

/// 独立持久化的实体
pub trait Entity: Mapped {
    /// 集合名，默认取类型名
    fn kind() -> Kind;

    /// 由多个字段组合出的标识，例如 `user_id:follower_id`
    fn id_accessor() -> Option<fn(&Self) -> Id> {
        None
    }
}

// 实体元信息，链接期注册
pub struct EntityMeta {
    pub kind: &'static str,
    pub type_name: &'static str,
}

impl std::fmt::Debug for EntityMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EntityMeta {{ kind: {}, type_name: {} }}",
            self.kind, self.type_name
        )
    }
}

inventory::collect!(EntityMeta);

/// 所有已注册的实体：kind -> 类型路径
pub fn registered_kinds() -> std::collections::HashMap<&'static str, &'static str> {
    inventory::iter::<EntityMeta>()
        .map(|meta| (meta.kind, meta.type_name))
        .collect()
}
