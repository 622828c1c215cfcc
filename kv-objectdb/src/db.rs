use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;

use crate::{
    Entity,
    bundle::Bundle,
    descriptor::Registry,
    error::Error,
    filter::{Constraints, to_filter},
    gateway::StoreGateway,
    key::Id,
    mapper::EntityMapper,
    store::StoreClient,
};

/// 对象数据库入口：对象 <-> Record 映射 + 存储调用
pub struct ObjectDb<S> {
    gateway: StoreGateway<S>,
    mapper: EntityMapper,
}

impl<S: Clone> Clone for ObjectDb<S> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            mapper: self.mapper.clone(),
        }
    }
}

impl<S: StoreClient> ObjectDb<S> {
    pub fn new(client: S) -> Self {
        Self::with_registry(client, Arc::new(Registry::new()))
    }

    /// 多个实例共享同一份类型描述缓存
    pub fn with_registry(client: S, registry: Arc<Registry>) -> Self {
        Self {
            gateway: StoreGateway::new(client),
            mapper: EntityMapper::new(registry),
        }
    }

    pub fn mapper(&self) -> &EntityMapper {
        &self.mapper
    }

    pub fn gateway(&self) -> &StoreGateway<S> {
        &self.gateway
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.mapper.registry()
    }

    pub async fn save<T: Entity>(&self, object: &T) -> Result<(), Error> {
        self.gateway.upsert_one(self.mapper.to_record(object)?).await
    }

    pub async fn save_all<B: Bundle + ?Sized>(&self, objects: &B) -> Result<(), Error> {
        self.gateway.upsert_many(objects.records(&self.mapper)?).await
    }

    /// 只更新指定字段，其余已存储的字段保持不变。
    ///
    /// 先按 key 读取再合并写回；同一 key 上的并发部分写入以最后一次为准。
    pub async fn save_fields<T: Entity>(&self, object: &T, field_names: &[&str]) -> Result<(), Error> {
        let partial = self.mapper.to_partial_record(object, field_names)?;
        let existing = self.gateway.find_by_key(partial.key().clone()).await?;
        self.gateway
            .upsert_one(EntityMapper::merge(existing, partial))
            .await
    }

    pub async fn delete<T: Entity>(&self, object: &T) -> Result<(), Error> {
        self.gateway.delete_one(self.mapper.object_key(object)?).await
    }

    pub async fn delete_all<B: Bundle + ?Sized>(&self, objects: &B) -> Result<(), Error> {
        self.gateway.delete_many(objects.keys(&self.mapper)?).await
    }

    pub async fn find<T: Entity>(&self, limit: usize) -> Result<Vec<T>, Error> {
        let kind = self.mapper.kind_of::<T>()?;
        self.gateway
            .query_many(&kind, None, limit)
            .await?
            .into_iter()
            .map(|record| self.mapper.decode(record))
            .collect()
    }

    pub async fn find_where<T: Entity>(
        &self,
        constraints: &Constraints,
        limit: usize,
    ) -> Result<Vec<T>, Error> {
        let kind = self.mapper.kind_of::<T>()?;
        let filter = to_filter(constraints);
        self.gateway
            .query_many(&kind, filter.as_ref(), limit)
            .await?
            .into_iter()
            .map(|record| self.mapper.decode(record))
            .collect()
    }

    pub async fn find_one<T: Entity>(&self) -> Result<Option<T>, Error> {
        let kind = self.mapper.kind_of::<T>()?;
        let record = self.gateway.query_one(&kind, None).await?;
        self.mapper.from_record(record)
    }

    /// 没有匹配时返回 `None`
    pub async fn find_one_where<T: Entity>(
        &self,
        constraints: &Constraints,
    ) -> Result<Option<T>, Error> {
        let kind = self.mapper.kind_of::<T>()?;
        let filter = to_filter(constraints);
        let record = self.gateway.query_one(&kind, filter.as_ref()).await?;
        self.mapper.from_record(record)
    }

    /// 按无父 key 查找；带父 key 的类型用 [`ObjectDb::find_child_by_id`]
    pub async fn find_by_id<T: Entity>(&self, id: impl Into<Id>) -> Result<Option<T>, Error> {
        let key = self.mapper.key_for::<T>(id)?;
        let record = self.gateway.find_by_key(key).await?;
        self.mapper.from_record(record)
    }

    /// 不存在的 id 被省略，结果顺序不保证。与 `find_by_id` 一样只查无父 key。
    pub async fn find_by_ids<T, I>(&self, ids: I) -> Result<Vec<T>, Error>
    where
        T: Entity,
        I: IntoIterator,
        I::Item: Into<Id>,
    {
        let keys = ids
            .into_iter()
            .map(|id| self.mapper.key_for::<T>(id))
            .collect::<Result<Vec<_>, _>>()?;
        self.gateway
            .find_by_keys(keys)
            .await?
            .into_iter()
            .map(|record| self.mapper.decode(record))
            .collect()
    }

    /// `parent` 下的直接子对象
    pub async fn find_child_by_id<P: Entity, C: Entity>(
        &self,
        parent: &P,
        id: impl Into<Id>,
    ) -> Result<Option<C>, Error> {
        let key = self
            .mapper
            .key_for::<C>(id)?
            .with_parent(self.mapper.object_key(parent)?);
        let record = self.gateway.find_by_key(key).await?;
        self.mapper.from_record(record)
    }

    /// `parent` 的所有后代中 id 大于 `cursor_floor` 的前 `limit` 个，按 id 升序
    pub async fn find_children<P: Entity, C: Entity>(
        &self,
        parent: &P,
        limit: usize,
        cursor_floor: i64,
    ) -> Result<Vec<C>, Error> {
        let parent_key = self.mapper.object_key(parent)?;
        let kind = self.mapper.kind_of::<C>()?;
        self.gateway
            .query_children(&parent_key, &kind, limit, cursor_floor)
            .await?
            .into_iter()
            .map(|record| self.mapper.decode(record))
            .collect()
    }

    /// 按页遍历全部后代，每页以上一页最后的 id 作为下限续查。
    /// 不同分支下与页尾 id 相同的记录会被下一页跳过。
    pub fn children_stream<'a, P: Entity, C: Entity>(
        &'a self,
        parent: &P,
        page_size: usize,
    ) -> impl Stream<Item = Result<C, Error>> + use<'a, S, P, C> {
        let parent_key = self.mapper.object_key(parent);
        let kind = self.mapper.kind_of::<C>();

        try_stream! {
            let parent_key = parent_key?;
            let kind = kind?;
            let mut floor = i64::MIN;
            loop {
                let records = self
                    .gateway
                    .query_children(&parent_key, &kind, page_size, floor)
                    .await?;
                let len = records.len();
                for record in records {
                    if let Some(id) = record.key().id().as_int() {
                        floor = floor.max(id);
                    }
                    yield self.mapper.decode::<C>(record)?;
                }
                if len == 0 || len < page_size || floor == i64::MAX {
                    break;
                }
            }
        }
    }
}
