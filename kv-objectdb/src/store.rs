use std::future::Future;

use crate::{
    error::StoreError,
    filter::Filter,
    key::{Key, Kind},
    record::Record,
};

/// 外部键值存储客户端的最小接口。
///
/// 写入后的可见性不保证立即生效；查询结果的顺序由存储决定。
pub trait StoreClient: Send + Sync {
    /// 按 key 覆盖写入
    fn upsert(&self, records: Vec<Record>) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 删除不存在的 key 不是错误
    fn delete(&self, keys: Vec<Key>) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 缺失的 key 直接省略
    fn lookup(
        &self,
        keys: Vec<Key>,
    ) -> impl Future<Output = Result<Vec<Record>, StoreError>> + Send;

    fn run_query(
        &self,
        kind: &Kind,
        filter: Option<&Filter>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Record>, StoreError>> + Send;

    /// `parent` 的全部后代（不限层级）中整数 id 大于 `floor` 的部分，按 id 升序。
    ///
    /// 不同分支下的 id 混在一起排序；名称 id 的记录不返回。
    fn run_ancestor_query(
        &self,
        parent: &Key,
        kind: &Kind,
        limit: usize,
        floor: i64,
    ) -> impl Future<Output = Result<Vec<Record>, StoreError>> + Send;
}
