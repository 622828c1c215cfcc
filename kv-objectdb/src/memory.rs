//! 进程内存储后端。
//!
//! 按 key 读取与祖先查询是强一致的；普通查询读取一份滞后的索引，写入要在
//! `lag` 次查询之后才可见，用来确定性地模拟最终一致性。

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    error::StoreError,
    filter::Filter,
    key::{Id, Key, Kind},
    record::Record,
    store::StoreClient,
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<Key, Record>,
    indexed: BTreeMap<Key, Record>,
    pending: VecDeque<Pending>,
    lag: u32,
    fail_next: Option<StoreError>,
    requests: usize,
}

struct Pending {
    change: Change,
    remaining: u32,
}

enum Change {
    Put(Record),
    Delete(Key),
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入在之后的 `lag` 次查询中不可见
    pub fn eventually_consistent(lag: u32) -> Self {
        let store = Self::default();
        store.lock().lag = lag;
        store
    }

    /// 下一次请求返回该错误
    pub fn fail_next(&self, error: StoreError) {
        self.lock().fail_next = Some(error);
    }

    /// 已处理的请求数
    pub fn requests(&self) -> usize {
        self.lock().requests
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 立即让所有挂起的写入对查询可见
    pub fn settle(&self) {
        let mut inner = self.lock();
        while let Some(pending) = inner.pending.pop_front() {
            inner.index(pending.change);
        }
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.records.clear();
        inner.indexed.clear();
        inner.pending.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // 每次修改都是单步完成的，锁中毒时状态仍然一致
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn begin(&mut self) -> Result<(), StoreError> {
        self.requests += 1;
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn apply(&mut self, change: Change) {
        match &change {
            Change::Put(record) => {
                self.records.insert(record.key().clone(), record.clone());
            }
            Change::Delete(key) => {
                self.records.remove(key);
            }
        }
        if self.lag == 0 {
            self.index(change);
        } else {
            self.pending.push_back(Pending {
                change,
                remaining: self.lag,
            });
        }
    }

    fn index(&mut self, change: Change) {
        match change {
            Change::Put(record) => {
                self.indexed.insert(record.key().clone(), record);
            }
            Change::Delete(key) => {
                self.indexed.remove(&key);
            }
        }
    }

    fn tick(&mut self) {
        for pending in self.pending.iter_mut() {
            pending.remaining = pending.remaining.saturating_sub(1);
        }
        while self.pending.front().is_some_and(|p| p.remaining == 0) {
            if let Some(pending) = self.pending.pop_front() {
                self.index(pending.change);
            }
        }
    }
}

fn is_descendant(key: &Key, ancestor: &Key) -> bool {
    key.parent()
        .is_some_and(|parent| parent.path().contains(&ancestor))
}

impl StoreClient for MemoryStore {
    async fn upsert(&self, records: Vec<Record>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.begin()?;
        for record in records {
            inner.apply(Change::Put(record));
        }
        Ok(())
    }

    async fn delete(&self, keys: Vec<Key>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.begin()?;
        for key in keys {
            inner.apply(Change::Delete(key));
        }
        Ok(())
    }

    async fn lookup(&self, keys: Vec<Key>) -> Result<Vec<Record>, StoreError> {
        let mut inner = self.lock();
        inner.begin()?;
        Ok(keys
            .iter()
            .filter_map(|key| inner.records.get(key).cloned())
            .collect())
    }

    async fn run_query(
        &self,
        kind: &Kind,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let mut inner = self.lock();
        inner.begin()?;
        let records = inner
            .indexed
            .values()
            .filter(|record| record.kind() == kind)
            .filter(|record| filter.is_none_or(|f| f.matches(record)))
            .take(limit)
            .cloned()
            .collect();
        inner.tick();
        Ok(records)
    }

    async fn run_ancestor_query(
        &self,
        parent: &Key,
        kind: &Kind,
        limit: usize,
        floor: i64,
    ) -> Result<Vec<Record>, StoreError> {
        let mut inner = self.lock();
        inner.begin()?;
        let mut records = inner
            .records
            .values()
            .filter(|record| record.kind() == kind && is_descendant(record.key(), parent))
            .filter(|record| matches!(record.key().id(), Id::Int(id) if *id > floor))
            .cloned()
            .collect::<Vec<_>>();
        records.sort_by_key(|record| record.key().id().as_int());
        records.truncate(limit);
        Ok(records)
    }
}
