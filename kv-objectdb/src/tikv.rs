//! TiKV 事务接口上的存储后端。每次写入一个乐观事务，读取使用快照。

use tikv_client::{Key as TikvKey, Snapshot, TransactionClient, proto::kvrpcpb};

use crate::{
    config::TikvConfig,
    error::{Error, StoreError},
    filter::Filter,
    key::{Id, Key, Kind},
    proto::{decode_record, encode_record},
    record::Record,
    store::StoreClient,
    utils::{descendants_prefix, kind_prefix, next_key, prefix_end, record_path},
};

const PAGE_SIZE: u32 = 128;
const DROP_PAGE_SIZE: u32 = 10000;

#[derive(Clone)]
pub struct TikvStore {
    client: TransactionClient,
}

impl TikvStore {
    pub async fn connect(config: &TikvConfig) -> Result<Self, Error> {
        let client = TransactionClient::new(config.pd_endpoints.clone())
            .await
            .map_err(StoreError::Tikv)?;
        Ok(Self { client })
    }

    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.client.snapshot(
            self.client
                .current_timestamp()
                .await
                .map_err(StoreError::Tikv)?,
            tikv_client::TransactionOptions::new_optimistic(),
        ))
    }

    async fn mutate(&self, mutations: Vec<kvrpcpb::Mutation>) -> Result<(), StoreError> {
        let mut txn = self
            .client
            .begin_optimistic()
            .await
            .map_err(StoreError::Tikv)?;
        txn.batch_mutate(mutations)
            .await
            .map_err(StoreError::Tikv)?;
        txn.commit().await.map_err(StoreError::Tikv)?;
        Ok(())
    }

    // 按前缀分页扫描，保留满足 `keep` 的记录，最多 `limit` 条
    async fn scan_records<F>(
        &self,
        prefix: &str,
        limit: usize,
        mut keep: F,
    ) -> Result<Vec<Record>, StoreError>
    where
        F: FnMut(&Record) -> bool + Send,
    {
        let mut snapshot = self.snapshot().await?;
        let mut start_key: TikvKey = prefix.to_string().into();
        let end_key = prefix_end(prefix);
        let mut records = Vec::new();

        loop {
            let kvs = snapshot
                .scan(start_key.clone()..end_key.clone(), PAGE_SIZE)
                .await
                .map_err(StoreError::Tikv)?
                .collect::<Vec<_>>();

            let Some(last) = kvs.last() else {
                break;
            };
            start_key = next_key(last.key());
            let len = kvs.len();

            for kv in kvs {
                let record = decode_record(kv.value().as_slice())?;
                if keep(&record) {
                    records.push(record);
                    if records.len() >= limit {
                        return Ok(records);
                    }
                }
            }

            if len < PAGE_SIZE as usize {
                break;
            }
        }
        Ok(records)
    }

    /// 删除所有记录
    pub async fn drop_all(&self) -> Result<(), Error> {
        let mut txn = self
            .client
            .begin_optimistic()
            .await
            .map_err(StoreError::Tikv)?;

        let mut start: TikvKey = "record/".to_string().into();
        let end = prefix_end("record/");
        loop {
            let keys = txn
                .scan_keys(start.clone()..end.clone(), DROP_PAGE_SIZE)
                .await
                .map_err(StoreError::Tikv)?
                .collect::<Vec<_>>();
            let Some(last) = keys.last() else {
                break;
            };
            start = next_key(last);
            let len = keys.len();

            for key in keys {
                txn.delete(key).await.map_err(StoreError::Tikv)?;
            }
            if len < DROP_PAGE_SIZE as usize {
                break;
            }
        }

        txn.commit().await.map_err(StoreError::Tikv)?;
        Ok(())
    }
}

impl StoreClient for TikvStore {
    async fn upsert(&self, records: Vec<Record>) -> Result<(), StoreError> {
        let mutations = records
            .iter()
            .map(|record| kvrpcpb::Mutation {
                key: record_path(record.key()).into(),
                op: kvrpcpb::Op::Put.into(),
                value: encode_record(record),
                ..Default::default()
            })
            .collect();
        self.mutate(mutations).await
    }

    async fn delete(&self, keys: Vec<Key>) -> Result<(), StoreError> {
        let mutations = keys
            .iter()
            .map(|key| kvrpcpb::Mutation {
                key: record_path(key).into(),
                op: kvrpcpb::Op::Del.into(),
                ..Default::default()
            })
            .collect();
        self.mutate(mutations).await
    }

    async fn lookup(&self, keys: Vec<Key>) -> Result<Vec<Record>, StoreError> {
        let mut snapshot = self.snapshot().await?;
        snapshot
            .batch_get(keys.iter().map(record_path).collect::<Vec<_>>())
            .await
            .map_err(StoreError::Tikv)?
            .map(|data| decode_record(data.value().as_slice()))
            .collect()
    }

    async fn run_query(
        &self,
        kind: &Kind,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        // TiKV 没有属性过滤，分页扫描后在客户端求值
        self.scan_records(&kind_prefix(kind), limit, |record| {
            filter.is_none_or(|f| f.matches(record))
        })
        .await
    }

    async fn run_ancestor_query(
        &self,
        parent: &Key,
        kind: &Kind,
        limit: usize,
        floor: i64,
    ) -> Result<Vec<Record>, StoreError> {
        // 不同分支下的后代在 key 空间中不按 id 排列，需要整段扫描后排序
        let mut records = self
            .scan_records(&descendants_prefix(parent, kind), usize::MAX, |record| {
                matches!(record.key().id(), Id::Int(id) if *id > floor)
            })
            .await?;
        records.sort_by_key(|record| record.key().id().as_int());
        records.truncate(limit);
        Ok(records)
    }
}
