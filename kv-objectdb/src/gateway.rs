use crate::{
    error::Error,
    filter::Filter,
    key::{Key, Kind},
    record::Record,
    store::StoreClient,
};

/// 对存储客户端的直接调用，不缓存、不重试
#[derive(Clone)]
pub struct StoreGateway<S> {
    client: S,
}

impl<S: StoreClient> StoreGateway<S> {
    pub fn new(client: S) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &S {
        &self.client
    }

    pub async fn upsert_one(&self, record: Record) -> Result<(), Error> {
        log::debug!("upsert {}", record.key());
        self.client.upsert(vec![record]).await?;
        Ok(())
    }

    pub async fn upsert_many(&self, records: Vec<Record>) -> Result<(), Error> {
        if records.is_empty() {
            return Ok(());
        }
        log::debug!("upsert batch of {}", records.len());
        self.client.upsert(records).await?;
        Ok(())
    }

    pub async fn delete_one(&self, key: Key) -> Result<(), Error> {
        log::debug!("delete {}", key);
        self.client.delete(vec![key]).await?;
        Ok(())
    }

    pub async fn delete_many(&self, keys: Vec<Key>) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }
        log::debug!("delete batch of {}", keys.len());
        self.client.delete(keys).await?;
        Ok(())
    }

    pub async fn find_by_key(&self, key: Key) -> Result<Option<Record>, Error> {
        log::debug!("lookup {}", key);
        Ok(self.client.lookup(vec![key]).await?.into_iter().next())
    }

    pub async fn find_by_keys(&self, keys: Vec<Key>) -> Result<Vec<Record>, Error> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let requested = keys.len();
        let records = self.client.lookup(keys).await?;
        log::debug!("lookup batch: {} of {} found", records.len(), requested);
        Ok(records)
    }

    pub async fn query_one(
        &self,
        kind: &Kind,
        filter: Option<&Filter>,
    ) -> Result<Option<Record>, Error> {
        Ok(self.query_many(kind, filter, 1).await?.into_iter().next())
    }

    pub async fn query_many(
        &self,
        kind: &Kind,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<Record>, Error> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let records = self.client.run_query(kind, filter, limit).await?;
        log::debug!(
            "query {} (filtered: {}, limit {}): {} records",
            kind,
            filter.is_some(),
            limit,
            records.len()
        );
        Ok(records)
    }

    pub async fn query_children(
        &self,
        parent: &Key,
        kind: &Kind,
        limit: usize,
        cursor_floor: i64,
    ) -> Result<Vec<Record>, Error> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let records = self
            .client
            .run_ancestor_query(parent, kind, limit, cursor_floor)
            .await?;
        log::debug!(
            "children of {} of kind {} above {}: {} records",
            parent,
            kind,
            cursor_floor,
            records.len()
        );
        Ok(records)
    }
}
