use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::store::table::{Item, ItemTable};
use crate::store::StoreError;

/// In-process entity table. Used by tests and by local runs without Postgres.
#[derive(Clone, Default)]
pub struct MemoryItemTable {
    items: Arc<RwLock<BTreeMap<(String, String), Item>>>,
}

impl MemoryItemTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }
}

#[async_trait]
impl ItemTable for MemoryItemTable {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError> {
        let items = self.items.read().await;
        Ok(items.get(&(pk.to_string(), sk.to_string())).cloned())
    }

    async fn put(&self, item: Item) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        items.insert((item.pk.clone(), item.sk.clone()), item);
        Ok(())
    }

    async fn put_batch(&self, batch: Vec<Item>) -> Result<(), StoreError> {
        // A single write guard makes the batch atomic to readers.
        let mut items = self.items.write().await;
        for item in batch {
            items.insert((item.pk.clone(), item.sk.clone()), item);
        }
        Ok(())
    }

    async fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Item>, StoreError> {
        let items = self.items.read().await;
        let start = (pk.to_string(), sk_prefix.to_string());
        Ok(items
            .range(start..)
            .take_while(|((item_pk, item_sk), _)| item_pk == pk && item_sk.starts_with(sk_prefix))
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn query_index(&self, index_key: &str) -> Result<Vec<Item>, StoreError> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|item| item.index_key.as_deref() == Some(index_key))
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        pk: &str,
        sk: &str,
        changes: Map<String, Value>,
    ) -> Result<Item, StoreError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&(pk.to_string(), sk.to_string()))
            .ok_or_else(|| StoreError::ConditionFailed {
                pk: pk.to_string(),
                sk: sk.to_string(),
            })?;
        item.attributes.extend(changes);
        Ok(item.clone())
    }
}
