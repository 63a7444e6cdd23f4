use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::store::StoreError;

/// One raw row of the entity table.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub pk: String,
    pub sk: String,
    /// Secondary-index key; only generated pieces carry one.
    pub index_key: Option<String>,
    pub attributes: Map<String, Value>,
}

/// Raw key-value access to the single entity table.
///
/// Queries are always scoped to one partition key (or one index key);
/// there is deliberately no scan.
#[async_trait]
pub trait ItemTable: Send + Sync {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError>;

    /// Inserts or fully replaces the item at `(pk, sk)`.
    async fn put(&self, item: Item) -> Result<(), StoreError>;

    /// Writes every item or none of them.
    async fn put_batch(&self, items: Vec<Item>) -> Result<(), StoreError>;

    /// Items in partition `pk` whose sort key starts with `sk_prefix`,
    /// ordered by sort key.
    async fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Item>, StoreError>;

    async fn query_index(&self, index_key: &str) -> Result<Vec<Item>, StoreError>;

    /// Merges `changes` into the attributes of an existing item and returns
    /// the updated item. Fails with `StoreError::ConditionFailed` when the
    /// item does not exist; never creates one.
    async fn update(
        &self,
        pk: &str,
        sk: &str,
        changes: Map<String, Value>,
    ) -> Result<Item, StoreError>;
}
