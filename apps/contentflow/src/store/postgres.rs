use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::debug;

use crate::store::table::{Item, ItemTable};
use crate::store::StoreError;

/// Postgres-backed entity table (`entities`, see migrations/).
#[derive(Clone)]
pub struct PgItemTable {
    pool: PgPool,
}

impl PgItemTable {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    pk: String,
    sk: String,
    index_key: Option<String>,
    attributes: Json<Map<String, Value>>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            pk: row.pk,
            sk: row.sk,
            index_key: row.index_key,
            attributes: row.attributes.0,
        }
    }
}

const UPSERT_ITEM: &str = r#"
    INSERT INTO entities (pk, sk, index_key, attributes)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (pk, sk)
    DO UPDATE SET index_key = EXCLUDED.index_key, attributes = EXCLUDED.attributes
"#;

#[async_trait]
impl ItemTable for PgItemTable {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT pk, sk, index_key, attributes FROM entities WHERE pk = $1 AND sk = $2",
        )
        .bind(pk)
        .bind(sk)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Item::from))
    }

    async fn put(&self, item: Item) -> Result<(), StoreError> {
        sqlx::query(UPSERT_ITEM)
            .bind(&item.pk)
            .bind(&item.sk)
            .bind(&item.index_key)
            .bind(Json(&item.attributes))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn put_batch(&self, items: Vec<Item>) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }

        let count = items.len();
        let mut tx = self.pool.begin().await?;
        for item in &items {
            sqlx::query(UPSERT_ITEM)
                .bind(&item.pk)
                .bind(&item.sk)
                .bind(&item.index_key)
                .bind(Json(&item.attributes))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!("Batch-wrote {count} items");
        Ok(())
    }

    async fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT pk, sk, index_key, attributes
            FROM entities
            WHERE pk = $1 AND starts_with(sk, $2)
            ORDER BY sk
            "#,
        )
        .bind(pk)
        .bind(sk_prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn query_index(&self, index_key: &str) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT pk, sk, index_key, attributes FROM entities WHERE index_key = $1",
        )
        .bind(index_key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn update(
        &self,
        pk: &str,
        sk: &str,
        changes: Map<String, Value>,
    ) -> Result<Item, StoreError> {
        // `||` on jsonb merges top-level keys, right side wins.
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            UPDATE entities
            SET attributes = attributes || $3
            WHERE pk = $1 AND sk = $2
            RETURNING pk, sk, index_key, attributes
            "#,
        )
        .bind(pk)
        .bind(sk)
        .bind(Json(&changes))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Item::from).ok_or_else(|| StoreError::ConditionFailed {
            pk: pk.to_string(),
            sk: sk.to_string(),
        })
    }
}
