use async_trait::async_trait;
use sqlx::PgPool;

use crate::repositories::DbResult;

/// Durable string store addressed by `(namespace, key, sub_key)`. A missing
/// entry is reported as `None`, never as an error.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str, sub_key: &str) -> DbResult<Option<String>>;

    /// Inserts or overwrites the entry.
    async fn put(&self, namespace: &str, key: &str, sub_key: &str, value: &str) -> DbResult<()>;

    /// Removes the entry. Removing an absent entry succeeds.
    async fn delete(&self, namespace: &str, key: &str, sub_key: &str) -> DbResult<()>;
}

#[derive(Clone, Debug)]
pub struct PgKvStore {
    pool: PgPool,
}

impl PgKvStore {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }
}

#[async_trait]
impl KvStore for PgKvStore {
    async fn get(&self, namespace: &str, key: &str, sub_key: &str) -> DbResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM kv_entries WHERE namespace = $1 AND entry_key = $2 AND sub_key = $3",
        )
        .bind(namespace)
        .bind(key)
        .bind(sub_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn put(&self, namespace: &str, key: &str, sub_key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (namespace, entry_key, sub_key, value, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (namespace, entry_key, sub_key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(sub_key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str, sub_key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM kv_entries WHERE namespace = $1 AND entry_key = $2 AND sub_key = $3")
            .bind(namespace)
            .bind(key)
            .bind(sub_key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
