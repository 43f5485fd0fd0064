use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::repositories::{
    challenge::ChallengeRepository,
    kv_store::{KvStore, PgKvStore},
    session::SessionRepository,
    DbResult,
};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Stored value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The two durable per-identity stores, sharing one key-value backend.
#[derive(Clone)]
pub struct DbPersistence {
    pub challenges: ChallengeRepository,
    pub sessions: SessionRepository,
}

impl DbPersistence {
    pub async fn new(database_url: &str, namespace: &str) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self::from_pool(&pool, namespace))
    }

    pub fn from_pool(pool: &PgPool, namespace: &str) -> Self {
        Self::with_store(Arc::new(PgKvStore::new(pool)), namespace)
    }

    pub fn with_store(store: Arc<dyn KvStore>, namespace: &str) -> Self {
        Self {
            challenges: ChallengeRepository::new(store.clone(), namespace),
            sessions: SessionRepository::new(store, namespace),
        }
    }
}
