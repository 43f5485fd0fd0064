use std::sync::Arc;

use crate::{
    models::{
        challenge::{Challenge, LoginRecord},
        identity::Identity,
    },
    repositories::{kv_store::KvStore, DbResult},
};

const CHALLENGE_KEY: &str = "loginMessage";

/// Pending login challenges, one per identity.
#[derive(Clone)]
pub struct ChallengeRepository {
    store: Arc<dyn KvStore>,
    namespace: String,
}

impl ChallengeRepository {
    pub fn new(store: Arc<dyn KvStore>, namespace: &str) -> Self {
        Self {
            store,
            namespace: namespace.to_string(),
        }
    }

    /// Replaces any challenge the owner already had.
    pub async fn put(&self, owner: &Identity, challenge: &Challenge) -> DbResult<()> {
        let value = serde_json::to_string(&challenge.to_record())?;

        self.store
            .put(&self.namespace, CHALLENGE_KEY, owner.as_str(), &value)
            .await
    }

    pub async fn get(&self, owner: &Identity) -> DbResult<Option<Challenge>> {
        let Some(value) = self.store.get(&self.namespace, CHALLENGE_KEY, owner.as_str()).await? else {
            return Ok(None);
        };

        let record: LoginRecord = serde_json::from_str(&value)?;

        Ok(Some(Challenge::from_record(owner.clone(), record)))
    }

    pub async fn delete(&self, owner: &Identity) -> DbResult<()> {
        self.store.delete(&self.namespace, CHALLENGE_KEY, owner.as_str()).await
    }
}
