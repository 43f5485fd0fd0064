use std::sync::Arc;

use crate::{
    models::{
        identity::Identity,
        session::{Session, SessionRecord},
    },
    repositories::{kv_store::KvStore, DbResult},
};

const SESSION_KEY: &str = "ethAddress";

#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KvStore>,
    namespace: String,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KvStore>, namespace: &str) -> Self {
        Self {
            store,
            namespace: namespace.to_string(),
        }
    }

    pub async fn put(&self, session: &Session) -> DbResult<()> {
        let value = serde_json::to_string(&session.to_record())?;

        self.store
            .put(&self.namespace, SESSION_KEY, session.owner.as_str(), &value)
            .await
    }

    pub async fn get(&self, owner: &Identity) -> DbResult<Option<Session>> {
        let Some(value) = self.store.get(&self.namespace, SESSION_KEY, owner.as_str()).await? else {
            return Ok(None);
        };

        let record: SessionRecord = serde_json::from_str(&value)?;

        Ok(Some(Session::from_record(owner.clone(), record)))
    }
}
