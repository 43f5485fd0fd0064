use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    db_persistence::DbError,
    repositories::{kv_store::KvStore, DbResult},
};

type EntryKey = (String, String, String);

/// Process-local `KvStore` for tests. Each operation can be made to fail the
/// way an unreachable database would; `set_unavailable` toggles all of them.
#[derive(Default)]
pub struct InMemoryKvStore {
    entries: Mutex<HashMap<EntryKey, String>>,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl InMemoryKvStore {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.set_fail_gets(unavailable);
        self.set_fail_puts(unavailable);
        self.set_fail_deletes(unavailable);
    }

    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> DbResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(DbError::Database(sqlx::Error::PoolTimedOut));
        }

        Ok(())
    }

    fn key(namespace: &str, key: &str, sub_key: &str) -> EntryKey {
        (namespace.to_string(), key.to_string(), sub_key.to_string())
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, namespace: &str, key: &str, sub_key: &str) -> DbResult<Option<String>> {
        Self::check(&self.fail_gets)?;
        tokio::task::yield_now().await;

        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&Self::key(namespace, key, sub_key))
            .cloned())
    }

    async fn put(&self, namespace: &str, key: &str, sub_key: &str, value: &str) -> DbResult<()> {
        Self::check(&self.fail_puts)?;
        tokio::task::yield_now().await;

        self.entries
            .lock()
            .unwrap()
            .insert(Self::key(namespace, key, sub_key), value.to_string());

        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str, sub_key: &str) -> DbResult<()> {
        Self::check(&self.fail_deletes)?;
        tokio::task::yield_now().await;

        self.entries.lock().unwrap().remove(&Self::key(namespace, key, sub_key));

        Ok(())
    }
}
