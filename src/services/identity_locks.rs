use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::identity::Identity;

type LockTable = Arc<Mutex<HashMap<Identity, Arc<AsyncMutex<()>>>>>;

/// One async mutex per identity, created on demand and dropped once nobody
/// holds or waits for it. Different identities never block each other.
#[derive(Clone, Default)]
pub struct IdentityLocks {
    table: LockTable,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, identity: &Identity) -> IdentityGuard {
        let cell = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.entry(identity.clone()).or_default().clone()
        };

        let guard = cell.lock_owned().await;

        IdentityGuard {
            guard: Some(guard),
            identity: identity.clone(),
            table: self.table.clone(),
        }
    }

    /// Number of identities with a live lock entry.
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct IdentityGuard {
    guard: Option<OwnedMutexGuard<()>>,
    identity: Identity,
    table: LockTable,
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        // release first so the strong count below only sees the table and waiters
        drop(self.guard.take());

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cell) = table.get(&self.identity) {
            if Arc::strong_count(cell) == 1 {
                table.remove(&self.identity);
            }
        }
    }
}
