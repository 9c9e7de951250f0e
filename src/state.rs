use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::period::MonthKey;
use crate::store::{LedgerStore, MemoryStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn LedgerStore>,
    pub admission: Arc<AdmissionLocks>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn LedgerStore>) -> Self {
        Self {
            config,
            store,
            admission: Arc::new(AdmissionLocks::default()),
        }
    }

    /// State over the in-memory store; used by the test suites.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(AppConfig::for_tests()),
            Arc::new(MemoryStore::new()),
        )
    }
}

/// Lock table keyed by (user, month).
///
/// Expense admission is check-then-write: two concurrent admissions in the
/// same scope could each validate against a stale aggregate and together
/// overshoot a budget or the month's income. Admission holds the scope's
/// lock across the whole sequence; different users and months proceed in
/// parallel.
#[derive(Default)]
pub struct AdmissionLocks {
    scopes: Mutex<HashMap<(Uuid, MonthKey), Arc<Mutex<()>>>>,
}

impl AdmissionLocks {
    pub async fn acquire(&self, user_id: Uuid, month: MonthKey) -> OwnedMutexGuard<()> {
        let scope = {
            let mut scopes = self.scopes.lock().await;
            scopes
                .entry((user_id, month))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        scope.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_scope_serializes() {
        let locks = AdmissionLocks::default();
        let user = Uuid::new_v4();
        let month = MonthKey::parse("2025-06").unwrap();
        let guard = locks.acquire(user, month.clone()).await;
        // The same scope must not be grantable while the first guard is held.
        let pending = locks.acquire(user, month);
        tokio::select! {
            _ = pending => panic!("scope lock granted twice"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
        }
        drop(guard);
    }

    #[tokio::test]
    async fn different_scopes_are_independent() {
        let locks = AdmissionLocks::default();
        let user = Uuid::new_v4();
        let _june = locks
            .acquire(user, MonthKey::parse("2025-06").unwrap())
            .await;
        // A different month for the same user must be grantable immediately.
        let _july = locks
            .acquire(user, MonthKey::parse("2025-07").unwrap())
            .await;
    }
}
