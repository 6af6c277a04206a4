//! In-memory transactional key/value store.
//!
//! Transactions buffer their writes and see their own uncommitted changes.
//! Commit applies the buffer to the shared map; rollback drops it.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::isolation::{Scope, Transaction, TransactionError, TransactionProvider};

/// Shared key/value store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<DashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed value for `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.get(key).map(|v| v.value().clone())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Seed a committed value outside of any transaction.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }
}

#[async_trait]
impl TransactionProvider for MemoryStore {
    async fn begin(&self) -> Result<Scope, TransactionError> {
        let txn = MemoryTransaction::new(self.clone());
        tracing::trace!(transaction = %txn.id, "Transaction started");
        Ok(Scope::new(txn))
    }
}

#[derive(Debug, Default)]
struct TxnState {
    /// `None` marks a pending delete.
    pending: BTreeMap<String, Option<Value>>,
    finished: bool,
}

/// A transaction against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTransaction {
    id: String,
    store: MemoryStore,
    state: Mutex<TxnState>,
}

impl MemoryTransaction {
    fn new(store: MemoryStore) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            store,
            state: Mutex::new(TxnState::default()),
        }
    }

    fn open_state(&self) -> Result<parking_lot::MutexGuard<'_, TxnState>, TransactionError> {
        let state = self.state.lock();
        if state.finished {
            return Err(TransactionError::Finished(self.id.clone()));
        }
        Ok(state)
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, TransactionError> {
        let state = self.open_state()?;
        match state.pending.get(key) {
            Some(pending) => Ok(pending.clone()),
            None => Ok(self.store.get(key)),
        }
    }

    pub fn put(&self, key: impl Into<String>, value: Value) -> Result<(), TransactionError> {
        self.open_state()?.pending.insert(key.into(), Some(value));
        Ok(())
    }

    /// Returns whether the key existed from this transaction's point of view.
    pub fn delete(&self, key: &str) -> Result<bool, TransactionError> {
        let existed = self.get(key)?.is_some();
        self.open_state()?.pending.insert(key.to_string(), None);
        Ok(existed)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    async fn commit(&self) -> Result<(), TransactionError> {
        let mut state = self.open_state()?;
        state.finished = true;
        let writes = std::mem::take(&mut state.pending);
        let count = writes.len();
        for (key, value) in writes {
            match value {
                Some(value) => {
                    self.store.data.insert(key, value);
                }
                None => {
                    self.store.data.remove(&key);
                }
            }
        }
        tracing::trace!(transaction = %self.id, writes = count, "Transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), TransactionError> {
        let mut state = self.open_state()?;
        state.finished = true;
        state.pending.clear();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn begin(store: &MemoryStore) -> Scope {
        store.begin().await.unwrap()
    }

    #[tokio::test]
    async fn test_read_your_writes_until_commit() {
        let store = MemoryStore::new();
        let scope = begin(&store).await;
        let txn = scope.downcast::<MemoryTransaction>().unwrap();

        txn.put("k", json!("v")).unwrap();
        assert_eq!(txn.get("k").unwrap(), Some(json!("v")));
        assert_eq!(store.get("k"), None);

        scope.commit().await.unwrap();
        assert_eq!(store.get("k"), Some(json!("v")));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes_and_deletes() {
        let store = MemoryStore::new();
        store.insert("keep", json!(1));

        let scope = begin(&store).await;
        let txn = scope.downcast::<MemoryTransaction>().unwrap();
        txn.put("new", json!(2)).unwrap();
        assert!(txn.delete("keep").unwrap());
        assert_eq!(txn.get("keep").unwrap(), None);

        scope.rollback().await.unwrap();
        assert_eq!(store.get("keep"), Some(json!(1)));
        assert_eq!(store.get("new"), None);
    }

    #[tokio::test]
    async fn test_finished_transaction_rejects_work() {
        let store = MemoryStore::new();
        let scope = begin(&store).await;
        scope.commit().await.unwrap();

        let txn = scope.downcast::<MemoryTransaction>().unwrap();
        assert!(matches!(txn.put("k", json!(0)), Err(TransactionError::Finished(_))));
        assert!(matches!(scope.commit().await, Err(TransactionError::Finished(_))));
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let store = MemoryStore::new();
        let a = begin(&store).await;
        let b = begin(&store).await;

        a.downcast::<MemoryTransaction>().unwrap().put("a", json!(1)).unwrap();
        b.downcast::<MemoryTransaction>().unwrap().put("b", json!(2)).unwrap();
        assert_eq!(b.downcast::<MemoryTransaction>().unwrap().get("a").unwrap(), None);

        b.rollback().await.unwrap();
        a.commit().await.unwrap();
        assert_eq!(store.get("a"), Some(json!(1)));
        assert_eq!(store.get("b"), None);
    }
}
