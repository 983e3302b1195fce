//! In-memory store implementations.
//!
//! Used by tests and local development runs where no Postgres instance is
//! available. Behavior matches the repository implementations, including the
//! uniqueness invariant on `external_id` and TTL-based state expiry.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use domain::models::job::{JobRecord, StoredJob};
use domain::store::{JobStore, StateStore, StoreError};

/// In-memory [`JobStore`].
#[derive(Default)]
pub struct InMemoryJobStore {
    inner: Mutex<JobStoreInner>,
}

#[derive(Default)]
struct JobStoreInner {
    jobs: HashMap<String, StoredJob>,
    next_id: i64,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<StoredJob>, StoreError> {
        let inner = self.inner.lock().expect("job store lock");
        Ok(inner.jobs.get(external_id).cloned())
    }

    async fn insert(&self, record: &JobRecord) -> Result<StoredJob, StoreError> {
        if !record.has_external_id() {
            return Err(StoreError::MissingExternalId);
        }
        let mut inner = self.inner.lock().expect("job store lock");
        if inner.jobs.contains_key(&record.external_id) {
            return Err(StoreError::DuplicateExternalId(record.external_id.clone()));
        }
        inner.next_id += 1;
        let stored = StoredJob {
            id: inner.next_id,
            record: record.clone(),
            last_synced_at: Utc::now(),
            sync_status: "synced".to_string(),
        };
        inner.jobs.insert(record.external_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: i64, record: &JobRecord) -> Result<StoredJob, StoreError> {
        if !record.has_external_id() {
            return Err(StoreError::MissingExternalId);
        }
        let mut inner = self.inner.lock().expect("job store lock");
        let existing_key = inner
            .jobs
            .iter()
            .find(|(_, stored)| stored.id == id)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| StoreError::NotFound(format!("job id {id}")))?;

        inner.jobs.remove(&existing_key);
        let stored = StoredJob {
            id,
            record: record.clone(),
            last_synced_at: Utc::now(),
            sync_status: "synced".to_string(),
        };
        inner.jobs.insert(record.external_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<StoredJob>, StoreError> {
        let mut inner = self.inner.lock().expect("job store lock");
        Ok(inner.jobs.remove(external_id))
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().expect("job store lock");
        let dropped = inner.jobs.len() as u64;
        inner.jobs.clear();
        Ok(dropped)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let inner = self.inner.lock().expect("job store lock");
        Ok(inner.jobs.len() as i64)
    }
}

/// In-memory [`StateStore`].
#[derive(Default)]
pub struct InMemoryStateStore {
    entries: Mutex<HashMap<String, StateEntry>>,
}

struct StateEntry {
    value: serde_json::Value,
    expires_at: Option<Instant>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let entries = self.entries.lock().expect("state store lock");
        Ok(entries.get(key).and_then(|entry| {
            match entry.expires_at {
                Some(expires_at) if expires_at <= Instant::now() => None,
                _ => Some(entry.value.clone()),
            }
        }))
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("state store lock");
        entries.insert(
            key.to_string(),
            StateEntry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn put_with_ttl(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("state store lock");
        entries.insert(
            key.to_string(),
            StateEntry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("state store lock");
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(external_id: &str, title: &str) -> JobRecord {
        JobRecord {
            external_id: external_id.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryJobStore::new();
        let stored = store.insert(&record("J1", "Engineer")).await.unwrap();
        assert_eq!(stored.sync_status, "synced");

        let found = store.find_by_external_id("J1").await.unwrap().unwrap();
        assert_eq!(found.id, stored.id);
        assert_eq!(found.record.title, "Engineer");
        assert!(store.find_by_external_id("J2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let store = InMemoryJobStore::new();
        store.insert(&record("J1", "A")).await.unwrap();
        let err = store.insert(&record("J1", "B")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateExternalId(_)));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_missing_external_id() {
        let store = InMemoryJobStore::new();
        let err = store.insert(&record("", "A")).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingExternalId));
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let store = InMemoryJobStore::new();
        let stored = store.insert(&record("J1", "Old")).await.unwrap();
        store.update(stored.id, &record("J1", "New")).await.unwrap();
        let found = store.find_by_external_id("J1").await.unwrap().unwrap();
        assert_eq!(found.record.title, "New");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id_not_found() {
        let store = InMemoryJobStore::new();
        let err = store.update(99, &record("J1", "X")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_by_external_id() {
        let store = InMemoryJobStore::new();
        store.insert(&record("J1", "A")).await.unwrap();
        let deleted = store.delete_by_external_id("J1").await.unwrap();
        assert_eq!(deleted.unwrap().record.title, "A");
        assert!(store.delete_by_external_id("J1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_all() {
        let store = InMemoryJobStore::new();
        store.insert(&record("J1", "A")).await.unwrap();
        store.insert(&record("J2", "B")).await.unwrap();
        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_state_store_put_get_delete() {
        let store = InMemoryStateStore::new();
        assert!(store.get("k").await.unwrap().is_none());
        store.put("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap(), json!({"a": 1}));
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_state_store_ttl_expiry() {
        let store = InMemoryStateStore::new();
        store
            .put_with_ttl("k", json!(1), Duration::from_secs(0))
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        store
            .put_with_ttl("k", json!(2), Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap(), json!(2));
    }
}
