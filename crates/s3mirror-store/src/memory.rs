//! In-memory object store.
//!
//! Backs the test suites on both ends of the replication link: the
//! write-path calls are counted so idempotency can be asserted, and
//! change notifications can be injected to drive the live listener.

use crate::api::{ChangeRecord, ObjectEntry, ObjectStat, ObjectStore, StoreError};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    etag: String,
}

#[derive(Debug, Default)]
struct Inner {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    iam: Vec<u8>,
    bucket_meta: BTreeMap<String, Vec<u8>>,
    put_calls: usize,
    delete_calls: usize,
    iam_imports: usize,
    meta_imports: usize,
    iam_export_error: Option<String>,
    event_tx: Option<mpsc::Sender<ChangeRecord>>,
}

/// In-memory [`ObjectStore`] implementation.
///
/// Clones share the same underlying state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    event_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<ChangeRecord>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                event_tx: Some(event_tx),
                ..Inner::default()
            })),
            event_rx: Arc::new(tokio::sync::Mutex::new(event_rx)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Create an empty bucket.
    pub fn create_bucket(&self, name: impl Into<String>) {
        self.lock().buckets.entry(name.into()).or_default();
    }

    /// Fingerprint used by this store for object content.
    #[must_use]
    pub fn etag_for(data: &[u8]) -> String {
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Inject a live change notification, as the cluster would emit it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] if the stream was shut down.
    pub async fn inject_event(&self, record: ChangeRecord) -> Result<(), StoreError> {
        let tx = self.lock().event_tx.clone().ok_or(StoreError::Closed)?;
        tx.send(record).await.map_err(|_| StoreError::Closed)
    }

    /// End the notification stream; pending and future
    /// [`ObjectStore::next_events`] calls return [`StoreError::Closed`].
    pub fn close_events(&self) {
        self.lock().event_tx = None;
    }

    /// Make every subsequent [`ObjectStore::export_iam`] call fail
    /// with `message`, as an unhealthy cluster would.
    pub fn fail_iam_exports(&self, message: impl Into<String>) {
        self.lock().iam_export_error = Some(message.into());
    }

    /// Current content of one object, if present.
    #[must_use]
    pub fn object_content(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.data.clone())
    }

    /// Last imported IAM blob.
    #[must_use]
    pub fn iam(&self) -> Vec<u8> {
        self.lock().iam.clone()
    }

    /// Last imported metadata blob for `bucket`.
    #[must_use]
    pub fn bucket_metadata(&self, bucket: &str) -> Option<Vec<u8>> {
        self.lock().bucket_meta.get(bucket).cloned()
    }

    /// How many times `put_object` has actually been called.
    #[must_use]
    pub fn put_calls(&self) -> usize {
        self.lock().put_calls
    }

    /// How many times `delete_object` has been called.
    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.lock().delete_calls
    }

    /// How many IAM imports have been applied.
    #[must_use]
    pub fn iam_imports(&self) -> usize {
        self.lock().iam_imports
    }

    /// How many bucket-metadata imports have been applied.
    #[must_use]
    pub fn meta_imports(&self) -> usize {
        self.lock().meta_imports
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock().buckets.keys().cloned().collect())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectEntry>, StoreError> {
        let inner = self.lock();
        let Some(objects) = inner.buckets.get(bucket) else {
            return Err(StoreError::Api {
                status: 404,
                message: format!("no such bucket: {bucket}"),
            });
        };

        // Single-level listing: keys nested below the prefix collapse
        // into directory entries, like the cluster's own listing API.
        let mut entries = Vec::new();
        let mut dirs = BTreeSet::new();
        for (key, object) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            if let Some(slash) = rest.find('/') {
                dirs.insert(format!("{prefix}{}", &rest[..=slash]));
            } else {
                entries.push(ObjectEntry {
                    key: key.clone(),
                    size: object.data.len() as u64,
                    etag: object.etag.clone(),
                });
            }
        }

        for dir in dirs {
            entries.push(ObjectEntry {
                key: dir,
                size: 0,
                etag: String::new(),
            });
        }
        Ok(entries)
    }

    async fn stat_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectStat>, StoreError> {
        Ok(self
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| ObjectStat {
                etag: o.etag.clone(),
                size: o.data.len() as u64,
            }))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.data.clone())
            .ok_or_else(|| StoreError::Api {
                status: 404,
                message: format!("no such object: {bucket}/{key}"),
            })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.put_calls += 1;
        let etag = Self::etag_for(&body);
        inner
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), StoredObject { data: body, etag });
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.delete_calls += 1;
        if let Some(objects) = inner.buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn export_iam(&self) -> Result<Vec<u8>, StoreError> {
        let inner = self.lock();
        if let Some(message) = &inner.iam_export_error {
            return Err(StoreError::Api {
                status: 503,
                message: message.clone(),
            });
        }
        Ok(inner.iam.clone())
    }

    async fn import_iam(&self, blob: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.iam = blob.to_vec();
        inner.iam_imports += 1;
        Ok(())
    }

    async fn export_bucket_metadata(&self, bucket: &str) -> Result<Vec<u8>, StoreError> {
        Ok(self
            .lock()
            .bucket_meta
            .get(bucket)
            .cloned()
            .unwrap_or_else(|| format!("meta:{bucket}").into_bytes()))
    }

    async fn import_bucket_metadata(
        &self,
        bucket: &str,
        blob: &[u8],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.bucket_meta.insert(bucket.to_string(), blob.to_vec());
        inner.meta_imports += 1;
        Ok(())
    }

    async fn next_events(&self) -> Result<Vec<ChangeRecord>, StoreError> {
        let mut rx = self.event_rx.lock().await;
        let Some(first) = rx.recv().await else {
            return Err(StoreError::Closed);
        };

        let mut batch = vec![first];
        while let Ok(record) = rx.try_recv() {
            batch.push(record);
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChangeKind;

    #[tokio::test]
    async fn put_get_delete_cycle() {
        let store = MemoryStore::new();
        store.put_object("b", "k", vec![1, 2, 3]).await.unwrap();

        assert_eq!(store.get_object("b", "k").await.unwrap(), vec![1, 2, 3]);
        let stat = store.stat_object("b", "k").await.unwrap().unwrap();
        assert_eq!(stat.etag, MemoryStore::etag_for(&[1, 2, 3]));

        store.delete_object("b", "k").await.unwrap();
        assert_eq!(store.stat_object("b", "k").await.unwrap(), None);

        // Idempotent delete at the store boundary.
        store.delete_object("b", "k").await.unwrap();
        store.delete_object("never-existed", "k").await.unwrap();
    }

    #[tokio::test]
    async fn single_level_listing_collapses_directories() {
        let store = MemoryStore::new();
        store.put_object("b", "top.txt", vec![1]).await.unwrap();
        store.put_object("b", "dir/a.txt", vec![2]).await.unwrap();
        store.put_object("b", "dir/b.txt", vec![3]).await.unwrap();

        let entries = store.list_objects("b", "").await.unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["top.txt", "dir/"]);
        assert!(entries[1].is_dir());

        let nested = store.list_objects("b", "dir/").await.unwrap();
        let keys: Vec<&str> = nested.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["dir/a.txt", "dir/b.txt"]);
    }

    #[tokio::test]
    async fn injected_export_failure_surfaces() {
        let store = MemoryStore::new();
        store.export_iam().await.unwrap();

        store.fail_iam_exports("maintenance");
        assert!(matches!(
            store.export_iam().await,
            Err(StoreError::Api { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn injected_events_come_back_in_order() {
        let store = MemoryStore::new();
        let record = ChangeRecord {
            kind: ChangeKind::Created,
            bucket: "b".to_string(),
            key: "k".to_string(),
            etag: "e".to_string(),
        };
        store.inject_event(record.clone()).await.unwrap();

        let batch = store.next_events().await.unwrap();
        assert_eq!(batch, vec![record]);
    }

    #[tokio::test]
    async fn closed_event_stream_reports_closed() {
        let store = MemoryStore::new();
        store.close_events();
        assert!(matches!(store.next_events().await, Err(StoreError::Closed)));
        assert!(store
            .inject_event(ChangeRecord {
                kind: ChangeKind::Removed,
                bucket: "b".to_string(),
                key: "k".to_string(),
                etag: String::new(),
            })
            .await
            .is_err());
    }
}
