//! Object-store trait and record types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One entry from an object listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Content fingerprint.
    pub etag: String,
}

impl ObjectEntry {
    /// Whether this entry is a directory-like key that listings must
    /// recurse into rather than fetch.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.size == 0 && self.key.ends_with('/')
    }
}

/// Metadata for a single object, as returned by a stat call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStat {
    /// Content fingerprint.
    pub etag: String,
    /// Object size in bytes.
    pub size: u64,
}

/// The class of a live change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// An object was created or overwritten.
    Created,
    /// An object was removed.
    Removed,
}

/// One live change notification from the source cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// What happened.
    pub kind: ChangeKind,
    /// Bucket the change occurred in.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Fingerprint of the new content; empty for removals.
    #[serde(default)]
    pub etag: String,
}

/// Errors surfaced by store implementations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Store client initialization failed
    #[error("store init error: {0}")]
    Init(String),
    /// Request transport failed
    #[error("store request error: {0}")]
    Request(String),
    /// Store API returned an error status
    #[error("store API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the store
        message: String,
    },
    /// Response parsing failed
    #[error("store parse error: {0}")]
    Parse(String),
    /// The notification stream ended
    #[error("notification stream closed")]
    Closed,
}

/// Control/data API of an object-storage cluster.
///
/// Every operation is a black-box RPC with its own failure modes; the
/// replication pipeline propagates errors without retrying.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Enumerate all bucket names.
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError>;

    /// Enumerate objects under `bucket` filtered by `prefix`.
    ///
    /// Directory-like keys appear as entries with
    /// [`ObjectEntry::is_dir`] set; callers recurse into them.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectEntry>, StoreError>;

    /// Fetch metadata for one object, or `None` if it does not exist.
    async fn stat_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectStat>, StoreError>;

    /// Read the full object body.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write `body` as the object content, creating or overwriting.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), StoreError>;

    /// Remove one object. Removing an absent object is not an error.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// Export the cluster's full IAM state as an opaque blob.
    async fn export_iam(&self) -> Result<Vec<u8>, StoreError>;

    /// Import an IAM blob, fully replacing the covered scope.
    async fn import_iam(&self, blob: &[u8]) -> Result<(), StoreError>;

    /// Export one bucket's configuration metadata as an opaque blob.
    async fn export_bucket_metadata(&self, bucket: &str) -> Result<Vec<u8>, StoreError>;

    /// Import a bucket-metadata blob.
    async fn import_bucket_metadata(
        &self,
        bucket: &str,
        blob: &[u8],
    ) -> Result<(), StoreError>;

    /// Wait for the next batch of live change notifications.
    ///
    /// Blocks until at least one record is available. Returns
    /// [`StoreError::Closed`] once the stream has ended for good.
    async fn next_events(&self) -> Result<Vec<ChangeRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_entries_are_flagged() {
        let dir = ObjectEntry {
            key: "photos/2024/".to_string(),
            size: 0,
            etag: String::new(),
        };
        let file = ObjectEntry {
            key: "photos/cat.jpg".to_string(),
            size: 4,
            etag: "abc".to_string(),
        };
        assert!(dir.is_dir());
        assert!(!file.is_dir());
    }

    #[test]
    fn change_record_json_shape() {
        let json = r#"{"kind":"created","bucket":"b","key":"k","etag":"e"}"#;
        let record: ChangeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, ChangeKind::Created);

        // etag is optional for removals
        let json = r#"{"kind":"removed","bucket":"b","key":"k"}"#;
        let record: ChangeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, ChangeKind::Removed);
        assert!(record.etag.is_empty());
    }
}
