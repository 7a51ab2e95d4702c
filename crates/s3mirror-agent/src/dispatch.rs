//! Apply engine: turns decoded envelopes into target-store operations.

use s3mirror_proto::{Envelope, EventKind};
use s3mirror_store::{ObjectStore, StoreError};

/// Applies envelopes against the target store.
///
/// Application is idempotent where the store allows it: puts are
/// skipped when the target already holds content with the same
/// fingerprint, and deletes of absent objects succeed. Unknown kinds
/// are ignored for forward compatibility.
pub struct Dispatcher<S> {
    store: S,
}

impl<S: ObjectStore> Dispatcher<S> {
    /// Wrap a target store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Apply one envelope.
    ///
    /// Errors are scoped to this envelope; the caller decides whether
    /// to keep consuming the stream.
    ///
    /// # Errors
    ///
    /// Propagates any failure from the target store's API.
    pub async fn apply(&self, envelope: &Envelope) -> Result<(), StoreError> {
        tracing::info!(
            seq = envelope.seq,
            kind = %envelope.kind,
            bucket = %envelope.bucket,
            name = %envelope.name,
            "applying envelope"
        );

        match envelope.kind {
            EventKind::IamExport => self.store.import_iam(&envelope.content).await,
            EventKind::BucketMetaExport => {
                self.store
                    .import_bucket_metadata(&envelope.bucket, &envelope.content)
                    .await
            }
            EventKind::ObjectPut => {
                if let Some(stat) = self
                    .store
                    .stat_object(&envelope.bucket, &envelope.name)
                    .await?
                {
                    if stat.etag == envelope.etag {
                        tracing::debug!(
                            bucket = %envelope.bucket,
                            name = %envelope.name,
                            etag = %envelope.etag,
                            "content already present, skipping put"
                        );
                        return Ok(());
                    }
                }
                self.store
                    .put_object(&envelope.bucket, &envelope.name, envelope.content.clone())
                    .await
            }
            EventKind::ObjectDelete => {
                self.store
                    .delete_object(&envelope.bucket, &envelope.name)
                    .await
            }
            EventKind::Unknown(value) => {
                tracing::debug!(kind = value, "ignoring unknown event kind");
                Ok(())
            }
        }
    }
}
