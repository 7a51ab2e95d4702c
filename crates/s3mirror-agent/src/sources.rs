//! Event sources feeding the producer queue.
//!
//! Four producers share the queue: the one-shot full object export, the
//! one-shot IAM + bucket-metadata export, the periodic resync, and the
//! live notification listener. All of them block when the queue is
//! full; a stalled transport stalls every source by design.

use anyhow::{Context, Result};
use s3mirror_core::{BucketFilter, QueueSender};
use s3mirror_proto::Envelope;
use s3mirror_store::{ChangeKind, ObjectStore, StoreError};
use std::time::Duration;

/// Emit an `ObjectPut` for every object in every non-skipped bucket.
///
/// Listings are single-level; directory-like entries are pushed onto a
/// work stack instead of fetched.
///
/// # Errors
///
/// Returns error on store API failures or if the queue has closed.
pub async fn export_all_objects<S: ObjectStore>(
    store: &S,
    filter: &BucketFilter,
    queue: &QueueSender<Envelope>,
) -> Result<()> {
    tracing::info!("exporting all objects");

    for bucket in store.list_buckets().await.context("list buckets")? {
        if filter.is_skipped(&bucket) {
            tracing::debug!(bucket, "bucket skipped");
            continue;
        }

        let mut prefixes = vec![String::new()];
        while let Some(prefix) = prefixes.pop() {
            let entries = store
                .list_objects(&bucket, &prefix)
                .await
                .with_context(|| format!("list objects in {bucket}/{prefix}"))?;

            for entry in entries {
                if entry.is_dir() {
                    prefixes.push(entry.key);
                    continue;
                }

                let content = store
                    .get_object(&bucket, &entry.key)
                    .await
                    .with_context(|| format!("get object {bucket}/{}", entry.key))?;
                enqueue(
                    queue,
                    Envelope::object_put(&bucket, &entry.key, &entry.etag, content),
                )
                .await?;
            }
        }
    }
    Ok(())
}

/// Emit one `IamExport` envelope with the cluster's full IAM state.
///
/// # Errors
///
/// Returns error on store API failures or if the queue has closed.
pub async fn export_iam<S: ObjectStore>(
    store: &S,
    queue: &QueueSender<Envelope>,
) -> Result<()> {
    let blob = store.export_iam().await.context("export IAM")?;
    tracing::info!(size = blob.len(), "exporting IAM state");
    enqueue(queue, Envelope::iam_export(blob)).await
}

/// Emit one `BucketMetaExport` per non-skipped bucket.
///
/// # Errors
///
/// Returns error on store API failures or if the queue has closed.
pub async fn export_bucket_metadata<S: ObjectStore>(
    store: &S,
    filter: &BucketFilter,
    queue: &QueueSender<Envelope>,
) -> Result<()> {
    for bucket in store.list_buckets().await.context("list buckets")? {
        if filter.is_skipped(&bucket) {
            continue;
        }
        let blob = store
            .export_bucket_metadata(&bucket)
            .await
            .with_context(|| format!("export metadata for {bucket}"))?;
        tracing::info!(bucket, size = blob.len(), "exporting bucket metadata");
        enqueue(queue, Envelope::bucket_meta_export(&bucket, blob)).await?;
    }
    Ok(())
}

/// Re-emit IAM and bucket-metadata state on a fixed interval, forever.
///
/// In append-only mode only IAM is re-exported, matching the startup
/// behavior.
///
/// # Errors
///
/// Returns error on store API failures or if the queue has closed.
pub async fn resync_loop<S: ObjectStore>(
    store: S,
    filter: BucketFilter,
    queue: QueueSender<Envelope>,
    period: Duration,
    append_only: bool,
) -> Result<()> {
    let mut ticker = tokio::time::interval(period);
    // The immediate first tick would duplicate the startup export.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        tracing::info!("periodic resync");
        export_iam(&store, &queue).await?;
        if !append_only {
            export_bucket_metadata(&store, &filter, &queue).await?;
        }
    }
}

/// Translate live change notifications into envelopes until the stream
/// ends.
///
/// A closed notification stream is a normal termination, not an error.
///
/// # Errors
///
/// Returns error on store API failures or if the queue has closed.
pub async fn listen_events<S: ObjectStore>(
    store: &S,
    filter: &BucketFilter,
    queue: &QueueSender<Envelope>,
) -> Result<()> {
    loop {
        let batch = match store.next_events().await {
            Ok(batch) => batch,
            Err(StoreError::Closed) => {
                tracing::info!("notification stream closed");
                return Ok(());
            }
            Err(e) => return Err(e).context("poll change notifications"),
        };

        for record in batch {
            if filter.is_skipped(&record.bucket) {
                continue;
            }

            match record.kind {
                ChangeKind::Created => {
                    let content = store
                        .get_object(&record.bucket, &record.key)
                        .await
                        .with_context(|| {
                            format!("get changed object {}/{}", record.bucket, record.key)
                        })?;
                    enqueue(
                        queue,
                        Envelope::object_put(&record.bucket, &record.key, &record.etag, content),
                    )
                    .await?;
                }
                ChangeKind::Removed => {
                    enqueue(queue, Envelope::object_delete(&record.bucket, &record.key))
                        .await?;
                }
            }
        }
    }
}

async fn enqueue(queue: &QueueSender<Envelope>, envelope: Envelope) -> Result<()> {
    queue
        .send(envelope)
        .await
        .context("event queue closed")?;
    tracing::trace!(
        depth = queue.depth(),
        capacity = queue.capacity(),
        "envelope queued"
    );
    Ok(())
}
