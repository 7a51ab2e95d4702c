//! Client runtime: wires the event sources, producer queue, sender
//! loop, and resilient transport together.

use crate::sender::SenderLoop;
use crate::sources;
use crate::transport::{ReconnectStream, TransportConfig};
use anyhow::{Context, Result};
use s3mirror_core::{bounded, BucketFilter, DEFAULT_CAPACITY};
use s3mirror_store::ObjectStore;
use std::time::Duration;

/// Client runtime options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Transport tuning, including the server address.
    pub transport: TransportConfig,
    /// Buckets excluded from replication.
    pub filter: BucketFilter,
    /// Stream only live changes, skipping the full object and
    /// bucket-metadata exports.
    pub append_only: bool,
    /// Interval between IAM/metadata resyncs.
    pub resync_period: Duration,
}

/// Run the replication client until the notification stream ends or a
/// fatal error occurs.
///
/// Startup order matches the deployed behavior: full object export
/// (unless append-only), IAM export, bucket-metadata export, then the
/// periodic resync timer and the live listener. The sender loop drains
/// the queue concurrently the whole time.
///
/// # Errors
///
/// Returns error on store API failures (including a failed periodic
/// resync), on a closed queue, or when the transport exhausts its
/// retry budget.
pub async fn run_client<S>(store: S, options: ClientOptions) -> Result<()>
where
    S: ObjectStore + Clone + Send + Sync + 'static,
{
    let ClientOptions {
        transport,
        filter,
        append_only,
        resync_period,
    } = options;

    let (queue, queue_rx) = bounded(DEFAULT_CAPACITY);
    let sender = SenderLoop::new(queue_rx, ReconnectStream::new(transport));
    let mut sender_task = tokio::spawn(sender.run());

    let produce_result = {
        let produce = async {
            if append_only {
                tracing::info!("append-only mode, skipping full object export");
            } else {
                sources::export_all_objects(&store, &filter, &queue).await?;
            }
            sources::export_iam(&store, &queue).await?;
            if !append_only {
                sources::export_bucket_metadata(&store, &filter, &queue).await?;
            }

            let mut resync = tokio::spawn(sources::resync_loop(
                store.clone(),
                filter.clone(),
                queue.clone(),
                resync_period,
                append_only,
            ));

            // A dead resync job must not leave the client running with
            // periodic state sync silently disabled.
            let result = tokio::select! {
                joined = &mut resync => match joined {
                    Ok(Ok(())) => Err(anyhow::anyhow!("resync loop exited unexpectedly")),
                    Ok(Err(e)) => Err(e.context("periodic resync failed")),
                    Err(e) => Err(anyhow::Error::from(e).context("resync task panicked")),
                },
                result = sources::listen_events(&store, &filter, &queue) => result,
            };
            resync.abort();
            result
        };
        tokio::pin!(produce);

        tokio::select! {
            joined = &mut sender_task => {
                joined.context("sender task panicked")??;
                anyhow::bail!("sender loop exited before producers finished");
            }
            result = &mut produce => result,
        }
    };

    // Producers are done; closing the queue lets the sender drain the
    // backlog and exit.
    drop(queue);
    sender_task.await.context("sender task panicked")??;
    produce_result
}
