//! End-to-end loopback tests: a real server and a real client joined
//! over 127.0.0.1, with in-memory stores on both ends.

use s3mirror_agent::transport::TransportConfig;
use s3mirror_agent::{run_client, ClientOptions, Server};
use s3mirror_core::BucketFilter;
use s3mirror_store::{ChangeKind, ChangeRecord, MemoryStore, ObjectStore};
use std::time::Duration;

/// Poll `check` until it holds or five seconds pass.
async fn wait_until<F: Fn() -> bool>(what: &str, check: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

fn created(bucket: &str, key: &str, content: &[u8]) -> ChangeRecord {
    ChangeRecord {
        kind: ChangeKind::Created,
        bucket: bucket.to_string(),
        key: key.to_string(),
        etag: MemoryStore::etag_for(content),
    }
}

fn removed(bucket: &str, key: &str) -> ChangeRecord {
    ChangeRecord {
        kind: ChangeKind::Removed,
        bucket: bucket.to_string(),
        key: key.to_string(),
        etag: String::new(),
    }
}

#[tokio::test]
async fn replicates_over_a_loopback_link() {
    let target = MemoryStore::new();
    let server = Server::bind("127.0.0.1:0", target.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());

    let source = MemoryStore::new();
    source.put_object("b", "k", vec![1, 2, 3]).await.unwrap();
    source.import_iam(b"iam-blob").await.unwrap();

    let options = ClientOptions {
        transport: TransportConfig::new(&addr.to_string()),
        filter: BucketFilter::default(),
        append_only: false,
        resync_period: Duration::from_secs(3600),
    };
    let client = tokio::spawn(run_client(source.clone(), options));

    // Startup exports land in order: objects, IAM, bucket metadata.
    wait_until("object export", || {
        target.object_content("b", "k") == Some(vec![1, 2, 3])
    })
    .await;
    wait_until("IAM export", || target.iam() == b"iam-blob").await;
    wait_until("metadata export", || {
        target.bucket_metadata("b") == Some(b"meta:b".to_vec())
    })
    .await;
    assert_eq!(target.put_calls(), 1);

    // A notification for content the target already holds is skipped;
    // a genuinely new object is replicated.
    source.inject_event(created("b", "k", &[1, 2, 3])).await.unwrap();
    source.put_object("b", "k2", vec![4]).await.unwrap();
    source.inject_event(created("b", "k2", &[4])).await.unwrap();

    wait_until("new object", || {
        target.object_content("b", "k2") == Some(vec![4])
    })
    .await;
    assert_eq!(target.put_calls(), 2, "matching fingerprint must not rewrite");

    // Delete, then delete again: the second apply is a no-op.
    source.inject_event(removed("b", "k")).await.unwrap();
    source.inject_event(removed("b", "k")).await.unwrap();
    source.close_events();

    // The client drains its queue, every envelope acked, then returns.
    client.await.unwrap().unwrap();

    assert_eq!(target.object_content("b", "k"), None);
    assert_eq!(target.delete_calls(), 2);
    assert_eq!(target.object_content("b", "k2"), Some(vec![4]));
}

#[tokio::test]
async fn append_only_skips_full_and_metadata_exports() {
    let target = MemoryStore::new();
    let server = Server::bind("127.0.0.1:0", target.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());

    let source = MemoryStore::new();
    source.put_object("b", "pre-existing", vec![9]).await.unwrap();
    source.import_iam(b"policies").await.unwrap();

    let options = ClientOptions {
        transport: TransportConfig::new(&addr.to_string()),
        filter: BucketFilter::default(),
        append_only: true,
        resync_period: Duration::from_secs(3600),
    };
    let client = tokio::spawn(run_client(source.clone(), options));

    // IAM still flows in append-only mode.
    wait_until("IAM export", || target.iam() == b"policies").await;

    // Only live changes are replicated.
    source.put_object("b", "live", vec![5, 6]).await.unwrap();
    source.inject_event(created("b", "live", &[5, 6])).await.unwrap();
    wait_until("live object", || {
        target.object_content("b", "live") == Some(vec![5, 6])
    })
    .await;

    source.close_events();
    client.await.unwrap().unwrap();

    assert_eq!(target.object_content("b", "pre-existing"), None);
    assert_eq!(target.put_calls(), 1);
    assert_eq!(target.meta_imports(), 0);
}

#[tokio::test]
async fn resync_failure_terminates_the_client() {
    let target = MemoryStore::new();
    let server = Server::bind("127.0.0.1:0", target.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());

    let source = MemoryStore::new();
    source.import_iam(b"healthy").await.unwrap();

    let options = ClientOptions {
        transport: TransportConfig::new(&addr.to_string()),
        filter: BucketFilter::default(),
        append_only: true,
        resync_period: Duration::from_millis(50),
    };
    let client = tokio::spawn(run_client(source.clone(), options));

    // Startup export succeeds; the next periodic resync hits the fault.
    wait_until("startup IAM export", || target.iam() == b"healthy").await;
    source.fail_iam_exports("cluster unavailable");

    let err = tokio::time::timeout(Duration::from_secs(5), client)
        .await
        .expect("client kept running with resync dead")
        .unwrap()
        .unwrap_err();
    assert!(err.to_string().contains("resync"), "got: {err:#}");
}

#[tokio::test]
async fn skipped_buckets_never_reach_the_target() {
    let target = MemoryStore::new();
    let server = Server::bind("127.0.0.1:0", target.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());

    let source = MemoryStore::new();
    source.put_object("keep", "k", vec![1]).await.unwrap();
    source.put_object("scratch", "k", vec![2]).await.unwrap();

    let options = ClientOptions {
        transport: TransportConfig::new(&addr.to_string()),
        filter: BucketFilter::parse("scratch"),
        append_only: false,
        resync_period: Duration::from_secs(3600),
    };
    let client = tokio::spawn(run_client(source.clone(), options));

    wait_until("kept bucket", || {
        target.object_content("keep", "k") == Some(vec![1])
    })
    .await;

    source.close_events();
    client.await.unwrap().unwrap();

    assert_eq!(target.object_content("scratch", "k"), None);
    assert_eq!(target.bucket_metadata("scratch"), None);
    assert_eq!(target.bucket_metadata("keep"), Some(b"meta:keep".to_vec()));
}
