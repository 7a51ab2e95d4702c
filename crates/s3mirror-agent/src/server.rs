//! Ingestion server: accepts replication links and applies their
//! event streams to the target store.
//!
//! Each connection runs two tasks. The read task owns the frame buffer
//! and decodes as bytes arrive; complete bodies are handed over a
//! channel so decoding never blocks on apply work. The apply task owns
//! the write half, decodes envelopes, dispatches them, and answers each
//! one with an acknowledgment byte.

use crate::dispatch::Dispatcher;
use anyhow::{Context, Result};
use bytes::BytesMut;
use s3mirror_proto::{Ack, Envelope, FrameCodec, GREETING};
use s3mirror_store::ObjectStore;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// How many decoded-but-unapplied bodies one connection may buffer.
const APPLY_BACKLOG: usize = 32;

/// The replication ingestion server.
pub struct Server<S> {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher<S>>,
    next_conn_id: AtomicU64,
    connected: Arc<AtomicI64>,
}

impl<S: ObjectStore + Send + Sync + 'static> Server<S> {
    /// Bind the listen address.
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound.
    pub async fn bind(addr: &str, store: S) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind {addr}"))?;
        Ok(Self {
            listener,
            dispatcher: Arc::new(Dispatcher::new(store)),
            next_conn_id: AtomicU64::new(1),
            connected: Arc::new(AtomicI64::new(0)),
        })
    }

    /// The actually bound address.
    ///
    /// # Errors
    ///
    /// Returns error if the local address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("local addr")
    }

    /// Accept connections until interrupted.
    ///
    /// # Errors
    ///
    /// Returns error if accepting fails.
    pub async fn serve(self) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "server listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (socket, peer) = accepted.context("accept")?;
                    let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let connected = Arc::clone(&self.connected);

                    let count = connected.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::info!(conn_id, %peer, connected = count, "connection opened");

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn_id, socket, dispatcher).await {
                            tracing::warn!(conn_id, error = %e, "connection ended with error");
                        }
                        let count = connected.fetch_sub(1, Ordering::Relaxed) - 1;
                        tracing::info!(conn_id, connected = count, "connection closed");
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection<S: ObjectStore + Send + Sync + 'static>(
    conn_id: u64,
    mut socket: TcpStream,
    dispatcher: Arc<Dispatcher<S>>,
) -> Result<()> {
    socket
        .write_all(GREETING.as_bytes())
        .await
        .context("write greeting")?;

    let (read_half, write_half) = socket.into_split();
    let (body_tx, body_rx) = mpsc::channel(APPLY_BACKLOG);

    let apply_task = tokio::spawn(apply_loop(conn_id, body_rx, write_half, dispatcher));

    let read_result = read_loop(conn_id, read_half, body_tx).await;

    // body_tx is dropped by read_loop; the apply task drains and exits.
    apply_task.await.context("apply task panicked")?;
    read_result
}

/// Decode frames as bytes arrive and hand complete bodies to the apply
/// task. Never blocks on apply work beyond this connection's own
/// bounded backlog.
async fn read_loop(
    conn_id: u64,
    mut read_half: OwnedReadHalf,
    body_tx: mpsc::Sender<bytes::Bytes>,
) -> Result<()> {
    let codec = FrameCodec;
    let mut buf = BytesMut::with_capacity(8 * 1024);

    loop {
        while let Some(body) = codec
            .decode(&mut buf)
            .with_context(|| format!("invalid frame on connection {conn_id}"))?
        {
            tracing::debug!(conn_id, len = body.len(), "received frame");
            if body_tx.send(body).await.is_err() {
                // Apply task is gone, most likely a failed ack write.
                return Ok(());
            }
        }

        let n = read_half.read_buf(&mut buf).await.context("read")?;
        if n == 0 {
            return Ok(());
        }
    }
}

/// Decode and apply envelopes, acknowledging each one.
async fn apply_loop<S: ObjectStore>(
    conn_id: u64,
    mut body_rx: mpsc::Receiver<bytes::Bytes>,
    mut write_half: OwnedWriteHalf,
    dispatcher: Arc<Dispatcher<S>>,
) {
    while let Some(body) = body_rx.recv().await {
        let envelope = match Envelope::from_cbor(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Framing was intact but the body is garbage; the
                // stream cannot be trusted beyond this point.
                tracing::error!(conn_id, error = %e, "undecodable envelope, dropping connection");
                return;
            }
        };

        let ok = match dispatcher.apply(&envelope).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    conn_id,
                    seq = envelope.seq,
                    kind = %envelope.kind,
                    bucket = %envelope.bucket,
                    name = %envelope.name,
                    error = %e,
                    "apply failed"
                );
                false
            }
        };

        let ack = Ack {
            seq: envelope.seq,
            ok,
        };
        if let Err(e) = write_half.write_all(&[ack.to_byte()]).await {
            tracing::warn!(conn_id, error = %e, "ack write failed");
            return;
        }
    }
}
