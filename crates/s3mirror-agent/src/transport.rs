//! Self-healing TCP transport for the client side of the link.
//!
//! The stream is exclusively owned by the sender loop; `&mut self` on
//! every operation is what serializes access. Before any read or write,
//! `prepare` redials a dropped connection under a bounded retry budget
//! and re-runs the protocol handshake, so reconnects are invisible to
//! the caller apart from latency. Exhausting the budget is fatal at
//! this layer; recovery policy belongs to the embedding task.

use s3mirror_proto::GREETING;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

/// Dial and retry tuning for [`ReconnectStream`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Server address to dial.
    pub addr: String,
    /// Per-attempt dial timeout.
    pub dial_timeout: Duration,
    /// How many dial attempts before giving up.
    pub retry_times: u32,
    /// Pause between dial attempts.
    pub retry_interval: Duration,
}

impl TransportConfig {
    /// Defaults matching the deployed tuning: 3 dials, 10s apart, 3s
    /// timeout each.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            dial_timeout: Duration::from_secs(3),
            retry_times: 3,
            retry_interval: Duration::from_secs(10),
        }
    }
}

/// Errors surfaced by transport operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Every dial in the retry budget failed.
    #[error("dial {addr} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Address that was dialed.
        addr: String,
        /// Number of attempts made.
        attempts: u32,
        /// The last dial error observed.
        last: String,
    },
    /// The server's greeting line did not match the protocol handshake.
    #[error("handshake mismatch: expected {expected:?}, got {got:?}")]
    HandshakeMismatch {
        /// The expected greeting.
        expected: String,
        /// What the server actually sent.
        got: String,
    },
    /// Read or write failed mid-stream. The connection is dropped and
    /// the next operation redials.
    #[error("connection i/o error: {0}")]
    Io(String),
}

/// A TCP stream that redials and re-handshakes on demand.
#[derive(Debug)]
pub struct ReconnectStream {
    config: TransportConfig,
    stream: Option<TcpStream>,
}

impl ReconnectStream {
    /// Create a transport. No connection is made until the first
    /// operation.
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    /// Whether a live connection is currently held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Drop the connection. The next operation redials.
    pub fn close(&mut self) {
        self.stream = None;
    }

    /// Ensure a connected, handshaken stream.
    async fn prepare(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let mut last = String::from("no dial attempted");
        for attempt in 1..=self.config.retry_times {
            if attempt > 1 {
                sleep(self.config.retry_interval).await;
            }

            match timeout(
                self.config.dial_timeout,
                TcpStream::connect(&self.config.addr),
            )
            .await
            {
                Ok(Ok(mut stream)) => {
                    Self::handshake(&mut stream, self.config.dial_timeout).await?;
                    tracing::info!(addr = %self.config.addr, attempt, "connected");
                    self.stream = Some(stream);
                    return Ok(());
                }
                Ok(Err(e)) => last = e.to_string(),
                Err(_) => last = format!("dial timed out after {:?}", self.config.dial_timeout),
            }
            tracing::warn!(addr = %self.config.addr, attempt, error = %last, "dial failed");
        }

        Err(TransportError::RetriesExhausted {
            addr: self.config.addr.clone(),
            attempts: self.config.retry_times,
            last,
        })
    }

    /// Read and validate the server greeting. A mismatch is fatal, not
    /// retried: it means the far side is not an s3mirror server. The
    /// read is bounded by `limit` so a peer that accepts the dial but
    /// stays silent cannot hang the connection forever.
    async fn handshake(stream: &mut TcpStream, limit: Duration) -> Result<(), TransportError> {
        let mut line = vec![0u8; GREETING.len()];
        timeout(limit, stream.read_exact(&mut line))
            .await
            .map_err(|_| TransportError::Io(format!("greeting timed out after {limit:?}")))?
            .map_err(|e| TransportError::Io(e.to_string()))?;

        if line != GREETING.as_bytes() {
            return Err(TransportError::HandshakeMismatch {
                expected: GREETING.to_string(),
                got: String::from_utf8_lossy(&line).into_owned(),
            });
        }
        Ok(())
    }

    /// Write all of `buf`, redialing first if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::RetriesExhausted`] when disconnected
    /// and redialing fails, or [`TransportError::Io`] on a mid-stream
    /// write failure (the connection is dropped in that case).
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.prepare().await?;
        let stream = self.stream.as_mut().ok_or_else(|| {
            TransportError::Io("prepare left no stream".to_string())
        })?;

        if let Err(e) = stream.write_all(buf).await {
            self.stream = None;
            return Err(TransportError::Io(e.to_string()));
        }
        Ok(())
    }

    /// Fill `buf` completely, redialing first if necessary.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ReconnectStream::write_all`].
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        self.prepare().await?;
        let stream = self.stream.as_mut().ok_or_else(|| {
            TransportError::Io("prepare left no stream".to_string())
        })?;

        if let Err(e) = stream.read_exact(buf).await {
            self.stream = None;
            return Err(TransportError::Io(e.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn refused_addr() -> String {
        // Bind then drop to get a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    #[tokio::test]
    async fn retry_budget_is_exact_and_spaced() {
        let interval = Duration::from_millis(50);
        let mut conn = ReconnectStream::new(TransportConfig {
            addr: refused_addr().await,
            dial_timeout: Duration::from_millis(200),
            retry_times: 3,
            retry_interval: interval,
        });

        let start = Instant::now();
        let err = conn.write_all(b"x").await.unwrap_err();

        match err {
            TransportError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        // Three dials have two inter-attempt pauses between them.
        assert!(start.elapsed() >= interval * 2);
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn handshake_and_write_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(GREETING.as_bytes()).await.unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut conn = ReconnectStream::new(TransportConfig {
            addr,
            dial_timeout: Duration::from_secs(1),
            retry_times: 3,
            retry_interval: Duration::from_millis(10),
        });

        conn.write_all(b"hello").await.unwrap();
        assert!(conn.is_connected());
        assert_eq!(&server.await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn silent_peer_cannot_hang_the_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        // Accept the dial, then never write the greeting.
        let hold = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let mut conn = ReconnectStream::new(TransportConfig {
            addr,
            dial_timeout: Duration::from_millis(100),
            retry_times: 1,
            retry_interval: Duration::from_millis(10),
        });

        let start = Instant::now();
        let err = conn.write_all(b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
        assert!(start.elapsed() < Duration::from_secs(5));
        hold.abort();
    }

    #[tokio::test]
    async fn greeting_mismatch_is_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Same length as the real greeting, wrong content.
            let wrong = &b"imposter hello  !\n"[..GREETING.len()];
            socket.write_all(wrong).await.unwrap();
        });

        let mut conn = ReconnectStream::new(TransportConfig {
            addr,
            dial_timeout: Duration::from_secs(1),
            retry_times: 1,
            retry_interval: Duration::from_millis(10),
        });

        let err = conn.write_all(b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::HandshakeMismatch { .. }));
    }
}
