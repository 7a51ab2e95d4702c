//! Sender loop: drains the producer queue onto the wire.
//!
//! Synchronous-acknowledgment protocol variant: exactly one envelope is
//! in flight, and the loop reads the server's single ack byte before
//! taking the next envelope off the queue.

use crate::transport::ReconnectStream;
use anyhow::{Context, Result};
use s3mirror_core::{QueueReceiver, SeqGenerator};
use s3mirror_proto::{Ack, Envelope, FrameCodec};

/// Drains the queue, stamps sequence numbers, frames and sends
/// envelopes, and awaits acknowledgments.
pub struct SenderLoop {
    queue: QueueReceiver<Envelope>,
    transport: ReconnectStream,
    seq: SeqGenerator,
    codec: FrameCodec,
}

impl SenderLoop {
    /// Create a sender loop owning the queue receiver and transport.
    pub fn new(queue: QueueReceiver<Envelope>, transport: ReconnectStream) -> Self {
        Self {
            queue,
            transport,
            seq: SeqGenerator::new(),
            codec: FrameCodec,
        }
    }

    /// Run until every producer has dropped its queue handle.
    ///
    /// # Errors
    ///
    /// Returns error on encode failures or when the transport exhausts
    /// its retry budget; either is fatal for the replication link.
    pub async fn run(mut self) -> Result<()> {
        while let Some(mut envelope) = self.queue.recv().await {
            envelope.seq = self.seq.next();

            tracing::info!(
                seq = envelope.seq,
                kind = %envelope.kind,
                bucket = %envelope.bucket,
                name = %envelope.name,
                size = envelope.content.len(),
                "sending envelope"
            );

            let body = envelope.to_cbor().context("encode envelope")?;
            let frame = self.codec.encode(&body).context("frame envelope")?;
            self.transport
                .write_all(&frame)
                .await
                .context("write frame")?;

            let mut byte = [0u8; 1];
            self.transport
                .read_exact(&mut byte)
                .await
                .context("read acknowledgment")?;
            let ack = Ack::from_byte(byte[0]);

            tracing::debug!(seq = ack.seq, ok = ack.ok, "received ack");
            if ack.seq != envelope.seq {
                tracing::warn!(
                    sent = envelope.seq,
                    acked = ack.seq,
                    "acknowledgment sequence mismatch"
                );
            }
            if !ack.ok {
                tracing::warn!(
                    seq = envelope.seq,
                    kind = %envelope.kind,
                    bucket = %envelope.bucket,
                    name = %envelope.name,
                    "server failed to apply envelope"
                );
            }
        }

        tracing::info!("all producers finished, sender loop exiting");
        Ok(())
    }
}
