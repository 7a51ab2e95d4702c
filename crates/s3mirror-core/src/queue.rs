//! Bounded producer queue.
//!
//! All event sources (full export, metadata export, periodic resync,
//! live listener) hand envelopes to the single sender loop through this
//! queue. When the queue is full, producers block rather than drop:
//! completeness is favored over liveness, so a stalled transport stalls
//! every producer. The depth accessor exists so that condition is
//! visible to operators before producers silently stop making progress.

use tokio::sync::mpsc;

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 8;

/// Error returned when the draining side of the queue has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event queue closed: receiver dropped")]
pub struct QueueClosed;

/// Producer handle. Cheap to clone; one per event source.
#[derive(Debug)]
pub struct QueueSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> QueueSender<T> {
    /// Enqueue one item, waiting for a free slot when the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the receiver was dropped.
    pub async fn send(&self, item: T) -> Result<(), QueueClosed> {
        self.tx.send(item).await.map_err(|_| QueueClosed)
    }

    /// Number of items currently buffered.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Total queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consumer handle, owned by the sender loop.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> QueueReceiver<T> {
    /// Receive the next item in submission order, or `None` once every
    /// producer handle has been dropped.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

/// Create a bounded FIFO queue.
///
/// # Panics
///
/// Panics if `capacity` is zero (bounded channels need at least one
/// slot).
#[must_use]
pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueSender { tx }, QueueReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn fifo_across_producers() {
        let (tx, mut rx) = bounded(DEFAULT_CAPACITY);
        let tx2 = tx.clone();
        let tx3 = tx.clone();

        tx.send("a").await.unwrap();
        tx2.send("b").await.unwrap();
        tx3.send("c").await.unwrap();

        assert_eq!(rx.recv().await, Some("a"));
        assert_eq!(rx.recv().await, Some("b"));
        assert_eq!(rx.recv().await, Some("c"));
    }

    #[tokio::test]
    async fn full_queue_blocks_until_drained() {
        let (tx, mut rx) = bounded(2);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        assert_eq!(tx.depth(), 2);

        let mut blocked = task::spawn(tx.send(3));
        assert_pending!(blocked.poll());

        // Draining one slot unblocks the producer.
        assert_eq!(rx.recv().await, Some(1));
        assert_ready!(blocked.poll()).unwrap();
        drop(blocked);

        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn send_after_receiver_drop_errors() {
        let (tx, rx) = bounded(1);
        drop(rx);
        assert_eq!(tx.send(1).await, Err(QueueClosed));
    }

    #[tokio::test]
    async fn depth_tracks_buffered_items() {
        let (tx, mut rx) = bounded(4);
        assert_eq!(tx.depth(), 0);
        assert_eq!(tx.capacity(), 4);

        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        assert_eq!(tx.depth(), 2);

        rx.recv().await.unwrap();
        assert_eq!(tx.depth(), 1);
    }
}
