//! # s3mirror Core
//!
//! Replication primitives shared by the s3mirror client and server:
//!
//! - Wrapping sequence generator for acknowledgment correlation
//! - Bounded FIFO event queue with depth observability
//! - Skip-bucket filter applied to exports and live notifications

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod filter;
pub mod queue;
pub mod seq;

pub use filter::BucketFilter;
pub use queue::{bounded, QueueClosed, QueueReceiver, QueueSender, DEFAULT_CAPACITY};
pub use seq::SeqGenerator;
