//! # s3mirror Protocol
//!
//! Wire protocol for the replication link between the s3mirror client
//! (source cluster) and server (target cluster).
//!
//! ## Wire format
//!
//! Each replication event travels as one frame:
//!
//! ```text
//! +-----------+-----------------------+
//! |   magic   |   body len (u32 BE)   |
//! +-----------+-----------+-----------+
//! |   body (CBOR-encoded Envelope)    |
//! +-----------------------------------+
//! ```
//!
//! The server answers every applied envelope with a single
//! acknowledgment byte (`bit 0` = ok flag, `bits 1-7` = sequence).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ack;
pub mod envelope;
pub mod frame;

pub use ack::Ack;
pub use envelope::{Envelope, EventKind, WireError};
pub use frame::{FrameCodec, FrameError, GREETING, MAGIC, MAX_BODY_LEN};
