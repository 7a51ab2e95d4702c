//! # s3mirror Agent
//!
//! Runtime for both ends of the replication link.
//!
//! The **client** side exports IAM state, bucket metadata, and objects
//! from the source cluster and streams change events through a bounded
//! queue, a single sender loop, and a self-healing TCP transport. The
//! **server** side accepts those links, decodes frames as bytes
//! arrive, and applies envelopes to the target cluster without ever
//! blocking the network loop on apply work.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod dispatch;
pub mod sender;
pub mod server;
pub mod sources;
pub mod transport;

pub use client::{run_client, ClientOptions};
pub use dispatch::Dispatcher;
pub use server::Server;
pub use transport::{ReconnectStream, TransportConfig, TransportError};
