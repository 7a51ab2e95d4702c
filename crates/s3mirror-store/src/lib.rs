//! # s3mirror Store Boundary
//!
//! The object-storage control/data API consumed by the replication
//! pipeline, treated as a black-box collaborator:
//!
//! - [`ObjectStore`]: the trait both ends of the link program against
//! - [`HttpStore`]: adapter for a cluster's HTTP admin API
//! - [`MemoryStore`]: in-memory store used by tests
//!
//! The pipeline does not retry store calls; retry policy, if any, lives
//! behind this boundary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod http;
pub mod memory;

pub use api::{ChangeKind, ChangeRecord, ObjectEntry, ObjectStat, ObjectStore, StoreError};
pub use http::{HttpStore, HttpStoreConfig};
pub use memory::MemoryStore;
