#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # lblink-testkit: in-memory peers for protocol tests
//!
//! The real store adapter is backed by a replicated keyspace whose
//! propagation the protocol cannot observe. The harness here reproduces
//! that shape in memory: two [`MemoryPeer`]s joined by a [`RelationLink`],
//! where one side's writes become visible to the other only when a test
//! explicitly calls a `propagate_*` method: the replication round under
//! the test's control.

pub mod builders;
pub mod memory;

pub use builders::sample_request;
pub use memory::{MemoryPeer, MemoryStateStore, RelationLink};
