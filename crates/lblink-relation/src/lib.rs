#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # lblink-relation: the exchange protocol over replicated namespaces
//!
//! Two peers that share no channel other than an eventually-propagated
//! key-value store negotiate a record version, then trade requests and
//! responses through it. The requesting side writes `request_<name>` keys
//! into its own namespace; the fulfilling side observes them after a
//! propagation round, answers under `response_<name>` in *its* own
//! namespace, and the answer travels back the same way.
//!
//! Nothing here blocks, spawns, or schedules: every operation is a
//! read/compute/write pass meant to run synchronously when the host learns
//! the store changed. Change and removal detection work by content digest
//! and identity bookkeeping, never by timestamps, so repeated delivery of
//! unchanged data is free.
//!
//! The host supplies two seams:
//! - [`RelationStore`]: access to the replicated namespaces, leadership,
//!   and member addresses;
//! - [`StateStore`]: durable storage for each process's own bookkeeping
//!   (which request identities it has seen, which response contents it has
//!   acknowledged).

pub mod consumer;
pub mod error;
pub mod keys;
pub mod negotiation;
pub mod producer;
pub mod state;
pub mod store;

pub use consumer::ConsumerEndpoint;
pub use error::{RelationError, Result};
pub use negotiation::{converged_relations, phase, publish_version, RelationPhase};
pub use producer::ProducerEndpoint;
pub use state::{ConsumerState, JsonFileStore, ProducerState, StateError, StateStore};
pub use store::{member_backends, RelationStore};

// Record types the endpoints traffic in.
pub use lblink_schema::{
    ContentHash, ErrorKind, HealthCheck, MemberId, Protocol, RelationId, Request, RequestId,
    Response,
};
