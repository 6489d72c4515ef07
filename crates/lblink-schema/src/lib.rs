#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # lblink-schema: wire records for the load balancer relation protocol
//!
//! Two peers exchange requests for load balancer endpoints and the responses
//! that fulfil them through a replicated key-value namespace, so nothing in
//! this crate performs I/O: it defines the record types, their canonical
//! textual encoding, and the content digests the rest of the protocol uses
//! for change detection and request/response correlation.
//!
//! ## Core concepts
//!
//! - **Canonical encoding**: a record always serializes to the same bytes
//!   for the same logical content (defaults applied, object keys sorted), so
//!   digest equality can stand in for structural equality.
//! - **Aggregate validation**: encode, decode, and hashing all run the full
//!   constraint set and report every violated field at once, never just the
//!   first.
//! - **Versioning**: record types are grouped per protocol version behind a
//!   registry; peers agree on a version number before any payload is parsed.

pub mod codec;
pub mod hash;
pub mod ids;
pub mod registry;
pub mod v1;

pub use codec::{ValidationFailure, Violation};
pub use hash::{digest, ContentHash};
pub use ids::{MemberId, RelationId, RequestId};
pub use registry::{negotiate, ProtocolVersion, CURRENT_VERSION, SUPPORTED_VERSIONS};
pub use v1::{ErrorKind, HealthCheck, Protocol, Request, Response};
