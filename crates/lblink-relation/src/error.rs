//! Protocol-level failures.

use lblink_schema::ValidationFailure;

use crate::state::StateError;

/// Why an endpoint operation was refused.
///
/// None of these are retryable as-is: a payload stays invalid, a non-leader
/// stays a non-leader, and an unconverged relation stays unconverged until
/// something outside this layer changes. Fulfilment failures are *not*
/// errors; they ride inside [`Response`](lblink_schema::Response) payloads.
#[derive(Debug, thiserror::Error)]
pub enum RelationError {
    /// A payload failed schema constraints.
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// A write was attempted without holding leadership.
    #[error("local process is not the elected writer for its namespace")]
    NotLeader,

    /// No relation has converged on a shared protocol version.
    #[error("no converged relation is available")]
    Unavailable,

    /// Durable bookkeeping could not be read or persisted.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Result alias for endpoint operations.
pub type Result<T> = std::result::Result<T, RelationError>;
