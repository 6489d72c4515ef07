//! Durable process-local bookkeeping.
//!
//! The known-request and acknowledged-response records live *outside* the
//! replicated store: they are each process's own memory of what it has
//! already seen. They must survive restarts (losing them would re-announce
//! every removal and re-deliver every acknowledged response), so endpoints
//! persist them through the [`StateStore`] seam after every mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use lblink_schema::{ContentHash, RequestId};

/// Consumer-side bookkeeping: every request identity observed and not yet
/// acknowledged as removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerState {
    /// Identities of requests seen in past passes.
    pub known_requests: BTreeSet<RequestId>,
}

/// Producer-side bookkeeping: the last acknowledged response digest per
/// request name.
///
/// `None` marks a request that has been (re)sent and whose next response is
/// new whatever its content; a missing entry means the name has never been
/// sent (or its removal was acknowledged).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerState {
    /// Last acknowledged response digest, keyed by request name.
    pub acked: BTreeMap<String, Option<ContentHash>>,
}

/// Why bookkeeping could not be read or persisted.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The backing location could not be read.
    #[error("failed to read state at {location}: {source}")]
    Read {
        /// Where the state lives.
        location: String,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The backing location could not be written.
    #[error("failed to persist state at {location}: {source}")]
    Write {
        /// Where the state lives.
        location: String,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The persisted document no longer parses.
    #[error("state at {location} does not parse: {source}")]
    Corrupt {
        /// Where the state lives.
        location: String,
        /// Underlying parse failure.
        source: serde_json::Error,
    },
    /// The in-memory value could not be encoded.
    #[error("state cannot be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Durable storage for one endpoint's bookkeeping.
pub trait StateStore<T> {
    /// The last persisted value, or `T::default()` when none exists yet.
    fn load(&self) -> Result<T, StateError>;

    /// Persist the value.
    fn save(&mut self, value: &T) -> Result<(), StateError>;
}

/// File-backed state store: one JSON document, replaced atomically by
/// writing a sibling and renaming it over the previous file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// A store rooted at the given path. The parent directory must exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

impl<T: Serialize + DeserializeOwned + Default> StateStore<T> for JsonFileStore {
    fn load(&self) -> Result<T, StateError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => {
                return Err(StateError::Read {
                    location: self.location(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| StateError::Corrupt {
            location: self.location(),
            source,
        })
    }

    fn save(&mut self, value: &T) -> Result<(), StateError> {
        let text = serde_json::to_string_pretty(value).map_err(StateError::Encode)?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, text).map_err(|source| StateError::Write {
            location: staging.display().to_string(),
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| StateError::Write {
            location: self.location(),
            source,
        })
    }
}
