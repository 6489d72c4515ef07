//! Protocol version registry.
//!
//! A peer announces a single version number before any payload flows; the
//! registry is the only place that maps an agreed number to concrete record
//! codecs. Exactly one version is current at build time; older and newer
//! numbers are placeholders so that a future version can coexist with this
//! one without breaking peers deployed mid-relationship.

use std::fmt;

use crate::codec::ValidationFailure;
use crate::v1;

/// A protocol version both ends of a relation can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    /// The first (and current) record set.
    V1,
}

/// Every version this build can speak, ascending.
pub const SUPPORTED_VERSIONS: &[ProtocolVersion] = &[ProtocolVersion::V1];

/// The version announced to peers.
pub const CURRENT_VERSION: ProtocolVersion = ProtocolVersion::V1;

impl ProtocolVersion {
    /// Wire number of this version.
    pub fn number(self) -> u32 {
        match self {
            Self::V1 => 1,
        }
    }

    /// Version for a wire number, if this build knows it.
    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            1 => Some(Self::V1),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Pick the version to speak with a peer announcing `remote`.
///
/// The result is the highest version both sides support; with a single
/// supported version that reduces to "theirs, if we know it". `None` keeps
/// the relation in negotiation: no payload is parsed against a version the
/// peer never agreed to.
pub fn negotiate(remote: u32) -> Option<ProtocolVersion> {
    let remote = ProtocolVersion::from_number(remote)?;
    SUPPORTED_VERSIONS.iter().copied().filter(|v| *v <= remote).max()
}

/// Decode a stored request payload under an agreed version.
pub fn decode_request(
    version: ProtocolVersion,
    name: &str,
    text: &str,
) -> Result<v1::Request, ValidationFailure> {
    match version {
        ProtocolVersion::V1 => v1::Request::decode(name, text),
    }
}

/// Decode a stored response payload under an agreed version.
pub fn decode_response(
    version: ProtocolVersion,
    name: &str,
    text: &str,
) -> Result<v1::Response, ValidationFailure> {
    match version {
        ProtocolVersion::V1 => v1::Response::decode(name, text),
    }
}
