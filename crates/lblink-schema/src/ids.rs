//! Identities shared by both sides of the protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric identifier of one relation between a local and a remote
/// namespace. Hosts assign these; enumeration order follows the number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RelationId(pub u64);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one member (unit) backing a requested endpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    /// Create a member identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity of a request: the relation it arrived over plus its name.
///
/// This is what the consumer's removal bookkeeping records, so it must be
/// orderable and serializable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId {
    /// Originating relation.
    pub relation: RelationId,
    /// Request name, unique within its namespace.
    pub name: String,
}

impl RequestId {
    /// Build an identity from its parts.
    pub fn new(relation: RelationId, name: impl Into<String>) -> Self {
        Self {
            relation,
            name: name.into(),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.relation, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_order_by_relation_then_name() {
        let a = RequestId::new(RelationId(1), "zeta");
        let b = RequestId::new(RelationId(2), "alpha");
        let c = RequestId::new(RelationId(2), "beta");
        assert!(a < b && b < c);
    }

    #[test]
    fn display_forms() {
        assert_eq!(RequestId::new(RelationId(3), "web").to_string(), "3:web");
        assert_eq!(MemberId::new("app/0").to_string(), "app/0");
    }
}
