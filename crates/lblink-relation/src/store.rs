//! The host-facing store adapter.

use lblink_schema::{MemberId, RelationId};

/// Access to the replicated per-peer keyspace, implemented by the embedding
/// host.
///
/// Each relation pairs this peer's own namespace with a propagated snapshot
/// of the remote peer's. The own namespace has exactly one writer, the
/// elected leader of this peer, and local writes are visible to subsequent
/// local reads within the same pass. When a write becomes visible to the
/// *remote* peer is entirely up to the host's replication; the protocol
/// never assumes same-pass delivery.
pub trait RelationStore {
    /// Relations currently established, ordered by id. The ordering makes
    /// "first converged relation" deterministic where a protocol carries a
    /// single-peer cardinality constraint.
    fn relations(&self) -> Vec<RelationId>;

    /// Read a key from this peer's own namespace.
    fn read_local(&self, relation: RelationId, key: &str) -> Option<String>;

    /// Write a key into this peer's own namespace.
    ///
    /// Callers check [`is_leader`](Self::is_leader) first; the adapter may
    /// assume the discipline is upheld.
    fn write_local(&mut self, relation: RelationId, key: &str, value: String);

    /// Remove a key from this peer's own namespace.
    fn delete_local(&mut self, relation: RelationId, key: &str);

    /// Read a key from the propagated view of the remote namespace.
    fn read_remote(&self, relation: RelationId, key: &str) -> Option<String>;

    /// Keys with the given prefix in this peer's own namespace, in no
    /// particular order.
    fn local_keys(&self, relation: RelationId, prefix: &str) -> Vec<String>;

    /// Keys with the given prefix in the remote view, in no particular
    /// order.
    fn remote_keys(&self, relation: RelationId, prefix: &str) -> Vec<String>;

    /// Whether this process is the elected writer for its namespace.
    fn is_leader(&self) -> bool;

    /// Members backing the requested endpoints of this relation: the
    /// requesting peer's units. On the requesting side these are the
    /// host's own units; on the fulfilling side, the propagated view of
    /// them.
    fn members(&self, relation: RelationId) -> Vec<MemberId>;

    /// Advertised address of one member, if it has published one.
    fn member_address(&self, relation: RelationId, member: &MemberId) -> Option<String>;
}

/// Addresses of the members backing a relation, ordered by member id.
///
/// This is the backend list a request with no explicit backends defaults
/// to. Both sides derive it the same way so their content digests agree
/// once member data has propagated.
pub fn member_backends<S: RelationStore + ?Sized>(store: &S, relation: RelationId) -> Vec<String> {
    let mut members = store.members(relation);
    members.sort();
    members
        .iter()
        .filter_map(|member| store.member_address(relation, member))
        .collect()
}
