//! Version marker exchange and convergence.
//!
//! A relation starts invisible. The elected leader on each side writes its
//! supported version into its own namespace; once a peer can read a marker
//! it also supports from the remote side, the relation converges and
//! traffic may flow. A missing, unparseable, or unsupported marker keeps
//! (or puts) the relation back in negotiation; failing closed is the
//! default, so no payload is ever parsed against a version the peer never
//! agreed to.

use lblink_schema::{negotiate, ProtocolVersion, RelationId, CURRENT_VERSION};
use tracing::{debug, warn};

use crate::keys::VERSION_KEY;
use crate::store::RelationStore;

/// Where a relation stands in version negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationPhase {
    /// Waiting for the remote marker, or the marker is unsupported.
    Negotiating,
    /// Both sides support this version; traffic may flow.
    Converged(ProtocolVersion),
}

/// Write the local version marker into every relation's own namespace.
///
/// Hosts call this when a relation is established and on every leadership
/// (re)acquisition. Only the elected leader writes; for any other process
/// this is a no-op rather than an error, since it is wired to lifecycle
/// events every replica observes.
pub fn publish_version<S: RelationStore>(store: &mut S) {
    if !store.is_leader() {
        return;
    }
    for relation in store.relations() {
        store.write_local(relation, VERSION_KEY, CURRENT_VERSION.number().to_string());
        debug!(%relation, version = %CURRENT_VERSION, "published version marker");
    }
}

/// Negotiation phase of one relation.
pub fn phase<S: RelationStore + ?Sized>(store: &S, relation: RelationId) -> RelationPhase {
    let Some(marker) = store.read_remote(relation, VERSION_KEY) else {
        return RelationPhase::Negotiating;
    };
    let number = match marker.trim().parse::<u32>() {
        Ok(number) => number,
        Err(_) => {
            warn!(%relation, marker, "remote version marker does not parse");
            return RelationPhase::Negotiating;
        }
    };
    match negotiate(number) {
        Some(version) => RelationPhase::Converged(version),
        None => {
            debug!(%relation, remote = number, "remote version is not supported");
            RelationPhase::Negotiating
        }
    }
}

/// Relations that have converged, with their agreed version, in id order.
///
/// This is the enumeration every endpoint operation goes through;
/// negotiating relations are invisible to them.
pub fn converged_relations<S: RelationStore + ?Sized>(
    store: &S,
) -> Vec<(RelationId, ProtocolVersion)> {
    store
        .relations()
        .into_iter()
        .filter_map(|relation| match phase(store, relation) {
            RelationPhase::Converged(version) => Some((relation, version)),
            RelationPhase::Negotiating => None,
        })
        .collect()
}
