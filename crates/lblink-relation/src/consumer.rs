//! The request-consuming endpoint: fulfils load balancer requests.
//!
//! Runs on the peer that provisions endpoints. Each evaluation pass reads
//! the requests advertised across converged relations, decides which are
//! new (by digest), which are gone (by identity bookkeeping), and writes
//! responses back into the local namespace.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use lblink_schema::{registry, Request, RequestId};

use crate::error::{RelationError, Result};
use crate::keys;
use crate::negotiation::{self, converged_relations, phase, RelationPhase};
use crate::state::{ConsumerState, StateStore};
use crate::store::{member_backends, RelationStore};

/// Fulfils requests advertised by remote peers.
///
/// The store is passed into every operation rather than owned, so tests and
/// hosts can hand the same store to several collaborators; the endpoint
/// itself owns only its durable bookkeeping.
pub struct ConsumerEndpoint<P> {
    persistence: P,
    state: ConsumerState,
}

impl<P: StateStore<ConsumerState>> ConsumerEndpoint<P> {
    /// Create an endpoint, reloading bookkeeping persisted by an earlier
    /// process instance. The known-identifiers set starts empty on first
    /// run.
    pub fn new(persistence: P) -> Result<Self> {
        let state = persistence.load()?;
        Ok(Self { persistence, state })
    }

    /// Announce the local protocol version (leader only, no-op otherwise).
    pub fn publish_version<S: RelationStore>(&self, store: &mut S) {
        negotiation::publish_version(store);
    }

    /// Every request currently advertised across converged relations.
    ///
    /// Only the leader reads: replicas must not build up divergent views of
    /// the request set, so non-leaders get an empty list without touching
    /// the store. Requests without explicit backends are defaulted from the
    /// relation's member addresses, ordered by member id. Observed
    /// identities are added to the durable known set.
    pub fn all_requests<S: RelationStore>(&mut self, store: &S) -> Result<Vec<Request>> {
        if !store.is_leader() {
            return Ok(Vec::new());
        }
        let mut requests = Vec::new();
        for (relation, version) in converged_relations(store) {
            let mut request_keys = store.remote_keys(relation, keys::REQUEST_KEY_PREFIX);
            request_keys.sort();
            for key in request_keys {
                let Some(name) = keys::request_name(&key) else {
                    continue;
                };
                let Some(text) = store.read_remote(relation, &key) else {
                    continue;
                };
                let mut request = match registry::decode_request(version, name, &text) {
                    Ok(request) => request,
                    Err(failure) => {
                        warn!(%relation, name, %failure, "skipping request that does not decode");
                        continue;
                    }
                };
                request.relation = Some(relation);
                if let Some(text) = store.read_local(relation, &keys::response_key(name)) {
                    match registry::decode_response(version, name, &text) {
                        Ok(response) => request.response = response,
                        Err(failure) => {
                            warn!(%relation, name, %failure, "stored response does not decode");
                        }
                    }
                }
                if request.backends.is_empty() {
                    request.backends = member_backends(store, relation);
                }
                requests.push(request);
            }
        }

        let mut grew = false;
        for request in &requests {
            if let Some(id) = request.id() {
                grew |= self.state.known_requests.insert(id);
            }
        }
        if grew {
            self.persistence.save(&self.state)?;
        }
        Ok(requests)
    }

    /// Requests whose current content has not been answered: no response on
    /// file, or a response stamped with a different content digest.
    pub fn new_requests<S: RelationStore>(&mut self, store: &S) -> Result<Vec<Request>> {
        Ok(self
            .all_requests(store)?
            .into_iter()
            .filter(|request| request.response.received_hash != request.hash())
            .collect())
    }

    /// Identities observed before that are no longer advertised, as
    /// identity-only placeholder requests.
    ///
    /// A removal is reported on every pass until [`ack_removal`] drops it
    /// from the known set (idempotent, not one-shot), so a host that
    /// crashes mid-cleanup sees it again. Identities whose relation is
    /// still present but mid-negotiation are in limbo, not removed: the
    /// request may well still exist on the other side.
    ///
    /// [`ack_removal`]: Self::ack_removal
    pub fn removed_requests<S: RelationStore>(&mut self, store: &S) -> Result<Vec<Request>> {
        if !store.is_leader() {
            return Ok(Vec::new());
        }
        let current: BTreeSet<RequestId> = self
            .all_requests(store)?
            .iter()
            .filter_map(Request::id)
            .collect();
        let relations = store.relations();
        Ok(self
            .state
            .known_requests
            .iter()
            .filter(|id| !current.contains(*id))
            .filter(|id| {
                !relations.contains(&id.relation)
                    || matches!(phase(store, id.relation), RelationPhase::Converged(_))
            })
            .map(Request::placeholder)
            .collect())
    }

    /// Stop reporting a removed request.
    pub fn ack_removal(&mut self, request: &Request) -> Result<()> {
        if let Some(id) = request.id() {
            if self.state.known_requests.remove(&id) {
                self.persistence.save(&self.state)?;
            }
        }
        Ok(())
    }

    /// Answer a request.
    ///
    /// Stamps the response's correlation token with the request's content
    /// digest *now*, at the moment of sending, then writes it into the local
    /// namespace under the response key. Requires leadership.
    pub fn send_response<S: RelationStore>(
        &mut self,
        store: &mut S,
        request: &mut Request,
    ) -> Result<()> {
        if !store.is_leader() {
            return Err(RelationError::NotLeader);
        }
        let Some(relation) = request.relation else {
            return Err(RelationError::Unavailable);
        };
        let token = request.try_hash()?;
        request.response.name = request.name.clone();
        request.response.received_hash = Some(token);
        let text = request.response.encode()?;
        store.write_local(relation, &keys::response_key(&request.name), text);
        debug!(%relation, name = %request.name, success = request.response.is_success(), "sent response");
        Ok(())
    }

    /// Withdraw the response for a request.
    ///
    /// A no-op when the originating relation no longer exists; there is
    /// nothing left to clean up. Requires leadership.
    pub fn revoke_response<S: RelationStore>(
        &mut self,
        store: &mut S,
        request: &Request,
    ) -> Result<()> {
        if !store.is_leader() {
            return Err(RelationError::NotLeader);
        }
        let Some(relation) = request.relation else {
            return Ok(());
        };
        if !store.relations().contains(&relation) {
            return Ok(());
        }
        store.delete_local(relation, &keys::response_key(&request.name));
        debug!(%relation, name = %request.name, "revoked response");
        Ok(())
    }

    /// Whether anything needs attention: a request is new or a known one
    /// disappeared. Hosts poll this when the store propagates.
    pub fn is_changed<S: RelationStore>(&mut self, store: &S) -> Result<bool> {
        Ok(!self.new_requests(store)?.is_empty() || !self.removed_requests(store)?.is_empty())
    }
}
