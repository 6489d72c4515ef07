//! The request-producing endpoint: asks for load balancer endpoints.
//!
//! Runs on the peer that wants endpoints provisioned. It writes requests
//! into its own namespace, watches the remote view for responses, and
//! decides which responses are news by comparing digests: a response is
//! surfaced when its correlation token matches the request content
//! currently on file *and* its own digest differs from whatever was last
//! acknowledged.

use tracing::{debug, trace, warn};

use lblink_schema::{registry, ContentHash, ProtocolVersion, RelationId, Request, Response};

use crate::error::{RelationError, Result};
use crate::keys;
use crate::negotiation::{self, converged_relations};
use crate::state::{ProducerState, StateStore};
use crate::store::{member_backends, RelationStore};

/// Issues requests and tracks the responses that answer them.
pub struct ProducerEndpoint<P> {
    persistence: P,
    state: ProducerState,
}

impl<P: StateStore<ProducerState>> ProducerEndpoint<P> {
    /// Create an endpoint, reloading bookkeeping persisted by an earlier
    /// process instance.
    pub fn new(persistence: P) -> Result<Self> {
        let state = persistence.load()?;
        Ok(Self { persistence, state })
    }

    /// Announce the local protocol version (leader only, no-op otherwise).
    pub fn publish_version<S: RelationStore>(&self, store: &mut S) {
        negotiation::publish_version(store);
    }

    /// The relation requests go over: the first converged one. Requests
    /// have single-peer cardinality, and relation enumeration is ordered,
    /// so the choice is deterministic.
    pub fn relation<S: RelationStore>(&self, store: &S) -> Option<(RelationId, ProtocolVersion)> {
        converged_relations(store).into_iter().next()
    }

    /// Whether a converged relation exists at all.
    pub fn is_available<S: RelationStore>(&self, store: &S) -> bool {
        self.relation(store).is_some()
    }

    /// Whether this process may send requests right now: a converged
    /// relation exists and it holds leadership.
    pub fn can_request<S: RelationStore>(&self, store: &S) -> bool {
        self.is_available(store) && store.is_leader()
    }

    /// The request stored under `name`, with any visible response merged
    /// in, or a fresh unpopulated request bound to that name.
    ///
    /// Requires leadership and a converged relation: this is the staging
    /// step for a write, and only the leader may hold a view it intends to
    /// send.
    pub fn get_request<S: RelationStore>(&self, store: &S, name: &str) -> Result<Request> {
        if !store.is_leader() {
            return Err(RelationError::NotLeader);
        }
        let Some((relation, version)) = self.relation(store) else {
            return Err(RelationError::Unavailable);
        };
        let Some(text) = store.read_local(relation, &keys::request_key(name)) else {
            let mut request = Request::new(name);
            request.relation = Some(relation);
            return Ok(request);
        };
        let mut request = registry::decode_request(version, name, &text)?;
        request.relation = Some(relation);
        if let Some(text) = store.read_remote(relation, &keys::response_key(name)) {
            match registry::decode_response(version, name, &text) {
                Ok(response) => request.response = response,
                Err(failure) => {
                    warn!(%relation, name, %failure, "remote response does not decode");
                }
            }
        }
        Ok(request)
    }

    /// Send (or update) a request.
    ///
    /// Validates and writes the request into the local namespace, and
    /// resets the acknowledgment record for its name: whatever response
    /// arrives next is new by definition, even if its content matches an
    /// answer to some earlier version of the request.
    pub fn send_request<S: RelationStore>(&mut self, store: &mut S, request: &Request) -> Result<()> {
        if !store.is_leader() {
            return Err(RelationError::NotLeader);
        }
        let Some((relation, _)) = self.relation(store) else {
            return Err(RelationError::Unavailable);
        };
        let text = request.encode()?;
        store.write_local(relation, &keys::request_key(&request.name), text);
        self.state.acked.insert(request.name.clone(), None);
        self.persistence.save(&self.state)?;
        debug!(%relation, name = %request.name, "sent request");
        Ok(())
    }

    /// Withdraw a request entirely. The fulfilling side observes the key's
    /// disappearance through its own removal detection.
    pub fn remove_request<S: RelationStore>(&mut self, store: &mut S, name: &str) -> Result<()> {
        if !store.is_leader() {
            return Err(RelationError::NotLeader);
        }
        let Some((relation, _)) = self.relation(store) else {
            return Ok(());
        };
        store.delete_local(relation, &keys::request_key(name));
        if self.state.acked.remove(name).is_some() {
            self.persistence.save(&self.state)?;
        }
        debug!(%relation, name, "removed request");
        Ok(())
    }

    /// The response visible for one request name, if any.
    pub fn get_response<S: RelationStore>(&self, store: &S, name: &str) -> Result<Option<Response>> {
        Ok(self
            .all_responses(store)?
            .into_iter()
            .find(|response| response.name == name))
    }

    /// Every response visible for requests this peer has on file.
    ///
    /// Non-leaders get an empty list without reading, mirroring the
    /// consumer side: replicas must not accumulate divergent views.
    pub fn all_responses<S: RelationStore>(&self, store: &S) -> Result<Vec<Response>> {
        if !store.is_leader() {
            return Ok(Vec::new());
        }
        let Some((relation, version)) = self.relation(store) else {
            return Ok(Vec::new());
        };
        let mut names: Vec<String> = store
            .local_keys(relation, keys::REQUEST_KEY_PREFIX)
            .iter()
            .filter_map(|key| keys::request_name(key))
            .map(String::from)
            .collect();
        names.sort();

        let mut responses = Vec::new();
        for name in names {
            let Some(text) = store.read_remote(relation, &keys::response_key(&name)) else {
                continue;
            };
            match registry::decode_response(version, &name, &text) {
                Ok(response) => responses.push(response),
                Err(failure) => {
                    warn!(%relation, %name, %failure, "skipping response that does not decode");
                }
            }
        }
        Ok(responses)
    }

    /// Responses that answer the request content currently on file and have
    /// not yet been acknowledged.
    ///
    /// A response whose correlation token no longer matches is stale (the
    /// request changed after it was produced) and is neither surfaced nor
    /// an error; the updated answer will arrive through the same path.
    pub fn new_responses<S: RelationStore>(&self, store: &S) -> Result<Vec<Response>> {
        let Some((relation, version)) = self.relation(store) else {
            return Ok(Vec::new());
        };
        let mut fresh = Vec::new();
        for response in self.all_responses(store)? {
            let current = self.current_request_hash(store, relation, version, &response.name);
            if response.received_hash != current {
                trace!(name = %response.name, "response is stale, awaiting a current one");
                continue;
            }
            let acked = self.state.acked.get(&response.name).copied().flatten();
            if response.hash() != acked {
                fresh.push(response);
            }
        }
        Ok(fresh)
    }

    /// Record a response as handled. Until the request changes again,
    /// repeated delivery of the same content stays invisible.
    pub fn ack_response(&mut self, response: &Response) -> Result<()> {
        let hash = response.try_hash()?;
        let previous = self
            .state
            .acked
            .insert(response.name.clone(), Some(hash));
        if previous != Some(Some(hash)) {
            self.persistence.save(&self.state)?;
        }
        Ok(())
    }

    /// Names whose acknowledged response has been withdrawn by the remote
    /// peer while the request itself is still on file.
    ///
    /// Reported on every pass until [`ack_revocation`] clears the name's
    /// tracking entry.
    ///
    /// [`ack_revocation`]: Self::ack_revocation
    pub fn revoked_responses<S: RelationStore>(&self, store: &S) -> Result<Vec<String>> {
        if !store.is_leader() {
            return Ok(Vec::new());
        }
        let Some((relation, _)) = self.relation(store) else {
            return Ok(Vec::new());
        };
        let mut revoked = Vec::new();
        for (name, acked) in &self.state.acked {
            if acked.is_none() {
                // Nothing was ever delivered for this name.
                continue;
            }
            if store.read_local(relation, &keys::request_key(name)).is_none() {
                // We withdrew the request ourselves.
                continue;
            }
            if store.read_remote(relation, &keys::response_key(name)).is_none() {
                revoked.push(name.clone());
            }
        }
        Ok(revoked)
    }

    /// Stop reporting a revoked response and forget its acknowledgment, so
    /// a reissued response counts as new.
    pub fn ack_revocation(&mut self, name: &str) -> Result<()> {
        if self.state.acked.remove(name).is_some() {
            self.persistence.save(&self.state)?;
        }
        Ok(())
    }

    /// Whether any response needs attention. Hosts poll this when the
    /// store propagates.
    pub fn is_changed<S: RelationStore>(&self, store: &S) -> Result<bool> {
        Ok(!self.new_responses(store)?.is_empty())
    }

    /// Digest of the request content currently on file for `name`, with
    /// backends defaulted the same way the fulfilling side defaults them,
    /// so both sides agree on what "current" means.
    fn current_request_hash<S: RelationStore>(
        &self,
        store: &S,
        relation: RelationId,
        version: ProtocolVersion,
        name: &str,
    ) -> Option<ContentHash> {
        let text = store.read_local(relation, &keys::request_key(name))?;
        let mut request = registry::decode_request(version, name, &text).ok()?;
        if request.backends.is_empty() {
            request.backends = member_backends(store, relation);
        }
        request.hash()
    }
}
