//! In-memory store and state implementations.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use lblink_relation::{RelationStore, StateError, StateStore};
use lblink_schema::{MemberId, RelationId};

#[derive(Debug, Clone, Default)]
struct MemoryRelation {
    /// This peer's own namespace: what it has written.
    local: BTreeMap<String, String>,
    /// Propagated snapshot of the other peer's namespace.
    remote: BTreeMap<String, String>,
    /// Addresses of the members backing requested endpoints, as this peer
    /// currently observes them.
    members: BTreeMap<MemberId, String>,
}

/// One peer process over an in-memory keyspace.
///
/// Local writes are immediately visible to local reads; the remote snapshot
/// only changes when a [`RelationLink`] propagates, or when a test injects
/// remote data directly.
#[derive(Debug, Clone, Default)]
pub struct MemoryPeer {
    leader: bool,
    relations: BTreeMap<RelationId, MemoryRelation>,
}

impl MemoryPeer {
    /// A peer with no relations that is not the leader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant or revoke leadership.
    pub fn set_leader(&mut self, leader: bool) {
        self.leader = leader;
    }

    /// Establish a relation.
    pub fn add_relation(&mut self, relation: RelationId) {
        self.relations.entry(relation).or_default();
    }

    /// Tear a relation down entirely.
    pub fn remove_relation(&mut self, relation: RelationId) {
        self.relations.remove(&relation);
    }

    /// Set the observed address of a backing member.
    pub fn set_member(&mut self, relation: RelationId, member: &str, address: &str) {
        self.relations
            .entry(relation)
            .or_default()
            .members
            .insert(MemberId::new(member), address.to_string());
    }

    /// Forget a backing member.
    pub fn remove_member(&mut self, relation: RelationId, member: &str) {
        if let Some(rel) = self.relations.get_mut(&relation) {
            rel.members.remove(&MemberId::new(member));
        }
    }

    /// Inject a key directly into the remote snapshot, bypassing
    /// propagation, for tests that need a remote state no peer of this
    /// build would write (e.g. an unsupported version marker).
    pub fn set_remote(&mut self, relation: RelationId, key: &str, value: &str) {
        self.relations
            .entry(relation)
            .or_default()
            .remote
            .insert(key.to_string(), value.to_string());
    }

    /// Remove a key from the remote snapshot directly.
    pub fn remove_remote(&mut self, relation: RelationId, key: &str) {
        if let Some(rel) = self.relations.get_mut(&relation) {
            rel.remote.remove(key);
        }
    }

    /// Inspect this peer's own namespace.
    pub fn local_data(&self, relation: RelationId) -> BTreeMap<String, String> {
        self.relations
            .get(&relation)
            .map(|rel| rel.local.clone())
            .unwrap_or_default()
    }
}

impl RelationStore for MemoryPeer {
    fn relations(&self) -> Vec<RelationId> {
        self.relations.keys().copied().collect()
    }

    fn read_local(&self, relation: RelationId, key: &str) -> Option<String> {
        self.relations.get(&relation)?.local.get(key).cloned()
    }

    fn write_local(&mut self, relation: RelationId, key: &str, value: String) {
        self.relations
            .entry(relation)
            .or_default()
            .local
            .insert(key.to_string(), value);
    }

    fn delete_local(&mut self, relation: RelationId, key: &str) {
        if let Some(rel) = self.relations.get_mut(&relation) {
            rel.local.remove(key);
        }
    }

    fn read_remote(&self, relation: RelationId, key: &str) -> Option<String> {
        self.relations.get(&relation)?.remote.get(key).cloned()
    }

    fn local_keys(&self, relation: RelationId, prefix: &str) -> Vec<String> {
        match self.relations.get(&relation) {
            Some(rel) => rel
                .local
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    fn remote_keys(&self, relation: RelationId, prefix: &str) -> Vec<String> {
        match self.relations.get(&relation) {
            Some(rel) => rel
                .remote
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    fn is_leader(&self) -> bool {
        self.leader
    }

    fn members(&self, relation: RelationId) -> Vec<MemberId> {
        match self.relations.get(&relation) {
            Some(rel) => rel.members.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    fn member_address(&self, relation: RelationId, member: &MemberId) -> Option<String> {
        self.relations.get(&relation)?.members.get(member).cloned()
    }
}

/// Two peers joined over one relation, with propagation under test control.
///
/// `producer` is the side that issues requests; `consumer` the side that
/// fulfils them. Member addresses describe the producer's units and are
/// applied to both peers' views at once; a test that needs to model
/// member-address propagation lag can drive two bare [`MemoryPeer`]s
/// instead.
#[derive(Debug)]
pub struct RelationLink {
    /// The request-issuing peer.
    pub producer: MemoryPeer,
    /// The request-fulfilling peer.
    pub consumer: MemoryPeer,
    relation: RelationId,
}

impl RelationLink {
    /// Join two fresh peers over the given relation id.
    pub fn new(relation: RelationId) -> Self {
        let mut link = Self {
            producer: MemoryPeer::new(),
            consumer: MemoryPeer::new(),
            relation,
        };
        link.producer.add_relation(relation);
        link.consumer.add_relation(relation);
        link
    }

    /// The relation the peers share.
    pub fn relation(&self) -> RelationId {
        self.relation
    }

    /// Record a backing member's address on both peers' views.
    pub fn set_member(&mut self, member: &str, address: &str) {
        self.producer.set_member(self.relation, member, address);
        self.consumer.set_member(self.relation, member, address);
    }

    /// Copy the producer's own namespace into the consumer's remote
    /// snapshot, deletions included.
    pub fn propagate_producer_to_consumer(&mut self) {
        let snapshot = self.producer.local_data(self.relation);
        if let Some(rel) = self.consumer.relations.get_mut(&self.relation) {
            rel.remote = snapshot;
        }
    }

    /// Copy the consumer's own namespace into the producer's remote
    /// snapshot, deletions included.
    pub fn propagate_consumer_to_producer(&mut self) {
        let snapshot = self.consumer.local_data(self.relation);
        if let Some(rel) = self.producer.relations.get_mut(&self.relation) {
            rel.remote = snapshot;
        }
    }

    /// One full replication round in both directions.
    pub fn propagate(&mut self) {
        self.propagate_producer_to_consumer();
        self.propagate_consumer_to_producer();
    }
}

/// In-memory durable state with restart semantics.
///
/// The persisted document is held behind a shared handle: cloning the store
/// and handing the clone to a freshly constructed endpoint models a process
/// restart that reloads the previous instance's bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    saved: Rc<RefCell<Option<String>>>,
}

impl MemoryStateStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Serialize + DeserializeOwned + Default> StateStore<T> for MemoryStateStore {
    fn load(&self) -> Result<T, StateError> {
        match self.saved.borrow().as_deref() {
            None => Ok(T::default()),
            Some(text) => serde_json::from_str(text).map_err(|source| StateError::Corrupt {
                location: "<memory>".to_string(),
                source,
            }),
        }
    }

    fn save(&mut self, value: &T) -> Result<(), StateError> {
        let text = serde_json::to_string(value).map_err(StateError::Encode)?;
        *self.saved.borrow_mut() = Some(text);
        Ok(())
    }
}
