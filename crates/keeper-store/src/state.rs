use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use keeper_types::{ActorId, Credential, Envelope, EventStatus, Payload, Sequence, StatusMask};

use crate::error::{StoreError, StoreResult};

struct PairingEntry {
    actor: ActorId,
    redeemed: bool,
}

/// Tables shared by every backend.
///
/// Mutators apply unconditionally; callers check preconditions first (under
/// the write gate) so that replaying a record log never re-litigates a
/// decision that was already made durable.
pub(crate) struct StoreState {
    events: BTreeMap<Sequence, Envelope>,
    credentials: HashMap<Credential, ActorId>,
    actors: BTreeSet<ActorId>,
    pairing: HashMap<String, PairingEntry>,
}

impl StoreState {
    pub(crate) fn new() -> Self {
        let mut actors = BTreeSet::new();
        actors.insert(ActorId::ROOT);
        Self {
            events: BTreeMap::new(),
            credentials: HashMap::new(),
            actors,
            pairing: HashMap::new(),
        }
    }

    // ---- Events ----

    pub(crate) fn insert_batch(&mut self, source: ActorId, batch: Vec<(Sequence, Payload)>) {
        for (sequence, payload) in batch {
            self.events
                .insert(sequence, Envelope::pending(sequence, source, payload));
        }
    }

    pub(crate) fn scan(&self, after: Sequence, mask: StatusMask) -> Vec<Envelope> {
        self.events
            .range((Bound::Excluded(after), Bound::Unbounded))
            .map(|(_, envelope)| envelope)
            .filter(|envelope| mask.contains(envelope.status))
            .cloned()
            .collect()
    }

    pub(crate) fn status_of(&self, sequence: Sequence) -> StoreResult<EventStatus> {
        self.events
            .get(&sequence)
            .map(|envelope| envelope.status)
            .ok_or(StoreError::NotFound(sequence))
    }

    pub(crate) fn set_status(&mut self, sequence: Sequence, status: EventStatus) {
        if let Some(envelope) = self.events.get_mut(&sequence) {
            envelope.status = status;
        }
    }

    pub(crate) fn max_sequence(&self) -> Option<Sequence> {
        self.events.keys().next_back().copied()
    }

    // ---- Actors & credentials ----

    pub(crate) fn actor_for(&self, credential: &Credential) -> Option<ActorId> {
        self.credentials.get(credential).copied()
    }

    pub(crate) fn actor_exists(&self, actor: ActorId) -> bool {
        self.actors.contains(&actor)
    }

    pub(crate) fn next_actor(&self) -> ActorId {
        self.actors
            .iter()
            .next_back()
            .map(ActorId::next)
            .unwrap_or(ActorId::ROOT)
    }

    pub(crate) fn add_actor(&mut self, actor: ActorId) {
        self.actors.insert(actor);
    }

    pub(crate) fn bind(&mut self, actor: ActorId, credential: Credential) {
        self.credentials.insert(credential, actor);
    }

    /// Whether binding `credential` to `actor` needs a write.
    ///
    /// `Ok(false)` when the binding already exists.
    pub(crate) fn check_bind(&self, actor: ActorId, credential: &Credential) -> StoreResult<bool> {
        if !self.actor_exists(actor) {
            return Err(StoreError::UnknownActor(actor));
        }
        match self.actor_for(credential) {
            Some(existing) if existing == actor => Ok(false),
            Some(existing) => Err(StoreError::CredentialInUse(existing)),
            None => Ok(true),
        }
    }

    // ---- Pairing keys ----

    pub(crate) fn issue_pairing(&mut self, key: String, actor: ActorId) {
        self.pairing.insert(
            key,
            PairingEntry {
                actor,
                redeemed: false,
            },
        );
    }

    pub(crate) fn has_pairing(&self, key: &str) -> bool {
        self.pairing.contains_key(key)
    }

    pub(crate) fn check_redeem(&self, key: &str) -> StoreResult<ActorId> {
        match self.pairing.get(key) {
            None => Err(StoreError::UnknownPairingKey),
            Some(entry) if entry.redeemed => Err(StoreError::PairingKeyUsed),
            Some(entry) => Ok(entry.actor),
        }
    }

    pub(crate) fn mark_redeemed(&mut self, key: &str) {
        if let Some(entry) = self.pairing.get_mut(key) {
            entry.redeemed = true;
        }
    }
}

/// A fresh pairing key: 16 random bytes, hex encoded.
pub(crate) fn generate_pairing_key() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}
