use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use keeper_types::{
    ActorId, Credential, Envelope, EventStatus, Payload, Sequence, SequenceClock, StatusMask,
};

use crate::error::{StoreError, StoreResult};
use crate::gate::{BusyPolicy, WriteGate};
use crate::state::{generate_pairing_key, StoreState};
use crate::traits::{IdentityRegistry, LedgerStore, PairingKeys};

/// In-memory store for tests, local demos, and embedding.
///
/// Writers serialize through a [`WriteGate`]; readers take a shared lock on
/// the tables and never wait on the gate.
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    gate: WriteGate<()>,
    clock: SequenceClock,
}

impl InMemoryStore {
    pub fn new(policy: BusyPolicy) -> Self {
        Self {
            state: RwLock::new(StoreState::new()),
            gate: WriteGate::new((), policy),
            clock: SequenceClock::new(),
        }
    }

    /// Number of events in the log.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.scan(Sequence::GENESIS, StatusMask::ALL).len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(BusyPolicy::default())
    }
}

impl LedgerStore for InMemoryStore {
    fn append(&self, source: ActorId, payloads: &[Payload]) -> StoreResult<Vec<Sequence>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let _gate = self.gate.acquire()?;
        let sequences = self.clock.tick_batch(payloads.len());
        let batch = sequences.iter().copied().zip(payloads.iter().cloned()).collect();
        self.write()?.insert_batch(source, batch);

        debug!(%source, count = sequences.len(), "batch appended");
        Ok(sequences)
    }

    fn scan(&self, after: Sequence, mask: StatusMask) -> StoreResult<Vec<Envelope>> {
        Ok(self.read()?.scan(after, mask))
    }

    fn set_status(&self, sequence: Sequence, status: EventStatus) -> StoreResult<()> {
        if self.read()?.status_of(sequence)? == status {
            return Ok(());
        }

        let _gate = self.gate.acquire()?;
        let mut state = self.write()?;
        state.status_of(sequence)?;
        state.set_status(sequence, status);
        Ok(())
    }
}

impl IdentityRegistry for InMemoryStore {
    fn resolve(&self, credential: &Credential) -> StoreResult<ActorId> {
        if let Some(actor) = self.read()?.actor_for(credential) {
            return Ok(actor);
        }

        let _gate = self.gate.acquire()?;
        let mut state = self.write()?;
        // Another writer may have enrolled the same key while we waited.
        if let Some(actor) = state.actor_for(credential) {
            return Ok(actor);
        }

        let actor = state.next_actor();
        state.add_actor(actor);
        state.bind(actor, credential.clone());

        debug!(%actor, %credential, "actor created");
        Ok(actor)
    }

    fn lookup(&self, credential: &Credential) -> StoreResult<Option<ActorId>> {
        Ok(self.read()?.actor_for(credential))
    }

    fn bind(&self, actor: ActorId, credential: &Credential) -> StoreResult<()> {
        let _gate = self.gate.acquire()?;
        let mut state = self.write()?;
        if state.check_bind(actor, credential)? {
            state.bind(actor, credential.clone());
            debug!(%actor, %credential, "credential bound");
        }
        Ok(())
    }

    fn create_actor(&self) -> StoreResult<ActorId> {
        let _gate = self.gate.acquire()?;
        let mut state = self.write()?;
        let actor = state.next_actor();
        state.add_actor(actor);
        Ok(actor)
    }

    fn actor_exists(&self, actor: ActorId) -> StoreResult<bool> {
        Ok(self.read()?.actor_exists(actor))
    }
}

impl PairingKeys for InMemoryStore {
    fn issue(&self, actor: ActorId) -> StoreResult<String> {
        let _gate = self.gate.acquire()?;
        let mut state = self.write()?;
        if !state.actor_exists(actor) {
            return Err(StoreError::UnknownActor(actor));
        }

        let mut key = generate_pairing_key();
        while state.has_pairing(&key) {
            key = generate_pairing_key();
        }
        state.issue_pairing(key.clone(), actor);
        Ok(key)
    }

    fn redeem(&self, key: &str) -> StoreResult<ActorId> {
        let _gate = self.gate.acquire()?;
        let mut state = self.write()?;
        let actor = state.check_redeem(key)?;
        state.mark_redeemed(key);
        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn credential(byte: u8) -> Credential {
        Credential::new(vec![byte; 64]).unwrap()
    }

    #[test]
    fn append_assigns_increasing_pending_sequences() {
        let store = InMemoryStore::default();
        let payloads = vec![
            Payload::seed_actor("alice"),
            Payload::seed_player("alice", "p1"),
            Payload::player_surname("p1", "Jean"),
        ];

        let sequences = store.append(ActorId(1), &payloads).unwrap();
        assert_eq!(sequences.len(), 3);
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));

        let scanned = store.scan(Sequence::GENESIS, StatusMask::ALL).unwrap();
        assert_eq!(scanned.len(), 3);
        for ((envelope, sequence), payload) in scanned.iter().zip(&sequences).zip(&payloads) {
            assert_eq!(envelope.sequence, *sequence);
            assert_eq!(envelope.source, ActorId(1));
            assert_eq!(envelope.status, EventStatus::Pending);
            assert_eq!(envelope.payload.encode().unwrap(), payload.encode().unwrap());
        }
    }

    #[test]
    fn empty_append_is_noop() {
        let store = InMemoryStore::default();
        assert!(store.append(ActorId(1), &[]).unwrap().is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn later_batches_sort_after_earlier_ones() {
        let store = InMemoryStore::default();
        let first = store.append(ActorId(1), &[Payload::seed_actor("a")]).unwrap();
        let second = store.append(ActorId(2), &[Payload::seed_actor("b")]).unwrap();
        assert!(first[0] < second[0]);
    }

    #[test]
    fn scan_filters_by_cursor_and_mask() {
        let store = InMemoryStore::default();
        let seqs = store
            .append(
                ActorId(1),
                &[
                    Payload::seed_actor("a"),
                    Payload::seed_actor("b"),
                    Payload::seed_actor("c"),
                ],
            )
            .unwrap();
        store.set_status(seqs[0], EventStatus::Accepted).unwrap();
        store.set_status(seqs[1], EventStatus::Rejected).unwrap();

        let accepted = store.scan(Sequence::GENESIS, StatusMask::ACCEPTED).unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].sequence, seqs[0]);

        let not_rejected = store
            .scan(Sequence::GENESIS, StatusMask::PENDING | StatusMask::ACCEPTED)
            .unwrap();
        assert_eq!(not_rejected.len(), 2);

        let after_first = store.scan(seqs[0], StatusMask::ALL).unwrap();
        assert_eq!(
            after_first.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![seqs[1], seqs[2]]
        );
    }

    #[test]
    fn set_status_is_idempotent_and_checks_existence() {
        let store = InMemoryStore::default();
        let seqs = store.append(ActorId(1), &[Payload::Reset]).unwrap();

        store.set_status(seqs[0], EventStatus::Accepted).unwrap();
        store.set_status(seqs[0], EventStatus::Accepted).unwrap();
        assert_eq!(
            store.scan(Sequence::GENESIS, StatusMask::ACCEPTED).unwrap().len(),
            1
        );

        let missing = store.set_status(Sequence(1), EventStatus::Accepted);
        assert!(matches!(missing, Err(StoreError::NotFound(Sequence(1)))));
    }

    #[test]
    fn resolve_creates_actor_once() {
        let store = InMemoryStore::default();
        let alice = store.resolve(&credential(1)).unwrap();
        let bob = store.resolve(&credential(2)).unwrap();

        assert_eq!(alice, ActorId(1));
        assert_eq!(bob, ActorId(2));
        assert_eq!(store.resolve(&credential(1)).unwrap(), alice);
        assert_eq!(store.lookup(&credential(3)).unwrap(), None);
    }

    #[test]
    fn root_actor_exists_without_credential() {
        let store = InMemoryStore::default();
        assert!(store.actor_exists(ActorId::ROOT).unwrap());
        assert!(!store.actor_exists(ActorId(1)).unwrap());
    }

    #[test]
    fn bind_attaches_second_credential() {
        let store = InMemoryStore::default();
        let alice = store.resolve(&credential(1)).unwrap();

        store.bind(alice, &credential(9)).unwrap();
        assert_eq!(store.resolve(&credential(9)).unwrap(), alice);

        // Rebinding the same pair is a no-op.
        store.bind(alice, &credential(9)).unwrap();
    }

    #[test]
    fn bind_rejects_unknown_actor_and_foreign_credential() {
        let store = InMemoryStore::default();
        let alice = store.resolve(&credential(1)).unwrap();
        let bob = store.resolve(&credential(2)).unwrap();

        assert!(matches!(
            store.bind(ActorId(99), &credential(5)),
            Err(StoreError::UnknownActor(ActorId(99)))
        ));
        assert!(matches!(
            store.bind(bob, &credential(1)),
            Err(StoreError::CredentialInUse(actor)) if actor == alice
        ));
    }

    #[test]
    fn create_actor_allocates_after_existing() {
        let store = InMemoryStore::default();
        store.resolve(&credential(1)).unwrap();
        let orga = store.create_actor().unwrap();
        assert_eq!(orga, ActorId(2));
        assert_eq!(store.resolve(&credential(2)).unwrap(), ActorId(3));
    }

    #[test]
    fn pairing_key_is_single_use() {
        let store = InMemoryStore::default();
        let actor = store.create_actor().unwrap();
        let key = store.issue(actor).unwrap();
        assert_eq!(key.len(), 32);

        assert_eq!(store.redeem(&key).unwrap(), actor);
        assert!(matches!(store.redeem(&key), Err(StoreError::PairingKeyUsed)));
        assert!(matches!(
            store.redeem("not-a-key"),
            Err(StoreError::UnknownPairingKey)
        ));
    }

    #[test]
    fn pairing_requires_existing_actor() {
        let store = InMemoryStore::default();
        assert!(matches!(
            store.issue(ActorId(7)),
            Err(StoreError::UnknownActor(ActorId(7)))
        ));
    }

    #[test]
    fn concurrent_appends_never_collide() {
        let store = Arc::new(InMemoryStore::default());
        let mut handles = Vec::new();

        for writer in 1..=8u64 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let payloads: Vec<Payload> = (0..25)
                    .map(|i| Payload::seed_actor(format!("w{writer}-{i}")))
                    .collect();
                store.append(ActorId(writer), &payloads).unwrap()
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            let batch = handle.join().unwrap();
            assert!(batch.windows(2).all(|w| w[0] < w[1]));
            all.extend(batch);
        }

        let len = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), len);
        assert_eq!(store.len().unwrap(), 200);
    }

    #[test]
    fn concurrent_resolve_of_same_credential_is_first_seen_wins() {
        let store = Arc::new(InMemoryStore::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.resolve(&credential(42)).unwrap())
            })
            .collect();

        let actors: Vec<ActorId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(actors.iter().all(|a| *a == actors[0]));
        assert_eq!(store.create_actor().unwrap(), ActorId(2));
    }
}
