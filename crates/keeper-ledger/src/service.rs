use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use keeper_store::{InMemoryStore, KeeperStore, StoreError};
use keeper_types::{ActorId, Credential, Payload, Permission, Sequence};

use crate::error::{LedgerError, LedgerResult};
use crate::projection::{ActorView, VisibleEvent};
use crate::reconcile::{ReconcileReport, Reconciler, SubmitOutcome};
use crate::replay::ReplayEngine;

/// An authenticated caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub actor_id: ActorId,
    /// Permission derived from the authoritative replay at lookup time.
    pub permission: Option<Permission>,
}

/// Result of bootstrapping an organizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrgaBootstrap {
    pub actor_id: ActorId,
    pub pairing_key: String,
}

/// The ledger as seen by a request handler.
///
/// Holds no derived state: every call re-derives what it needs from the
/// store. Cheap to clone.
#[derive(Clone)]
pub struct Keeper {
    store: Arc<dyn KeeperStore>,
}

impl Keeper {
    pub fn new(store: Arc<dyn KeeperStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::default()))
    }

    pub fn store(&self) -> &dyn KeeperStore {
        self.store.as_ref()
    }

    /// Resolve `credential` to its actor, creating one on first sight.
    pub fn authenticate(&self, credential: &Credential) -> LedgerResult<Caller> {
        let actor_id = self.store.resolve(credential)?;
        let replay = ReplayEngine::replay_from_genesis(self.store())?;
        Ok(Caller {
            actor_id,
            permission: replay.space.permission(actor_id),
        })
    }

    /// The caller's visible history after `from`.
    pub fn state(&self, caller: &Caller, from: Sequence) -> LedgerResult<Vec<VisibleEvent>> {
        self.history(caller.actor_id, from)
    }

    /// Visible history of any actor after `from`.
    pub fn history(&self, viewer: ActorId, from: Sequence) -> LedgerResult<Vec<VisibleEvent>> {
        Ok(ActorView::build(self.store(), viewer)?.since(from))
    }

    /// Submit a non-empty batch on behalf of `caller`.
    pub fn submit(&self, caller: &Caller, payloads: &[Payload]) -> LedgerResult<Vec<SubmitOutcome>> {
        if payloads.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        Reconciler::new(self.store()).submit(caller.actor_id, payloads)
    }

    pub fn reconcile(&self) -> LedgerResult<ReconcileReport> {
        Reconciler::new(self.store()).reconcile()
    }

    /// Issue a pairing key for the actor bound to `handle`.
    ///
    /// The caller must be an organizer, and the target must hold no
    /// elevated permission.
    pub fn issue_pairing(&self, caller: &Caller, handle: &str) -> LedgerResult<String> {
        if caller.permission != Some(Permission::Orga) {
            return Err(LedgerError::NotAuthorized);
        }

        let space = ReplayEngine::replay_from_genesis(self.store())?.space;
        let target = space
            .actor_for(handle)
            .ok_or_else(|| LedgerError::UnknownHandle(handle.to_string()))?;
        if space.permission(target).is_some() {
            return Err(LedgerError::NotAuthorized);
        }

        let key = self.store.issue(target)?;
        info!(issuer = %caller.actor_id, %target, handle, "pairing key issued");
        Ok(key)
    }

    /// Consume `key` and bind `credential` to the actor it was issued for.
    ///
    /// A credential already bound to some actor cannot be paired; the key is
    /// left unconsumed in that case.
    pub fn redeem(&self, credential: &Credential, key: &str) -> LedgerResult<ActorId> {
        if let Some(existing) = self.store.lookup(credential)? {
            return Err(StoreError::CredentialInUse(existing).into());
        }

        let actor = self.store.redeem(key)?;
        self.store.bind(actor, credential)?;
        info!(%actor, %credential, "pairing key redeemed");
        Ok(actor)
    }

    /// Create an organizer bound to `handle` and a pairing key for its
    /// first device.
    pub fn create_orga(&self, handle: &str) -> LedgerResult<OrgaBootstrap> {
        let actor_id = self.store.create_actor()?;
        let reconciler = Reconciler::new(self.store());

        let steps = [
            (actor_id, Payload::seed_actor(handle)),
            (ActorId::ROOT, Payload::permission(actor_id, Permission::Orga)),
        ];
        for (source, payload) in steps {
            let outcomes = reconciler.submit(source, std::slice::from_ref(&payload))?;
            let rejected = outcomes.iter().find(|o| !o.status.is_accepted());
            if let Some(outcome) = rejected {
                let replay = ReplayEngine::replay_from_genesis(self.store())?;
                let rejection = replay
                    .outcomes
                    .iter()
                    .find(|o| o.sequence == outcome.sequence)
                    .and_then(|o| o.verdict.err());
                return Err(match rejection {
                    Some(rejection) => LedgerError::BootstrapRejected(rejection),
                    None => LedgerError::NotAuthorized,
                });
            }
        }

        let pairing_key = self.store.issue(actor_id)?;
        info!(actor = %actor_id, handle, "organizer created");
        Ok(OrgaBootstrap {
            actor_id,
            pairing_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use keeper_types::EventStatus;

    use crate::space::Rejection;

    use super::*;

    fn credential(byte: u8) -> Credential {
        Credential::new(vec![byte; 32]).unwrap()
    }

    #[test]
    fn authenticate_creates_then_reuses_actor() {
        let keeper = Keeper::in_memory();
        let first = keeper.authenticate(&credential(1)).unwrap();
        let again = keeper.authenticate(&credential(1)).unwrap();
        assert_eq!(first, again);
        assert_eq!(first.permission, None);
        assert_ne!(first.actor_id, keeper.authenticate(&credential(2)).unwrap().actor_id);
    }

    #[test]
    fn empty_batch_is_an_input_error() {
        let keeper = Keeper::in_memory();
        let caller = keeper.authenticate(&credential(1)).unwrap();
        assert!(matches!(keeper.submit(&caller, &[]), Err(LedgerError::EmptyBatch)));
        assert!(keeper.store().scan(Sequence::GENESIS, keeper_types::StatusMask::ALL).unwrap().is_empty());
    }

    #[test]
    fn caller_sees_own_state_only() {
        let keeper = Keeper::in_memory();
        let alice = keeper.authenticate(&credential(1)).unwrap();
        let bob = keeper.authenticate(&credential(2)).unwrap();

        keeper.submit(&alice, &[Payload::seed_actor("alice")]).unwrap();
        keeper
            .submit(&bob, &[Payload::seed_actor("bob"), Payload::seed_player("bob", "p1")])
            .unwrap();

        let state = keeper.state(&alice, Sequence::GENESIS).unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state[0].payload, Payload::seed_actor("alice"));
        assert_eq!(keeper.state(&bob, Sequence::GENESIS).unwrap().len(), 2);
    }

    #[test]
    fn create_orga_bootstraps_a_pairable_organizer() {
        let keeper = Keeper::in_memory();
        let bootstrap = keeper.create_orga("gm").unwrap();

        let device = credential(9);
        let actor = keeper.redeem(&device, &bootstrap.pairing_key).unwrap();
        assert_eq!(actor, bootstrap.actor_id);

        let caller = keeper.authenticate(&device).unwrap();
        assert_eq!(caller.actor_id, bootstrap.actor_id);
        assert_eq!(caller.permission, Some(Permission::Orga));

        // The key is single use.
        assert!(matches!(
            keeper.redeem(&credential(10), &bootstrap.pairing_key),
            Err(LedgerError::Store(StoreError::PairingKeyUsed))
        ));
    }

    #[test]
    fn create_orga_with_taken_handle_fails() {
        let keeper = Keeper::in_memory();
        keeper.create_orga("gm").unwrap();
        assert!(matches!(
            keeper.create_orga("gm"),
            Err(LedgerError::BootstrapRejected(Rejection::HandleTaken))
        ));
    }

    #[test]
    fn orga_pairs_a_new_device_for_a_player() {
        let keeper = Keeper::in_memory();
        let bootstrap = keeper.create_orga("gm").unwrap();
        let orga_device = credential(1);
        keeper.redeem(&orga_device, &bootstrap.pairing_key).unwrap();
        let orga = keeper.authenticate(&orga_device).unwrap();

        let player = keeper.authenticate(&credential(2)).unwrap();
        keeper.submit(&player, &[Payload::seed_actor("bob")]).unwrap();

        let key = keeper.issue_pairing(&orga, "bob").unwrap();
        let phone = credential(3);
        assert_eq!(keeper.redeem(&phone, &key).unwrap(), player.actor_id);
        assert_eq!(keeper.authenticate(&phone).unwrap().actor_id, player.actor_id);
    }

    #[test]
    fn pairing_rules() {
        let keeper = Keeper::in_memory();
        let bootstrap = keeper.create_orga("gm").unwrap();
        keeper.redeem(&credential(1), &bootstrap.pairing_key).unwrap();
        let orga = keeper.authenticate(&credential(1)).unwrap();
        let player = keeper.authenticate(&credential(2)).unwrap();
        keeper.submit(&player, &[Payload::seed_actor("bob")]).unwrap();

        assert!(matches!(
            keeper.issue_pairing(&player, "bob"),
            Err(LedgerError::NotAuthorized)
        ));
        assert!(matches!(
            keeper.issue_pairing(&orga, "nobody"),
            Err(LedgerError::UnknownHandle(_))
        ));
        // Organizers cannot be taken over through pairing.
        assert!(matches!(
            keeper.issue_pairing(&orga, "gm"),
            Err(LedgerError::NotAuthorized)
        ));

        let key = keeper.issue_pairing(&orga, "bob").unwrap();
        // A credential already on file cannot be paired, and the key survives.
        assert!(matches!(
            keeper.redeem(&credential(1), &key),
            Err(LedgerError::Store(StoreError::CredentialInUse(_)))
        ));
        assert!(matches!(
            keeper.redeem(&credential(4), "feedface"),
            Err(LedgerError::Store(StoreError::UnknownPairingKey))
        ));
        assert_eq!(keeper.redeem(&credential(4), &key).unwrap(), player.actor_id);
    }

    #[test]
    fn orga_administers_players_and_reconcile_is_stable() {
        let keeper = Keeper::in_memory();
        let bootstrap = keeper.create_orga("gm").unwrap();
        keeper.redeem(&credential(1), &bootstrap.pairing_key).unwrap();
        let orga = keeper.authenticate(&credential(1)).unwrap();
        let player = keeper.authenticate(&credential(2)).unwrap();
        keeper.submit(&player, &[Payload::seed_actor("bob")]).unwrap();

        let outcomes = keeper
            .submit(
                &orga,
                &[Payload::seed_player("bob", "p1"), Payload::player_surname("p1", "Jean")],
            )
            .unwrap();
        assert!(outcomes.iter().all(|o| o.status == EventStatus::Accepted));

        assert_eq!(keeper.reconcile().unwrap().updated, 0);
        assert_eq!(keeper.state(&player, Sequence::GENESIS).unwrap().len(), 3);
    }

    #[test]
    fn file_backed_keeper_survives_restart() {
        use keeper_store::{FileStore, FileStoreConfig};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keeper.ledger");
        let open = || {
            let store = FileStore::open(&path, FileStoreConfig::default()).unwrap();
            Keeper::new(Arc::new(store))
        };

        let alice = {
            let keeper = open();
            let alice = keeper.authenticate(&credential(1)).unwrap();
            keeper.submit(&alice, &[Payload::seed_actor("alice")]).unwrap();
            alice
        };

        let keeper = open();
        assert_eq!(keeper.authenticate(&credential(1)).unwrap(), alice);
        let state = keeper.state(&alice, Sequence::GENESIS).unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(keeper.reconcile().unwrap().updated, 0);

        let outcomes = keeper.submit(&alice, &[Payload::seed_actor("again")]).unwrap();
        assert_eq!(outcomes[0].error.as_deref(), Some("actor already has a handle"));
    }
}
