use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use keeper_store::LedgerStore;
use keeper_types::{ActorId, EventStatus, Payload, Sequence};

use crate::error::{LedgerError, LedgerResult};
use crate::replay::{ReplayEngine, ReplayResult};
use crate::space::Rejection;

/// Final classification of one submitted payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub sequence: Sequence,
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub replayed: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Status writes this pass performed.
    pub updated: usize,
}

/// Append, replay the whole ledger, persist changed statuses.
pub struct Reconciler<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: LedgerStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Append `payloads` from `source` and return their final statuses in
    /// submission order.
    ///
    /// An empty batch only reconciles and returns nothing.
    pub fn submit(&self, source: ActorId, payloads: &[Payload]) -> LedgerResult<Vec<SubmitOutcome>> {
        let sequences = self.store.append(source, payloads)?;
        let (result, _) = self.run()?;

        let mut outcomes = Vec::with_capacity(sequences.len());
        for sequence in sequences {
            let outcome = result
                .outcomes
                .binary_search_by_key(&sequence, |o| o.sequence)
                .map(|index| &result.outcomes[index])
                .map_err(|_| keeper_store::StoreError::NotFound(sequence))?;

            let error = outcome.verdict.err().map(|rejection| {
                warn!(%source, %sequence, reason = %rejection, "event rejected");
                rejection.to_string()
            });
            outcomes.push(SubmitOutcome {
                sequence,
                status: outcome.status(),
                error,
            });
        }

        let accepted = outcomes.iter().filter(|o| o.status.is_accepted()).count();
        if !outcomes.is_empty() {
            info!(%source, submitted = outcomes.len(), accepted, "batch reconciled");
        }
        Ok(outcomes)
    }

    /// Replay and persist statuses without appending anything.
    pub fn reconcile(&self) -> LedgerResult<ReconcileReport> {
        let (result, updated) = self.run()?;
        let report = ReconcileReport {
            replayed: result.outcomes.len(),
            accepted: result.accepted(),
            rejected: result.rejected(),
            updated,
        };
        info!(
            replayed = report.replayed,
            accepted = report.accepted,
            rejected = report.rejected,
            updated = report.updated,
            "ledger reconciled"
        );
        Ok(report)
    }

    /// Full replay, corruption check, then status write-back.
    ///
    /// Every outcome is checked before the first write, so a corrupted
    /// ledger is left exactly as it was found.
    fn run(&self) -> LedgerResult<(ReplayResult, usize)> {
        let result = ReplayEngine::replay_from_genesis(self.store)?;

        if let Some(reversal) = result.outcomes.iter().find(|o| o.is_reversal()) {
            let reason = reversal
                .verdict
                .err()
                .map(|rejection: Rejection| rejection.to_string())
                .unwrap_or_default();
            error!(
                sequence = %reversal.sequence,
                %reason,
                "accepted event no longer replays as accepted"
            );
            return Err(LedgerError::Corruption {
                sequence: reversal.sequence,
                reason,
            });
        }

        let updates: Vec<(Sequence, EventStatus)> = result
            .outcomes
            .iter()
            .filter(|o| o.stored != o.status())
            .map(|o| (o.sequence, o.status()))
            .collect();

        self.store.set_statuses(&updates)?;
        debug!(replayed = result.outcomes.len(), updated = updates.len(), "statuses persisted");
        Ok((result, updates.len()))
    }
}

#[cfg(test)]
mod tests {
    use keeper_store::InMemoryStore;
    use keeper_types::{Permission, StatusMask};

    use super::*;

    const ALICE: ActorId = ActorId(1);
    const BOB: ActorId = ActorId(2);
    const CAROL: ActorId = ActorId(3);

    fn submit_one(store: &InMemoryStore, source: ActorId, payload: Payload) -> SubmitOutcome {
        let mut outcomes = Reconciler::new(store).submit(source, &[payload]).unwrap();
        assert_eq!(outcomes.len(), 1);
        outcomes.remove(0)
    }

    fn statuses(store: &InMemoryStore) -> Vec<EventStatus> {
        store
            .scan(Sequence::GENESIS, StatusMask::ALL)
            .unwrap()
            .into_iter()
            .map(|e| e.status)
            .collect()
    }

    #[test]
    fn duplicate_handle_is_rejected() {
        let store = InMemoryStore::default();
        let first = submit_one(&store, ALICE, Payload::seed_actor("alice"));
        assert_eq!(first.status, EventStatus::Accepted);
        assert_eq!(first.error, None);

        let second = submit_one(&store, BOB, Payload::seed_actor("alice"));
        assert_eq!(second.status, EventStatus::Rejected);
        assert_eq!(second.error.as_deref(), Some("handle already exists"));
    }

    #[test]
    fn only_root_grants_orga() {
        let store = InMemoryStore::default();
        let grant = Payload::permission(ALICE, Permission::Orga);

        assert_eq!(submit_one(&store, ActorId::ROOT, grant.clone()).status, EventStatus::Accepted);
        let denied = submit_one(&store, ActorId(5), grant);
        assert_eq!(denied.status, EventStatus::Rejected);
        assert_eq!(denied.error.as_deref(), Some("not authorized"));
    }

    #[test]
    fn player_scenarios() {
        let store = InMemoryStore::default();
        submit_one(&store, ALICE, Payload::seed_actor("alice"));
        submit_one(&store, BOB, Payload::seed_actor("bob"));

        let foreign = submit_one(&store, ALICE, Payload::seed_player("bob", "p1"));
        assert_eq!(foreign.error.as_deref(), Some("not authorized"));
        let own = submit_one(&store, BOB, Payload::seed_player("bob", "p1"));
        assert_eq!(own.status, EventStatus::Accepted);

        let duplicate = submit_one(&store, BOB, Payload::seed_player("bob", "p1"));
        assert_eq!(duplicate.error.as_deref(), Some("player already exists"));

        let edit = submit_one(&store, BOB, Payload::player_surname("p1", "Jean"));
        assert_eq!(edit.status, EventStatus::Accepted);
        let intruder = submit_one(&store, CAROL, Payload::player_surname("p1", "Jean"));
        assert_eq!(intruder.status, EventStatus::Rejected);
    }

    #[test]
    fn batch_results_keep_submission_order() {
        let store = InMemoryStore::default();
        let outcomes = Reconciler::new(&store)
            .submit(
                ALICE,
                &[
                    Payload::seed_actor("alice"),
                    Payload::seed_player("alice", "p1"),
                    Payload::Unknown(serde_json::json!({"kind": "lock_player"})),
                ],
            )
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.windows(2).all(|w| w[0].sequence < w[1].sequence));
        assert_eq!(outcomes[0].status, EventStatus::Accepted);
        // Later events in the same batch see the earlier ones.
        assert_eq!(outcomes[1].status, EventStatus::Accepted);
        assert_eq!(outcomes[2].error.as_deref(), Some("unknown event kind"));
    }

    #[test]
    fn empty_reconcile_reaches_fixed_point() {
        let store = InMemoryStore::default();
        store
            .append(
                ALICE,
                &[Payload::seed_actor("alice"), Payload::seed_actor("again")],
            )
            .unwrap();
        store.append(BOB, &[Payload::seed_actor("alice")]).unwrap();

        let reconciler = Reconciler::new(&store);
        let first = reconciler.reconcile().unwrap();
        assert_eq!(first.replayed, 3);
        assert_eq!(first.accepted, 1);
        assert_eq!(first.updated, 3);
        let after_first = statuses(&store);

        let second = reconciler.reconcile().unwrap();
        assert_eq!(second.updated, 0);
        assert_eq!(statuses(&store), after_first);
        assert!(reconciler.submit(ALICE, &[]).unwrap().is_empty());
    }

    #[test]
    fn accepted_event_turning_invalid_is_corruption() {
        let store = InMemoryStore::default();
        let seqs = store
            .append(
                ALICE,
                &[Payload::seed_actor("alice"), Payload::seed_actor("again")],
            )
            .unwrap();
        store.set_status(seqs[1], EventStatus::Accepted).unwrap();

        let err = Reconciler::new(&store).reconcile().unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Corruption { sequence, .. } if sequence == seqs[1]
        ));
        // Nothing was written: the valid first event is still pending.
        assert_eq!(
            statuses(&store),
            vec![EventStatus::Pending, EventStatus::Accepted]
        );
    }

    #[test]
    fn rejected_event_may_flip_to_accepted() {
        let store = InMemoryStore::default();
        let seqs = store.append(ALICE, &[Payload::seed_actor("alice")]).unwrap();
        store.set_status(seqs[0], EventStatus::Rejected).unwrap();

        let report = Reconciler::new(&store).reconcile().unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(statuses(&store), vec![EventStatus::Accepted]);
    }

    #[test]
    fn outcome_serializes_without_empty_error() {
        let outcome = SubmitOutcome {
            sequence: Sequence(7),
            status: EventStatus::Accepted,
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"sequence": 7, "status": "accepted"})
        );
    }

    #[test]
    fn concurrent_submissions_classify_consistently() {
        let store = InMemoryStore::default();

        std::thread::scope(|scope| {
            for i in 1..=8u64 {
                let store = &store;
                scope.spawn(move || {
                    let actor = ActorId(i);
                    let own = format!("player{i}");
                    for _ in 0..5 {
                        Reconciler::new(store)
                            .submit(
                                actor,
                                &[
                                    Payload::seed_actor("shared"),
                                    Payload::seed_actor(own.clone()),
                                    Payload::seed_player("shared", "p-shared"),
                                    Payload::seed_player(own.clone(), "p-common"),
                                    Payload::player_surname("p-common", own.clone()),
                                ],
                            )
                            .unwrap();
                    }
                });
            }
        });

        let accepted = store.scan(Sequence::GENESIS, StatusMask::ACCEPTED).unwrap();
        let seeds = |handle: &str| {
            accepted
                .iter()
                .filter(|e| matches!(&e.payload, Payload::SeedActor { handle: h } if h == handle))
                .count()
        };
        let players = |id: &str| {
            accepted
                .iter()
                .filter(|e| matches!(&e.payload, Payload::SeedPlayer { player_id, .. } if player_id == id))
                .count()
        };

        assert_eq!(seeds("shared"), 1);
        assert!((1..=8).all(|i| seeds(&format!("player{i}")) <= 1));
        assert_eq!(players("p-shared"), 1);
        assert_eq!(players("p-common"), 1);
        assert!(statuses(&store).iter().all(|s| *s != EventStatus::Pending));

        let report = Reconciler::new(&store).reconcile().unwrap();
        assert_eq!(report.replayed, 8 * 5 * 5);
        assert_eq!(report.updated, 0);
    }
}
