use keeper_types::{ActorId, Credential, Envelope, EventStatus, Payload, Sequence, StatusMask};

use crate::error::StoreResult;

/// Append-only event log with a mutable status column.
///
/// Implementations must satisfy:
/// - `append` is all-or-nothing for the whole batch.
/// - Returned sequences are strictly increasing in submission order and
///   strictly greater than every sequence already stored.
/// - `scan` returns envelopes in ascending sequence order.
pub trait LedgerStore: Send + Sync {
    /// Persist `payloads` as pending events from `source`.
    ///
    /// An empty batch is a no-op and returns no sequences.
    fn append(&self, source: ActorId, payloads: &[Payload]) -> StoreResult<Vec<Sequence>>;

    /// All envelopes with `sequence > after` whose status is in `mask`.
    fn scan(&self, after: Sequence, mask: StatusMask) -> StoreResult<Vec<Envelope>>;

    /// Overwrite the status of one event. Writing the current status again
    /// is a no-op; an unknown sequence is `StoreError::NotFound`.
    fn set_status(&self, sequence: Sequence, status: EventStatus) -> StoreResult<()>;

    /// Apply several status updates.
    ///
    /// Default implementation calls `set_status()` for each update. Updates
    /// are independent, so a partial failure leaves nothing inconsistent.
    fn set_statuses(&self, updates: &[(Sequence, EventStatus)]) -> StoreResult<()> {
        updates
            .iter()
            .try_for_each(|(sequence, status)| self.set_status(*sequence, *status))
    }
}

/// Maps caller credentials to stable actor identifiers.
pub trait IdentityRegistry: Send + Sync {
    /// Actor bound to `credential`, creating a fresh actor on first sight.
    fn resolve(&self, credential: &Credential) -> StoreResult<ActorId>;

    /// Actor bound to `credential` without creating one.
    fn lookup(&self, credential: &Credential) -> StoreResult<Option<ActorId>>;

    /// Attach an additional credential to an existing actor.
    fn bind(&self, actor: ActorId, credential: &Credential) -> StoreResult<()>;

    /// Allocate a new actor with no credential bound yet.
    fn create_actor(&self) -> StoreResult<ActorId>;

    /// Whether the actor has been created (the root actor always exists).
    fn actor_exists(&self, actor: ActorId) -> StoreResult<bool>;
}

/// Single-use keys that let a new device join an existing actor.
pub trait PairingKeys: Send + Sync {
    /// Issue a fresh key for `actor`. The actor must exist.
    fn issue(&self, actor: ActorId) -> StoreResult<String>;

    /// Consume `key` and return the actor it was issued for.
    fn redeem(&self, key: &str) -> StoreResult<ActorId>;
}

/// Everything the ledger service needs from a backend.
pub trait KeeperStore: LedgerStore + IdentityRegistry + PairingKeys {}

impl<T: LedgerStore + IdentityRegistry + PairingKeys> KeeperStore for T {}
