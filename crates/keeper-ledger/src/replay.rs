use serde::{Deserialize, Serialize};

use keeper_store::LedgerStore;
use keeper_types::{Envelope, EventStatus, Sequence, StatusMask};

use crate::error::LedgerResult;
use crate::space::{AuthoritativeSpace, Rejection};

/// Verdict of replay for one stored envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub sequence: Sequence,
    /// Status the store held when the envelope was scanned.
    pub stored: EventStatus,
    pub verdict: Result<(), Rejection>,
}

impl ReplayOutcome {
    /// Status the store should hold after this replay.
    pub fn status(&self) -> EventStatus {
        match self.verdict {
            Ok(()) => EventStatus::Accepted,
            Err(_) => EventStatus::Rejected,
        }
    }

    /// Stored as accepted but no longer valid.
    pub fn is_reversal(&self) -> bool {
        self.stored.is_accepted() && self.verdict.is_err()
    }
}

/// Saved replay position: the space after every event up to `last`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last: Sequence,
    pub space: AuthoritativeSpace,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            last: Sequence::GENESIS,
            space: AuthoritativeSpace::new(),
        }
    }
}

/// Result of replaying a run of envelopes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayResult {
    pub space: AuthoritativeSpace,
    pub outcomes: Vec<ReplayOutcome>,
    pub last: Sequence,
}

impl ReplayResult {
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            last: self.last,
            space: self.space.clone(),
        }
    }

    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.verdict.is_ok()).count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.accepted()
    }
}

/// Deterministic replay of the ledger through the validation engine.
pub struct ReplayEngine;

impl ReplayEngine {
    /// Replay every stored envelope, whatever its status, from the initial
    /// space.
    pub fn replay_from_genesis<S: LedgerStore + ?Sized>(store: &S) -> LedgerResult<ReplayResult> {
        Self::replay_from_checkpoint(store, &Checkpoint::default())
    }

    /// Replay only the envelopes after `checkpoint.last`, starting from its
    /// saved space. Must agree with [`Self::replay_from_genesis`].
    pub fn replay_from_checkpoint<S: LedgerStore + ?Sized>(
        store: &S,
        checkpoint: &Checkpoint,
    ) -> LedgerResult<ReplayResult> {
        let envelopes = store.scan(checkpoint.last, StatusMask::ALL)?;
        Ok(Self::apply(checkpoint.space.clone(), checkpoint.last, &envelopes))
    }

    /// Pure transition over an ordered run of envelopes.
    pub fn apply(
        mut space: AuthoritativeSpace,
        mut last: Sequence,
        envelopes: &[Envelope],
    ) -> ReplayResult {
        let mut outcomes = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            let verdict = space.process(envelope.source, &envelope.payload);
            outcomes.push(ReplayOutcome {
                sequence: envelope.sequence,
                stored: envelope.status,
                verdict,
            });
            last = envelope.sequence;
        }

        ReplayResult {
            space,
            outcomes,
            last,
        }
    }
}
