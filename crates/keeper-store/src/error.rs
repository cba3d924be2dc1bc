use std::time::Duration;

use keeper_types::{ActorId, Sequence, TypeError};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No event with this sequence exists.
    #[error("no event with sequence {0}")]
    NotFound(Sequence),

    /// The actor has never been created.
    #[error("unknown actor {0}")]
    UnknownActor(ActorId),

    /// The credential is already bound to a different actor.
    #[error("credential already bound to {0}")]
    CredentialInUse(ActorId),

    /// The pairing key was never issued.
    #[error("unknown pairing key")]
    UnknownPairingKey,

    /// The pairing key was already redeemed.
    #[error("pairing key already used")]
    PairingKeyUsed,

    /// The exclusive write section stayed contended past the busy timeout.
    #[error("store busy: write lock not acquired within {0:?}")]
    Busy(Duration),

    /// A lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The record log is unreadable in a way recovery cannot skip.
    #[error("corrupt record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },

    /// A failed append could not be cut back out of the record log.
    #[error("record log {} poisoned by a failed write", .0.display())]
    LogPoisoned(std::path::PathBuf),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
