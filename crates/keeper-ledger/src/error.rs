use keeper_store::StoreError;
use keeper_types::Sequence;

use crate::space::Rejection;

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A stored `accepted` event no longer replays as accepted. Fatal.
    #[error("ledger corruption at seq {sequence}: {reason}")]
    Corruption { sequence: Sequence, reason: String },

    #[error("submission batch is empty")]
    EmptyBatch,

    #[error("unknown handle {0:?}")]
    UnknownHandle(String),

    #[error("not authorized")]
    NotAuthorized,

    #[error("bootstrap event rejected: {0}")]
    BootstrapRejected(Rejection),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
