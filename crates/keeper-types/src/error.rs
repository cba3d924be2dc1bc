use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("credential is empty")]
    EmptyCredential,

    #[error("unknown event status code {0}")]
    UnknownStatus(u8),

    #[error("serialization error: {0}")]
    Serialization(String),
}
