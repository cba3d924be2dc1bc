use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use keeper_ledger::LedgerError;
use keeper_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("missing or malformed authorization header")]
    Unauthenticated,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidCredential(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Ledger(err) => match err {
                LedgerError::EmptyBatch | LedgerError::BootstrapRejected(_) => {
                    StatusCode::BAD_REQUEST
                }
                LedgerError::NotAuthorized => StatusCode::FORBIDDEN,
                LedgerError::UnknownHandle(_) => StatusCode::NOT_FOUND,
                LedgerError::Store(
                    StoreError::UnknownPairingKey
                    | StoreError::PairingKeyUsed
                    | StoreError::CredentialInUse(_),
                ) => StatusCode::BAD_REQUEST,
                LedgerError::Store(_) | LedgerError::Corruption { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Store(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
