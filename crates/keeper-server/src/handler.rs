use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use keeper_ledger::{Caller, Keeper, LedgerError, SubmitOutcome, VisibleEvent};
use keeper_types::{ActorId, Credential, Payload, Sequence};

use crate::auth::{bearer_token, CredentialResolver};
use crate::error::{ServerError, ServerResult};

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub keeper: Keeper,
    pub resolver: Arc<dyn CredentialResolver>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StateQuery {
    #[serde(default)]
    pub from: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PairingResponse {
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub actor_id: ActorId,
}

/// Run a ledger call off the async runtime; store writes may busy-wait.
async fn blocking<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(ServerError::from)
}

async fn credential(state: &AppState, headers: &HeaderMap) -> ServerResult<Credential> {
    let token = bearer_token(headers)?;
    state.resolver.resolve(token).await
}

async fn caller(state: &AppState, headers: &HeaderMap) -> ServerResult<Caller> {
    let credential = credential(state, headers).await?;
    let keeper = state.keeper.clone();
    blocking(move || keeper.authenticate(&credential)).await
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /state?from=<sequence>`. A missing `from` reads from the start.
pub async fn get_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<StateQuery>, QueryRejection>,
) -> ServerResult<Json<Vec<VisibleEvent>>> {
    let Query(query) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let caller = caller(&state, &headers).await?;
    let keeper = state.keeper.clone();
    let events = blocking(move || keeper.state(&caller, Sequence(query.from))).await?;
    debug!(actor = %caller.actor_id, from = query.from, count = events.len(), "state served");
    Ok(Json(events))
}

/// `POST /state` with a JSON array of payloads.
pub async fn post_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Json<Vec<SubmitOutcome>>> {
    let payloads: Vec<Payload> =
        serde_json::from_slice(&body).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let caller = caller(&state, &headers).await?;

    let keeper = state.keeper.clone();
    let outcomes = blocking(move || keeper.submit(&caller, &payloads)).await?;
    Ok(Json(outcomes))
}

/// `POST /auth/handles/:handle`
pub async fn issue_pairing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(handle): Path<String>,
) -> ServerResult<Json<PairingResponse>> {
    let caller = caller(&state, &headers).await?;
    let keeper = state.keeper.clone();
    let key = blocking(move || keeper.issue_pairing(&caller, &handle)).await?;
    Ok(Json(PairingResponse { key }))
}

/// `POST /auth/redeem/:key`
///
/// The caller's credential is bound, not resolved: a device that is
/// already known cannot be paired.
pub async fn redeem(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> ServerResult<Json<RedeemResponse>> {
    let credential = credential(&state, &headers).await?;
    let keeper = state.keeper.clone();
    let actor_id = blocking(move || keeper.redeem(&credential, &key)).await?;
    Ok(Json(RedeemResponse { actor_id }))
}
