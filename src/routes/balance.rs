use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::balance::{AmountRequest, BalanceResponse},
    error::AppError,
    services::balance_service,
    state::SharedState,
};

/// Routes exposing the balance engine to operator tooling.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/balances/{id}", get(get_balance).put(set_balance))
        .route("/balances/{id}/give", post(give))
        .route("/balances/{id}/take", post(take))
}

/// Current balance of an identity; unknown identities report 0.
pub async fn get_balance(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Json<BalanceResponse> {
    let balance = balance_service::balance(&state, id);
    Json(BalanceResponse { id, balance })
}

/// Overwrite an identity's balance; negative amounts clamp to 0.
pub async fn set_balance(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AmountRequest>,
) -> Json<BalanceResponse> {
    let balance = balance_service::set_balance(&state, id, payload.amount);
    Json(BalanceResponse { id, balance })
}

/// Credit tokens to an identity; the amount must be strictly positive.
pub async fn give(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AmountRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = balance_service::give(&state, id, payload.amount)?;
    Ok(Json(BalanceResponse { id, balance }))
}

/// Debit tokens from an identity; conflicts when funds are insufficient.
pub async fn take(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AmountRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = balance_service::take(&state, id, payload.amount)?;
    Ok(Json(BalanceResponse { id, balance }))
}
