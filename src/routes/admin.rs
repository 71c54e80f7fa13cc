use axum::{
    Json, Router,
    extract::{Query, State},
    routing::post,
};

use crate::{
    dto::balance::{SaveParams, SaveResponse},
    error::AppError,
    services::persistence,
    state::SharedState,
};

/// Administrative routes for deliberate persistence operations.
pub fn router() -> Router<SharedState> {
    Router::new().route("/admin/save", post(save))
}

/// Persist the ledger immediately. `?backup=true` moves the previous file to
/// a timestamped backup first; this is the only caller of backup mode.
pub async fn save(
    State(state): State<SharedState>,
    Query(params): Query<SaveParams>,
) -> Result<Json<SaveResponse>, AppError> {
    let entries = persistence::save_to_disk(&state, params.backup)
        .await
        .map_err(AppError::from)?;
    Ok(Json(SaveResponse {
        entries,
        backup: params.backup,
    }))
}
