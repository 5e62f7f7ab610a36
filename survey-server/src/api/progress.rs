//! Progress saving

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;

use super::ApiError;
use crate::store::ProgressUpdate;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// POST /api/progress
///
/// Body: `{participant_id, order?, responses?, index?, completed?}`.
pub async fn save_progress(
    State(state): State<AppState>,
    payload: Result<Json<ProgressUpdate>, JsonRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Json(update) = payload?;
    state.store.save_progress(update).await?;
    Ok(Json(OkResponse { ok: true }))
}
