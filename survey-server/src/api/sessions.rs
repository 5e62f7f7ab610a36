//! Session shell creation and lookup

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::store::session::participant_id_text;
use crate::store::Session;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EnsureSessionRequest {
    #[serde(default, deserialize_with = "participant_id_text")]
    pub participant_id: String,
}

#[derive(Debug, Serialize)]
pub struct EnsureSessionResponse {
    pub ok: bool,
    pub participant_id: String,
}

/// POST /api/session
///
/// Creates an empty session unless one exists; echoes the sanitized id.
pub async fn ensure_session(
    State(state): State<AppState>,
    payload: Result<Json<EnsureSessionRequest>, JsonRejection>,
) -> Result<Json<EnsureSessionResponse>, ApiError> {
    let Json(request) = payload?;
    let participant_id = state.store.ensure(&request.participant_id).await?;
    Ok(Json(EnsureSessionResponse {
        ok: true,
        participant_id,
    }))
}

/// GET /api/session/:participant_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.store.load(&participant_id).await?))
}
