use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use rsvp_core::Guest;
use rsvp_registry::RsvpSubmission;
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::auth::SessionClaims, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SubmitRsvpRequest {
    /// Reopens an existing RSVP from a session that never created it.
    #[serde(default)]
    pub guest_id: Option<Uuid>,
    #[serde(flatten)]
    pub submission: RsvpSubmission,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/rsvp", post(submit_rsvp))
        .route("/v1/guests/me", get(current_guest))
        .route("/v1/guests/{guest_id}", get(get_guest))
}

async fn submit_rsvp(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(req): Json<SubmitRsvpRequest>,
) -> Result<Json<Guest>, AppError> {
    let cache = state.session_cache(&claims);
    let guest = state.rsvp.submit(&cache, req.guest_id, req.submission).await?;
    Ok(Json(guest))
}

async fn current_guest(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<Guest>, AppError> {
    let cache = state.session_cache(&claims);
    state.rsvp.current_guest(&cache).await?
        .map(Json)
        .ok_or_else(|| {
            let msg = "No RSVP recorded for this session".to_string();
            AppError::NotFoundError("guest_not_found", msg)
        })
}

async fn get_guest(
    State(state): State<AppState>,
    Path(guest_id): Path<Uuid>,
) -> Result<Json<Guest>, AppError> {
    Ok(Json(state.rsvp.guest(guest_id).await?))
}
