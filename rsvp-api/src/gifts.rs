use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Extension, Json, Router,
};
use rsvp_core::{GiftView, SessionCache};
use rsvp_registry::{RegistryView, Released, Reserved};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, middleware::auth::SessionClaims, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct GuestQuery {
    pub guest_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub gift_id: Uuid,
    pub guest_id: Uuid,
    pub outcome: Reserved,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub gift_id: Uuid,
    pub guest_id: Uuid,
    pub outcome: Released,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/gifts", get(list_gifts))
        .route("/v1/registry", get(open_registry))
        .route("/v1/gifts/{gift_id}/reservation", put(reserve_gift).delete(unreserve_gift))
}

/// Read-only views may look through another guest id; an explicit
/// `guest_id` wins over the session's cached guest.
async fn viewer(cache: &SessionCache, explicit: Option<Uuid>) -> Option<Uuid> {
    match explicit {
        Some(id) => Some(id),
        None => cache.guest().await.map(|g| g.id),
    }
}

/// Mutations always act as the session's own guest.
async fn acting_guest(cache: &SessionCache) -> Result<Uuid, AppError> {
    cache.guest().await.map(|g| g.id).ok_or_else(|| {
        AppError::ValidationError("Submit your RSVP before using the registry".to_string())
    })
}

async fn list_gifts(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Query(query): Query<GuestQuery>,
) -> Result<Json<Vec<GiftView>>, AppError> {
    let cache = state.session_cache(&claims);
    let viewer = viewer(&cache, query.guest_id).await;
    Ok(Json(state.reservations.list(viewer).await?))
}

async fn open_registry(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Query(query): Query<GuestQuery>,
) -> Result<Json<RegistryView>, AppError> {
    let cache = state.session_cache(&claims);
    let viewer = viewer(&cache, query.guest_id).await;
    Ok(Json(state.reservations.refresh(&cache, viewer).await?))
}

async fn reserve_gift(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(gift_id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, AppError> {
    let cache = state.session_cache(&claims);
    let guest_id = acting_guest(&cache).await?;

    let outcome = state.reservations.reserve(&cache, gift_id, guest_id).await?;
    Ok(Json(ReservationResponse { gift_id, guest_id, outcome }))
}

async fn unreserve_gift(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(gift_id): Path<Uuid>,
) -> Result<Json<ReleaseResponse>, AppError> {
    let cache = state.session_cache(&claims);
    let guest_id = acting_guest(&cache).await?;

    let outcome = state.reservations.unreserve(&cache, gift_id, guest_id).await?;
    Ok(Json(ReleaseResponse { gift_id, guest_id, outcome }))
}
