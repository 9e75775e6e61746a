use axum::{
    extract::State,
    Json,
    routing::post,
    Router,
};
use serde::Serialize;
use jsonwebtoken::{encode, Header, EncodingKey};
use chrono::{Utc, Duration};
use uuid::Uuid;
use crate::{state::AppState, error::AppError, middleware::auth::SessionClaims};

#[derive(Debug, Serialize)]
struct SessionResponse {
    token: String,
    session_id: String,
    expires_at: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/sessions", post(open_session))
}

async fn open_session(State(state): State<AppState>) -> Result<Json<SessionResponse>, AppError> {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp();
    let claims = SessionClaims {
        sub: session_id.clone(),
        exp: expires_at as usize,
    };

    let key = EncodingKey::from_secret(state.auth.secret.as_bytes());
    let token = encode(&Header::default(), &claims, &key)
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

    tracing::debug!(session = %session_id, "Session opened");
    Ok(Json(SessionResponse { token, session_id, expires_at }))
}
