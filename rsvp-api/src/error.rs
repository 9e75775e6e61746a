use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rsvp_core::StoreError;
use rsvp_registry::RegistryError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(&'static str, String),
    ValidationError(String),
    NotFoundError(&'static str, String),
    ConflictError(&'static str, String),
    ServiceUnavailable(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::AuthenticationError(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", msg)
            },
            AppError::AuthorizationError(code, msg) => (StatusCode::FORBIDDEN, code, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::NotFoundError(code, msg) => (StatusCode::NOT_FOUND, code, msg),
            AppError::ConflictError(code, msg) => (StatusCode::CONFLICT, code, msg),
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                let msg = "Please try again in a moment".to_string();
                (StatusCode::SERVICE_UNAVAILABLE, "store_timeout", msg)
            },
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                let msg = "Something went wrong, please try again".to_string();
                (StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
            },
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::Validation(msg) => AppError::ValidationError(msg),
            RegistryError::AlreadyReserved(_) => {
                AppError::ConflictError("already_reserved", message)
            },
            RegistryError::NotOwner(_) => AppError::AuthorizationError("not_owner", message),
            RegistryError::NotAttending(_) => {
                AppError::AuthorizationError("not_attending", message)
            },
            RegistryError::GuestNotFound(_) => AppError::NotFoundError("guest_not_found", message),
            RegistryError::GiftNotFound(_) => AppError::NotFoundError("gift_not_found", message),
            RegistryError::Store(StoreError::Timeout { .. }) => {
                AppError::ServiceUnavailable(message)
            },
            RegistryError::Store(_) => AppError::InternalServerError(message),
        }
    }
}
