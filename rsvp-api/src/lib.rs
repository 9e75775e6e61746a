use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error;
pub mod gifts;
pub mod middleware;
pub mod rsvp;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let session_routes = Router::new()
        .merge(rsvp::routes())
        .merge(gifts::routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session_auth_middleware,
        ));

    Router::new()
        .merge(auth::routes())
        .merge(session_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
