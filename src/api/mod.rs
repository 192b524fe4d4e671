pub mod admin;
pub mod public;
pub mod user;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    Extension, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::middleware::logging::logging_middleware;
use crate::state::AppState;
use admin::admin_api_router;
use public::{public_api_router, uploads::uploads_router};
use user::user_api_router;

pub fn create_api_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_api_router(state.clone()))
        .merge(user_api_router(state.clone()));

    Router::new()
        .nest("/api", api)
        .nest("/api/admin", admin_api_router(state.clone()))
        .merge(uploads_router())
        .layer(from_fn(logging_middleware))
        .layer(cors_layer(state.config.frontend_url.as_deref()))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// Cookies only travel cross-origin to an explicitly named frontend.
fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match frontend_url.map(|url| HeaderValue::from_str(url.trim_end_matches('/'))) {
        Some(Ok(origin)) => base.allow_origin(origin).allow_credentials(true),
        Some(Err(err)) => {
            warn!(error = %err, "FRONTEND_URL is not a valid origin, cross-origin requests disabled");
            base
        }
        None => base,
    }
}
