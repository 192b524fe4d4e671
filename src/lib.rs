pub mod api;
pub mod config;
pub mod entities;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// The full HTTP application: every route plus the shared layers.
pub fn build_app(state: AppState) -> Router {
    api::create_api_router(state)
}
