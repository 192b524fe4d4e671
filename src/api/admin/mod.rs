pub mod order;
pub mod product;
pub mod stats;
pub mod upload;
pub mod user;

use axum::{middleware::from_fn_with_state, Router};

use order::admin_order_router;
use product::admin_product_router;
use stats::admin_stats_router;
use upload::upload_router;
use user::admin_user_router;

use crate::entities::user::Role;
use crate::middleware::auth::{auth_middleware, AuthState};
use crate::state::AppState;

pub fn admin_api_router(state: AppState) -> Router {
    let upload_router = upload_router(state.config.max_upload_bytes);

    Router::new()
        .merge(admin_product_router())
        .merge(admin_order_router())
        .merge(admin_user_router())
        .merge(admin_stats_router())
        .merge(upload_router)
        .route_layer(from_fn_with_state(
            AuthState {
                app: state,
                role: Role::Admin,
            },
            auth_middleware,
        ))
}
