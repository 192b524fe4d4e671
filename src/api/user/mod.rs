pub mod cart;
pub mod order;
pub mod profile;
pub mod wishlist;

use axum::{middleware::from_fn_with_state, Router};

use crate::entities::user::Role;
use crate::middleware::auth::{auth_middleware, AuthState};
use crate::state::AppState;
use cart::cart_router;
use order::user_order_router;
use profile::profile_router;
use wishlist::wishlist_router;

/// Routes under `/api` for any signed-in account. Admins pass the guard as well.
pub fn user_api_router(state: AppState) -> Router {
    Router::new()
        .merge(profile_router())
        .merge(cart_router())
        .merge(wishlist_router())
        .merge(user_order_router())
        .route_layer(from_fn_with_state(
            AuthState {
                app: state,
                role: Role::Customer,
            },
            auth_middleware,
        ))
}
