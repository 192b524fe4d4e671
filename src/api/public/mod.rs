pub mod auth;
pub mod order;
pub mod paypal;
pub mod product;
pub mod uploads;

use axum::Router;

use crate::state::AppState;

use auth::auth_router;
use order::order_router;
use paypal::paypal_router;
use product::product_router;

/// Routes under `/api` that need no account.
pub fn public_api_router(state: AppState) -> Router {
    Router::new()
        .merge(auth_router())
        .merge(product_router())
        .merge(order_router(state))
        .merge(paypal_router())
}
