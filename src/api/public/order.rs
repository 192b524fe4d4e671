use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::entities::{cart, order};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{optional_auth_middleware, Claims};
use crate::services::{
    email,
    orders::{self, CustomerInfo, LineRequest, NewOrder, ShippingRates},
};
use crate::state::AppState;

pub const SUPPORTED_PAYMENT_METHODS: &[&str] = &["paypal"];

pub fn order_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/orders",
            post(create_order).route_layer(from_fn_with_state(state, optional_auth_middleware)),
        )
        .route("/orders/track", get(track_order))
}

/// Guest or signed-in checkout. A signed-in caller with no explicit items checks out
/// their cart; their cart is emptied either way.
async fn create_order(
    Extension(state): Extension<AppState>,
    claims: Option<Extension<Claims>>,
    Json(payload): Json<CreateOrder>,
) -> ApiResult<Response> {
    let user_id = claims.map(|Extension(claims)| claims.user_id);

    let payment_method = payload
        .payment_method
        .unwrap_or_else(|| "paypal".to_owned())
        .to_lowercase();
    if !SUPPORTED_PAYMENT_METHODS.contains(&payment_method.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported payment method: {payment_method}"
        )));
    }

    let txn = state.db.begin().await?;

    let lines = match (payload.items.is_empty(), user_id) {
        (true, Some(user_id)) => cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .order_by_asc(cart::Column::Id)
            .all(&txn)
            .await?
            .into_iter()
            .map(|entry| LineRequest {
                product_id: entry.product_id,
                quantity: entry.quantity,
                size: entry.size,
                color: entry.color,
            })
            .collect(),
        _ => payload.items,
    };

    let placed = orders::place_order(
        &txn,
        NewOrder {
            user_id,
            customer: payload.customer,
            lines,
            payment_method,
            notes: payload.notes.filter(|notes| !notes.trim().is_empty()),
        },
        ShippingRates {
            free_threshold: state.config.free_shipping_threshold,
            flat_rate: state.config.flat_shipping_rate,
        },
    )
    .await?;

    if let Some(user_id) = user_id {
        cart::Entity::delete_many()
            .filter(cart::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    info!(
        order_number = %placed.order.order_number,
        user_id = ?user_id,
        total = placed.order.total,
        "Order placed"
    );

    email::spawn_send(
        state.mailer.as_ref(),
        email::order_confirmation(&placed.order, &placed.items),
    );
    if let Some(admin_email) = state.config.admin_email.as_deref() {
        email::spawn_send(
            state.mailer.as_ref(),
            email::admin_new_order(admin_email, &placed.order, &placed.items),
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "order": placed,
        })),
    )
        .into_response())
}

/// Public lookup. Both the number and the email must match, otherwise it is simply not found.
async fn track_order(
    Extension(state): Extension<AppState>,
    Query(query): Query<TrackQuery>,
) -> ApiResult<Json<Value>> {
    let not_found = || ApiError::NotFound("Order not found".into());
    let txn = state.db.begin().await?;

    let found = order::Entity::find()
        .filter(order::Column::OrderNumber.eq(query.order_number.trim()))
        .one(&txn)
        .await?
        .ok_or_else(not_found)?;

    if !found
        .customer_email
        .eq_ignore_ascii_case(query.email.trim())
    {
        return Err(not_found());
    }

    let order = orders::with_items(&txn, found).await?;
    Ok(Json(json!({
        "success": true,
        "order": order,
    })))
}

#[derive(Deserialize, Debug)]
struct CreateOrder {
    customer: CustomerInfo,
    #[serde(default)]
    items: Vec<LineRequest>,
    payment_method: Option<String>,
    notes: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TrackQuery {
    order_number: String,
    email: String,
}
