use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde_json::{json, Value};
use tracing::info;

use crate::entities::{order, order::OrderStatus, order_item};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::Claims;
use crate::services::orders::{self, OrderWithItems, StatusChange};
use crate::state::AppState;

pub fn user_order_router() -> Router {
    Router::new()
        .route("/user/orders", get(list_orders))
        .route("/user/orders/:order_number", get(get_order))
        .route("/user/orders/:order_number/cancel", post(cancel_order))
}

async fn list_orders(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;

    let orders: Vec<OrderWithItems> = order::Entity::find()
        .filter(order::Column::UserId.eq(claims.user_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .find_with_related(order_item::Entity)
        .all(&txn)
        .await?
        .into_iter()
        .map(|(order, items)| OrderWithItems { order, items })
        .collect();

    Ok(Json(json!({
        "success": true,
        "count": orders.len(),
        "orders": orders,
    })))
}

async fn get_order(
    Path(order_number): Path<String>,
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;
    let found = find_own_order(&txn, &order_number, claims.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "order": orders::with_items(&txn, found).await?,
    })))
}

async fn cancel_order(
    Path(order_number): Path<String>,
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;
    let current = find_own_order(&txn, &order_number, claims.user_id).await?;

    if current.order_status == OrderStatus::Cancelled {
        return Err(ApiError::BadRequest("Order is already cancelled".into()));
    }

    let change = StatusChange {
        order_status: Some(OrderStatus::Cancelled),
        ..Default::default()
    };
    let transition = orders::plan_transition(&current, change, Utc::now())?;
    let updated = orders::apply_transition(&txn, current, &transition, None).await?;
    let order = orders::with_items(&txn, updated).await?;
    txn.commit().await?;

    info!(order_number = %order.order.order_number, user_id = claims.user_id, "Order cancelled by customer");

    Ok(Json(json!({
        "success": true,
        "order": order,
    })))
}

async fn find_own_order<C: ConnectionTrait>(
    db: &C,
    order_number: &str,
    user_id: i32,
) -> ApiResult<order::Model> {
    order::Entity::find()
        .filter(order::Column::OrderNumber.eq(order_number))
        .filter(order::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_number} not found")))
}
