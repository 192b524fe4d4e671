use axum::{
    extract::{Extension, Path, Query},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::public::product::Page;
use crate::entities::order::{self, FulfillmentStatus, OrderStatus, PaymentStatus};
use crate::error::{ApiError, ApiResult};
use crate::services::{
    email,
    orders::{self, StatusChange},
};
use crate::state::AppState;

pub fn admin_order_router() -> Router {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order).patch(patch_order))
}

async fn list_orders(
    Query(params): Query<AdminOrdersQuery>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;

    let mut finder = order::Entity::find();
    if let Some(status) = params.order_status {
        finder = finder.filter(order::Column::OrderStatus.eq(status));
    }
    if let Some(status) = params.fulfillment_status {
        finder = finder.filter(order::Column::FulfillmentStatus.eq(status));
    }
    if let Some(status) = params.payment_status {
        finder = finder.filter(order::Column::PaymentStatus.eq(status));
    }
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        finder = finder.filter(
            Condition::any()
                .add(order::Column::OrderNumber.contains(search))
                .add(order::Column::CustomerEmail.contains(search.to_lowercase())),
        );
    }

    let page = Page::from_query(params.page, params.limit);
    let paginator = finder
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .paginate(&txn, page.limit);
    let total = paginator.num_items().await?;
    let orders = paginator.fetch_page(page.index()).await?;

    Ok(Json(json!({
        "success": true,
        "orders": orders,
        "total": total,
        "page": page.number,
        "limit": page.limit,
        "total_pages": page.total_pages(total),
    })))
}

async fn get_order(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;
    let found = find_order(&txn, id).await?;

    Ok(Json(json!({
        "success": true,
        "order": orders::with_items(&txn, found).await?,
    })))
}

/// Moves the order through its state machines. Reaching shipped or delivered mails the
/// customer once the change is committed.
async fn patch_order(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Json(payload): Json<PatchOrder>,
) -> ApiResult<Json<Value>> {
    let tracking_number = payload
        .tracking_number
        .map(|number| number.trim().to_owned())
        .filter(|number| !number.is_empty());

    let txn = state.db.begin().await?;
    let current = find_order(&txn, id).await?;
    let transition = orders::plan_transition(&current, payload.change, Utc::now())?;
    let updated = orders::apply_transition(&txn, current, &transition, tracking_number).await?;
    let order = orders::with_items(&txn, updated).await?;
    txn.commit().await?;

    info!(
        order_number = %order.order.order_number,
        order_status = %order.order.order_status,
        fulfillment_status = %order.order.fulfillment_status,
        payment_status = %order.order.payment_status,
        "Order updated"
    );

    if transition.shipped_now {
        email::spawn_send(state.mailer.as_ref(), email::shipping_update(&order.order));
    }
    if transition.delivered_now {
        email::spawn_send(state.mailer.as_ref(), email::delivery_update(&order.order));
    }

    Ok(Json(json!({
        "success": true,
        "order": order,
    })))
}

async fn find_order<C: sea_orm::ConnectionTrait>(db: &C, id: i32) -> ApiResult<order::Model> {
    order::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No order with {id} id was found.")))
}

#[derive(Deserialize)]
struct AdminOrdersQuery {
    order_status: Option<OrderStatus>,
    fulfillment_status: Option<FulfillmentStatus>,
    payment_status: Option<PaymentStatus>,
    search: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Deserialize, Debug)]
struct PatchOrder {
    #[serde(flatten)]
    change: StatusChange,
    tracking_number: Option<String>,
}
