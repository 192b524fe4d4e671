use axum::{extract::Extension, routing::get, Json, Router};
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use serde_json::{json, Value};

use crate::entities::{
    order::{self, FulfillmentStatus, OrderStatus, PaymentStatus},
    product, user,
};
use crate::error::ApiResult;
use crate::services::orders::round_cents;
use crate::state::AppState;

pub fn admin_stats_router() -> Router {
    Router::new().route("/stats", get(get_stats))
}

async fn get_stats(Extension(state): Extension<AppState>) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;

    let products = product::Entity::find().count(&txn).await?;
    let active_products = product::Entity::find()
        .filter(product::Column::IsActive.eq(true))
        .count(&txn)
        .await?;
    let orders = order::Entity::find().count(&txn).await?;
    let customers = user::Entity::find()
        .filter(user::Column::Role.eq(user::Role::Customer))
        .count(&txn)
        .await?;

    let paid_totals: Vec<f64> = order::Entity::find()
        .select_only()
        .column(order::Column::Total)
        .filter(order::Column::PaymentStatus.eq(PaymentStatus::Paid))
        .into_tuple()
        .all(&txn)
        .await?;
    let revenue = round_cents(paid_totals.iter().sum());

    let pending_fulfillment = order::Entity::find()
        .filter(order::Column::OrderStatus.ne(OrderStatus::Cancelled))
        .filter(order::Column::FulfillmentStatus.is_in([
            FulfillmentStatus::Unfulfilled,
            FulfillmentStatus::Processing,
        ]))
        .count(&txn)
        .await?;

    let low_stock: Vec<(i32, String, i32)> = product::Entity::find()
        .select_only()
        .columns([product::Column::Id, product::Column::Name, product::Column::Stock])
        .filter(product::Column::IsActive.eq(true))
        .filter(product::Column::Stock.lte(state.config.low_stock_threshold))
        .order_by_asc(product::Column::Stock)
        .order_by_asc(product::Column::Id)
        .into_tuple()
        .all(&txn)
        .await?;

    Ok(Json(json!({
        "success": true,
        "stats": {
            "products": products,
            "active_products": active_products,
            "orders": orders,
            "customers": customers,
            "revenue": revenue,
            "paid_orders": paid_totals.len(),
            "pending_fulfillment": pending_fulfillment,
            "low_stock": low_stock
                .into_iter()
                .map(|(id, name, stock)| json!({ "id": id, "name": name, "stock": stock }))
                .collect::<Vec<_>>(),
        },
    })))
}
