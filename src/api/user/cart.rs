use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::entities::{cart, cart::Entity as CartEntity, product};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::Claims;
use crate::services::{
    cart::{find_active_product, set_cart_quantity, upsert_cart_line},
    orders::{normalize_variant, round_cents},
};
use crate::state::AppState;

pub fn cart_router() -> Router {
    Router::new()
        .route("/cart", get(get_cart).post(add_product).delete(clear_cart))
        .route("/cart/:id", patch(patch_entry).delete(remove_product))
}

async fn get_cart(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;
    let view = load_cart(&txn, claims.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "items": view.items,
        "subtotal": view.subtotal,
        "item_count": view.item_count,
    })))
}

async fn add_product(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddProduct>,
) -> ApiResult<Response> {
    payload.validate()?;

    let txn = state.db.begin().await?;
    let product = find_active_product(&txn, payload.product_id).await?;
    let (entry, created) = upsert_cart_line(
        &txn,
        claims.user_id,
        &product,
        payload.quantity,
        normalize_variant(payload.size),
        normalize_variant(payload.color),
    )
    .await?;
    txn.commit().await?;

    let (status, message) = if created {
        (StatusCode::CREATED, "Added successfully")
    } else {
        (StatusCode::OK, "Quantity updated")
    };

    Ok((
        status,
        Json(json!({
            "success": true,
            "message": message,
            "item": CartLine::new(entry, Some(product)),
        })),
    )
        .into_response())
}

async fn patch_entry(
    Path(id): Path<i32>,
    Extension(claims): Extension<Claims>,
    Extension(state): Extension<AppState>,
    Json(payload): Json<PatchCart>,
) -> ApiResult<Json<Value>> {
    if payload.quantity < 0 {
        return Err(ApiError::BadRequest("Quantity cannot be negative".into()));
    }

    let txn = state.db.begin().await?;
    let entry = find_own_entry(&txn, id, claims.user_id).await?;

    if payload.quantity == 0 {
        let entry: cart::ActiveModel = entry.into();
        entry.delete(&txn).await?;
        txn.commit().await?;
        return Ok(Json(json!({
            "success": true,
            "message": "Resource deleted successfully"
        })));
    }

    let product = find_active_product(&txn, entry.product_id).await?;
    let entry = set_cart_quantity(&txn, entry, &product, payload.quantity).await?;
    txn.commit().await?;

    Ok(Json(json!({
        "success": true,
        "message": "Resource patched successfully",
        "item": CartLine::new(entry, Some(product)),
    })))
}

async fn remove_product(
    Path(id): Path<i32>,
    Extension(claims): Extension<Claims>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;
    let entry: cart::ActiveModel = find_own_entry(&txn, id, claims.user_id).await?.into();
    entry.delete(&txn).await?;
    txn.commit().await?;

    Ok(Json(json!({
        "success": true,
        "message": "Resource deleted successfully"
    })))
}

async fn clear_cart(
    Extension(claims): Extension<Claims>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;
    let result = CartEntity::delete_many()
        .filter(cart::Column::UserId.eq(claims.user_id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    Ok(Json(json!({
        "success": true,
        "removed": result.rows_affected,
    })))
}

/// Rows belonging to someone else are reported as missing.
async fn find_own_entry<C: ConnectionTrait>(
    db: &C,
    id: i32,
    user_id: i32,
) -> ApiResult<cart::Model> {
    CartEntity::find_by_id(id)
        .filter(cart::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No related entry with {id} id was found.")))
}

pub struct CartView {
    pub items: Vec<CartLine>,
    pub subtotal: f64,
    pub item_count: i32,
}

pub async fn load_cart<C: ConnectionTrait>(db: &C, user_id: i32) -> ApiResult<CartView> {
    let rows = CartEntity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .find_also_related(product::Entity)
        .order_by_asc(cart::Column::Id)
        .all(db)
        .await?;

    let items: Vec<CartLine> = rows
        .into_iter()
        .map(|(entry, product)| CartLine::new(entry, product))
        .collect();
    let subtotal = round_cents(items.iter().map(|line| line.line_total).sum());
    let item_count = items.iter().map(|line| line.quantity).sum();

    Ok(CartView {
        items,
        subtotal,
        item_count,
    })
}

#[derive(Serialize, Debug)]
pub struct CartLine {
    pub id: i32,
    pub product_id: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: i32,
    pub line_total: f64,
    pub product: Option<ProductSummary>,
}

#[derive(Serialize, Debug)]
pub struct ProductSummary {
    pub id: i32,
    pub name: String,
    pub price: f64,
    pub image: Option<String>,
    pub category: String,
    pub stock: i32,
    pub is_active: bool,
}

impl ProductSummary {
    pub fn new(product: &product::Model) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            image: product.cover_image(),
            category: product.category.clone(),
            stock: product.stock,
            is_active: product.is_active,
        }
    }
}

impl CartLine {
    /// Inactive products stay visible but no longer count towards the subtotal.
    pub fn new(entry: cart::Model, product: Option<product::Model>) -> Self {
        let line_total = product
            .as_ref()
            .filter(|product| product.is_active)
            .map(|product| round_cents(product.price * f64::from(entry.quantity)))
            .unwrap_or(0.0);

        Self {
            id: entry.id,
            product_id: entry.product_id,
            size: entry.size,
            color: entry.color,
            quantity: entry.quantity,
            line_total,
            product: product.as_ref().map(ProductSummary::new),
        }
    }
}

#[derive(Deserialize, Validate, Debug)]
struct AddProduct {
    product_id: i32,
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 100))]
    quantity: i32,
    size: Option<String>,
    color: Option<String>,
}

fn one() -> i32 {
    1
}

#[derive(Deserialize)]
struct PatchCart {
    quantity: i32,
}
