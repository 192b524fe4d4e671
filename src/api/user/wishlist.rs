use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::cart::{CartLine, ProductSummary};
use crate::entities::{product, wishlist, wishlist::Entity as WishlistEntity};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::Claims;
use crate::services::{
    cart::{find_active_product, upsert_cart_line, upsert_wishlist_line},
    orders::normalize_variant,
};
use crate::state::AppState;

pub fn wishlist_router() -> Router {
    Router::new()
        .route("/wishlist", get(get_wishlist).post(add_product))
        .route("/wishlist/:id", delete(remove_product))
        .route("/wishlist/:id/move-to-cart", post(move_to_cart))
}

async fn get_wishlist(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;

    let items: Vec<WishlistLine> = WishlistEntity::find()
        .filter(wishlist::Column::UserId.eq(claims.user_id))
        .find_also_related(product::Entity)
        .order_by_desc(wishlist::Column::CreatedAt)
        .order_by_desc(wishlist::Column::Id)
        .all(&txn)
        .await?
        .into_iter()
        .map(|(entry, product)| WishlistLine::new(entry, product.as_ref()))
        .collect();

    Ok(Json(json!({
        "success": true,
        "count": items.len(),
        "items": items,
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
    let (entry, created) = upsert_wishlist_line(
        &txn,
        claims.user_id,
        product.id,
        payload.quantity,
        normalize_variant(payload.size),
        normalize_variant(payload.color),
    )
    .await?;
    txn.commit().await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(json!({
            "success": true,
            "item": WishlistLine::new(entry, Some(&product)),
        })),
    )
        .into_response())
}

async fn remove_product(
    Path(id): Path<i32>,
    Extension(claims): Extension<Claims>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;
    let entry: wishlist::ActiveModel = find_own_entry(&txn, id, claims.user_id).await?.into();
    entry.delete(&txn).await?;
    txn.commit().await?;

    Ok(Json(json!({
        "success": true,
        "message": "Resource deleted successfully"
    })))
}

/// Upserts the wishlist line into the cart and drops it from the wishlist. Either both
/// happen or neither does.
async fn move_to_cart(
    Path(id): Path<i32>,
    Extension(claims): Extension<Claims>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;
    let entry = find_own_entry(&txn, id, claims.user_id).await?;
    let product = find_active_product(&txn, entry.product_id).await?;

    let (cart_entry, _) = upsert_cart_line(
        &txn,
        claims.user_id,
        &product,
        entry.quantity,
        entry.size.clone(),
        entry.color.clone(),
    )
    .await?;

    let entry: wishlist::ActiveModel = entry.into();
    entry.delete(&txn).await?;
    txn.commit().await?;

    Ok(Json(json!({
        "success": true,
        "message": "Moved to cart",
        "item": CartLine::new(cart_entry, Some(product)),
    })))
}

async fn find_own_entry<C: ConnectionTrait>(
    db: &C,
    id: i32,
    user_id: i32,
) -> ApiResult<wishlist::Model> {
    WishlistEntity::find_by_id(id)
        .filter(wishlist::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No related entry with {id} id was found.")))
}

#[derive(Serialize, Debug)]
struct WishlistLine {
    id: i32,
    product_id: i32,
    size: Option<String>,
    color: Option<String>,
    quantity: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    product: Option<ProductSummary>,
}

impl WishlistLine {
    fn new(entry: wishlist::Model, product: Option<&product::Model>) -> Self {
        Self {
            id: entry.id,
            product_id: entry.product_id,
            size: entry.size,
            color: entry.color,
            quantity: entry.quantity,
            created_at: entry.created_at,
            product: product.map(ProductSummary::new),
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
