//! Upsert-or-increment for cart and wishlist lines keyed by
//! `(user_id, product_id, size, color)`.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, Set,
};

use crate::entities::{cart, product, wishlist};
use crate::error::{ApiError, ApiResult};

/// `NULL` never equals `NULL` in SQL, so an unset variant has to be matched with `IS NULL`.
pub fn same_variant<C: ColumnTrait>(
    size_col: C,
    color_col: C,
    size: Option<&str>,
    color: Option<&str>,
) -> Condition {
    let size_cond = match size {
        Some(size) => size_col.eq(size),
        None => size_col.is_null(),
    };
    let color_cond = match color {
        Some(color) => color_col.eq(color),
        None => color_col.is_null(),
    };
    Condition::all().add(size_cond).add(color_cond)
}

pub async fn find_active_product<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
) -> ApiResult<product::Model> {
    product::Entity::find_by_id(product_id)
        .filter(product::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product with {product_id} id was found")))
}

fn ensure_stock(product: &product::Model, quantity: i32) -> ApiResult<()> {
    if quantity > product.stock {
        return Err(ApiError::BadRequest(format!(
            "Only {} of {} in stock",
            product.stock, product.name
        )));
    }
    Ok(())
}

/// Returns the stored line and whether it was newly inserted.
pub async fn upsert_cart_line<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    product: &product::Model,
    quantity: i32,
    size: Option<String>,
    color: Option<String>,
) -> ApiResult<(cart::Model, bool)> {
    let existing = cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .filter(cart::Column::ProductId.eq(product.id))
        .filter(same_variant(
            cart::Column::Size,
            cart::Column::Color,
            size.as_deref(),
            color.as_deref(),
        ))
        .one(db)
        .await?;

    let now = Utc::now();
    match existing {
        Some(entry) => {
            let total = entry.quantity + quantity;
            ensure_stock(product, total)?;
            let mut entry: cart::ActiveModel = entry.into();
            entry.quantity = Set(total);
            entry.updated_at = Set(now);
            Ok((entry.update(db).await?, false))
        }
        None => {
            ensure_stock(product, quantity)?;
            let entry = cart::ActiveModel {
                user_id: Set(user_id),
                product_id: Set(product.id),
                size: Set(size),
                color: Set(color),
                quantity: Set(quantity),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok((entry, true))
        }
    }
}

/// Same key semantics as the cart, without the stock bound.
pub async fn upsert_wishlist_line<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    product_id: i32,
    quantity: i32,
    size: Option<String>,
    color: Option<String>,
) -> ApiResult<(wishlist::Model, bool)> {
    let existing = wishlist::Entity::find()
        .filter(wishlist::Column::UserId.eq(user_id))
        .filter(wishlist::Column::ProductId.eq(product_id))
        .filter(same_variant(
            wishlist::Column::Size,
            wishlist::Column::Color,
            size.as_deref(),
            color.as_deref(),
        ))
        .one(db)
        .await?;

    let now = Utc::now();
    match existing {
        Some(entry) => {
            let total = entry.quantity + quantity;
            let mut entry: wishlist::ActiveModel = entry.into();
            entry.quantity = Set(total);
            entry.updated_at = Set(now);
            Ok((entry.update(db).await?, false))
        }
        None => {
            let entry = wishlist::ActiveModel {
                user_id: Set(user_id),
                product_id: Set(product_id),
                size: Set(size),
                color: Set(color),
                quantity: Set(quantity),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok((entry, true))
        }
    }
}

pub async fn set_cart_quantity<C: ConnectionTrait>(
    db: &C,
    entry: cart::Model,
    product: &product::Model,
    quantity: i32,
) -> ApiResult<cart::Model> {
    ensure_stock(product, quantity)?;
    let mut entry: cart::ActiveModel = entry.into();
    entry.quantity = Set(quantity);
    entry.updated_at = Set(Utc::now());
    Ok(entry.update(db).await?)
}
