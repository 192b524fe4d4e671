use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use crate::api::public::product::{sort_products, Page};
use crate::entities::product::{self, Entity as ProductEntity};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn admin_product_router() -> Router {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(admin_get_product)
                .patch(patch_product)
                .delete(delete_product),
        )
}

/// Inactive products included.
async fn list_products(
    Query(params): Query<AdminProductsQuery>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;

    let mut finder = ProductEntity::find();
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        finder = finder.filter(
            Condition::any()
                .add(product::Column::Name.contains(search))
                .add(product::Column::Category.contains(search)),
        );
    }
    if let Some(category) = params.category.as_deref().filter(|c| !c.is_empty()) {
        finder = finder.filter(product::Column::Category.eq(category));
    }
    if let Some(is_active) = params.is_active {
        finder = finder.filter(product::Column::IsActive.eq(is_active));
    }

    let finder = sort_products(finder, params.sort.as_deref());
    let page = Page::from_query(params.page, params.limit);
    let paginator = finder.paginate(&txn, page.limit);
    let total = paginator.num_items().await?;
    let products = paginator.fetch_page(page.index()).await?;

    Ok(Json(json!({
        "success": true,
        "products": products,
        "total": total,
        "page": page.number,
        "limit": page.limit,
        "total_pages": page.total_pages(total),
    })))
}

async fn admin_get_product(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;
    let product = find_product(&txn, id).await?;

    Ok(Json(json!({
        "success": true,
        "product": product,
    })))
}

async fn create_product(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CreateProduct>,
) -> ApiResult<Response> {
    payload.validate()?;
    let name = not_blank(&payload.name, "name")?;
    let category = not_blank(&payload.category, "category")?;

    let now = Utc::now();
    let txn = state.db.begin().await?;
    let created = product::ActiveModel {
        name: Set(name),
        description: Set(payload.description),
        price: Set(payload.price),
        images: Set(json!(payload.images)),
        category: Set(category),
        stock: Set(payload.stock),
        specifications: Set(payload.specifications.unwrap_or_else(|| json!({}))),
        is_featured: Set(payload.is_featured.unwrap_or_default()),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(product_id = created.id, name = %created.name, "Product created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "product": created,
        })),
    )
        .into_response())
}

async fn patch_product(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Json(payload): Json<PatchProductPayload>,
) -> ApiResult<Json<Value>> {
    payload.validate()?;
    let name = payload.name.as_deref().map(|n| not_blank(n, "name")).transpose()?;
    let category = payload
        .category
        .as_deref()
        .map(|c| not_blank(c, "category"))
        .transpose()?;

    let txn = state.db.begin().await?;
    let mut product: product::ActiveModel = find_product(&txn, id).await?.into();

    if let Some(name) = name {
        product.name = Set(name);
    }
    if let Some(description) = payload.description {
        product.description = Set(description);
    }
    if let Some(price) = payload.price {
        product.price = Set(price);
    }
    if let Some(images) = payload.images {
        product.images = Set(json!(images));
    }
    if let Some(category) = category {
        product.category = Set(category);
    }
    if let Some(stock) = payload.stock {
        product.stock = Set(stock);
    }
    if let Some(specifications) = payload.specifications {
        product.specifications = Set(specifications);
    }
    if let Some(is_featured) = payload.is_featured {
        product.is_featured = Set(is_featured);
    }
    if let Some(is_active) = payload.is_active {
        product.is_active = Set(is_active);
    }
    product.updated_at = Set(Utc::now());

    let product = product.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(json!({
        "success": true,
        "product": product,
    })))
}

/// Cart and wishlist rows go with the product; order lines keep their snapshot.
async fn delete_product(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;
    let product: product::ActiveModel = find_product(&txn, id).await?.into();
    product.delete(&txn).await?;
    txn.commit().await?;

    info!(product_id = id, "Product deleted");

    Ok(Json(json!({
        "success": true,
        "message": "Resource deleted successfully."
    })))
}

fn not_blank(value: &str, field: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("Product {field} cannot be blank")));
    }
    Ok(trimmed.to_owned())
}

async fn find_product<C: sea_orm::ConnectionTrait>(db: &C, id: i32) -> ApiResult<product::Model> {
    ProductEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product with {id} id was found.")))
}

#[derive(Deserialize)]
struct AdminProductsQuery {
    search: Option<String>,
    category: Option<String>,
    is_active: Option<bool>,
    sort: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Deserialize, Validate, Debug)]
struct CreateProduct {
    #[validate(length(min = 1, max = 200))]
    name: String,
    #[serde(default)]
    description: String,
    #[validate(range(exclusive_min = 0.0))]
    price: f64,
    #[serde(default)]
    images: Vec<String>,
    #[validate(length(min = 1, max = 64))]
    category: String,
    #[validate(range(min = 0))]
    stock: i32,
    specifications: Option<Value>,
    is_featured: Option<bool>,
    is_active: Option<bool>,
}

#[derive(Deserialize, Validate, Debug)]
struct PatchProductPayload {
    #[validate(length(min = 1, max = 200))]
    name: Option<String>,
    description: Option<String>,
    #[validate(range(exclusive_min = 0.0))]
    price: Option<f64>,
    images: Option<Vec<String>>,
    #[validate(length(min = 1, max = 64))]
    category: Option<String>,
    #[validate(range(min = 0))]
    stock: Option<i32>,
    specifications: Option<Value>,
    is_featured: Option<bool>,
    is_active: Option<bool>,
}
