use axum::{
    extract::{Extension, Path, Query},
    routing::get,
    Json, Router,
};
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::entities::product::{self, Entity as ProductEntity};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const DEFAULT_PAGE_SIZE: u64 = 12;
pub const MAX_PAGE_SIZE: u64 = 100;

pub fn product_router() -> Router {
    Router::new()
        .route("/products", get(get_products))
        .route("/products/categories", get(get_categories))
        .route("/products/:id", get(get_product))
}

async fn get_products(
    Query(params): Query<GetProductsQuery>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;

    let mut finder = ProductEntity::find().filter(product::Column::IsActive.eq(true));

    if let Some(category) = params.category.as_deref().filter(|c| !c.is_empty()) {
        finder = finder.filter(product::Column::Category.eq(category));
    }
    if Some(true) == params.featured {
        finder = finder.filter(product::Column::IsFeatured.eq(true));
    }
    if let Some(min) = params.min_price {
        finder = finder.filter(product::Column::Price.gte(min));
    }
    if let Some(max) = params.max_price {
        finder = finder.filter(product::Column::Price.lte(max));
    }
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        finder = finder.filter(product::Column::Name.contains(search));
    }

    let finder = sort_products(finder, params.sort.as_deref());
    let page = Page::from_query(params.page, params.limit);

    let paginator = finder.paginate(&txn, page.limit);
    let total = paginator.num_items().await?;
    let products = paginator.fetch_page(page.index()).await?;

    Ok(Json(json!({
        "success": true,
        "products": products.into_iter().map(PublicProductResponse::from).collect::<Vec<_>>(),
        "total": total,
        "page": page.number,
        "limit": page.limit,
        "total_pages": page.total_pages(total),
    })))
}

async fn get_categories(Extension(state): Extension<AppState>) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;

    let categories: Vec<String> = ProductEntity::find()
        .select_only()
        .column(product::Column::Category)
        .filter(product::Column::IsActive.eq(true))
        .distinct()
        .order_by_asc(product::Column::Category)
        .into_tuple()
        .all(&txn)
        .await?;

    Ok(Json(json!({
        "success": true,
        "categories": categories,
    })))
}

async fn get_product(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;

    let product = ProductEntity::find_by_id(id)
        .filter(product::Column::IsActive.eq(true))
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product with {id} id was found.")))?;

    Ok(Json(json!({
        "success": true,
        "product": PublicProductResponse::from(product),
    })))
}

pub fn sort_products(
    finder: Select<ProductEntity>,
    sort: Option<&str>,
) -> Select<ProductEntity> {
    match sort {
        Some("price_asc") => finder.order_by_asc(product::Column::Price),
        Some("price_desc") => finder.order_by_desc(product::Column::Price),
        Some("name") => finder.order_by_asc(product::Column::Name),
        _ => finder
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id),
    }
}

/// 1-based page number with a bounded page size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    pub number: u64,
    pub limit: u64,
}

impl Page {
    pub fn from_query(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            number: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn index(&self) -> u64 {
        self.number - 1
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

#[derive(Deserialize)]
struct GetProductsQuery {
    category: Option<String>,
    featured: Option<bool>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    search: Option<String>,
    sort: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Serialize)]
pub struct PublicProductResponse {
    id: i32,
    name: String,
    description: String,
    price: f64,
    images: Value,
    category: String,
    stock: i32,
    in_stock: bool,
    specifications: Value,
    is_featured: bool,
}

impl From<product::Model> for PublicProductResponse {
    fn from(value: product::Model) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            price: value.price,
            images: value.images,
            category: value.category,
            stock: value.stock,
            in_stock: value.stock > 0,
            specifications: value.specifications,
            is_featured: value.is_featured,
        }
    }
}
