use axum::{
    extract::{Extension, Path, Query},
    routing::{get, patch},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use crate::api::public::{auth::UserResponse, product::Page};
use crate::api::user::profile::PatchProfile;
use crate::entities::user::{self, Entity as UserEntity, Role};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

pub fn admin_user_router() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", patch(patch_user).delete(delete_user))
}

async fn list_users(
    Query(params): Query<AdminUsersQuery>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;

    let mut finder = UserEntity::find();
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        finder = finder.filter(
            Condition::any()
                .add(user::Column::Email.contains(search.to_lowercase()))
                .add(user::Column::FirstName.contains(search))
                .add(user::Column::LastName.contains(search)),
        );
    }
    if let Some(role) = params.role {
        finder = finder.filter(user::Column::Role.eq(role));
    }

    let page = Page::from_query(params.page, params.limit);
    let paginator = finder
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id)
        .paginate(&txn, page.limit);
    let total = paginator.num_items().await?;
    let users = paginator.fetch_page(page.index()).await?;

    Ok(Json(json!({
        "success": true,
        "users": users.into_iter().map(UserResponse::from).collect::<Vec<_>>(),
        "total": total,
        "page": page.number,
        "limit": page.limit,
        "total_pages": page.total_pages(total),
    })))
}

async fn patch_user(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PatchUser>,
) -> ApiResult<Json<Value>> {
    payload.profile.validate()?;
    if id == claims.user_id && payload.role == Some(Role::Customer) {
        return Err(ApiError::BadRequest("You cannot remove your own admin role".into()));
    }

    let txn = state.db.begin().await?;
    let mut user: user::ActiveModel = find_user(&txn, id).await?.into();
    if let Some(role) = payload.role {
        user.role = Set(role);
    }
    let user = payload.profile.apply(user).update(&txn).await?;
    txn.commit().await?;

    info!(user_id = id, role = %user.role, "User updated by admin");

    Ok(Json(json!({
        "success": true,
        "user": UserResponse::from(user),
    })))
}

/// Their cart and wishlist go too; past orders stay with the user link cleared.
async fn delete_user(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    if id == claims.user_id {
        return Err(ApiError::BadRequest("You cannot delete your own account".into()));
    }

    let txn = state.db.begin().await?;
    let user: user::ActiveModel = find_user(&txn, id).await?.into();
    user.delete(&txn).await?;
    txn.commit().await?;

    info!(user_id = id, "User deleted by admin");

    Ok(Json(json!({
        "success": true,
        "message": "Resource deleted successfully."
    })))
}

async fn find_user<C: sea_orm::ConnectionTrait>(db: &C, id: i32) -> ApiResult<user::Model> {
    UserEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No user with {id} id was found.")))
}

#[derive(Deserialize)]
struct AdminUsersQuery {
    search: Option<String>,
    role: Option<Role>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Deserialize, Debug)]
struct PatchUser {
    role: Option<Role>,
    #[serde(flatten)]
    profile: PatchProfile,
}
