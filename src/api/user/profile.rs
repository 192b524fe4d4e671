use axum::{extract::Extension, routing::get, Json, Router};
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::api::public::auth::UserResponse;
use crate::entities::user::{self, Entity as UserEntity};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

pub fn profile_router() -> Router {
    Router::new().route("/auth/me", get(me).patch(patch_me))
}

async fn me(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let txn = state.db.begin().await?;
    let user = UserEntity::find_by_id(claims.user_id)
        .one(&txn)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(json!({
        "success": true,
        "user": UserResponse::from(user),
    })))
}

/// Empty strings clear the field.
async fn patch_me(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PatchProfile>,
) -> ApiResult<Json<Value>> {
    payload.validate()?;

    let txn = state.db.begin().await?;
    let user: user::ActiveModel = UserEntity::find_by_id(claims.user_id)
        .one(&txn)
        .await?
        .ok_or(ApiError::Unauthorized)?
        .into();

    let user = payload.apply(user).update(&txn).await?;
    txn.commit().await?;

    Ok(Json(json!({
        "success": true,
        "user": UserResponse::from(user),
    })))
}

#[derive(Deserialize, Validate, Debug, Default)]
pub struct PatchProfile {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

impl PatchProfile {
    pub fn apply(self, mut user: user::ActiveModel) -> user::ActiveModel {
        let clean = |value: String| {
            let value = value.trim().to_owned();
            (!value.is_empty()).then_some(value)
        };

        if let Some(first_name) = self.first_name {
            user.first_name = Set(clean(first_name));
        }
        if let Some(last_name) = self.last_name {
            user.last_name = Set(clean(last_name));
        }
        if let Some(phone) = self.phone {
            user.phone = Set(clean(phone));
        }
        user
    }
}
