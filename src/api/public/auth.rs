use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::entities::user::{self, hash_password, Entity as UserEntity, Role};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{auth_cookie, expired_auth_cookie, generate_token};
use crate::state::AppState;

pub fn auth_router() -> Router {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/admin/login", post(admin_login))
}

async fn register_user(
    Extension(state): Extension<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterUser>,
) -> ApiResult<Response> {
    payload.validate()?;

    let password = hash_password(&payload.password)
        .map_err(|err| ApiError::PasswordHashFailed(err.to_string()))?;
    let email = payload.email.trim().to_lowercase();

    let txn = state.db.begin().await?;

    let taken = UserEntity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(&txn)
        .await?
        .is_some();
    if taken {
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let new_user = user::ActiveModel {
        email: Set(email),
        password: Set(password),
        first_name: Set(payload.first_name),
        last_name: Set(payload.last_name),
        phone: Set(payload.phone),
        role: Set(Role::Customer),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let created = match new_user.insert(&txn).await {
        Ok(created) => created,
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(err) => return Err(err.into()),
    };
    txn.commit().await?;

    info!(user_id = created.id, "Registered new customer");

    let token = generate_token(
        created.id,
        created.role,
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;
    let jar = jar.add(auth_cookie(token.clone(), state.config.cookie_secure));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({
            "success": true,
            "token": token,
            "user": UserResponse::from(created),
        })),
    )
        .into_response())
}

async fn login(
    Extension(state): Extension<AppState>,
    jar: CookieJar,
    Json(payload): Json<UserLogin>,
) -> ApiResult<Response> {
    let user = authenticate(&state, &payload).await?;
    issue_session(&state, jar, user)
}

async fn admin_login(
    Extension(state): Extension<AppState>,
    jar: CookieJar,
    Json(payload): Json<UserLogin>,
) -> ApiResult<Response> {
    let user = authenticate(&state, &payload).await?;
    if user.role != Role::Admin {
        return Err(ApiError::Unauthorized);
    }
    issue_session(&state, jar, user)
}

async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(expired_auth_cookie()),
        Json(json!({
            "success": true,
            "message": "Logged out"
        })),
    )
}

/// Unknown email and wrong password look the same to the caller.
async fn authenticate(state: &AppState, payload: &UserLogin) -> ApiResult<user::Model> {
    let email = payload.email.trim().to_lowercase();

    let user = UserEntity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(&*state.db)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    user.check_hash(&payload.password)
        .map_err(|_| ApiError::Unauthorized)?;

    Ok(user)
}

fn issue_session(state: &AppState, jar: CookieJar, user: user::Model) -> ApiResult<Response> {
    let token = generate_token(
        user.id,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;
    let jar = jar.add(auth_cookie(token.clone(), state.config.cookie_secure));

    Ok((
        StatusCode::OK,
        jar,
        Json(json!({
            "success": true,
            "token": token,
            "user": UserResponse::from(user),
        })),
    )
        .into_response())
}

#[derive(Deserialize, Validate, Debug)]
struct RegisterUser {
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
    #[validate(length(max = 100))]
    first_name: Option<String>,
    #[validate(length(max = 100))]
    last_name: Option<String>,
    #[validate(length(max = 32))]
    phone: Option<String>,
}

#[derive(Deserialize, Debug)]
struct UserLogin {
    email: String,
    password: String,
}

#[derive(Serialize, Debug)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(value: user::Model) -> Self {
        Self {
            id: value.id,
            email: value.email,
            first_name: value.first_name,
            last_name: value.last_name,
            phone: value.phone,
            role: value.role,
            created_at: value.created_at,
        }
    }
}
