use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::entities::user::{Entity as UserEntity, Role};
use crate::error::ApiError;
use crate::state::AppState;

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn role(&self) -> Option<Role> {
        Role::from_str(&self.role).ok()
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub app: AppState,
    pub role: Role,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,
    #[error("Invalid user id or role")]
    InvalidUserOrRole,
    #[error("Token expired or malformed")]
    InvalidToken,
    #[error("Insufficient role")]
    Forbidden,
    #[error("Failed to generate token")]
    GenerationFail,
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

/// Rejects the request unless it carries a valid token whose user holds `state.role`.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_token(req.headers()) else {
        return ApiError::from(AuthError::MissingToken).into_response();
    };

    match validate_token(&state.app.db, &state.app.config.jwt_secret, &token, state.role).await {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(err) => {
            debug!(error = %err, "Rejected token");
            ApiError::from(err).into_response()
        }
    }
}

/// Attaches `Claims` when a valid token is present and lets anonymous requests through.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(req.headers()) {
        match validate_token(&state.db, &state.config.jwt_secret, &token, Role::Customer).await {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
            }
            Err(err) => debug!(error = %err, "Ignoring invalid token on public route"),
        }
    }
    next.run(req).await
}

/// Bearer header wins over the cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match bearer {
        Some(token) => Some(token.to_owned()),
        None => CookieJar::from_headers(headers)
            .get(AUTH_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .filter(|token| !token.is_empty()),
    }
}

pub fn generate_token(
    user_id: i32,
    role: Role,
    secret: &str,
    expiration_hours: i64,
) -> Result<String, AuthError> {
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(expiration_hours))
        .ok_or(AuthError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims {
        user_id,
        role: role.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::GenerationFail)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidToken)
}

/// Decodes the token and re-checks the user against the database: the account must still
/// exist with the role the token was issued for, and that role must grant `required`.
pub async fn validate_token(
    db: &DatabaseConnection,
    secret: &str,
    token: &str,
    required: Role,
) -> Result<Claims, AuthError> {
    let claims = decode_token(secret, token)?;
    let claimed = claims.role().ok_or(AuthError::InvalidUserOrRole)?;

    let user = UserEntity::find_by_id(claims.user_id)
        .one(db)
        .await
        .map_err(|err| AuthError::InternalServerError(err.to_string()))?
        .ok_or(AuthError::InvalidUserOrRole)?;

    if user.role != claimed {
        return Err(AuthError::InvalidUserOrRole);
    }
    if !claimed.grants(required) {
        return Err(AuthError::Forbidden);
    }

    Ok(claims)
}

pub fn auth_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

pub fn expired_auth_cookie() -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, "")).path("/").build()
}
