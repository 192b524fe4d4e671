use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::middleware::auth::AuthError;
use crate::services::paypal::PayPalError;

/// Every handler failure ends up here. The rendered body is always
/// `{"success": false, "error": ...}` and the error itself rides along as a
/// response extension so the logging middleware can record the cause.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Failed to validate: {0}")]
    ValidationFail(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Payload too large")]
    PayloadTooLarge,
    #[error("Database error: {0}")]
    DbError(String),
    #[error("Failed to hash password {0}")]
    PasswordHashFailed(String),
    #[error("Failed to generate token: {0}")]
    TokenGenerationFailed(String),
    #[error("{0}")]
    General(String),
    #[error("{0} is not configured")]
    ServiceUnavailable(&'static str),
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::ValidationFail(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::DbError(_)
            | Self::PasswordHashFailed(_)
            | Self::TokenGenerationFailed(_)
            | Self::General(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Server-side failures never leak their details.
    fn public_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_owned(),
            StatusCode::BAD_GATEWAY => "Payment provider request failed".to_owned(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status(),
            Json(json!({
                "success": false,
                "error": self.public_message(),
            })),
        )
            .into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        Self::DbError(err.to_string())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        Self::ValidationFail(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::GenerationFail => Self::TokenGenerationFailed(err.to_string()),
            AuthError::InternalServerError(msg) => Self::DbError(msg),
            AuthError::Forbidden => Self::Forbidden,
            _ => Self::Unauthorized,
        }
    }
}

impl From<PayPalError> for ApiError {
    fn from(err: PayPalError) -> Self {
        match err {
            PayPalError::WebhookNotConfigured => Self::ServiceUnavailable("PayPal webhook"),
            _ => Self::Upstream(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
