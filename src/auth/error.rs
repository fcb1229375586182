//! Error taxonomy shared by the guard, the account flows, and scoped handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::{Constraint, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("insufficient role for this operation")]
    Forbidden,

    /// Same error for unknown identities and wrong passwords.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid site code")]
    InvalidJoinCode,

    #[error("an account with this email already exists")]
    AlreadyExists,

    #[error("this unit has no free resident slots")]
    UnitTaken,

    #[error("{0}")]
    ValidationFailed(String),

    #[error("not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage failure: {0}")]
    Store(#[source] StoreError),
}

impl AuthError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    /// Stable machine-readable code returned in error bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidJoinCode => "invalid_join_code",
            Self::AlreadyExists => "already_exists",
            Self::UnitTaken => "unit_taken",
            Self::ValidationFailed(_) => "validation_failed",
            Self::NotFound => "not_found",
            Self::Internal(_) | Self::Store(_) => "internal",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidJoinCode | Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists | Self::UnitTaken => StatusCode::CONFLICT,
            Self::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(
                Constraint::UserEmail | Constraint::Ballot | Constraint::DuePeriod,
            ) => Self::AlreadyExists,
            StoreError::Conflict(Constraint::UnitCapacity) => Self::UnitTaken,
            other => Self::Store(other),
        }
    }
}

impl IntoResponse for AuthError {
    /// Server-side failures are logged and surfaced as `500` without details.
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(_) | Self::Store(_) => {
                error!("Request failed: {self}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (
            status,
            Json(json!({
                "error": self.code(),
                "message": message,
            })),
        )
            .into_response()
    }
}
