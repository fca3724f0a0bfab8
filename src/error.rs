use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::{
    auth::services::AuthError,
    db::StoreError,
    expenses::services::ExpenseError,
};

/// Error returned by every handler. Clients only ever see the short message
/// of a variant, never the text of an underlying failure.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("internal server error")]
    Internal(#[source] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn internal(e: impl Into<anyhow::Error>) -> Self {
        Self::Internal(e.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref e) = self {
            error!(error = ?e, "internal error");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        Self::internal(e)
    }
}

impl From<ExpenseError> for AppError {
    fn from(e: ExpenseError) -> Self {
        match e {
            ExpenseError::InvalidId => Self::Validation("invalid expense id"),
            ExpenseError::InvalidAmount => Self::Validation("invalid amount"),
            ExpenseError::InvalidCategory => Self::Validation("invalid category"),
            ExpenseError::NotFound => Self::NotFound("expense not found"),
            ExpenseError::Store(e) => Self::internal(e),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidEmail => Self::Validation("invalid email"),
            AuthError::WeakPassword => Self::Validation("password must be at least 6 characters"),
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::DuplicateEmail => Self::Conflict("email already registered"),
            AuthError::UserNotFound => Self::Unauthorized,
            AuthError::Credential(e) => Self::internal(e),
            AuthError::Token(e) => Self::internal(e),
            AuthError::Store(e) => Self::internal(e),
        }
    }
}
