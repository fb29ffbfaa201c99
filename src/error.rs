use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::users::repo::StoreError;

/// Field name → human-readable messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Every failure a request can end in.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    ValidationFailed(FieldErrors),
    #[error("email already in use")]
    Conflict,
    #[error("authentication required")]
    Unauthenticated,
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("admin access required")]
    Forbidden,
    #[error("user not found")]
    NotFound,
    #[error("cannot delete yourself")]
    SelfDeletion,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

impl AppError {
    /// Single-field validation failure.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.into(), vec![message.into()]);
        AppError::ValidationFailed(fields)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationFailed(_) | AppError::Conflict | AppError::SelfDeletion => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthenticated | AppError::InvalidToken | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AppError::ValidationFailed(_) => "Validation failed",
            AppError::Conflict => "Email already in use",
            AppError::Unauthenticated => "Authentication required",
            AppError::InvalidToken => "Invalid token",
            AppError::InvalidCredentials => "Invalid email or password",
            AppError::Forbidden => "Admin access required",
            AppError::NotFound => "User not found",
            AppError::SelfDeletion => "Cannot delete yourself",
            AppError::Internal(_) => "Internal server error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Internal(cause) = &self {
            error!(error = %cause, "request failed");
        }
        let body = ErrorBody {
            error: self.message(),
            fields: match self {
                AppError::ValidationFailed(fields) => Some(fields),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AppError::Conflict,
            StoreError::Database(e) => AppError::Internal(anyhow::Error::new(e).context("user store")),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| match &e.message {
                        Some(msg) => msg.to_string(),
                        None => format!("invalid {field} ({})", e.code),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        AppError::ValidationFailed(fields)
    }
}
