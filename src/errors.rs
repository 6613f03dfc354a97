use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{CreateError, StoreError};
use crate::models::ValidationErrors;
use crate::policy::PolicyViolation;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No requester. Answered with a redirect to `login_url`, which carries
    /// the original path as `return_to`.
    #[error("Unauthenticated")]
    Unauthenticated { login_url: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {errors}")]
    ValidationFailed {
        draft: serde_json::Value,
        errors: ValidationErrors,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn prediction_not_found(id: Uuid) -> Self {
        AppError::NotFound(format!("prediction {id} not found"))
    }

    /// 422 that hands the submitted draft back so the form can be re-shown.
    pub fn invalid<T: Serialize>(draft: &T, errors: ValidationErrors) -> Self {
        AppError::ValidationFailed {
            draft: serde_json::to_value(draft).unwrap_or(serde_json::Value::Null),
            errors,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

#[derive(Serialize)]
struct ValidationBody<'a> {
    success: bool,
    error: String,
    prediction: &'a serde_json::Value,
    errors: &'a ValidationErrors,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthenticated { login_url } => {
                return (StatusCode::FOUND, [(header::LOCATION, login_url.clone())]).into_response();
            }
            AppError::ValidationFailed { draft, errors } => {
                let body = ValidationBody {
                    success: false,
                    error: errors.to_string(),
                    prediction: draft,
                    errors,
                };
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
            }
            AppError::Forbidden(msg) => {
                metrics::counter!("access_denied_total").increment(1);
                (StatusCode::FORBIDDEN, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

impl From<PolicyViolation> for AppError {
    fn from(v: PolicyViolation) -> Self {
        match v {
            // Handlers resolve the login redirect before consulting the policy.
            PolicyViolation::Unauthenticated => AppError::Forbidden(v.to_string()),
            PolicyViolation::NotCreator => AppError::Forbidden(v.to_string()),
            PolicyViolation::AlreadyJudged(_) | PolicyViolation::AlreadyWithdrawn => {
                AppError::Conflict(v.to_string())
            }
            PolicyViolation::OutcomeUnset => AppError::BadRequest(v.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Stale(_) => AppError::Conflict(e.to_string()),
            StoreError::NotFound(id) => AppError::prediction_not_found(id),
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

impl From<CreateError> for AppError {
    fn from(e: CreateError) -> Self {
        match e {
            CreateError::Store(e) => e.into(),
            CreateError::Invalid(errors) => AppError::ValidationFailed {
                draft: serde_json::Value::Null,
                errors,
            },
            CreateError::Duplicate(_) => AppError::Conflict(e.to_string()),
        }
    }
}
