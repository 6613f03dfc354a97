pub mod health;
pub mod listings;
pub mod metrics;
pub mod predictions;
pub mod statistics;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::Prediction;
use crate::AppState;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

pub fn prediction_path(id: Uuid) -> String {
    format!("/predictions/{id}")
}

/// 302 Found to `location`.
pub fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

pub(crate) async fn load_prediction(state: &AppState, id: Uuid) -> Result<Prediction, AppError> {
    state
        .store
        .find_prediction(id)
        .await?
        .ok_or_else(|| AppError::prediction_not_found(id))
}
