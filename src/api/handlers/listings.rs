use axum::extract::State;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{NewPrediction, Prediction, PredictionFilter, Response};
use crate::statistics::Statistics;
use crate::AppState;

use super::statistics::cached_statistics;
use super::ApiResponse;

const HAPPENSTANCE_PREDICTIONS: i64 = 3;
const HAPPENSTANCE_RESPONSES: i64 = 6;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HomeView {
    pub prediction: NewPrediction,
    pub responses: Vec<Response>,
}

#[derive(Serialize)]
pub struct ListingView {
    pub title: &'static str,
    pub filter: &'static str,
    pub predictions: Vec<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

#[derive(Serialize)]
pub struct HappenstanceView {
    pub unjudged: Vec<Prediction>,
    pub judged: Vec<Prediction>,
    pub recent: Vec<Prediction>,
    pub responses: Vec<Response>,
}

/// Empty creation form. Each form gets its own submission id so a
/// resubmit can be recognised.
pub fn new_prediction_draft() -> NewPrediction {
    NewPrediction {
        submission_id: Some(Uuid::new_v4()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /: creation form plus the latest responses
pub async fn home(State(state): State<AppState>) -> Result<Json<ApiResponse<HomeView>>, AppError> {
    let responses = state
        .store
        .recent_responses(state.config.home_response_limit)
        .await?;

    Ok(Json(ApiResponse::ok(HomeView {
        prediction: new_prediction_draft(),
        responses,
    })))
}

/// GET /predictions: recent predictions with site-wide statistics
pub async fn index(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ListingView>>, AppError> {
    let filter = PredictionFilter::Recent;
    let predictions = state
        .store
        .list_predictions(filter, Some(state.config.index_limit))
        .await?;
    let statistics = cached_statistics(&state, None).await?;

    Ok(Json(ApiResponse::ok(ListingView {
        title: filter.title(),
        filter: filter.as_str(),
        predictions,
        statistics: Some(statistics),
    })))
}

async fn listing(state: &AppState, filter: PredictionFilter) -> Result<ListingView, AppError> {
    let predictions = state.store.list_predictions(filter, None).await?;
    Ok(ListingView {
        title: filter.title(),
        filter: filter.as_str(),
        predictions,
        statistics: None,
    })
}

/// GET /predictions/unjudged
pub async fn unjudged(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ListingView>>, AppError> {
    Ok(Json(ApiResponse::ok(listing(&state, PredictionFilter::Unjudged).await?)))
}

/// GET /predictions/judged
pub async fn judged(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ListingView>>, AppError> {
    Ok(Json(ApiResponse::ok(listing(&state, PredictionFilter::Judged).await?)))
}

/// GET /predictions/future
pub async fn future(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ListingView>>, AppError> {
    Ok(Json(ApiResponse::ok(listing(&state, PredictionFilter::Future).await?)))
}

/// GET /predictions/happenstance: a little of everything
pub async fn happenstance(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<HappenstanceView>>, AppError> {
    let limit = Some(HAPPENSTANCE_PREDICTIONS);
    let unjudged = state.store.list_predictions(PredictionFilter::Unjudged, limit).await?;
    let judged = state.store.list_predictions(PredictionFilter::Judged, limit).await?;
    let recent = state.store.list_predictions(PredictionFilter::Recent, limit).await?;
    let responses = state.store.recent_responses(HAPPENSTANCE_RESPONSES).await?;

    Ok(Json(ApiResponse::ok(HappenstanceView {
        unjudged,
        judged,
        recent,
        responses,
    })))
}
