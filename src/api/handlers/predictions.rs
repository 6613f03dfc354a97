use axum::extract::{Path, State};
use axum::http::Uri;
use axum::response::Response;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::auth::Requester;
use crate::api::extract::Submitted;
use crate::cache;
use crate::db::CreateError;
use crate::errors::AppError;
use crate::models::{
    timeline, DeadlineNotification, NewPrediction, NewResponse, NotificationToggle, Outcome,
    Prediction, PredictionEvent, PredictionStatus, PredictionUpdate, ResponseDraft,
};
use crate::policy::PredictionAccessPolicy;
use crate::AppState;

use super::listings::new_prediction_draft;
use super::{found, load_prediction, prediction_path, ApiResponse};

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct JudgeRequest {
    /// `right`, `wrong`, `unknown`, or empty for unknown.
    #[serde(default)]
    pub outcome: String,
}

#[derive(Serialize)]
pub struct NewFormView {
    pub prediction: NewPrediction,
}

#[derive(Serialize)]
pub struct ShowView {
    pub prediction: Prediction,
    pub status: PredictionStatus,
    pub events: Vec<PredictionEvent>,
    pub prediction_response: ResponseDraft,
    /// The requester's own deadline notification, if any.
    pub deadline_notification: Option<DeadlineNotification>,
}

const NOT_CREATOR: &str = "only the creator of this prediction may do that";

// ---------------------------------------------------------------------------
// Creating
// ---------------------------------------------------------------------------

/// GET /predictions/new
pub async fn new_form(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    uri: Uri,
) -> Result<Json<ApiResponse<NewFormView>>, AppError> {
    requester.require(&uri, &state.config.login_path)?;

    Ok(Json(ApiResponse::ok(NewFormView {
        prediction: new_prediction_draft(),
    })))
}

/// POST /predictions: the requester becomes the creator
pub async fn create(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    uri: Uri,
    body: Result<Submitted<NewPrediction>, AppError>,
) -> Result<Response, AppError> {
    let creator = requester.require(&uri, &state.config.login_path)?;
    let Submitted(draft) = body?;

    match state.store.create_prediction(draft.clone(), creator).await {
        Ok(prediction) => {
            metrics::counter!("predictions_created_total").increment(1);
            tracing::info!(
                prediction_id = %prediction.id,
                creator = %creator.id,
                private = prediction.private,
                "Prediction created"
            );
            Ok(found(prediction_path(prediction.id)))
        }
        Err(CreateError::Duplicate(existing)) => {
            tracing::info!(prediction_id = %existing, "Duplicate submission, redirecting to original");
            Ok(found(prediction_path(existing)))
        }
        Err(CreateError::Invalid(errors)) => Err(AppError::invalid(&draft, errors)),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Viewing
// ---------------------------------------------------------------------------

/// GET /predictions/{id}
pub async fn show(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ShowView>>, AppError> {
    let prediction = load_prediction(&state, id).await?;

    // Private predictions are refused outright, signed in or not.
    if !PredictionAccessPolicy::can_view(&prediction, requester.user()) {
        return Err(AppError::Forbidden("this prediction is private".into()));
    }

    let deadline_notification = match requester.user() {
        Some(user) => state.store.deadline_notification(id, &user.id).await?,
        None => None,
    };

    Ok(Json(ApiResponse::ok(ShowView {
        status: prediction.status(),
        events: timeline(&prediction),
        prediction_response: ResponseDraft::for_requester(prediction.id, requester.user()),
        deadline_notification,
        prediction,
    })))
}

/// POST /predictions/{id}/responses: comment and/or wager
pub async fn respond(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    uri: Uri,
    Path(id): Path<Uuid>,
    body: Result<Submitted<NewResponse>, AppError>,
) -> Result<Response, AppError> {
    let user = requester.require(&uri, &state.config.login_path)?;
    let Submitted(body) = body?;
    let prediction = load_prediction(&state, id).await?;

    if !PredictionAccessPolicy::can_respond(&prediction, Some(user)) {
        return Err(AppError::Forbidden("this prediction is private".into()));
    }
    if let Err(errors) = body.validate() {
        return Err(AppError::invalid(&body, errors));
    }
    if body.is_wager() && !PredictionAccessPolicy::accepts_wagers(&prediction) {
        return Err(AppError::Conflict(format!(
            "prediction is {} and no longer accepts wagers",
            prediction.status()
        )));
    }

    let response = state.store.create_response(&prediction, body, user).await?;
    metrics::counter!("responses_created_total").increment(1);
    tracing::info!(
        prediction_id = %id,
        user = %user.id,
        wager = response.is_wager(),
        "Response recorded"
    );

    Ok(found(prediction_path(id)))
}

// ---------------------------------------------------------------------------
// Judging and withdrawing
// ---------------------------------------------------------------------------

/// POST /predictions/{id}/judge
pub async fn judge(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    uri: Uri,
    Path(id): Path<Uuid>,
    body: Result<Submitted<JudgeRequest>, AppError>,
) -> Result<Response, AppError> {
    let user = requester.require(&uri, &state.config.login_path)?;
    let mut prediction = load_prediction(&state, id).await?;

    if !PredictionAccessPolicy::can_judge(&prediction, Some(user)) {
        return Err(AppError::Forbidden(NOT_CREATOR.into()));
    }

    let Submitted(body) = body?;
    let outcome = Outcome::from_param(&body.outcome)
        .ok_or_else(|| AppError::BadRequest(format!("unknown outcome {:?}", body.outcome)))?;

    let judgment = PredictionAccessPolicy::apply_judgment(&mut prediction, outcome, Some(user))?;
    state.store.update_prediction(&prediction).await?;

    let keys = judgment.fragment_keys();
    let expired = cache::expire_all(state.cache.as_ref(), &keys);

    metrics::counter!("predictions_judged_total").increment(1);
    metrics::counter!("fragments_expired_total").increment(expired as u64);
    tracing::info!(
        prediction_id = %id,
        outcome = %outcome,
        invalidated = keys.len(),
        expired,
        "Prediction judged"
    );

    Ok(found(prediction_path(id)))
}

/// POST /predictions/{id}/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    uri: Uri,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let user = requester.require(&uri, &state.config.login_path)?;
    let mut prediction = load_prediction(&state, id).await?;

    if !PredictionAccessPolicy::can_edit(&prediction, Some(user)) {
        return Err(AppError::Forbidden(NOT_CREATOR.into()));
    }
    if !PredictionAccessPolicy::apply_withdrawal(&mut prediction, Some(user)) {
        return Err(AppError::Conflict(format!(
            "prediction is already {}",
            prediction.status()
        )));
    }

    state.store.update_prediction(&prediction).await?;

    metrics::counter!("predictions_withdrawn_total").increment(1);
    tracing::info!(prediction_id = %id, "Prediction withdrawn");

    Ok(found(prediction_path(id)))
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

/// GET /predictions/{id}/edit
pub async fn edit(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    uri: Uri,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Prediction>>, AppError> {
    let user = requester.require(&uri, &state.config.login_path)?;
    let prediction = load_prediction(&state, id).await?;

    if !PredictionAccessPolicy::can_edit(&prediction, Some(user)) {
        return Err(AppError::Forbidden(NOT_CREATOR.into()));
    }

    Ok(Json(ApiResponse::ok(prediction)))
}

/// PUT /predictions/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    uri: Uri,
    Path(id): Path<Uuid>,
    body: Result<Submitted<PredictionUpdate>, AppError>,
) -> Result<Response, AppError> {
    let user = requester.require(&uri, &state.config.login_path)?;
    let mut prediction = load_prediction(&state, id).await?;

    if !PredictionAccessPolicy::can_edit(&prediction, Some(user)) {
        return Err(AppError::Forbidden(NOT_CREATOR.into()));
    }

    let Submitted(changes) = body?;
    if let Err(errors) = changes.validate() {
        return Err(AppError::invalid(&changes, errors));
    }
    if changes.is_empty() {
        return Ok(found(prediction_path(id)));
    }

    prediction.apply_update(&changes);
    state.store.update_prediction(&prediction).await?;
    tracing::info!(prediction_id = %id, "Prediction updated");

    Ok(found(prediction_path(id)))
}

// ---------------------------------------------------------------------------
// Deadline notifications
// ---------------------------------------------------------------------------

/// PUT /predictions/{id}/deadline_notification: the requester's own reminder
pub async fn deadline_notification(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    uri: Uri,
    Path(id): Path<Uuid>,
    body: Result<Submitted<NotificationToggle>, AppError>,
) -> Result<Response, AppError> {
    let user = requester.require(&uri, &state.config.login_path)?;
    let prediction = load_prediction(&state, id).await?;

    if !PredictionAccessPolicy::can_respond(&prediction, Some(user)) {
        return Err(AppError::Forbidden("this prediction is private".into()));
    }

    let Submitted(toggle) = body?;
    let notification = state
        .store
        .set_deadline_notification(id, user, toggle.enabled)
        .await?;
    tracing::info!(
        prediction_id = %id,
        user = %user.id,
        enabled = notification.enabled,
        "Deadline notification set"
    );

    Ok(found(prediction_path(id)))
}
