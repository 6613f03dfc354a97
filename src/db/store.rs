use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    DeadlineNotification, NewPrediction, NewResponse, Prediction, PredictionFilter, Response,
    UserId, UserRef, ValidationErrors,
};
use crate::statistics::ScoredWager;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("prediction {0} was changed by another request")]
    Stale(Uuid),

    #[error("prediction {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.into())
    }
}

#[derive(Debug, Error)]
pub enum CreateError {
    /// The submission was already stored; carries the existing prediction id.
    #[error("prediction {0} was already created from this submission")]
    Duplicate(Uuid),

    #[error("invalid prediction: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for CreateError {
    fn from(e: sqlx::Error) -> Self {
        CreateError::Store(e.into())
    }
}

/// Persistence for predictions and their responses.
///
/// Updates are optimistic: a write succeeds only if the stored
/// `lock_version` still matches the snapshot being written.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Validate and insert, together with an enabled deadline notification
    /// for the creator. A reused `submission_id` yields
    /// `CreateError::Duplicate` with the id of the first prediction.
    async fn create_prediction(
        &self,
        new: NewPrediction,
        creator: &UserRef,
    ) -> Result<Prediction, CreateError>;

    /// Load a prediction with its responses, oldest first.
    async fn find_prediction(&self, id: Uuid) -> Result<Option<Prediction>, StoreError>;

    /// Persist the mutable fields of a snapshot and return the stored row.
    async fn update_prediction(&self, prediction: &Prediction) -> Result<Prediction, StoreError>;

    async fn list_predictions(
        &self,
        filter: PredictionFilter,
        limit: Option<i64>,
    ) -> Result<Vec<Prediction>, StoreError>;

    /// Append a response. Bumps the prediction's `lock_version`, so it
    /// fails with `Stale` if the prediction changed since it was loaded.
    async fn create_response(
        &self,
        prediction: &Prediction,
        new: NewResponse,
        user: &UserRef,
    ) -> Result<Response, StoreError>;

    /// Newest responses on public predictions.
    async fn recent_responses(&self, limit: i64) -> Result<Vec<Response>, StoreError>;

    /// Wagers on judged predictions, optionally for one user.
    async fn scored_wagers(&self, user: Option<&UserId>) -> Result<Vec<ScoredWager>, StoreError>;

    /// The user's own notification for a prediction, if they have one.
    async fn deadline_notification(
        &self,
        prediction_id: Uuid,
        user: &UserId,
    ) -> Result<Option<DeadlineNotification>, StoreError>;

    /// Create or update the user's notification for a prediction.
    async fn set_deadline_notification(
        &self,
        prediction_id: Uuid,
        user: &UserRef,
        enabled: bool,
    ) -> Result<DeadlineNotification, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
