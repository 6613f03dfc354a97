use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    DeadlineNotification, NewPrediction, NewResponse, Prediction, PredictionFilter, Response,
    UserId, UserRef,
};
use crate::statistics::ScoredWager;

use super::store::{CreateError, PredictionStore, StoreError};
use super::{notification_repo, prediction_repo, response_repo};

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PredictionStore for PgStore {
    async fn create_prediction(
        &self,
        new: NewPrediction,
        creator: &UserRef,
    ) -> Result<Prediction, CreateError> {
        prediction_repo::create_prediction(&self.pool, new, creator).await
    }

    async fn find_prediction(&self, id: Uuid) -> Result<Option<Prediction>, StoreError> {
        prediction_repo::find_prediction(&self.pool, id).await
    }

    async fn update_prediction(&self, prediction: &Prediction) -> Result<Prediction, StoreError> {
        prediction_repo::update_prediction(&self.pool, prediction).await
    }

    async fn list_predictions(
        &self,
        filter: PredictionFilter,
        limit: Option<i64>,
    ) -> Result<Vec<Prediction>, StoreError> {
        prediction_repo::list_predictions(&self.pool, filter, limit).await
    }

    async fn create_response(
        &self,
        prediction: &Prediction,
        new: NewResponse,
        user: &UserRef,
    ) -> Result<Response, StoreError> {
        response_repo::create_response(&self.pool, prediction, new, user).await
    }

    async fn recent_responses(&self, limit: i64) -> Result<Vec<Response>, StoreError> {
        response_repo::recent_responses(&self.pool, limit).await
    }

    async fn scored_wagers(&self, user: Option<&UserId>) -> Result<Vec<ScoredWager>, StoreError> {
        response_repo::scored_wagers(&self.pool, user).await
    }

    async fn deadline_notification(
        &self,
        prediction_id: Uuid,
        user: &UserId,
    ) -> Result<Option<DeadlineNotification>, StoreError> {
        notification_repo::find_notification(&self.pool, prediction_id, user).await
    }

    async fn set_deadline_notification(
        &self,
        prediction_id: Uuid,
        user: &UserRef,
        enabled: bool,
    ) -> Result<DeadlineNotification, StoreError> {
        notification_repo::set_notification(&self.pool, prediction_id, user, enabled).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
