use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    DeadlineNotification, NewPrediction, NewResponse, Prediction, PredictionFilter, Response,
    UserId, UserRef,
};
use crate::statistics::ScoredWager;

use super::store::{CreateError, PredictionStore, StoreError};

#[derive(Default)]
struct State {
    predictions: HashMap<Uuid, Prediction>,
    /// Prediction ids in insertion order.
    order: Vec<Uuid>,
    /// (prediction id, index into its responses) in insertion order.
    response_log: Vec<(Uuid, usize)>,
    submissions: HashMap<Uuid, Uuid>,
    notifications: HashMap<(Uuid, UserId), DeadlineNotification>,
}

/// In-process store used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PredictionStore for MemoryStore {
    async fn create_prediction(
        &self,
        new: NewPrediction,
        creator: &UserRef,
    ) -> Result<Prediction, CreateError> {
        new.validate()?;

        let mut state = self.state.write().await;

        if let Some(submission_id) = new.submission_id {
            if let Some(existing) = state.submissions.get(&submission_id) {
                return Err(CreateError::Duplicate(*existing));
            }
        }

        let deadline = new.deadline.ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!("validated draft lost its deadline"))
        })?;
        let now = Utc::now();
        let id = Uuid::new_v4();

        let mut prediction = Prediction {
            id,
            submission_id: new.submission_id,
            creator: creator.clone(),
            description: new.description.trim().to_string(),
            deadline,
            private: new.private,
            outcome: Default::default(),
            withdrawn: false,
            judged_by: None,
            judged_at: None,
            withdrawn_at: None,
            lock_version: 0,
            created_at: now,
            updated_at: now,
            responses: vec![],
        };

        if let Some(confidence) = new.initial_confidence {
            prediction.responses.push(Response {
                id: Uuid::new_v4(),
                prediction_id: id,
                user: creator.clone(),
                comment: None,
                confidence: Some(confidence),
                created_at: now,
            });
            state.response_log.push((id, 0));
        }

        if let Some(submission_id) = new.submission_id {
            state.submissions.insert(submission_id, id);
        }
        state.notifications.insert(
            (id, creator.id.clone()),
            DeadlineNotification {
                id: Uuid::new_v4(),
                prediction_id: id,
                user: creator.clone(),
                enabled: true,
                created_at: now,
                updated_at: now,
            },
        );
        state.order.push(id);
        state.predictions.insert(id, prediction.clone());

        Ok(prediction)
    }

    async fn find_prediction(&self, id: Uuid) -> Result<Option<Prediction>, StoreError> {
        Ok(self.state.read().await.predictions.get(&id).cloned())
    }

    async fn update_prediction(&self, prediction: &Prediction) -> Result<Prediction, StoreError> {
        let mut state = self.state.write().await;
        let stored = state
            .predictions
            .get_mut(&prediction.id)
            .ok_or(StoreError::NotFound(prediction.id))?;

        if stored.lock_version != prediction.lock_version {
            return Err(StoreError::Stale(prediction.id));
        }

        // Responses are append-only and owned by the store.
        let responses = std::mem::take(&mut stored.responses);
        *stored = Prediction {
            responses,
            lock_version: prediction.lock_version + 1,
            updated_at: Utc::now(),
            ..prediction.clone()
        };

        Ok(stored.clone())
    }

    async fn list_predictions(
        &self,
        filter: PredictionFilter,
        limit: Option<i64>,
    ) -> Result<Vec<Prediction>, StoreError> {
        let state = self.state.read().await;
        let now = Utc::now();

        // Newest first; stable sorts below keep that as the tie-breaker.
        let mut matching: Vec<&Prediction> = state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.predictions.get(id))
            .filter(|p| filter.matches(p, now))
            .collect();

        match filter {
            PredictionFilter::Recent => {}
            PredictionFilter::Unjudged | PredictionFilter::Future => {
                matching.sort_by_key(|p| p.deadline);
            }
            PredictionFilter::Judged => {
                matching.sort_by(|a, b| b.judged_at.cmp(&a.judged_at));
            }
        }

        let limit = limit.map_or(usize::MAX, |l| l.max(0) as usize);
        Ok(matching.into_iter().take(limit).cloned().collect())
    }

    async fn create_response(
        &self,
        prediction: &Prediction,
        new: NewResponse,
        user: &UserRef,
    ) -> Result<Response, StoreError> {
        let mut state = self.state.write().await;
        let stored = state
            .predictions
            .get_mut(&prediction.id)
            .ok_or(StoreError::NotFound(prediction.id))?;

        if stored.lock_version != prediction.lock_version {
            return Err(StoreError::Stale(prediction.id));
        }

        let response = Response {
            id: Uuid::new_v4(),
            prediction_id: prediction.id,
            user: user.clone(),
            comment: new.normalized_comment(),
            confidence: new.confidence,
            created_at: Utc::now(),
        };
        stored.responses.push(response.clone());
        stored.lock_version += 1;
        stored.updated_at = response.created_at;

        let index = stored.responses.len() - 1;
        state.response_log.push((prediction.id, index));

        Ok(response)
    }

    async fn recent_responses(&self, limit: i64) -> Result<Vec<Response>, StoreError> {
        let state = self.state.read().await;

        Ok(state
            .response_log
            .iter()
            .rev()
            .filter_map(|(pid, idx)| {
                let p = state.predictions.get(pid)?;
                if p.private {
                    return None;
                }
                p.responses.get(*idx)
            })
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn scored_wagers(&self, user: Option<&UserId>) -> Result<Vec<ScoredWager>, StoreError> {
        let state = self.state.read().await;

        Ok(state
            .predictions
            .values()
            .filter(|p| !p.withdrawn && p.outcome.is_set())
            .flat_map(|p| {
                p.wagers()
                    .filter(move |w| user.map_or(true, |u| w.user.id == *u))
                    .filter_map(move |w| {
                        w.confidence.map(|confidence| ScoredWager {
                            confidence,
                            outcome: p.outcome,
                        })
                    })
            })
            .filter(|w| w.is_correct().is_some())
            .collect())
    }

    async fn deadline_notification(
        &self,
        prediction_id: Uuid,
        user: &UserId,
    ) -> Result<Option<DeadlineNotification>, StoreError> {
        let state = self.state.read().await;
        Ok(state.notifications.get(&(prediction_id, user.clone())).cloned())
    }

    async fn set_deadline_notification(
        &self,
        prediction_id: Uuid,
        user: &UserRef,
        enabled: bool,
    ) -> Result<DeadlineNotification, StoreError> {
        let mut state = self.state.write().await;
        if !state.predictions.contains_key(&prediction_id) {
            return Err(StoreError::NotFound(prediction_id));
        }

        let now = Utc::now();
        let notification = state
            .notifications
            .entry((prediction_id, user.id.clone()))
            .or_insert_with(|| DeadlineNotification {
                id: Uuid::new_v4(),
                prediction_id,
                user: user.clone(),
                enabled,
                created_at: now,
                updated_at: now,
            });
        notification.enabled = enabled;
        notification.updated_at = now;

        Ok(notification.clone())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
