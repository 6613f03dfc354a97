use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewPrediction, Outcome, Prediction, PredictionFilter, Response, UserId, UserRef};

use super::{notification_repo, response_repo};
use super::store::{CreateError, StoreError};

/// Row shape of the `predictions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PredictionRow {
    pub id: Uuid,
    pub submission_id: Option<Uuid>,
    pub creator_id: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub private: bool,
    pub outcome: String,
    pub withdrawn: bool,
    pub judged_by: Option<String>,
    pub judged_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub lock_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PredictionRow {
    pub fn into_prediction(self, responses: Vec<Response>) -> anyhow::Result<Prediction> {
        let outcome = Outcome::parse(&self.outcome)
            .ok_or_else(|| anyhow::anyhow!("unknown outcome {:?} on {}", self.outcome, self.id))?;

        Ok(Prediction {
            id: self.id,
            submission_id: self.submission_id,
            creator: UserRef::new(self.creator_id),
            description: self.description,
            deadline: self.deadline,
            private: self.private,
            outcome,
            withdrawn: self.withdrawn,
            judged_by: self.judged_by.map(UserId::new),
            judged_at: self.judged_at,
            withdrawn_at: self.withdrawn_at,
            lock_version: self.lock_version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            responses,
        })
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

pub async fn create_prediction(
    pool: &PgPool,
    new: NewPrediction,
    creator: &UserRef,
) -> Result<Prediction, CreateError> {
    new.validate()?;

    if let Some(submission_id) = new.submission_id {
        if let Some(existing) = find_id_by_submission(pool, submission_id).await? {
            return Err(CreateError::Duplicate(existing));
        }
    }

    let deadline = new
        .deadline
        .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("validated draft lost its deadline")))?;

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query_as::<_, PredictionRow>(
        r#"
        INSERT INTO predictions (id, submission_id, creator_id, description, deadline, private)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.submission_id)
    .bind(creator.id.as_str())
    .bind(new.description.trim())
    .bind(deadline)
    .bind(new.private)
    .fetch_one(&mut *tx)
    .await;

    let row = match inserted {
        Ok(row) => row,
        // Lost a race with an identical submission.
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            tx.rollback().await?;
            let existing = match new.submission_id {
                Some(submission_id) => find_id_by_submission(pool, submission_id).await?,
                None => None,
            };
            return match existing {
                Some(id) => Err(CreateError::Duplicate(id)),
                None => Err(sqlx::Error::Database(db).into()),
            };
        }
        Err(e) => return Err(e.into()),
    };

    let mut responses = Vec::new();
    if let Some(confidence) = new.initial_confidence {
        let response = response_repo::insert_response(
            &mut *tx,
            row.id,
            creator,
            None,
            Some(confidence),
        )
        .await?;
        responses.push(response);
    }

    notification_repo::upsert_notification(&mut *tx, row.id, creator, true).await?;

    tx.commit().await?;

    Ok(row.into_prediction(responses).map_err(StoreError::from)?)
}

async fn find_id_by_submission(
    pool: &PgPool,
    submission_id: Uuid,
) -> Result<Option<Uuid>, StoreError> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM predictions WHERE submission_id = $1")
        .bind(submission_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.0))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

pub async fn find_prediction(pool: &PgPool, id: Uuid) -> Result<Option<Prediction>, StoreError> {
    let row = sqlx::query_as::<_, PredictionRow>("SELECT * FROM predictions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let responses = response_repo::responses_for(pool, &[row.id])
        .await?
        .remove(&row.id)
        .unwrap_or_default();

    Ok(Some(row.into_prediction(responses)?))
}

pub async fn list_predictions(
    pool: &PgPool,
    filter: PredictionFilter,
    limit: Option<i64>,
) -> Result<Vec<Prediction>, StoreError> {
    let sql = match filter {
        PredictionFilter::Recent => {
            "SELECT * FROM predictions WHERE private = false \
             ORDER BY created_at DESC LIMIT $1"
        }
        PredictionFilter::Unjudged => {
            "SELECT * FROM predictions WHERE private = false AND withdrawn = false \
             AND outcome = 'unset' AND deadline <= NOW() \
             ORDER BY deadline ASC LIMIT $1"
        }
        PredictionFilter::Judged => {
            "SELECT * FROM predictions WHERE private = false AND withdrawn = false \
             AND outcome <> 'unset' \
             ORDER BY judged_at DESC NULLS LAST LIMIT $1"
        }
        PredictionFilter::Future => {
            "SELECT * FROM predictions WHERE private = false AND withdrawn = false \
             AND outcome = 'unset' AND deadline > NOW() \
             ORDER BY deadline ASC LIMIT $1"
        }
    };

    let rows = sqlx::query_as::<_, PredictionRow>(sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut responses: HashMap<Uuid, Vec<Response>> = response_repo::responses_for(pool, &ids).await?;

    let mut predictions = Vec::with_capacity(rows.len());
    for row in rows {
        let rs = responses.remove(&row.id).unwrap_or_default();
        predictions.push(row.into_prediction(rs)?);
    }

    Ok(predictions)
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

pub async fn update_prediction(
    pool: &PgPool,
    prediction: &Prediction,
) -> Result<Prediction, StoreError> {
    let row = sqlx::query_as::<_, PredictionRow>(
        r#"
        UPDATE predictions
        SET description = $3,
            deadline = $4,
            private = $5,
            outcome = $6,
            withdrawn = $7,
            judged_by = $8,
            judged_at = $9,
            withdrawn_at = $10,
            lock_version = lock_version + 1,
            updated_at = NOW()
        WHERE id = $1 AND lock_version = $2
        RETURNING *
        "#,
    )
    .bind(prediction.id)
    .bind(prediction.lock_version)
    .bind(&prediction.description)
    .bind(prediction.deadline)
    .bind(prediction.private)
    .bind(prediction.outcome.as_str())
    .bind(prediction.withdrawn)
    .bind(prediction.judged_by.as_ref().map(UserId::as_str))
    .bind(prediction.judged_at)
    .bind(prediction.withdrawn_at)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(row.into_prediction(prediction.responses.clone())?),
        None => Err(missing_or_stale(pool, prediction.id).await),
    }
}

/// Distinguish a vanished row from a lost optimistic-lock race.
pub(super) async fn missing_or_stale(pool: &PgPool, id: Uuid) -> StoreError {
    let exists = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM predictions WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await;

    match exists {
        Ok((0,)) => StoreError::NotFound(id),
        Ok(_) => StoreError::Stale(id),
        Err(e) => e.into(),
    }
}
