use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{NewResponse, Outcome, Prediction, Response, UserId, UserRef};
use crate::statistics::ScoredWager;

use super::prediction_repo::missing_or_stale;
use super::store::StoreError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResponseRow {
    pub id: Uuid,
    pub prediction_id: Uuid,
    pub user_id: String,
    pub comment: Option<String>,
    pub confidence: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<ResponseRow> for Response {
    fn from(row: ResponseRow) -> Self {
        Response {
            id: row.id,
            prediction_id: row.prediction_id,
            user: UserRef::new(row.user_id),
            comment: row.comment,
            confidence: row.confidence,
            created_at: row.created_at,
        }
    }
}

pub async fn insert_response(
    conn: &mut PgConnection,
    prediction_id: Uuid,
    user: &UserRef,
    comment: Option<String>,
    confidence: Option<i32>,
) -> Result<Response, sqlx::Error> {
    let row = sqlx::query_as::<_, ResponseRow>(
        r#"
        INSERT INTO responses (id, prediction_id, user_id, comment, confidence)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(prediction_id)
    .bind(user.id.as_str())
    .bind(comment)
    .bind(confidence)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

/// Insert a response and bump the prediction's lock version in one
/// transaction, guarded by the version the caller loaded.
pub async fn create_response(
    pool: &PgPool,
    prediction: &Prediction,
    new: NewResponse,
    user: &UserRef,
) -> Result<Response, StoreError> {
    let mut tx = pool.begin().await?;

    let bumped = sqlx::query(
        "UPDATE predictions SET lock_version = lock_version + 1, updated_at = NOW() \
         WHERE id = $1 AND lock_version = $2",
    )
    .bind(prediction.id)
    .bind(prediction.lock_version)
    .execute(&mut *tx)
    .await?;

    if bumped.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(missing_or_stale(pool, prediction.id).await);
    }

    let response = insert_response(
        &mut *tx,
        prediction.id,
        user,
        new.normalized_comment(),
        new.confidence,
    )
    .await?;

    tx.commit().await?;

    Ok(response)
}

/// Responses for the given predictions, grouped by prediction, oldest first.
pub async fn responses_for(
    pool: &PgPool,
    prediction_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Response>>, StoreError> {
    if prediction_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, ResponseRow>(
        "SELECT * FROM responses WHERE prediction_id = ANY($1) ORDER BY created_at ASC",
    )
    .bind(prediction_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<Response>> = HashMap::new();
    for row in rows {
        grouped.entry(row.prediction_id).or_default().push(row.into());
    }

    Ok(grouped)
}

pub async fn recent_responses(pool: &PgPool, limit: i64) -> Result<Vec<Response>, StoreError> {
    let rows = sqlx::query_as::<_, ResponseRow>(
        r#"
        SELECT r.* FROM responses r
        INNER JOIN predictions p ON p.id = r.prediction_id
        WHERE p.private = false
        ORDER BY r.created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Response::from).collect())
}

pub async fn scored_wagers(
    pool: &PgPool,
    user: Option<&UserId>,
) -> Result<Vec<ScoredWager>, StoreError> {
    let rows: Vec<(i32, String)> = sqlx::query_as(
        r#"
        SELECT r.confidence, p.outcome FROM responses r
        INNER JOIN predictions p ON p.id = r.prediction_id
        WHERE r.confidence IS NOT NULL
          AND p.withdrawn = false
          AND p.outcome IN ('right', 'wrong')
          AND ($1::TEXT IS NULL OR r.user_id = $1)
        "#,
    )
    .bind(user.map(UserId::as_str))
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(confidence, outcome)| -> Result<ScoredWager, StoreError> {
            let outcome = Outcome::parse(&outcome)
                .ok_or_else(|| anyhow::anyhow!("unknown outcome {outcome:?}"))?;
            Ok(ScoredWager { confidence, outcome })
        })
        .collect()
}
