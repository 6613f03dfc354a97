use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{DeadlineNotification, UserId, UserRef};

use super::store::StoreError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub prediction_id: Uuid,
    pub user_id: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<NotificationRow> for DeadlineNotification {
    fn from(row: NotificationRow) -> Self {
        DeadlineNotification {
            id: row.id,
            prediction_id: row.prediction_id,
            user: UserRef::new(row.user_id),
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Upsert on (prediction, user). Runs on any connection so prediction
/// creation can include it in its transaction.
pub async fn upsert_notification(
    conn: &mut PgConnection,
    prediction_id: Uuid,
    user: &UserRef,
    enabled: bool,
) -> Result<DeadlineNotification, sqlx::Error> {
    let row = sqlx::query_as::<_, NotificationRow>(
        r#"
        INSERT INTO deadline_notifications (id, prediction_id, user_id, enabled)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (prediction_id, user_id)
        DO UPDATE SET enabled = EXCLUDED.enabled, updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(prediction_id)
    .bind(user.id.as_str())
    .bind(enabled)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

pub async fn find_notification(
    pool: &PgPool,
    prediction_id: Uuid,
    user: &UserId,
) -> Result<Option<DeadlineNotification>, StoreError> {
    let row = sqlx::query_as::<_, NotificationRow>(
        "SELECT * FROM deadline_notifications WHERE prediction_id = $1 AND user_id = $2",
    )
    .bind(prediction_id)
    .bind(user.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

pub async fn set_notification(
    pool: &PgPool,
    prediction_id: Uuid,
    user: &UserRef,
    enabled: bool,
) -> Result<DeadlineNotification, StoreError> {
    let mut conn = pool.acquire().await?;

    match upsert_notification(&mut *conn, prediction_id, user, enabled).await {
        Ok(notification) => Ok(notification),
        Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
            Err(StoreError::NotFound(prediction_id))
        }
        Err(e) => Err(e.into()),
    }
}
