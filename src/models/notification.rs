use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserRef;

/// One user's request to be reminded when a prediction falls due.
/// At most one per user and prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineNotification {
    pub id: Uuid,
    pub prediction_id: Uuid,
    pub user: UserRef,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of a notification toggle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationToggle {
    pub enabled: bool,
}
