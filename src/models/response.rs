use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prediction::ValidationErrors;
use super::user::UserRef;

pub const MAX_COMMENT_LEN: usize = 1000;

/// A comment and/or wager on a prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    pub prediction_id: Uuid,
    pub user: UserRef,
    pub comment: Option<String>,
    /// Confidence (0-100) that the prediction comes true. Present on wagers.
    pub confidence: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Response {
    pub fn is_wager(&self) -> bool {
        self.confidence.is_some()
    }
}

/// Input for responding to a prediction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewResponse {
    pub comment: Option<String>,
    pub confidence: Option<i32>,
}

impl NewResponse {
    pub fn is_wager(&self) -> bool {
        self.confidence.is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let comment = self.comment.as_deref().map(str::trim).filter(|c| !c.is_empty());

        if comment.is_none() && self.confidence.is_none() {
            errors.add("a response needs a comment or a confidence");
        }
        if let Some(c) = comment {
            if c.chars().count() > MAX_COMMENT_LEN {
                errors.add(format!(
                    "comment is too long (maximum is {MAX_COMMENT_LEN} characters)"
                ));
            }
        }
        if let Some(c) = self.confidence {
            if !(0..=100).contains(&c) {
                errors.add("confidence must be between 0 and 100");
            }
        }
        errors.into_result()
    }

    /// Blank comments are stored as absent.
    pub fn normalized_comment(&self) -> Option<String> {
        self.comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }
}

/// Empty response form shown alongside a prediction, bound to whoever is
/// looking at it.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseDraft {
    pub prediction_id: Uuid,
    pub user: Option<UserRef>,
    pub comment: Option<String>,
    pub confidence: Option<i32>,
}

impl ResponseDraft {
    pub fn for_requester(prediction_id: Uuid, requester: Option<&UserRef>) -> Self {
        Self {
            prediction_id,
            user: requester.cloned(),
            comment: None,
            confidence: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_response_rejected() {
        assert!(NewResponse::default().validate().is_err());

        let blank = NewResponse {
            comment: Some("   ".into()),
            confidence: None,
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_comment_only_and_wager_only_accepted() {
        let comment = NewResponse {
            comment: Some("no way".into()),
            confidence: None,
        };
        assert!(comment.validate().is_ok());
        assert!(!comment.is_wager());

        let wager = NewResponse {
            comment: None,
            confidence: Some(80),
        };
        assert!(wager.validate().is_ok());
        assert!(wager.is_wager());
    }

    #[test]
    fn test_confidence_out_of_range() {
        let r = NewResponse {
            comment: None,
            confidence: Some(-1),
        };
        let errors = r.validate().unwrap_err();
        assert!(errors.to_string().contains("between 0 and 100"));
    }

    #[test]
    fn test_draft_carries_requester() {
        let id = Uuid::new_v4();
        let user = UserRef::new("carol");
        let draft = ResponseDraft::for_requester(id, Some(&user));
        assert_eq!(draft.user, Some(user));
        assert!(ResponseDraft::for_requester(id, None).user.is_none());
    }
}
