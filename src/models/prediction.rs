use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::response::Response;
use super::user::{UserId, UserRef};

pub const MAX_DESCRIPTION_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Judged outcome of a prediction. `Unset` until the creator judges it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Unset,
    Right,
    Wrong,
    Unknown,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Unset => "unset",
            Outcome::Right => "right",
            Outcome::Wrong => "wrong",
            Outcome::Unknown => "unknown",
        }
    }

    /// Parse the stored column value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unset" => Some(Outcome::Unset),
            "right" => Some(Outcome::Right),
            "wrong" => Some(Outcome::Wrong),
            "unknown" => Some(Outcome::Unknown),
            _ => None,
        }
    }

    /// Parse the outcome submitted by a judging request. An empty value
    /// means the creator could not tell. `Unset` is never a valid judgment.
    pub fn from_param(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "right" | "true" => Some(Outcome::Right),
            "wrong" | "false" => Some(Outcome::Wrong),
            "" | "unknown" => Some(Outcome::Unknown),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Outcome::Unset)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PredictionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state, derived from `outcome` and `withdrawn`.
/// `Judged` and `Withdrawn` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Open,
    Judged,
    Withdrawn,
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionStatus::Open => f.write_str("open"),
            PredictionStatus::Judged => f.write_str("judged"),
            PredictionStatus::Withdrawn => f.write_str("withdrawn"),
        }
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Uuid,
    pub submission_id: Option<Uuid>,
    pub creator: UserRef,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub private: bool,
    pub outcome: Outcome,
    pub withdrawn: bool,
    pub judged_by: Option<UserId>,
    pub judged_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub lock_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Comments and wagers, oldest first.
    pub responses: Vec<Response>,
}

impl Prediction {
    pub fn status(&self) -> PredictionStatus {
        if self.withdrawn {
            PredictionStatus::Withdrawn
        } else if self.outcome.is_set() {
            PredictionStatus::Judged
        } else {
            PredictionStatus::Open
        }
    }

    pub fn is_open(&self) -> bool {
        self.status() == PredictionStatus::Open
    }

    /// Responses that carry a confidence.
    pub fn wagers(&self) -> impl Iterator<Item = &Response> {
        self.responses.iter().filter(|r| r.is_wager())
    }

    pub fn is_creator(&self, user: &UserRef) -> bool {
        self.creator == *user
    }

    /// Apply an already-validated edit.
    pub fn apply_update(&mut self, update: &PredictionUpdate) {
        if let Some(description) = &update.description {
            self.description = description.trim().to_string();
        }
        if let Some(deadline) = update.deadline {
            self.deadline = deadline;
        }
        if let Some(private) = update.private {
            self.private = private;
        }
    }
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// Input for creating a prediction. Also serves as the empty form draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewPrediction {
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
    pub private: bool,
    /// Client-generated id of the form submission, used to detect resubmits.
    pub submission_id: Option<Uuid>,
    /// The creator's own confidence, recorded as their first wager.
    pub initial_confidence: Option<i32>,
}

impl NewPrediction {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_description(&self.description, &mut errors);
        if self.deadline.is_none() {
            errors.add("deadline must be given");
        }
        if let Some(c) = self.initial_confidence {
            if !(0..=100).contains(&c) {
                errors.add("initial confidence must be between 0 and 100");
            }
        }
        errors.into_result()
    }
}

/// Creator edits. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionUpdate {
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub private: Option<bool>,
}

impl PredictionUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.deadline.is_none() && self.private.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(description) = &self.description {
            check_description(description, &mut errors);
        }
        errors.into_result()
    }
}

fn check_description(description: &str, errors: &mut ValidationErrors) {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        errors.add("description can't be blank");
    } else if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        errors.add(format!(
            "description is too long (maximum is {MAX_DESCRIPTION_LEN} characters)"
        ));
    }
}

/// Field-level validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn add(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

// ---------------------------------------------------------------------------
// PredictionFilter
// ---------------------------------------------------------------------------

/// Named listings. None of them include private predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionFilter {
    /// Newest first.
    Recent,
    /// Open with the deadline passed, oldest deadline first.
    Unjudged,
    /// Judged, most recently judged first.
    Judged,
    /// Open with the deadline ahead, soonest first.
    Future,
}

impl PredictionFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionFilter::Recent => "recent",
            PredictionFilter::Unjudged => "unjudged",
            PredictionFilter::Judged => "judged",
            PredictionFilter::Future => "future",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            PredictionFilter::Recent => "Recent Predictions",
            PredictionFilter::Unjudged => "Unjudged Predictions",
            PredictionFilter::Judged => "Judged Predictions",
            PredictionFilter::Future => "Upcoming Predictions",
        }
    }

    pub fn matches(&self, p: &Prediction, now: DateTime<Utc>) -> bool {
        if p.private {
            return false;
        }
        match self {
            PredictionFilter::Recent => true,
            PredictionFilter::Unjudged => p.is_open() && p.deadline <= now,
            PredictionFilter::Judged => p.status() == PredictionStatus::Judged,
            PredictionFilter::Future => p.is_open() && p.deadline > now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn open_prediction(creator: &str) -> Prediction {
        let now = Utc::now();
        Prediction {
            id: Uuid::new_v4(),
            submission_id: None,
            creator: UserRef::new(creator),
            description: "the sun will rise".into(),
            deadline: now + Duration::days(1),
            private: false,
            outcome: Outcome::Unset,
            withdrawn: false,
            judged_by: None,
            judged_at: None,
            withdrawn_at: None,
            lock_version: 0,
            created_at: now,
            updated_at: now,
            responses: vec![],
        }
    }

    #[test]
    fn test_outcome_param_parsing() {
        assert_eq!(Outcome::from_param("right"), Some(Outcome::Right));
        assert_eq!(Outcome::from_param("Wrong"), Some(Outcome::Wrong));
        assert_eq!(Outcome::from_param(""), Some(Outcome::Unknown));
        assert_eq!(Outcome::from_param("unset"), None);
        assert_eq!(Outcome::from_param("maybe"), None);
    }

    #[test]
    fn test_outcome_storage_round_trip() {
        for o in [Outcome::Unset, Outcome::Right, Outcome::Wrong, Outcome::Unknown] {
            assert_eq!(Outcome::parse(o.as_str()), Some(o));
        }
    }

    #[test]
    fn test_status_derivation() {
        let mut p = open_prediction("alice");
        assert_eq!(p.status(), PredictionStatus::Open);

        p.outcome = Outcome::Wrong;
        assert_eq!(p.status(), PredictionStatus::Judged);

        let mut w = open_prediction("alice");
        w.withdrawn = true;
        assert_eq!(w.status(), PredictionStatus::Withdrawn);
    }

    #[test]
    fn test_new_prediction_validation() {
        let draft = NewPrediction::default();
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.messages().len(), 2);

        let ok = NewPrediction {
            description: "it will rain".into(),
            deadline: Some(Utc::now()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad_confidence = NewPrediction {
            initial_confidence: Some(101),
            ..ok
        };
        assert!(bad_confidence.validate().is_err());
    }

    #[test]
    fn test_description_length_limit() {
        let draft = NewPrediction {
            description: "x".repeat(MAX_DESCRIPTION_LEN + 1),
            deadline: Some(Utc::now()),
            ..Default::default()
        };
        let errors = draft.validate().unwrap_err();
        assert!(errors.to_string().contains("too long"));
    }

    #[test]
    fn test_apply_update_only_touches_given_fields() {
        let mut p = open_prediction("alice");
        let deadline = p.deadline;
        p.apply_update(&PredictionUpdate {
            description: Some("  edited  ".into()),
            private: Some(true),
            ..Default::default()
        });
        assert_eq!(p.description, "edited");
        assert!(p.private);
        assert_eq!(p.deadline, deadline);
    }

    #[test]
    fn test_filters_hide_private_predictions() {
        let now = Utc::now();
        let mut p = open_prediction("alice");
        assert!(PredictionFilter::Recent.matches(&p, now));
        assert!(PredictionFilter::Future.matches(&p, now));
        assert!(!PredictionFilter::Unjudged.matches(&p, now));

        p.private = true;
        assert!(!PredictionFilter::Recent.matches(&p, now));
    }

    #[test]
    fn test_unjudged_filter_requires_passed_deadline() {
        let now = Utc::now();
        let mut p = open_prediction("alice");
        p.deadline = now - Duration::hours(1);
        assert!(PredictionFilter::Unjudged.matches(&p, now));
        assert!(!PredictionFilter::Future.matches(&p, now));

        p.outcome = Outcome::Right;
        assert!(!PredictionFilter::Unjudged.matches(&p, now));
        assert!(PredictionFilter::Judged.matches(&p, now));
    }
}
