use chrono::{DateTime, Utc};
use serde::Serialize;

use super::prediction::{Outcome, Prediction};
use super::user::UserId;

/// One entry in a prediction's history, as shown on its page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictionEvent {
    Created {
        at: DateTime<Utc>,
        user: UserId,
    },
    Wagered {
        at: DateTime<Utc>,
        user: UserId,
        confidence: i32,
        comment: Option<String>,
    },
    Commented {
        at: DateTime<Utc>,
        user: UserId,
        comment: String,
    },
    Judged {
        at: DateTime<Utc>,
        user: Option<UserId>,
        outcome: Outcome,
    },
    Withdrawn {
        at: DateTime<Utc>,
        user: UserId,
    },
}

impl PredictionEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            PredictionEvent::Created { at, .. }
            | PredictionEvent::Wagered { at, .. }
            | PredictionEvent::Commented { at, .. }
            | PredictionEvent::Judged { at, .. }
            | PredictionEvent::Withdrawn { at, .. } => *at,
        }
    }
}

/// Chronological history of a prediction.
pub fn timeline(p: &Prediction) -> Vec<PredictionEvent> {
    let mut events = vec![PredictionEvent::Created {
        at: p.created_at,
        user: p.creator.id.clone(),
    }];

    for r in &p.responses {
        let event = match (r.confidence, &r.comment) {
            (Some(confidence), comment) => PredictionEvent::Wagered {
                at: r.created_at,
                user: r.user.id.clone(),
                confidence,
                comment: comment.clone(),
            },
            (None, Some(comment)) => PredictionEvent::Commented {
                at: r.created_at,
                user: r.user.id.clone(),
                comment: comment.clone(),
            },
            (None, None) => continue,
        };
        events.push(event);
    }

    if let (true, Some(at)) = (p.outcome.is_set(), p.judged_at) {
        events.push(PredictionEvent::Judged {
            at,
            user: p.judged_by.clone(),
            outcome: p.outcome,
        });
    }
    if let (true, Some(at)) = (p.withdrawn, p.withdrawn_at) {
        events.push(PredictionEvent::Withdrawn {
            at,
            user: p.creator.id.clone(),
        });
    }

    // stable: ties keep insertion order
    events.sort_by_key(|e| e.at());
    events
}
