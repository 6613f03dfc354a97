//! Access control and state transitions for predictions.
//!
//! Everything here is a pure function over already-loaded values. Callers
//! own persistence and decide how a refusal is presented.

use std::collections::BTreeSet;

use chrono::Utc;
use thiserror::Error;

use crate::cache;
use crate::models::{Outcome, Prediction, PredictionStatus, UserId, UserRef};

/// Why a judgment was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("you must be signed in")]
    Unauthenticated,

    #[error("only the creator of a prediction may do that")]
    NotCreator,

    #[error("prediction has already been judged {0}")]
    AlreadyJudged(Outcome),

    #[error("prediction has been withdrawn")]
    AlreadyWithdrawn,

    #[error("a judgment needs an outcome")]
    OutcomeUnset,
}

/// Caches to invalidate after a prediction is judged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgmentResult {
    pub creator: UserId,
    /// Distinct users holding a wager on the prediction. May include the creator.
    pub wagerers: BTreeSet<UserId>,
    pub invalidate_global: bool,
}

impl JudgmentResult {
    /// Every user whose statistics changed: the creator plus all wagerers.
    pub fn affected_users(&self) -> BTreeSet<UserId> {
        let mut users = self.wagerers.clone();
        users.insert(self.creator.clone());
        users
    }

    /// Fragment cache keys to expire, per-user first, then the global entry.
    pub fn fragment_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .affected_users()
            .iter()
            .map(cache::user_statistics_key)
            .collect();
        if self.invalidate_global {
            keys.push(cache::GLOBAL_STATISTICS_KEY.to_string());
        }
        keys
    }
}

/// Rules deciding who may see and change a prediction.
pub struct PredictionAccessPolicy;

impl PredictionAccessPolicy {
    /// Public predictions are visible to everyone, private ones to their
    /// creator only.
    pub fn can_view(prediction: &Prediction, requester: Option<&UserRef>) -> bool {
        if !prediction.private {
            return true;
        }
        is_creator(prediction, requester)
    }

    pub fn can_judge(prediction: &Prediction, requester: Option<&UserRef>) -> bool {
        is_creator(prediction, requester)
    }

    /// Creator only, and only while the prediction is still open.
    pub fn can_withdraw(prediction: &Prediction, requester: Option<&UserRef>) -> bool {
        is_creator(prediction, requester) && prediction.is_open()
    }

    pub fn can_edit(prediction: &Prediction, requester: Option<&UserRef>) -> bool {
        is_creator(prediction, requester)
    }

    /// Any signed-in user who can see the prediction may respond to it.
    pub fn can_respond(prediction: &Prediction, requester: Option<&UserRef>) -> bool {
        requester.is_some() && Self::can_view(prediction, requester)
    }

    /// Comments are always welcome; wagers only while the prediction is open.
    pub fn accepts_wagers(prediction: &Prediction) -> bool {
        prediction.is_open()
    }

    /// Record the outcome. The prediction is left untouched on refusal.
    pub fn apply_judgment(
        prediction: &mut Prediction,
        outcome: Outcome,
        judged_by: Option<&UserRef>,
    ) -> Result<JudgmentResult, PolicyViolation> {
        if !outcome.is_set() {
            return Err(PolicyViolation::OutcomeUnset);
        }
        let judge = judged_by.ok_or(PolicyViolation::Unauthenticated)?;
        if !prediction.is_creator(judge) {
            return Err(PolicyViolation::NotCreator);
        }
        match prediction.status() {
            PredictionStatus::Open => {}
            PredictionStatus::Judged => {
                return Err(PolicyViolation::AlreadyJudged(prediction.outcome))
            }
            PredictionStatus::Withdrawn => return Err(PolicyViolation::AlreadyWithdrawn),
        }

        prediction.outcome = outcome;
        prediction.judged_by = Some(judge.id.clone());
        prediction.judged_at = Some(Utc::now());

        Ok(JudgmentResult {
            creator: prediction.creator.id.clone(),
            wagerers: prediction.wagers().map(|w| w.user.id.clone()).collect(),
            invalidate_global: true,
        })
    }

    /// Withdraw an open prediction. Returns false, changing nothing, when
    /// the requester is not the creator or the prediction is closed.
    pub fn apply_withdrawal(prediction: &mut Prediction, withdrawn_by: Option<&UserRef>) -> bool {
        if !Self::can_withdraw(prediction, withdrawn_by) {
            return false;
        }
        prediction.withdrawn = true;
        prediction.withdrawn_at = Some(Utc::now());
        true
    }
}

fn is_creator(prediction: &Prediction, requester: Option<&UserRef>) -> bool {
    requester.is_some_and(|u| prediction.is_creator(u))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Response;
    use chrono::Duration;
    use uuid::Uuid;

    fn make_prediction(creator: &str, private: bool) -> Prediction {
        let now = Utc::now();
        Prediction {
            id: Uuid::new_v4(),
            submission_id: None,
            creator: UserRef::new(creator),
            description: "interest rates fall by June".into(),
            deadline: now + Duration::days(30),
            private,
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

    fn add_response(p: &mut Prediction, user: &str, confidence: Option<i32>) {
        p.responses.push(Response {
            id: Uuid::new_v4(),
            prediction_id: p.id,
            user: UserRef::new(user),
            comment: confidence.is_none().then(|| "interesting".to_string()),
            confidence,
            created_at: Utc::now(),
        });
    }

    fn ids(names: &[&str]) -> BTreeSet<UserId> {
        names.iter().map(|n| UserId::new(*n)).collect()
    }

    // --- Viewing ---

    #[test]
    fn test_public_prediction_visible_to_everyone() {
        let p = make_prediction("alice", false);
        assert!(PredictionAccessPolicy::can_view(&p, Some(&UserRef::new("bob"))));
        assert!(PredictionAccessPolicy::can_view(&p, Some(&UserRef::new("alice"))));
        assert!(PredictionAccessPolicy::can_view(&p, None));
    }

    #[test]
    fn test_private_prediction_visible_to_creator_only() {
        let p = make_prediction("alice", true);
        assert!(PredictionAccessPolicy::can_view(&p, Some(&UserRef::new("alice"))));
        assert!(!PredictionAccessPolicy::can_view(&p, Some(&UserRef::new("bob"))));
        assert!(!PredictionAccessPolicy::can_view(&p, None));
    }

    #[test]
    fn test_private_prediction_hidden_from_wagerers() {
        let mut p = make_prediction("alice", true);
        add_response(&mut p, "bob", Some(70));
        assert!(!PredictionAccessPolicy::can_view(&p, Some(&UserRef::new("bob"))));
    }

    #[test]
    fn test_creator_can_always_view_own_prediction() {
        for private in [false, true] {
            let p = make_prediction("alice", private);
            assert!(PredictionAccessPolicy::can_view(&p, Some(&p.creator.clone())));
        }
    }

    // --- Ownership predicates ---

    #[test]
    fn test_judge_and_edit_require_creator() {
        let p = make_prediction("alice", false);
        let alice = UserRef::new("alice");
        let bob = UserRef::new("bob");

        assert!(PredictionAccessPolicy::can_judge(&p, Some(&alice)));
        assert!(!PredictionAccessPolicy::can_judge(&p, Some(&bob)));
        assert!(!PredictionAccessPolicy::can_judge(&p, None));

        assert!(PredictionAccessPolicy::can_edit(&p, Some(&alice)));
        assert!(!PredictionAccessPolicy::can_edit(&p, Some(&bob)));
        assert!(!PredictionAccessPolicy::can_edit(&p, None));
    }

    #[test]
    fn test_can_judge_ignores_state() {
        let mut p = make_prediction("alice", false);
        p.outcome = Outcome::Right;
        assert!(PredictionAccessPolicy::can_judge(&p, Some(&UserRef::new("alice"))));
    }

    #[test]
    fn test_withdraw_requires_creator_and_open() {
        let alice = UserRef::new("alice");
        let p = make_prediction("alice", false);
        assert!(PredictionAccessPolicy::can_withdraw(&p, Some(&alice)));
        assert!(!PredictionAccessPolicy::can_withdraw(&p, Some(&UserRef::new("bob"))));
        assert!(!PredictionAccessPolicy::can_withdraw(&p, None));

        let mut judged = make_prediction("alice", false);
        judged.outcome = Outcome::Wrong;
        assert!(!PredictionAccessPolicy::can_withdraw(&judged, Some(&alice)));
    }

    #[test]
    fn test_predicates_are_repeatable() {
        let p = make_prediction("alice", true);
        let bob = UserRef::new("bob");
        let first = (
            PredictionAccessPolicy::can_view(&p, Some(&bob)),
            PredictionAccessPolicy::can_judge(&p, Some(&bob)),
            PredictionAccessPolicy::can_withdraw(&p, Some(&bob)),
        );
        for _ in 0..5 {
            let again = (
                PredictionAccessPolicy::can_view(&p, Some(&bob)),
                PredictionAccessPolicy::can_judge(&p, Some(&bob)),
                PredictionAccessPolicy::can_withdraw(&p, Some(&bob)),
            );
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_respond_needs_login_and_visibility() {
        let public = make_prediction("alice", false);
        let private = make_prediction("alice", true);
        let bob = UserRef::new("bob");

        assert!(PredictionAccessPolicy::can_respond(&public, Some(&bob)));
        assert!(!PredictionAccessPolicy::can_respond(&public, None));
        assert!(!PredictionAccessPolicy::can_respond(&private, Some(&bob)));
    }

    // --- Judging ---

    #[test]
    fn test_judgment_targets_creator_and_wagerers() {
        let mut p = make_prediction("carol", false);
        add_response(&mut p, "alice", Some(80));
        add_response(&mut p, "bob", Some(20));
        add_response(&mut p, "alice", Some(90));

        let result =
            PredictionAccessPolicy::apply_judgment(&mut p, Outcome::Right, Some(&UserRef::new("carol")))
                .unwrap();

        assert_eq!(result.creator, UserId::new("carol"));
        assert_eq!(result.wagerers, ids(&["alice", "bob"]));
        assert_eq!(result.affected_users(), ids(&["alice", "bob", "carol"]));
        assert!(result.invalidate_global);
        assert_eq!(p.outcome, Outcome::Right);
        assert_eq!(p.judged_by, Some(UserId::new("carol")));
        assert!(p.judged_at.is_some());
    }

    #[test]
    fn test_judgment_without_wagers_targets_creator_only() {
        let mut p = make_prediction("carol", false);
        let result =
            PredictionAccessPolicy::apply_judgment(&mut p, Outcome::Wrong, Some(&UserRef::new("carol")))
                .unwrap();

        assert_eq!(
            result.fragment_keys(),
            vec!["statistics_partial-carol".to_string(), "statistics_partial".to_string()]
        );
    }

    #[test]
    fn test_judgment_skips_commenters() {
        let mut p = make_prediction("carol", false);
        add_response(&mut p, "dave", None);
        add_response(&mut p, "erin", Some(55));

        let result =
            PredictionAccessPolicy::apply_judgment(&mut p, Outcome::Right, Some(&UserRef::new("carol")))
                .unwrap();

        let keys = result.fragment_keys();
        assert!(keys.contains(&"statistics_partial-erin".to_string()));
        assert!(!keys.contains(&"statistics_partial-dave".to_string()));
        assert!(!keys.contains(&"statistics_partial-not-mee".to_string()));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_judgment_refusals_leave_prediction_untouched() {
        let mut p = make_prediction("carol", false);

        let err = PredictionAccessPolicy::apply_judgment(&mut p, Outcome::Right, None).unwrap_err();
        assert_eq!(err, PolicyViolation::Unauthenticated);

        let err = PredictionAccessPolicy::apply_judgment(
            &mut p,
            Outcome::Right,
            Some(&UserRef::new("mallory")),
        )
        .unwrap_err();
        assert_eq!(err, PolicyViolation::NotCreator);

        let err = PredictionAccessPolicy::apply_judgment(
            &mut p,
            Outcome::Unset,
            Some(&UserRef::new("carol")),
        )
        .unwrap_err();
        assert_eq!(err, PolicyViolation::OutcomeUnset);

        assert_eq!(p.outcome, Outcome::Unset);
        assert!(p.judged_by.is_none());
    }

    #[test]
    fn test_rejudging_keeps_first_outcome() {
        let carol = UserRef::new("carol");
        let mut p = make_prediction("carol", false);
        PredictionAccessPolicy::apply_judgment(&mut p, Outcome::Right, Some(&carol)).unwrap();

        let err =
            PredictionAccessPolicy::apply_judgment(&mut p, Outcome::Wrong, Some(&carol)).unwrap_err();
        assert_eq!(err, PolicyViolation::AlreadyJudged(Outcome::Right));
        assert_eq!(p.outcome, Outcome::Right);
    }

    #[test]
    fn test_withdrawn_prediction_cannot_be_judged() {
        let carol = UserRef::new("carol");
        let mut p = make_prediction("carol", false);
        assert!(PredictionAccessPolicy::apply_withdrawal(&mut p, Some(&carol)));

        let err =
            PredictionAccessPolicy::apply_judgment(&mut p, Outcome::Right, Some(&carol)).unwrap_err();
        assert_eq!(err, PolicyViolation::AlreadyWithdrawn);
        assert_eq!(p.outcome, Outcome::Unset);
    }

    // --- Withdrawal ---

    #[test]
    fn test_withdrawal_by_creator() {
        let mut p = make_prediction("alice", false);
        assert!(PredictionAccessPolicy::apply_withdrawal(&mut p, Some(&UserRef::new("alice"))));
        assert!(p.withdrawn);
        assert!(p.withdrawn_at.is_some());
        assert_eq!(p.status(), PredictionStatus::Withdrawn);
    }

    #[test]
    fn test_withdrawal_rejected_for_others() {
        let mut p = make_prediction("alice", false);
        assert!(!PredictionAccessPolicy::apply_withdrawal(&mut p, Some(&UserRef::new("bob"))));
        assert!(!PredictionAccessPolicy::apply_withdrawal(&mut p, None));
        assert!(!p.withdrawn);
    }

    #[test]
    fn test_second_withdrawal_rejected() {
        let alice = UserRef::new("alice");
        let mut p = make_prediction("alice", false);
        assert!(PredictionAccessPolicy::apply_withdrawal(&mut p, Some(&alice)));
        let first_at = p.withdrawn_at;

        assert!(!PredictionAccessPolicy::apply_withdrawal(&mut p, Some(&alice)));
        assert_eq!(p.withdrawn_at, first_at);
    }

    #[test]
    fn test_judged_prediction_cannot_be_withdrawn() {
        let alice = UserRef::new("alice");
        let mut p = make_prediction("alice", false);
        PredictionAccessPolicy::apply_judgment(&mut p, Outcome::Wrong, Some(&alice)).unwrap();
        assert!(!PredictionAccessPolicy::apply_withdrawal(&mut p, Some(&alice)));
        assert!(!p.withdrawn);
    }

    #[test]
    fn test_wagers_only_while_open() {
        let alice = UserRef::new("alice");
        let mut p = make_prediction("alice", false);
        assert!(PredictionAccessPolicy::accepts_wagers(&p));
        PredictionAccessPolicy::apply_withdrawal(&mut p, Some(&alice));
        assert!(!PredictionAccessPolicy::accepts_wagers(&p));
    }
}
