use serde::{Deserialize, Serialize};

use crate::models::Outcome;

const BUCKETS: [i32; 6] = [50, 60, 70, 80, 90, 100];

/// A wager paired with the outcome of its prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredWager {
    pub confidence: i32,
    pub outcome: Outcome,
}

impl ScoredWager {
    /// Confidence in whichever side the wager backed (50-100).
    pub fn relative_confidence(&self) -> i32 {
        if self.confidence >= 50 {
            self.confidence
        } else {
            100 - self.confidence
        }
    }

    /// `None` when the outcome doesn't settle the wager.
    pub fn is_correct(&self) -> Option<bool> {
        match self.outcome {
            Outcome::Right => Some(self.confidence >= 50),
            Outcome::Wrong => Some(self.confidence < 50),
            Outcome::Unset | Outcome::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceBucket {
    pub confidence: i32,
    pub count: i64,
    pub correct: i64,
    /// Percentage of correct wagers, `None` for an empty bucket.
    pub accuracy: Option<i32>,
}

/// Calibration: how often wagers at each confidence level came out right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub buckets: Vec<ConfidenceBucket>,
    pub count: i64,
    pub correct: i64,
    pub accuracy: Option<i32>,
}

impl Statistics {
    pub fn from_wagers(wagers: &[ScoredWager]) -> Self {
        let mut counts = [(0i64, 0i64); BUCKETS.len()];

        for wager in wagers {
            let Some(correct) = wager.is_correct() else {
                continue;
            };
            let idx = bucket_index(wager.relative_confidence());
            counts[idx].0 += 1;
            if correct {
                counts[idx].1 += 1;
            }
        }

        let buckets: Vec<ConfidenceBucket> = BUCKETS
            .iter()
            .zip(counts.iter())
            .map(|(&confidence, &(count, correct))| ConfidenceBucket {
                confidence,
                count,
                correct,
                accuracy: percentage(correct, count),
            })
            .collect();

        let count = buckets.iter().map(|b| b.count).sum();
        let correct = buckets.iter().map(|b| b.correct).sum();

        Self {
            buckets,
            count,
            correct,
            accuracy: percentage(correct, count),
        }
    }
}

fn bucket_index(relative_confidence: i32) -> usize {
    let decade = (relative_confidence.clamp(50, 100) / 10) * 10;
    BUCKETS.iter().position(|&b| b == decade).unwrap_or(0)
}

fn percentage(part: i64, whole: i64) -> Option<i32> {
    if whole == 0 {
        return None;
    }
    Some(((part * 100 + whole / 2) / whole) as i32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
