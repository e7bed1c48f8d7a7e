//! Append-only review telemetry: pass/fail/timeout/reveal outcomes per card.
use super::ScheduleState;
use crate::error::ReviewError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewResult {
    Correct,
    Wrong,
    Timeout,
    Reveal,
}

impl ReviewResult {
    pub const ALL: [ReviewResult; 4] = [
        ReviewResult::Correct,
        ReviewResult::Wrong,
        ReviewResult::Timeout,
        ReviewResult::Reveal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewResult::Correct => "correct",
            ReviewResult::Wrong => "wrong",
            ReviewResult::Timeout => "timeout",
            ReviewResult::Reveal => "reveal",
        }
    }
}

impl fmt::Display for ReviewResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a wire result. Like [`Grade`](super::Grade) parsing, surrounding
/// whitespace is trimmed and ASCII case is ignored; serde stays exact.
impl FromStr for ReviewResult {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ReviewResult::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ReviewError::invalid(format!("unknown review result '{s}'")))
    }
}

/// One immutable row of the review log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewLogEntry {
    pub id: i64,
    pub card_id: i64,
    #[serde(rename = "created_at")]
    pub timestamp: DateTime<Utc>,
    pub result: ReviewResult,
    pub duration_ms: Option<u64>,
}

/// Response body for a recorded review event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEventReceipt {
    pub entry_id: i64,
}

/// Schedule of one card together with its full review log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardHistory {
    pub card_id: i64,
    #[serde(flatten)]
    pub schedule: ScheduleState,
    pub reviews: Vec<ReviewLogEntry>,
}
