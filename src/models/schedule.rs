//! Per-card scheduling record.
//!
//! Serializes with the `srs_*` field names the card endpoints already use,
//! so a snapshot can be handed straight to the outer JSON layer.

use crate::error::ReviewError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_EASE: u32 = 250;
pub const MIN_EASE: u32 = 130;
pub const MAX_EASE: u32 = 350;

/// Lifecycle phase of a card.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardState {
    #[default]
    New,
    Learning,
    Review,
}

impl CardState {
    pub fn as_str(self) -> &'static str {
        match self {
            CardState::New => "new",
            CardState::Learning => "learning",
            CardState::Review => "review",
        }
    }
}

impl fmt::Display for CardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardState {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(CardState::New),
            "learning" => Ok(CardState::Learning),
            "review" => Ok(CardState::Review),
            other => Err(ReviewError::invalid(format!("unknown card state '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    #[serde(rename = "srs_type")]
    pub state: CardState,
    /// Index into the learning ladder; only read while `state` is `Learning`.
    #[serde(rename = "srs_step")]
    pub step: u32,
    /// Days until the next review; at least 1 while `state` is `Review`.
    #[serde(rename = "srs_ivl")]
    pub interval: u32,
    /// Fixed-point multiplier in hundredths (250 = 2.50x).
    #[serde(rename = "srs_ease")]
    pub ease: u32,
    #[serde(rename = "srs_lapses")]
    pub lapses: u32,
    #[serde(rename = "srs_due")]
    pub due: Option<DateTime<Utc>>,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self {
            state: CardState::New,
            step: 0,
            interval: 0,
            ease: DEFAULT_EASE,
            lapses: 0,
            due: None,
        }
    }
}

impl ScheduleState {
    /// True once the card may be shown again. New cards are always eligible.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due.is_none_or(|due| due <= now)
    }
}
