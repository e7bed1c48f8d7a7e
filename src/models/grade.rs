//! Learner's self-assessed recall quality for one graded review.
use crate::error::ReviewError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy];

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Again => "again",
            Grade::Hard => "hard",
            Grade::Good => "good",
            Grade::Easy => "easy",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a wire grade. Surrounding whitespace is trimmed and ASCII case is
/// ignored, so `" GOOD "` reads as [`Grade::Good`]. Serde deserialization
/// only accepts the exact lowercase names.
impl FromStr for Grade {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Grade::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ReviewError::invalid(format!("unknown grade '{s}'")))
    }
}
