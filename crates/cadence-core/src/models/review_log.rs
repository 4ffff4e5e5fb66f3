//! Ratings and the append-only review log

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeckId, ItemId, ReviewId, SeriesId};
use crate::error::Error;

/// Ordinal recall rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Fail,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Self; 4] = [Self::Fail, Self::Hard, Self::Good, Self::Easy];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for Rating {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Fail),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            other => Err(Error::InvalidRating(format!(
                "{other} is outside 1..=4 (fail, hard, good, easy)"
            ))),
        }
    }
}

impl FromStr for Rating {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "fail" | "again" => Ok(Self::Fail),
            "hard" => Ok(Self::Hard),
            "good" => Ok(Self::Good),
            "easy" => Ok(Self::Easy),
            other => other.parse::<u8>().map_or_else(
                |_| {
                    Err(Error::InvalidRating(format!(
                        "'{}' (expected fail, hard, good, easy or 1-4)",
                        s.trim()
                    )))
                },
                Self::try_from,
            ),
        }
    }
}

/// Parse a rating argument where `suspend` stands for the null pseudo-rating.
pub fn parse_review_action(value: &str) -> crate::Result<Option<Rating>> {
    if value.trim().eq_ignore_ascii_case("suspend") {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

/// One rating event. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub id: ReviewId,
    pub item_id: ItemId,
    pub deck_id: DeckId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<SeriesId>,
    pub reviewed_at: DateTime<Utc>,
    /// `None` records a suspend event
    pub rating: Option<Rating>,
    pub interval: u32,
    pub ease_factor: f64,
    pub mastery: f64,
}
