//! Quartile ordinal

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of four ordinal performance tiers. `First` holds the highest metric
/// values; `Fourth` holds the lowest, including agents with no activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quartile {
    First,
    Second,
    Third,
    Fourth,
}

/// Error returned when a quartile ordinal is outside 1..=4.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid quartile ordinal: {0} (expected 1-4)")]
pub struct QuartileParseError(pub i64);

impl Quartile {
    /// All quartiles, best first.
    pub const ALL: [Quartile; 4] = [
        Quartile::First,
        Quartile::Second,
        Quartile::Third,
        Quartile::Fourth,
    ];

    /// Ordinal in 1..=4.
    pub fn ordinal(self) -> u8 {
        match self {
            Quartile::First => 1,
            Quartile::Second => 2,
            Quartile::Third => 3,
            Quartile::Fourth => 4,
        }
    }

    /// Zero-based bucket index.
    pub fn index(self) -> usize {
        usize::from(self.ordinal() - 1)
    }

    pub fn from_ordinal(ordinal: i64) -> Result<Self, QuartileParseError> {
        match ordinal {
            1 => Ok(Quartile::First),
            2 => Ok(Quartile::Second),
            3 => Ok(Quartile::Third),
            4 => Ok(Quartile::Fourth),
            other => Err(QuartileParseError(other)),
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Lower ordinal is better.
    pub fn is_better_than(self, other: Quartile) -> bool {
        self.ordinal() < other.ordinal()
    }

    /// Human label used in logs and banners.
    pub fn label(self) -> &'static str {
        match self {
            Quartile::First => "Q1 (best)",
            Quartile::Second => "Q2",
            Quartile::Third => "Q3 (attention)",
            Quartile::Fourth => "Q4 (low)",
        }
    }
}

impl fmt::Display for Quartile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.ordinal())
    }
}

impl TryFrom<u8> for Quartile {
    type Error = QuartileParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_ordinal(i64::from(value))
    }
}

impl From<Quartile> for u8 {
    fn from(q: Quartile) -> Self {
        q.ordinal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal_roundtrip() {
        for q in Quartile::ALL {
            assert_eq!(Quartile::from_ordinal(i64::from(q.ordinal())).unwrap(), q);
            assert_eq!(Quartile::from_index(q.index()), Some(q));
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(Quartile::from_ordinal(0), Err(QuartileParseError(0)));
        assert_eq!(Quartile::from_ordinal(5), Err(QuartileParseError(5)));
        assert_eq!(Quartile::from_index(4), None);
    }

    #[test]
    fn test_lower_ordinal_is_better() {
        assert!(Quartile::First.is_better_than(Quartile::Second));
        assert!(!Quartile::Fourth.is_better_than(Quartile::Third));
        assert!(Quartile::First < Quartile::Fourth);
    }

    #[test]
    fn test_serde_as_integer() {
        let json = serde_json::to_string(&Quartile::Third).unwrap();
        assert_eq!(json, "3");
        let parsed: Quartile = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, Quartile::Second);
        assert!(serde_json::from_str::<Quartile>("7").is_err());
    }
}
