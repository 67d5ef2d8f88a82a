//! Quality Tiers
//!
//! The seven ordered quality tiers and the ranges used to constrain
//! which tiers a material stack may have.
//!
//! # Example
//!
//! ```
//! use upgrade_events::{Quality, QualityRange};
//!
//! assert_eq!(Quality::Poor.next(), Some(Quality::Normal));
//! assert!(QualityRange::exactly(Quality::Good).includes(Quality::Good));
//! assert!(!QualityRange::exactly(Quality::Good).includes(Quality::Normal));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality tier of an object, lowest to highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    #[default]
    Awful,
    Poor,
    Normal,
    Good,
    Excellent,
    Masterwork,
    Legendary,
}

impl Quality {
    /// Every tier in ascending order.
    pub const ALL: [Quality; 7] = [
        Quality::Awful,
        Quality::Poor,
        Quality::Normal,
        Quality::Good,
        Quality::Excellent,
        Quality::Masterwork,
        Quality::Legendary,
    ];

    /// The lowest tier; a cancelled intent resets to this.
    pub const MIN: Quality = Quality::Awful;

    /// The terminal tier. There is no transition out of it.
    pub const MAX: Quality = Quality::Legendary;

    /// Position of the tier in [`Quality::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The tier one step above, or `None` for the terminal tier.
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn is_max(self) -> bool {
        self == Self::MAX
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Awful => "awful",
            Quality::Poor => "poor",
            Quality::Normal => "normal",
            Quality::Good => "good",
            Quality::Excellent => "excellent",
            Quality::Masterwork => "masterwork",
            Quality::Legendary => "legendary",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a quality name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseQualityError(pub String);

impl fmt::Display for ParseQualityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid quality: '{}', expected one of awful, poor, normal, good, excellent, masterwork, legendary",
            self.0
        )
    }
}

impl std::error::Error for ParseQualityError {}

impl FromStr for Quality {
    type Err = ParseQualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|q| q.as_str() == wanted)
            .ok_or_else(|| ParseQualityError(s.to_string()))
    }
}

/// Accepted quality of a material stack for one requirement line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QualityRange {
    /// Any stack qualifies, with or without a quality.
    #[default]
    Any,
    /// Only stacks whose quality lies in the closed interval qualify.
    Within { min: Quality, max: Quality },
}

impl QualityRange {
    pub fn exactly(quality: Quality) -> Self {
        QualityRange::Within {
            min: quality,
            max: quality,
        }
    }

    /// Builds a closed interval, swapping the bounds if given in reverse.
    pub fn between(a: Quality, b: Quality) -> Self {
        QualityRange::Within {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self, QualityRange::Any)
    }

    pub fn includes(&self, quality: Quality) -> bool {
        match *self {
            QualityRange::Any => true,
            QualityRange::Within { min, max } => min <= quality && quality <= max,
        }
    }

    /// Whether a stack with the given (optional) quality satisfies this range.
    ///
    /// Stacks without a quality only satisfy an unconstrained range.
    pub fn accepts(&self, quality: Option<Quality>) -> bool {
        match quality {
            Some(q) => self.includes(q),
            None => self.is_unconstrained(),
        }
    }
}

impl fmt::Display for QualityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityRange::Any => write!(f, "any"),
            QualityRange::Within { min, max } if min == max => write!(f, "{}", min),
            QualityRange::Within { min, max } => write!(f, "{}..={}", min, max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order() {
        assert!(Quality::Awful < Quality::Poor);
        assert!(Quality::Masterwork < Quality::Legendary);
        assert_eq!(Quality::ALL.len(), 7);
        for (i, q) in Quality::ALL.iter().enumerate() {
            assert_eq!(q.index(), i);
        }
    }

    #[test]
    fn test_next_stops_at_legendary() {
        assert_eq!(Quality::Masterwork.next(), Some(Quality::Legendary));
        assert_eq!(Quality::Legendary.next(), None);
        assert!(Quality::Legendary.is_max());
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!("Normal".parse::<Quality>(), Ok(Quality::Normal));
        assert_eq!(" legendary ".parse::<Quality>(), Ok(Quality::Legendary));
        assert!("shiny".parse::<Quality>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Quality::Masterwork).unwrap();
        assert_eq!(json, "\"masterwork\"");

        let range: QualityRange = serde_json::from_str(r#"{"type":"any"}"#).unwrap();
        assert!(range.is_unconstrained());
    }

    #[test]
    fn test_range_acceptance() {
        let any = QualityRange::Any;
        assert!(any.accepts(None));
        assert!(any.accepts(Some(Quality::Awful)));

        let good_up = QualityRange::between(Quality::Legendary, Quality::Good);
        assert!(good_up.accepts(Some(Quality::Excellent)));
        assert!(!good_up.accepts(Some(Quality::Normal)));
        assert!(!good_up.accepts(None));
    }
}
