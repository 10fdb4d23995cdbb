//! Severity classification of case counts
//!
//! With a known population the label comes from the incidence ratio
//! `count / population × 100`:
//!
//! | ratio          | label      |
//! |----------------|------------|
//! | `>= 70`        | `critical` |
//! | `>= 50, < 70`  | `severe`   |
//! | `< 50`         | `moderate` |
//!
//! Without a usable population (missing, zero or negative) the absolute
//! count is banded instead:
//!
//! | count          | label      |
//! |----------------|------------|
//! | `>= 100`       | `critical` |
//! | `>= 50`        | `severe`   |
//! | `>= 10`        | `moderate` |
//! | `< 10`         | `mild`     |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Incidence ratio (percent) at or above which a count is critical
pub const CRITICAL_RATIO: f64 = 70.0;
/// Incidence ratio (percent) at or above which a count is severe
pub const SEVERE_RATIO: f64 = 50.0;

/// Absolute-count bands used when no population is known, highest first
pub const ABSOLUTE_BANDS: [(u64, SeverityLabel); 3] = [
    (100, SeverityLabel::Critical),
    (50, SeverityLabel::Severe),
    (10, SeverityLabel::Moderate),
];

/// Categorical risk label for a count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLabel {
    Mild,
    Moderate,
    Severe,
    Critical,
}

impl SeverityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLabel::Mild => "mild",
            SeverityLabel::Moderate => "moderate",
            SeverityLabel::Severe => "severe",
            SeverityLabel::Critical => "critical",
        }
    }
}

impl fmt::Display for SeverityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incidence ratio in percent, when the population is usable
pub fn incidence_ratio(count: u64, population: Option<i64>) -> Option<f64> {
    match population {
        Some(population) if population > 0 => Some(count as f64 * 100.0 / population as f64),
        _ => None,
    }
}

/// Classify a count against its population denominator
pub fn classify(count: u64, population: Option<i64>) -> SeverityLabel {
    match incidence_ratio(count, population) {
        Some(ratio) if ratio >= CRITICAL_RATIO => SeverityLabel::Critical,
        Some(ratio) if ratio >= SEVERE_RATIO => SeverityLabel::Severe,
        Some(_) => SeverityLabel::Moderate,
        None => classify_absolute(count),
    }
}

/// Classify a count on its own, using [`ABSOLUTE_BANDS`]
pub fn classify_absolute(count: u64) -> SeverityLabel {
    ABSOLUTE_BANDS
        .iter()
        .find(|(threshold, _)| count >= *threshold)
        .map(|(_, label)| *label)
        .unwrap_or(SeverityLabel::Mild)
}
