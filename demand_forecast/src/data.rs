//! Historical count handling: raw rows in, strictly ordered series out
//!
//! The persistence layer hands back rows whose dates may be strings, parsed
//! dates, timestamps or epoch milliseconds, and whose counts may be numbers or
//! numeric strings. [`format_observations`] turns those rows into an
//! [`ObservationSeries`]: one [`Observation`] per period, ascending, with
//! duplicate periods merged by summing their counts.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Days, Months, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Date of a raw row, as supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDate {
    /// Already-parsed calendar date
    Date(NaiveDate),
    /// Already-parsed timestamp (its UTC date is used)
    DateTime(DateTime<Utc>),
    /// Milliseconds since the Unix epoch
    EpochMillis(i64),
    /// Textual date in one of the accepted formats
    Text(String),
}

/// Count of a raw row, as supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// One unvalidated historical row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    #[serde(default)]
    pub date: Option<RawDate>,
    #[serde(default)]
    pub count: Option<RawCount>,
}

impl RawObservation {
    /// Create a raw row from anything convertible into a date and a count
    pub fn new(date: impl Into<RawDate>, count: impl Into<RawCount>) -> Self {
        Self {
            date: Some(date.into()),
            count: Some(count.into()),
        }
    }
}

impl From<NaiveDate> for RawDate {
    fn from(date: NaiveDate) -> Self {
        RawDate::Date(date)
    }
}

impl From<DateTime<Utc>> for RawDate {
    fn from(timestamp: DateTime<Utc>) -> Self {
        RawDate::DateTime(timestamp)
    }
}

impl From<&str> for RawDate {
    fn from(text: &str) -> Self {
        RawDate::Text(text.to_string())
    }
}

impl From<String> for RawDate {
    fn from(text: String) -> Self {
        RawDate::Text(text)
    }
}

impl From<i64> for RawCount {
    fn from(count: i64) -> Self {
        RawCount::Integer(count)
    }
}

impl From<i32> for RawCount {
    fn from(count: i32) -> Self {
        RawCount::Integer(i64::from(count))
    }
}

impl From<u32> for RawCount {
    fn from(count: u32) -> Self {
        RawCount::Integer(i64::from(count))
    }
}

impl From<f64> for RawCount {
    fn from(count: f64) -> Self {
        RawCount::Float(count)
    }
}

impl From<&str> for RawCount {
    fn from(text: &str) -> Self {
        RawCount::Text(text.to_string())
    }
}

impl RawDate {
    /// Resolve to a calendar date
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        match self {
            RawDate::Date(date) => Some(*date),
            RawDate::DateTime(timestamp) => Some(timestamp.date_naive()),
            RawDate::EpochMillis(millis) => {
                DateTime::<Utc>::from_timestamp_millis(*millis).map(|ts| ts.date_naive())
            }
            RawDate::Text(text) => parse_date_text(text),
        }
    }
}

impl RawCount {
    /// Resolve to a non-negative integer count
    pub fn to_count(&self) -> Option<u64> {
        match self {
            RawCount::Integer(value) => u64::try_from(*value).ok(),
            RawCount::Float(value) => integral_float(*value),
            RawCount::Text(text) => {
                let text = text.trim();
                text.parse::<u64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(integral_float))
            }
        }
    }
}

fn integral_float(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

/// Parse the textual date formats the collaborators are known to emit
fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.with_timezone(&Utc).date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, format) {
            return Some(timestamp.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%d/%m/%Y") {
        return Some(date);
    }
    // Monthly rows: "2024-03" is the first of the month
    if text.len() == 7 {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d") {
            return Some(date);
        }
    }

    None
}

/// A single validated count for one period
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Observation {
    pub period: NaiveDate,
    pub count: u64,
}

impl Observation {
    pub fn new(period: NaiveDate, count: u64) -> Self {
        Self { period, count }
    }
}

/// Spacing between consecutive periods of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
    /// Any other fixed spacing, in days
    Irregular(u64),
}

impl Cadence {
    /// Infer the cadence from the median gap between ascending periods
    pub fn infer(periods: &[NaiveDate]) -> Self {
        let mut gaps: Vec<i64> = periods
            .windows(2)
            .map(|w| (w[1] - w[0]).num_days())
            .collect();
        if gaps.is_empty() {
            return Cadence::Daily;
        }

        gaps.sort_unstable();
        match gaps[gaps.len() / 2] {
            g if g <= 1 => Cadence::Daily,
            6..=8 => Cadence::Weekly,
            28..=31 => Cadence::Monthly,
            g => Cadence::Irregular(g as u64),
        }
    }

    /// Length of the seasonal cycle for this cadence, if it has one
    pub fn seasonal_period(&self) -> Option<usize> {
        match self {
            Cadence::Daily => Some(7),
            Cadence::Monthly => Some(12),
            Cadence::Weekly | Cadence::Irregular(_) => None,
        }
    }

    /// The period `steps` cadence units after `from`
    pub fn advance(&self, from: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Cadence::Daily => from.checked_add_days(Days::new(u64::from(steps))),
            Cadence::Weekly => from.checked_add_days(Days::new(7 * u64::from(steps))),
            Cadence::Monthly => from.checked_add_months(Months::new(steps)),
            Cadence::Irregular(days) => from.checked_add_days(Days::new(days * u64::from(steps))),
        }
    }

    /// `horizon` strictly increasing periods following `last`
    pub fn future_periods(&self, last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
        (1..=horizon)
            .map(|step| {
                u32::try_from(step)
                    .ok()
                    .and_then(|step| self.advance(last, step))
                    .ok_or_else(|| {
                        ForecastError::InvalidParameter(format!(
                            "Cannot project {} periods past {}",
                            step, last
                        ))
                    })
            })
            .collect()
    }
}

/// Strictly ascending count series with unique periods
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObservationSeries {
    observations: Vec<Observation>,
}

impl ObservationSeries {
    /// Build a series from parsed observations, merging duplicates and sorting
    pub fn from_observations(observations: impl IntoIterator<Item = Observation>) -> Result<Self> {
        let mut merged: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for observation in observations {
            let total = merged.entry(observation.period).or_insert(0);
            *total = total.checked_add(observation.count).ok_or_else(|| {
                ForecastError::MalformedInput(format!(
                    "Count overflow while merging period {}",
                    observation.period
                ))
            })?;
        }

        Ok(Self {
            observations: merged
                .into_iter()
                .map(|(period, count)| Observation { period, count })
                .collect(),
        })
    }

    /// Build a series of consecutive periods starting at `start` (test and demo helper)
    pub fn from_counts(start: NaiveDate, cadence: Cadence, counts: &[u64]) -> Result<Self> {
        let mut observations = Vec::with_capacity(counts.len());
        for (i, &count) in counts.iter().enumerate() {
            let period = u32::try_from(i)
                .ok()
                .and_then(|step| cadence.advance(start, step))
                .ok_or_else(|| {
                    ForecastError::InvalidParameter(format!(
                        "Cannot place period {} after {}",
                        i, start
                    ))
                })?;
            observations.push(Observation { period, count });
        }

        Self::from_observations(observations)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn periods(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.period).collect()
    }

    /// Counts as floats, the form the models work on
    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.count as f64).collect()
    }

    pub fn first_period(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.period)
    }

    pub fn last_period(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.period)
    }

    pub fn cadence(&self) -> Cadence {
        Cadence::infer(&self.periods())
    }

    /// Split into the first `at` observations and the rest
    pub fn split_at(&self, at: usize) -> (ObservationSeries, ObservationSeries) {
        let at = at.min(self.observations.len());
        let (head, tail) = self.observations.split_at(at);
        (
            ObservationSeries {
                observations: head.to_vec(),
            },
            ObservationSeries {
                observations: tail.to_vec(),
            },
        )
    }

    /// Mean count, or `None` for an empty series
    pub fn mean(&self) -> Option<f64> {
        forecast_math::stats::mean(&self.values()).ok()
    }
}

/// Validate raw rows and format them into an ordered series.
///
/// Every row must carry a parseable date and a non-negative integer count;
/// the first offending row aborts formatting with
/// [`ForecastError::MalformedInput`].
pub fn format_observations(rows: &[RawObservation]) -> Result<ObservationSeries> {
    let mut observations = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let period = row
            .date
            .as_ref()
            .ok_or_else(|| ForecastError::MalformedInput(format!("Row {} has no date", index)))?
            .to_naive_date()
            .ok_or_else(|| {
                ForecastError::MalformedInput(format!(
                    "Row {} has an unparseable date: {:?}",
                    index, row.date
                ))
            })?;

        let count = row
            .count
            .as_ref()
            .ok_or_else(|| ForecastError::MalformedInput(format!("Row {} has no count", index)))?
            .to_count()
            .ok_or_else(|| {
                ForecastError::MalformedInput(format!(
                    "Row {} has a count that is not a non-negative integer: {:?}",
                    index, row.count
                ))
            })?;

        observations.push(Observation { period, count });
    }

    ObservationSeries::from_observations(observations)
}
