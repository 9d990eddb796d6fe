//! Half-open time intervals `[start, end)` over UTC instants.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Half-open time range `[start, end)`.
///
/// Ordering is by start, then end. Serialized as `"start/end"` with ISO-8601
/// instants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Interval {
    /// Creates an interval, rejecting `end < start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if end < start {
            return Err(CoreError::ValidationError(format!(
                "interval end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Builds `[end - period, end)`.
    pub fn with_period_ending(end: DateTime<Utc>, period: Duration) -> CoreResult<Self> {
        Self::new(end - period, end)
    }

    /// Builds `[start, start + period)`.
    pub fn with_period_starting(start: DateTime<Utc>, period: Duration) -> CoreResult<Self> {
        Self::new(start, start + period)
    }

    /// Parses `"start/end"`.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let (start, end) = text.split_once('/').ok_or_else(|| {
            CoreError::ValidationError(format!("interval `{}` is not of the form start/end", text))
        })?;
        Self::new(parse_instant(start)?, parse_instant(end)?)
    }

    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when the two ranges share at least one instant.
    #[must_use]
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    #[must_use]
    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// True when the ranges touch without overlapping.
    #[must_use]
    pub fn abuts(&self, other: &Interval) -> bool {
        self.end == other.start || other.end == self.start
    }

    /// Smallest interval covering every input, `None` for no input.
    pub fn umbrella<'a>(intervals: impl IntoIterator<Item = &'a Interval>) -> Option<Interval> {
        intervals.into_iter().fold(None, |acc: Option<Interval>, next| {
            Some(match acc {
                None => *next,
                Some(acc) => Interval {
                    start: acc.start.min(next.start),
                    end: acc.end.max(next.end),
                },
            })
        })
    }

    /// Merges overlapping or abutting intervals, returning the covered
    /// sub-ranges sorted by start.
    pub fn condense<'a>(intervals: impl IntoIterator<Item = &'a Interval>) -> Vec<Interval> {
        let mut sorted: Vec<Interval> = intervals.into_iter().copied().collect();
        sorted.sort();

        let mut condensed: Vec<Interval> = Vec::with_capacity(sorted.len());
        for interval in sorted {
            match condensed.last_mut() {
                Some(last) if interval.start <= last.end => {
                    last.end = last.end.max(interval.end);
                }
                _ => condensed.push(interval),
            }
        }
        condensed
    }
}

/// Parses an RFC 3339 instant, or a naive date-time / date taken as UTC.
pub fn parse_instant(text: &str) -> CoreResult<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(CoreError::ValidationError(format!(
        "`{}` is not a recognised instant",
        text
    )))
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.start.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

impl FromStr for Interval {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Interval {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}
