//! Calendar-month rating periods.
//!
//! A period is the secondary cache key component: every snapshot is stored
//! under the first day of the month it belongs to, in UTC.

use std::fmt;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{RookError, RookResult};

/// First-of-month date identifying one rating period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RatingPeriod(NaiveDate);

impl RatingPeriod {
    /// Normalize a calendar date to the period that contains it.
    pub fn containing(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    /// Period containing an instant, evaluated in UTC.
    pub fn containing_instant(instant: DateTime<Utc>) -> Self {
        Self::containing(instant.date_naive())
    }

    /// First day of the period.
    pub fn start(self) -> NaiveDate {
        self.0
    }

    /// The following period, or `None` at the end of chrono's date range.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add_months(Months::new(1)).map(Self)
    }

    /// Every period from `from` to `to` inclusive, ascending.
    ///
    /// Empty when `from` falls in a later month than `to`.
    pub fn expand(from: NaiveDate, to: NaiveDate) -> Vec<Self> {
        let end = Self::containing(to);
        let mut cursor = Some(Self::containing(from));
        let mut periods = Vec::with_capacity(Self::count_between(from, to));

        while let Some(period) = cursor.filter(|p| *p <= end) {
            periods.push(period);
            cursor = period.next();
        }
        periods
    }

    /// Number of periods `expand(from, to)` yields, computed without allocating.
    pub fn count_between(from: NaiveDate, to: NaiveDate) -> usize {
        let index = |d: NaiveDate| i64::from(d.year()) * 12 + i64::from(d.month0());
        let span = index(to) - index(from) + 1;
        usize::try_from(span).unwrap_or(0)
    }
}

impl From<NaiveDate> for RatingPeriod {
    fn from(date: NaiveDate) -> Self {
        Self::containing(date)
    }
}

impl fmt::Display for RatingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for RatingPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RatingPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_request_date(&raw)
            .map(Self::containing)
            .map_err(serde::de::Error::custom)
    }
}

/// Parse a caller-supplied date: `YYYY-MM-DD`, or `YYYY-MM` meaning the 1st.
pub fn parse_request_date(raw: &str) -> RookResult<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d"))
        .map_err(|_| {
            RookError::invalid_input(format!(
                "invalid date {:?}: expected YYYY-MM-DD or YYYY-MM",
                trimmed
            ))
        })
}
