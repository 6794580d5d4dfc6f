//! Since-expression resolver
//!
//! Turns the `--since` argument into an absolute timestamp relative to a
//! caller-supplied "now". Accepted forms:
//!
//! - absolute: anything a `startDate` attribute accepts (`2010-01-31`,
//!   `2010-01-31T08:00:00`, `2010-01-31 08:00`), plus `2010/01/31`
//! - `now`, `today`, `yesterday`
//! - `this week|month|year` (start of the current period, weeks start Monday)
//! - `last week|month|year`, `last N <unit>`, `N <unit> ago`, `a <unit> ago`
//!
//! Units are seconds, minutes, hours, days, weeks, months and years, in
//! singular, plural or short (`sec`, `min`, `hr`) form. Hyphens may stand in
//! for spaces in relative forms (`last-7-days`).

use crate::index::parse_timestamp;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinceError {
    #[error("Empty time expression")]
    Empty,

    #[error("Cannot understand time expression '{0}'")]
    Unrecognized(String),

    #[error("Time expression '{0}' is out of range")]
    OutOfRange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn parse(word: &str) -> Option<Self> {
        let unit = match word {
            "s" | "sec" | "secs" | "second" | "seconds" => Self::Second,
            "min" | "mins" | "minute" | "minutes" => Self::Minute,
            "h" | "hr" | "hrs" | "hour" | "hours" => Self::Hour,
            "d" | "day" | "days" => Self::Day,
            "w" | "wk" | "wks" | "week" | "weeks" => Self::Week,
            "mo" | "month" | "months" => Self::Month,
            "y" | "yr" | "yrs" | "year" | "years" => Self::Year,
            _ => return None,
        };
        Some(unit)
    }

    /// `now` moved back by `count` units, calendar-aware for months and years
    fn back(self, now: NaiveDateTime, count: u32) -> Option<NaiveDateTime> {
        let count64 = i64::from(count);
        match self {
            Self::Second => now.checked_sub_signed(Duration::try_seconds(count64)?),
            Self::Minute => now.checked_sub_signed(Duration::try_minutes(count64)?),
            Self::Hour => now.checked_sub_signed(Duration::try_hours(count64)?),
            Self::Day => now.checked_sub_signed(Duration::try_days(count64)?),
            Self::Week => now.checked_sub_signed(Duration::try_weeks(count64)?),
            Self::Month => now.checked_sub_months(Months::new(count)),
            Self::Year => now.checked_sub_months(Months::new(count.checked_mul(12)?)),
        }
    }
}

/// Resolve `expr` against `now`
///
/// # Errors
///
/// Returns `SinceError::Empty` for a blank expression,
/// `SinceError::Unrecognized` for anything outside the grammar above, and
/// `SinceError::OutOfRange` when the result does not fit a timestamp.
pub fn resolve_since(expr: &str, now: NaiveDateTime) -> Result<NaiveDateTime, SinceError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(SinceError::Empty);
    }

    if let Some(absolute) = parse_timestamp(trimmed) {
        return Ok(absolute);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y/%m/%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }

    let lowered = trimmed.to_lowercase().replace('-', " ");
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let out_of_range = || SinceError::OutOfRange(expr.to_string());
    let unrecognized = || SinceError::Unrecognized(expr.to_string());
    let today = now.date().and_time(chrono::NaiveTime::MIN);

    match words.as_slice() {
        ["now"] => Ok(now),
        ["today"] => Ok(today),
        ["yesterday"] => today
            .checked_sub_signed(Duration::days(1))
            .ok_or_else(out_of_range),
        ["this", period] => match Unit::parse(period) {
            Some(Unit::Day) => Ok(today),
            Some(Unit::Week) => {
                let offset = i64::from(now.weekday().num_days_from_monday());
                today
                    .checked_sub_signed(Duration::days(offset))
                    .ok_or_else(out_of_range)
            }
            Some(Unit::Month) => now
                .date()
                .with_day(1)
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
                .ok_or_else(out_of_range),
            Some(Unit::Year) => NaiveDate::from_ymd_opt(now.year(), 1, 1)
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
                .ok_or_else(out_of_range),
            _ => Err(unrecognized()),
        },
        ["last", unit] => {
            let unit = Unit::parse(unit).ok_or_else(unrecognized)?;
            unit.back(now, 1).ok_or_else(out_of_range)
        }
        ["last", count, unit] | [count, unit, "ago"] => {
            let count = parse_count(count).ok_or_else(unrecognized)?;
            let unit = Unit::parse(unit).ok_or_else(unrecognized)?;
            unit.back(now, count).ok_or_else(out_of_range)
        }
        _ => Err(unrecognized()),
    }
}

fn parse_count(word: &str) -> Option<u32> {
    match word {
        "a" | "an" | "one" => Some(1),
        _ => word.parse().ok(),
    }
}
