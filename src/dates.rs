//! Date extraction from free-form strings.
//!
//! Blog content carries dates in every shape imaginable: in frontmatter
//! (`created: 2023-04-05`), in file names (`2023-04-05-hello.md`), in
//! directory layouts (`2023/04/05/hello.md`), or European style
//! (`05.04.2023 notes.html`). Rather than demanding one format, three
//! permissive patterns are matched against the input and their fields merged:
//!
//! | Pattern | Captures |
//! |---------|----------|
//! | `YYYY<sep>M<sep>D` | year, month, day |
//! | `D<sep>M<sep>YYYY` | day, month, year |
//! | `HH:MM:SS` | hour, minute, second |
//!
//! `<sep>` is any run of non-digit characters. Each pattern contributes its
//! first match only; when two patterns capture the same field the later
//! pattern in the table wins. Fields nobody captured default to zero and the
//! result is normalized like a calendar would (month 13 rolls into the next
//! year, day 0 is the last day of the previous month).
//!
//! The same patterns drive [`DatePatterns::remove_dates`], which strips dates
//! from titles and output paths.

use chrono::{DateTime, Months, NaiveDate, TimeDelta, Utc};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DateError {
    #[error("no date found in '{0}'")]
    NoDateFound(String),
    #[error("malformed {field} '{value}' in '{input}'")]
    MalformedNumber {
        field: &'static str,
        value: String,
        input: String,
    },
    #[error("date in '{0}' is out of range")]
    OutOfRange(String),
}

const YEAR_MONTH_DAY: &str = r"(?P<year>\d{4})\D+(?P<month>\d{1,2})\D+(?P<day>\d{1,2})";
const DAY_MONTH_YEAR: &str = r"(?P<day>\d{1,2})\D+(?P<month>\d{1,2})\D+(?P<year>\d{4})";
const TIME_OF_DAY: &str = r"(?P<hour>\d{2}):(?P<min>\d{2}):(?P<sec>\d{2})";

const FIELDS: [&str; 6] = ["year", "month", "day", "hour", "min", "sec"];

/// The compiled date patterns, in priority order (last match wins per field).
///
/// Built once at startup and shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct DatePatterns {
    patterns: [Regex; 3],
}

impl DatePatterns {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: [
                Regex::new(YEAR_MONTH_DAY)?,
                Regex::new(DAY_MONTH_YEAR)?,
                Regex::new(TIME_OF_DAY)?,
            ],
        })
    }

    /// Extract a UTC timestamp from `input`.
    ///
    /// ```text
    /// "2023-04-05"                 → 2023-04-05 00:00:00
    /// "05.04.2023"                 → 2023-04-05 00:00:00
    /// "2023/04/05 notes 10:11:12"  → 2023-04-05 10:11:12
    /// "hello"                      → NoDateFound
    /// ```
    pub fn datetime_from_str(&self, input: &str) -> Result<DateTime<Utc>, DateError> {
        let mut fields: [Option<i64>; 6] = [None; 6];

        for pattern in &self.patterns {
            let Some(caps) = pattern.captures(input) else {
                continue;
            };
            for (slot, name) in fields.iter_mut().zip(FIELDS) {
                if let Some(m) = caps.name(name) {
                    let value =
                        m.as_str()
                            .parse::<i64>()
                            .map_err(|_| DateError::MalformedNumber {
                                field: name,
                                value: m.as_str().to_string(),
                                input: input.to_string(),
                            })?;
                    *slot = Some(value);
                }
            }
        }

        if fields.iter().all(Option::is_none) {
            return Err(DateError::NoDateFound(input.to_string()));
        }

        let [year, month, day, hour, min, sec] = fields.map(|f| f.unwrap_or(0));
        normalize(year, month, day, hour, min, sec)
            .ok_or_else(|| DateError::OutOfRange(input.to_string()))
    }

    /// Remove every date and time occurrence, then trim `-`, `_` and spaces
    /// from both ends.
    ///
    /// ```text
    /// "2023-04-05-hello-world" → "hello-world"
    /// "Release notes 10:00:00" → "Release notes"
    /// ```
    pub fn remove_dates(&self, input: &str) -> String {
        let mut out = input.to_string();
        for pattern in &self.patterns {
            out = pattern.replace_all(&out, "").into_owned();
        }
        out.trim_matches(|c| matches!(c, '-' | '_' | ' ')).to_string()
    }
}

/// Build a timestamp from possibly out-of-range components, rolling overflow
/// into the next larger unit.
fn normalize(year: i64, month: i64, day: i64, hour: i64, min: i64, sec: i64) -> Option<DateTime<Utc>> {
    let year = i32::try_from(year).ok()?;
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;

    let months = month - 1;
    let date = if months >= 0 {
        start.checked_add_months(Months::new(u32::try_from(months).ok()?))?
    } else {
        start.checked_sub_months(Months::new(u32::try_from(-months).ok()?))?
    };

    let offset = TimeDelta::try_days(day - 1)?
        .checked_add(&TimeDelta::try_hours(hour)?)?
        .checked_add(&TimeDelta::try_minutes(min)?)?
        .checked_add(&TimeDelta::try_seconds(sec)?)?;

    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(midnight.checked_add_signed(offset)?.and_utc())
}
