//! Date windows for seasonal compositing

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A seasonal window within one year, e.g. `2019, "04-15", "06-15"`.
///
/// The interval is half-open: `[year-start, year-end)`, matching how scene
/// catalogs filter acquisition dates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WindowFields", into = "WindowFields")]
pub struct DateWindow {
    year: i32,
    start_md: String,
    end_md: String,
    start: NaiveDate,
    end: NaiveDate,
}

/// Serialized form of a [`DateWindow`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WindowFields {
    year: i32,
    start: String,
    end: String,
}

impl DateWindow {
    /// Build a window from a year and two `MM-DD` day strings.
    pub fn new(year: i32, start: &str, end: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidDateWindow {
            year,
            start: start.to_string(),
            end: end.to_string(),
            reason,
        };

        let start_date = parse_month_day(year, start).map_err(&invalid)?;
        let end_date = parse_month_day(year, end).map_err(&invalid)?;
        if end_date < start_date {
            return Err(invalid("end is before start".into()));
        }

        Ok(Self {
            year,
            start_md: start.to_string(),
            end_md: end.to_string(),
            start: start_date,
            end: end_date,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end
    }

    /// Inclusive start instant (midnight UTC)
    pub fn start(&self) -> DateTime<Utc> {
        midnight_utc(self.start)
    }

    /// Exclusive end instant (midnight UTC)
    pub fn end(&self) -> DateTime<Utc> {
        midnight_utc(self.end)
    }

    /// Whether an acquisition time falls inside the window
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start() && t < self.end()
    }

    /// RFC 3339 interval string for STAC `datetime` search
    pub fn stac_interval(&self) -> String {
        format!(
            "{}/{}",
            self.start().format("%Y-%m-%dT%H:%M:%SZ"),
            self.end().format("%Y-%m-%dT%H:%M:%SZ")
        )
    }

    /// Require `before` to end no later than `after` starts.
    pub fn ensure_ordered(before: &DateWindow, after: &DateWindow) -> Result<()> {
        if before.end > after.start {
            return Err(Error::WindowOrder {
                before_end: before.end.to_string(),
                after_start: after.start.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl TryFrom<WindowFields> for DateWindow {
    type Error = Error;

    fn try_from(fields: WindowFields) -> Result<Self> {
        DateWindow::new(fields.year, &fields.start, &fields.end)
    }
}

impl From<DateWindow> for WindowFields {
    fn from(w: DateWindow) -> Self {
        Self {
            year: w.year,
            start: w.start_md,
            end: w.end_md,
        }
    }
}

fn parse_month_day(year: i32, md: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{year}-{}", md.trim()), "%Y-%m-%d")
        .map_err(|e| format!("'{md}' is not a valid MM-DD day: {e}"))
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}
