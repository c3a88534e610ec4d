//! Analysis window
//!
//! Every metric is evaluated over a half-open pickup window
//! `[start, end)`. Both bounds are bound parameters.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use taxi_query::Placeholder;

use crate::builder::QueryContext;
use crate::error::{AnalyticsError, Result};

/// Half-open pickup window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisWindow {
    /// Start (inclusive)
    #[serde(serialize_with = "serialize_ts")]
    pub start: NaiveDateTime,
    /// End (exclusive)
    #[serde(serialize_with = "serialize_ts")]
    pub end: NaiveDateTime,
}

impl AnalysisWindow {
    /// Create a window; `end` must be after `start`
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end <= start {
            return Err(AnalyticsError::InvalidWindow(format!(
                "end {} must be after start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Window from midnight of `start` to midnight of `end`
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::new(start.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN))
    }

    /// Parse bounds given as `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_bound(start)?, parse_bound(end)?)
    }

    /// Length of the window
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether a pickup time falls inside the window
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts < self.end
    }

    /// Bind both bounds, returning `(start, end)` placeholders
    ///
    /// Repeated calls within one query reuse the same placeholders.
    pub fn bind(&self, ctx: &mut QueryContext) -> (Placeholder, Placeholder) {
        let start = ctx.bind("window_start", self.start);
        let end = ctx.bind("window_end", self.end);
        (start, end)
    }

    /// `column >= $start AND column < $end`
    pub fn clause(&self, ctx: &mut QueryContext, column: &str) -> String {
        let (start, end) = self.bind(ctx);
        format!("{} >= {} AND {} < {}", column, start, column, end)
    }
}

const DEFAULT_START: NaiveDate = ymd(2025, 1, 1);
const DEFAULT_END: NaiveDate = ymd(2025, 2, 1);

const fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date,
        None => panic!("invalid default window date"),
    }
}

impl Default for AnalysisWindow {
    /// January 2025
    fn default() -> Self {
        Self {
            start: DEFAULT_START.and_time(NaiveTime::MIN),
            end: DEFAULT_END.and_time(NaiveTime::MIN),
        }
    }
}

impl std::fmt::Display for AnalysisWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

fn parse_bound(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| AnalyticsError::InvalidWindow(format!("invalid date: {}", s)))
}

fn serialize_ts<S: serde::Serializer>(
    ts: &NaiveDateTime,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&ts.format(taxi_query::TIMESTAMP_FORMAT))
}
