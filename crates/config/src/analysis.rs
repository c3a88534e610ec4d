//! Analysis configuration
//!
//! Default window and metric parameters used when the command line does not
//! override them.

use chrono::NaiveDate;
use serde::Deserialize;

/// Analysis configuration
///
/// # Example
///
/// ```toml
/// [analysis]
/// window_start = "2025-01-01"
/// window_end = "2025-02-01"
/// short_trip_threshold = 1.0
/// surge_threshold = 0.2
/// idle_cost_per_hour = 30.0
/// limit = 20
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// First day of the analysis window (inclusive)
    pub window_start: NaiveDate,

    /// Day after the analysis window (exclusive)
    pub window_end: NaiveDate,

    /// Distance in miles below which a trip counts as short
    pub short_trip_threshold: f64,

    /// Relative fare excess over the zone baseline that marks a surge
    pub surge_threshold: f64,

    /// Idle cost per hour of trip time, in dollars
    pub idle_cost_per_hour: f64,

    /// Row limit for ranked metrics. Each metric has its own default when unset.
    pub limit: Option<u32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_start: ymd(2025, 1, 1),
            window_end: ymd(2025, 2, 1),
            short_trip_threshold: 1.0,
            surge_threshold: 0.2,
            idle_cost_per_hour: 30.0,
            limit: None,
        }
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}
