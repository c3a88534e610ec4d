//! Taxi Analytics Engine
//!
//! Trip metrics that run unchanged against either trip store.
//!
//! # Overview
//!
//! This crate provides the analytics layer on top of `taxi-query`:
//!
//! - **Dialect**: SQL primitives (durations, hour buckets, medians,
//!   conditional aggregates) rendered for the active capability profile
//! - **Query Builder**: composes primitives into parameterised statements
//! - **Metrics**: revenue, efficiency, surge, wait time, congestion,
//!   incentives, variability and threshold simulation
//! - **Presentation**: assumptions and approximation labels per result
//!
//! # Usage
//!
//! ```ignore
//! use taxi_analytics::{AnalysisWindow, MetricsEngine};
//!
//! let engine = MetricsEngine::new(backend, CapabilityProfile::Reduced);
//! let window = AnalysisWindow::parse("2025-01-01", "2025-02-01")?;
//!
//! let report = engine.congestion_zones(&window).await?;
//! for assumption in &report.assumptions {
//!     println!("{}: {}", assumption.key, assumption.text);
//! }
//! ```
//!
//! # Approximations
//!
//! On the reduced profile, medians and percentiles fall back to the mean.
//! Every such fallback is reported as an `approximation` assumption on the
//! result; the full profile never approximates.

pub mod builder;
pub mod dialect;
pub mod error;
pub mod metrics;
pub mod presentation;
pub mod schema;
pub mod window;

#[cfg(test)]
mod builder_test;

// Re-exports for convenience
pub use builder::{CompiledQuery, JoinKind, QueryBuilder, QueryContext};
pub use dialect::{Approximation, Dialect, Fragment, Predicate, validate_operand};
pub use error::{AnalyticsError, Result};
pub use metrics::{
    CongestionZonesMetric, DemandCorrelationMetric, DriverIncentivesMetric,
    DurationDistributionMetric, EfficiencyHeatmapMetric, EfficiencyTimeseriesMetric, MAX_LIMIT,
    Metric, MetricKind, MetricParams, MetricsEngine, MisalignmentMetric, NegativeZonesMetric,
    NetProfitMetric, Overview, SensitivityPoint, ShortTripImpactMetric, SimulationImpact,
    SimulationOutcome, SimulationSnapshot, SurgeCorrelationMetric, SurgeEventsMetric,
    SurgeZonesMetric, SystemEfficiencyMetric, ThroughputMetric, VariabilityHeatmapMetric,
    VariabilityTrendsMetric, WaitTimeMetric, ZoneLookupMetric, ZoneRevenueMetric,
    DEFAULT_SENSITIVITY_THRESHOLDS,
};
pub use presentation::{Assumption, MetricReport};
pub use schema::{TripColumn, ZoneColumn};
pub use window::AnalysisWindow;
