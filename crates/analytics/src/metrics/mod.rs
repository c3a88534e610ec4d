//! Metrics engine for trip analytics
//!
//! Metrics are organized by analytical family:
//!
//! - **zones**: revenue, net profit, negative zones, zone lookup
//! - **congestion**: congestion index, throughput, short-trip impact
//! - **efficiency**: hourly time series, weekday × hour heatmap, demand correlation
//! - **surge**: surge events, surge zones, surge/revenue correlation
//! - **wait_time**: demand/supply proxy per zone-hour
//! - **incentives**: driver incentives, system efficiency, misalignment
//! - **variability**: duration CV heatmap, distribution, trends
//! - **simulation**: minimum-distance what-if and sensitivity
//! - **overview**: headline totals

pub mod congestion;
pub mod efficiency;
pub mod incentives;
pub mod overview;
pub mod simulation;
pub mod surge;
pub mod variability;
pub mod wait_time;
pub mod zones;

// Re-exports for convenience
pub use congestion::{CongestionZonesMetric, ShortTripImpactMetric, ThroughputMetric};
pub use efficiency::{DemandCorrelationMetric, EfficiencyHeatmapMetric, EfficiencyTimeseriesMetric};
pub use incentives::{DriverIncentivesMetric, MisalignmentMetric, SystemEfficiencyMetric};
pub use overview::Overview;
pub use simulation::{
    DEFAULT_SENSITIVITY_THRESHOLDS, SensitivityPoint, SimulationImpact, SimulationOutcome,
    SimulationSnapshot,
};
pub use surge::{SurgeCorrelationMetric, SurgeEventsMetric, SurgeZonesMetric};
pub use variability::{DurationDistributionMetric, VariabilityHeatmapMetric, VariabilityTrendsMetric};
pub use wait_time::WaitTimeMetric;
pub use zones::{NegativeZonesMetric, NetProfitMetric, ZoneLookupMetric, ZoneRevenueMetric};

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use taxi_query::{CapabilityProfile, QueryBackend, QueryResult};

use crate::builder::{CompiledQuery, QueryBuilder, QueryContext};
use crate::dialect::Dialect;
use crate::error::{AnalyticsError, Result};
use crate::presentation::{Assumption, MetricReport};
use crate::schema::{TRIPS, TripColumn};
use crate::window::AnalysisWindow;

/// Maximum allowed limit for metric results
pub const MAX_LIMIT: u32 = 10_000;

/// A tabular metric that can be executed against a query backend
#[async_trait]
pub trait Metric: Send + Sync {
    /// Get the metric name for logging/identification
    fn name(&self) -> &'static str;

    /// Fixed assumptions and limitations of this metric
    fn assumptions(&self) -> Vec<Assumption>;

    /// Compose the query for a dialect and window
    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery>;

    /// Execute this metric and return the annotated table
    async fn execute(
        &self,
        backend: &dyn QueryBackend,
        dialect: Dialect,
        window: &AnalysisWindow,
    ) -> Result<MetricReport<QueryResult>> {
        let compiled = self.build(dialect, window)?;
        let result = backend.execute(&compiled.statement).await?;

        tracing::debug!(
            metric = self.name(),
            backend = backend.name(),
            profile = %dialect.profile(),
            rows = result.row_count,
            time_ms = result.execution_time_ms,
            approximate = !compiled.is_exact(),
            "metric executed"
        );

        Ok(MetricReport::new(self.name(), result, self.assumptions())
            .with_approximations(&compiled.approximations))
    }
}

/// Metrics engine for executing analytics queries
///
/// Holds the shared pool-backed backend and the dialect chosen at startup.
#[derive(Clone)]
pub struct MetricsEngine {
    backend: Arc<dyn QueryBackend>,
    dialect: Dialect,
}

impl MetricsEngine {
    /// Create a new metrics engine for a backend running under `profile`
    pub fn new(backend: Arc<dyn QueryBackend>, profile: CapabilityProfile) -> Self {
        if backend.profile() != profile {
            tracing::warn!(
                backend = backend.name(),
                backend_profile = %backend.profile(),
                profile = %profile,
                "configured profile differs from backend profile"
            );
        }
        Self {
            backend,
            dialect: Dialect::new(profile),
        }
    }

    /// Get a reference to the underlying query backend
    pub fn backend(&self) -> &dyn QueryBackend {
        self.backend.as_ref()
    }

    /// Dialect used for every query
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Execute a metric query
    pub async fn execute(
        &self,
        metric: &dyn Metric,
        window: &AnalysisWindow,
    ) -> Result<MetricReport<QueryResult>> {
        metric
            .execute(self.backend.as_ref(), self.dialect, window)
            .await
    }

    // Zones

    /// Top zones by fare revenue
    pub async fn zone_revenue(
        &self,
        window: &AnalysisWindow,
        limit: u32,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&ZoneRevenueMetric::new(limit), window).await
    }

    /// Net profit per zone after the idle-time cost proxy
    pub async fn net_profit(
        &self,
        window: &AnalysisWindow,
        idle_cost_per_hour: f64,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&NetProfitMetric::new(idle_cost_per_hour), window)
            .await
    }

    /// Zones whose net profit is negative
    pub async fn negative_zones(
        &self,
        window: &AnalysisWindow,
        idle_cost_per_hour: f64,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&NegativeZonesMetric::new(idle_cost_per_hour), window)
            .await
    }

    /// Zone reference rows
    pub async fn zones(&self) -> Result<MetricReport<QueryResult>> {
        self.execute(&ZoneLookupMetric, &AnalysisWindow::default())
            .await
    }

    // Congestion

    /// Congestion index per zone
    pub async fn congestion_zones(
        &self,
        window: &AnalysisWindow,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&CongestionZonesMetric, window).await
    }

    /// Trips per active hour per zone
    pub async fn throughput(&self, window: &AnalysisWindow) -> Result<MetricReport<QueryResult>> {
        self.execute(&ThroughputMetric, window).await
    }

    /// Share of short trips per zone
    pub async fn short_trip_impact(
        &self,
        window: &AnalysisWindow,
        threshold: f64,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&ShortTripImpactMetric::new(threshold), window)
            .await
    }

    // Efficiency

    /// Hourly efficiency time series
    pub async fn efficiency_timeseries(
        &self,
        window: &AnalysisWindow,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&EfficiencyTimeseriesMetric, window).await
    }

    /// Efficiency by weekday and hour
    pub async fn efficiency_heatmap(
        &self,
        window: &AnalysisWindow,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&EfficiencyHeatmapMetric, window).await
    }

    /// Demand against efficiency per hour
    pub async fn demand_correlation(
        &self,
        window: &AnalysisWindow,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&DemandCorrelationMetric, window).await
    }

    // Surge

    /// Individual surge trips
    pub async fn surge_events(
        &self,
        window: &AnalysisWindow,
        threshold: f64,
        limit: u32,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&SurgeEventsMetric::new(threshold, limit), window)
            .await
    }

    /// Surge share per zone
    pub async fn surge_zones(
        &self,
        window: &AnalysisWindow,
        threshold: f64,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&SurgeZonesMetric::new(threshold), window).await
    }

    /// Daily surge frequency against daily revenue per zone
    pub async fn surge_correlation(
        &self,
        window: &AnalysisWindow,
        threshold: f64,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&SurgeCorrelationMetric::new(threshold), window)
            .await
    }

    // Wait time

    /// Demand/supply proxy per zone-hour
    pub async fn wait_time(
        &self,
        window: &AnalysisWindow,
        limit: u32,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&WaitTimeMetric::new(limit), window).await
    }

    // Incentives

    /// Driver incentive score per zone-hour
    pub async fn driver_incentives(
        &self,
        window: &AnalysisWindow,
        limit: u32,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&DriverIncentivesMetric::new(limit), window)
            .await
    }

    /// System efficiency score per zone-hour
    pub async fn system_efficiency(
        &self,
        window: &AnalysisWindow,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&SystemEfficiencyMetric, window).await
    }

    /// Zone-hours where driver and system incentives diverge
    pub async fn incentive_misalignment(
        &self,
        window: &AnalysisWindow,
        limit: u32,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&MisalignmentMetric::new(limit), window).await
    }

    // Variability

    /// Duration CV by hour and distance bin
    pub async fn variability_heatmap(
        &self,
        window: &AnalysisWindow,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&VariabilityHeatmapMetric, window).await
    }

    /// Duration distribution by hour
    pub async fn duration_distribution(
        &self,
        window: &AnalysisWindow,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&DurationDistributionMetric, window).await
    }

    /// Duration CV by date and hour
    pub async fn variability_trends(
        &self,
        window: &AnalysisWindow,
    ) -> Result<MetricReport<QueryResult>> {
        self.execute(&VariabilityTrendsMetric, window).await
    }

    // Simulation

    /// Remove trips below a distance threshold and compare totals
    pub async fn simulate_min_distance(
        &self,
        window: &AnalysisWindow,
        threshold: f64,
    ) -> Result<MetricReport<SimulationOutcome>> {
        simulation::simulate(self.backend.as_ref(), self.dialect, window, threshold).await
    }

    /// Repeat the simulation over several thresholds
    pub async fn sensitivity(
        &self,
        window: &AnalysisWindow,
        thresholds: &[f64],
    ) -> Result<MetricReport<Vec<SensitivityPoint>>> {
        simulation::sensitivity(self.backend.as_ref(), self.dialect, window, thresholds).await
    }

    // Overview

    /// Headline totals for the window
    pub async fn overview(&self, window: &AnalysisWindow) -> Result<MetricReport<Overview>> {
        overview::overview(self.backend.as_ref(), self.dialect, window).await
    }
}

/// Tabular metric selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    ZoneRevenue,
    NetProfit,
    NegativeZones,
    Zones,
    Congestion,
    Throughput,
    ShortTrips,
    EfficiencyTimeseries,
    EfficiencyHeatmap,
    DemandCorrelation,
    SurgeEvents,
    SurgeZones,
    SurgeCorrelation,
    WaitTime,
    DriverIncentives,
    SystemEfficiency,
    Misalignment,
    VariabilityHeatmap,
    DurationDistribution,
    VariabilityTrends,
}

impl MetricKind {
    /// Every tabular metric
    pub const ALL: [MetricKind; 20] = [
        Self::ZoneRevenue,
        Self::NetProfit,
        Self::NegativeZones,
        Self::Zones,
        Self::Congestion,
        Self::Throughput,
        Self::ShortTrips,
        Self::EfficiencyTimeseries,
        Self::EfficiencyHeatmap,
        Self::DemandCorrelation,
        Self::SurgeEvents,
        Self::SurgeZones,
        Self::SurgeCorrelation,
        Self::WaitTime,
        Self::DriverIncentives,
        Self::SystemEfficiency,
        Self::Misalignment,
        Self::VariabilityHeatmap,
        Self::DurationDistribution,
        Self::VariabilityTrends,
    ];

    /// Command-line name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZoneRevenue => "zone-revenue",
            Self::NetProfit => "net-profit",
            Self::NegativeZones => "negative-zones",
            Self::Zones => "zones",
            Self::Congestion => "congestion",
            Self::Throughput => "throughput",
            Self::ShortTrips => "short-trips",
            Self::EfficiencyTimeseries => "efficiency-timeseries",
            Self::EfficiencyHeatmap => "efficiency-heatmap",
            Self::DemandCorrelation => "demand-correlation",
            Self::SurgeEvents => "surge-events",
            Self::SurgeZones => "surge-zones",
            Self::SurgeCorrelation => "surge-correlation",
            Self::WaitTime => "wait-time",
            Self::DriverIncentives => "driver-incentives",
            Self::SystemEfficiency => "system-efficiency",
            Self::Misalignment => "misalignment",
            Self::VariabilityHeatmap => "variability-heatmap",
            Self::DurationDistribution => "duration-distribution",
            Self::VariabilityTrends => "variability-trends",
        }
    }

    /// Default row limit for metrics that take one
    pub fn default_limit(&self) -> Option<u32> {
        match self {
            Self::ZoneRevenue => Some(zones::DEFAULT_LIMIT),
            Self::SurgeEvents => Some(surge::DEFAULT_EVENT_LIMIT),
            Self::WaitTime => Some(wait_time::DEFAULT_LIMIT),
            Self::DriverIncentives => Some(incentives::DEFAULT_DRIVER_LIMIT),
            Self::Misalignment => Some(incentives::DEFAULT_MISALIGNMENT_LIMIT),
            _ => None,
        }
    }

    /// Build the metric with the given parameters
    pub fn metric(&self, params: &MetricParams) -> Box<dyn Metric> {
        let limit = params
            .limit
            .or(self.default_limit())
            .unwrap_or(MAX_LIMIT);
        match self {
            Self::ZoneRevenue => Box::new(ZoneRevenueMetric::new(limit)),
            Self::NetProfit => Box::new(NetProfitMetric::new(params.idle_cost_per_hour)),
            Self::NegativeZones => Box::new(NegativeZonesMetric::new(params.idle_cost_per_hour)),
            Self::Zones => Box::new(ZoneLookupMetric),
            Self::Congestion => Box::new(CongestionZonesMetric),
            Self::Throughput => Box::new(ThroughputMetric),
            Self::ShortTrips => Box::new(ShortTripImpactMetric::new(params.short_trip_threshold)),
            Self::EfficiencyTimeseries => Box::new(EfficiencyTimeseriesMetric),
            Self::EfficiencyHeatmap => Box::new(EfficiencyHeatmapMetric),
            Self::DemandCorrelation => Box::new(DemandCorrelationMetric),
            Self::SurgeEvents => Box::new(SurgeEventsMetric::new(params.surge_threshold, limit)),
            Self::SurgeZones => Box::new(SurgeZonesMetric::new(params.surge_threshold)),
            Self::SurgeCorrelation => Box::new(SurgeCorrelationMetric::new(params.surge_threshold)),
            Self::WaitTime => Box::new(WaitTimeMetric::new(limit)),
            Self::DriverIncentives => Box::new(DriverIncentivesMetric::new(limit)),
            Self::SystemEfficiency => Box::new(SystemEfficiencyMetric),
            Self::Misalignment => Box::new(MisalignmentMetric::new(limit)),
            Self::VariabilityHeatmap => Box::new(VariabilityHeatmapMetric),
            Self::DurationDistribution => Box::new(DurationDistributionMetric),
            Self::VariabilityTrends => Box::new(VariabilityTrendsMetric),
        }
    }
}

impl FromStr for MetricKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| AnalyticsError::UnknownMetric(s.to_string()))
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied metric parameters
#[derive(Debug, Clone, PartialEq)]
pub struct MetricParams {
    /// Row limit override (each metric has its own default)
    pub limit: Option<u32>,
    /// Miles below which a trip counts as short
    pub short_trip_threshold: f64,
    /// Relative fare margin above baseline that marks a surge
    pub surge_threshold: f64,
    /// Cost of one idle vehicle-hour
    pub idle_cost_per_hour: f64,
}

impl Default for MetricParams {
    fn default() -> Self {
        Self {
            limit: None,
            short_trip_threshold: congestion::DEFAULT_SHORT_TRIP_THRESHOLD,
            surge_threshold: surge::DEFAULT_SURGE_THRESHOLD,
            idle_cost_per_hour: zones::DEFAULT_IDLE_COST_PER_HOUR,
        }
    }
}

/// Trip table reference, optionally aliased
#[derive(Debug, Clone, Copy)]
pub(crate) struct Trips {
    alias: Option<&'static str>,
}

impl Trips {
    /// `FROM trips`
    pub(crate) const PLAIN: Trips = Trips { alias: None };

    /// `FROM trips t`
    pub(crate) const ALIASED: Trips = Trips { alias: Some("t") };

    /// Column reference, qualified when aliased
    pub(crate) fn col(&self, column: TripColumn) -> String {
        match self.alias {
            Some(alias) => column.qualified(alias),
            None => column.as_str().to_string(),
        }
    }

    /// Builder reading from the trip table
    pub(crate) fn builder(&self) -> QueryBuilder {
        match self.alias {
            Some(alias) => QueryBuilder::aliased(TRIPS, alias),
            None => QueryBuilder::new(TRIPS),
        }
    }

    /// Builder over valid trips: pickup inside the window, dropoff after pickup
    pub(crate) fn valid(&self, ctx: &mut QueryContext, window: &AnalysisWindow) -> QueryBuilder {
        let in_window = window.clause(ctx, &self.col(TripColumn::PickupAt));
        self.builder()
            .where_clause(in_window)
            .where_clause(self.positive_duration())
    }

    /// `dropoff > pickup`
    pub(crate) fn positive_duration(&self) -> String {
        format!(
            "{} > {}",
            self.col(TripColumn::DropoffAt),
            self.col(TripColumn::PickupAt)
        )
    }

    /// Trip duration in minutes
    pub(crate) fn duration(&self, ctx: &mut QueryContext) -> Result<String> {
        let fragment = ctx.dialect().duration_minutes(
            &self.col(TripColumn::PickupAt),
            &self.col(TripColumn::DropoffAt),
        )?;
        Ok(ctx.fragment(fragment))
    }
}

/// Validate a row limit and bind it
pub(crate) fn bind_limit(ctx: &mut QueryContext, limit: u32) -> Result<taxi_query::Placeholder> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(AnalyticsError::invalid_parameter(
            "limit",
            format!("must be between 1 and {}", MAX_LIMIT),
        ));
    }
    Ok(ctx.bind("limit", i64::from(limit)))
}

/// Validate a non-negative finite value
pub(crate) fn check_non_negative(name: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(AnalyticsError::invalid_parameter(
            name,
            format!("must be a non-negative number, got {}", value),
        ));
    }
    Ok(value)
}
