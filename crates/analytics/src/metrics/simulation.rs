//! Minimum-distance threshold simulation
//!
//! Compares trip count, revenue and average duration before and after
//! removing every trip shorter than a threshold. This is a static removal:
//! riders and drivers are assumed not to react.
//!
//! Missing distances count as zero so that `before = after + removed` holds
//! for every threshold.

use serde::Serialize;
use taxi_query::{QueryBackend, QueryResult, Value};

use crate::builder::{CompiledQuery, QueryBuilder, QueryContext};
use crate::dialect::{Dialect, Predicate};
use crate::error::{AnalyticsError, Result};
use crate::metrics::{Trips, check_non_negative};
use crate::presentation::{Assumption, MetricReport, assumptions};
use crate::schema::TripColumn;
use crate::window::AnalysisWindow;

/// Thresholds (miles) used when none are given
pub const DEFAULT_SENSITIVITY_THRESHOLDS: [f64; 4] = [0.5, 1.0, 1.5, 2.0];

const VALID_TRIPS: &str = "valid_trips";

/// Totals on one side of the simulation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSnapshot {
    pub total_trips: i64,
    pub total_revenue: f64,
    /// `None` when there are no trips
    pub avg_duration_minutes: Option<f64>,
}

/// Difference between the before and after snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationImpact {
    pub trips_removed: i64,
    /// `None` when there were no trips to begin with
    pub trips_removed_percentage: Option<f64>,
    /// Revenue after minus revenue before (zero or negative)
    pub revenue_impact: f64,
    /// `None` when revenue before is zero
    pub revenue_impact_percentage: Option<f64>,
    /// Change in average duration, `None` when either side has no trips
    pub avg_duration_change: Option<f64>,
}

/// Result of one threshold simulation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutcome {
    pub threshold_miles: f64,
    pub before: SimulationSnapshot,
    pub after: SimulationSnapshot,
    pub impact: SimulationImpact,
}

impl SimulationOutcome {
    /// Derive the impact from both snapshots
    pub fn new(threshold_miles: f64, before: SimulationSnapshot, after: SimulationSnapshot) -> Self {
        let trips_removed = before.total_trips - after.total_trips;
        let revenue_impact = after.total_revenue - before.total_revenue;
        let avg_duration_change = match (before.avg_duration_minutes, after.avg_duration_minutes) {
            (Some(b), Some(a)) => Some(a - b),
            _ => None,
        };

        let impact = SimulationImpact {
            trips_removed,
            trips_removed_percentage: percentage(trips_removed as f64, before.total_trips as f64),
            revenue_impact,
            revenue_impact_percentage: percentage(revenue_impact, before.total_revenue),
            avg_duration_change,
        };

        Self {
            threshold_miles,
            before,
            after,
            impact,
        }
    }
}

/// One row of the sensitivity table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityPoint {
    pub threshold_miles: f64,
    pub total_trips: i64,
    pub trips_removed: i64,
    pub trips_removed_percentage: Option<f64>,
    pub revenue_before: f64,
    pub revenue_after: f64,
    pub revenue_impact_percentage: Option<f64>,
}

impl From<&SimulationOutcome> for SensitivityPoint {
    fn from(outcome: &SimulationOutcome) -> Self {
        Self {
            threshold_miles: outcome.threshold_miles,
            total_trips: outcome.before.total_trips,
            trips_removed: outcome.impact.trips_removed,
            trips_removed_percentage: outcome.impact.trips_removed_percentage,
            revenue_before: outcome.before.total_revenue,
            revenue_after: outcome.after.total_revenue,
            revenue_impact_percentage: outcome.impact.revenue_impact_percentage,
        }
    }
}

fn percentage(part: f64, whole: f64) -> Option<f64> {
    if whole == 0.0 {
        None
    } else {
        Some(part / whole * 100.0)
    }
}

fn simulation_assumptions() -> Vec<Assumption> {
    assumptions(&[
        (
            "simulation",
            "Static removal - assumes no behavioral changes",
        ),
        ("distance", "Trips with no recorded distance count as zero miles"),
        ("revenue", "Revenue is the sum of total_amount"),
    ])
}

/// Compose the single-pass before/after query
pub(crate) fn build_query(
    dialect: Dialect,
    window: &AnalysisWindow,
    threshold: f64,
) -> Result<CompiledQuery> {
    let threshold = check_non_negative("threshold", threshold)?;
    let mut ctx = QueryContext::new(dialect);
    let trips = Trips::PLAIN;
    let bound = ctx.bind("threshold", threshold);
    let duration = trips.duration(&mut ctx)?;

    let per_trip = trips
        .valid(&mut ctx, window)
        .select_as(
            format!("COALESCE({}, 0)", trips.col(TripColumn::Distance)),
            "distance",
        )
        .select_as(trips.col(TripColumn::Total), "total_amount")
        .select_as(duration, "duration_minutes")
        .build();

    let removed = Predicate::less_than("distance", bound)?;
    let kept = Predicate::at_least("distance", bound)?;
    let trips_removed = ctx.fragment(dialect.conditional_count(&removed));
    let trips_after = ctx.fragment(dialect.conditional_count(&kept));
    let revenue_after = ctx.fragment(dialect.conditional_sum("total_amount", &kept)?);
    let duration_after = ctx.fragment(dialect.conditional_mean("duration_minutes", &kept)?);

    let sql = QueryBuilder::new(VALID_TRIPS)
        .with_cte(VALID_TRIPS, per_trip)
        .select_as("COUNT(*)", "total_trips")
        .select_as("SUM(total_amount)", "total_revenue")
        .select_as("AVG(duration_minutes)", "avg_duration_minutes")
        .select_as(trips_removed, "trips_removed")
        .select_as(trips_after, "trips_after")
        .select_as(revenue_after, "revenue_after")
        .select_as(duration_after, "avg_duration_after")
        .build();

    Ok(ctx.finish(sql))
}

fn cell<'a>(result: &'a QueryResult, name: &str) -> Result<&'a Value> {
    result
        .get(0, name)
        .ok_or_else(|| AnalyticsError::MissingColumn(name.to_string()))
}

fn count(result: &QueryResult, name: &str) -> Result<i64> {
    Ok(cell(result, name)?.as_i64().unwrap_or(0))
}

fn amount(result: &QueryResult, name: &str) -> Result<f64> {
    Ok(cell(result, name)?.as_f64().unwrap_or(0.0))
}

fn mean(result: &QueryResult, name: &str) -> Result<Option<f64>> {
    Ok(cell(result, name)?.as_f64())
}

/// Turn the single result row into an outcome
pub(crate) fn parse_outcome(threshold: f64, result: &QueryResult) -> Result<SimulationOutcome> {
    if result.is_empty() {
        return Err(taxi_query::QueryError::EmptyResult.into());
    }

    let before = SimulationSnapshot {
        total_trips: count(result, "total_trips")?,
        total_revenue: amount(result, "total_revenue")?,
        avg_duration_minutes: mean(result, "avg_duration_minutes")?,
    };
    let after = SimulationSnapshot {
        total_trips: count(result, "trips_after")?,
        total_revenue: amount(result, "revenue_after")?,
        avg_duration_minutes: mean(result, "avg_duration_after")?,
    };

    Ok(SimulationOutcome::new(threshold, before, after))
}

/// Run the simulation for one threshold
pub async fn simulate(
    backend: &dyn QueryBackend,
    dialect: Dialect,
    window: &AnalysisWindow,
    threshold: f64,
) -> Result<MetricReport<SimulationOutcome>> {
    let compiled = build_query(dialect, window, threshold)?;
    let result = backend.execute(&compiled.statement).await?;
    let outcome = parse_outcome(threshold, &result)?;

    tracing::debug!(
        backend = backend.name(),
        threshold,
        trips_removed = outcome.impact.trips_removed,
        time_ms = result.execution_time_ms,
        "simulation executed"
    );

    Ok(
        MetricReport::new("min_distance_simulation", outcome, simulation_assumptions())
            .with_approximations(&compiled.approximations),
    )
}

/// Run the simulation for each threshold, in the given order
pub async fn sensitivity(
    backend: &dyn QueryBackend,
    dialect: Dialect,
    window: &AnalysisWindow,
    thresholds: &[f64],
) -> Result<MetricReport<Vec<SensitivityPoint>>> {
    if thresholds.is_empty() {
        return Err(AnalyticsError::invalid_parameter(
            "thresholds",
            "at least one threshold is required",
        ));
    }

    let mut points = Vec::with_capacity(thresholds.len());
    for &threshold in thresholds {
        let report = simulate(backend, dialect, window, threshold).await?;
        points.push(SensitivityPoint::from(&report.data));
    }

    Ok(MetricReport::new(
        "min_distance_sensitivity",
        points,
        simulation_assumptions(),
    ))
}
