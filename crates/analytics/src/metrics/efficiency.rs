//! Fleet efficiency over time
//!
//! Efficiency is revenue per vehicle-hour spent carrying passengers:
//! `SUM(total_amount) / (trips × avg duration / 60)`.

use crate::builder::{CompiledQuery, QueryContext};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::metrics::{Metric, Trips};
use crate::presentation::{Assumption, assumptions};
use crate::schema::{DEMAND_CORRELATION_MIN_EXCLUSIVE, TripColumn};
use crate::window::AnalysisWindow;

fn efficiency_assumptions() -> Vec<Assumption> {
    assumptions(&[
        (
            "efficiency",
            "Revenue per occupied vehicle-hour: total_amount / (trips × average duration)",
        ),
        ("idle_time", "Idle time between trips is not observed"),
    ])
}

/// Shared expressions for the efficiency queries
struct Efficiency {
    avg_duration: String,
    efficiency: String,
    revenue: String,
}

impl Efficiency {
    fn new(ctx: &mut QueryContext, trips: Trips) -> Result<Self> {
        let dialect = ctx.dialect();
        let duration = trips.duration(ctx)?;
        let avg_duration = format!("AVG({})", duration);
        let revenue = format!("SUM({})", trips.col(TripColumn::Total));
        let efficiency = dialect.ratio(&revenue, format!("COUNT(*) * {} / 60.0", avg_duration));
        Ok(Self {
            avg_duration,
            efficiency,
            revenue,
        })
    }
}

/// Hourly efficiency time series
#[derive(Debug, Clone, Copy, Default)]
pub struct EfficiencyTimeseriesMetric;

impl Metric for EfficiencyTimeseriesMetric {
    fn name(&self) -> &'static str {
        "efficiency_timeseries"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        efficiency_assumptions()
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let trips = Trips::PLAIN;
        let hour = ctx.fragment(dialect.hour_bucket(&trips.col(TripColumn::PickupAt))?);
        let exprs = Efficiency::new(&mut ctx, trips)?;

        let sql = trips
            .valid(&mut ctx, window)
            .select_as(hour, "hour")
            .select_as("COUNT(*)", "total_trips")
            .select_as(&exprs.revenue, "total_revenue")
            .select_as(&exprs.avg_duration, "avg_duration_minutes")
            .select_as(&exprs.efficiency, "efficiency")
            .group_by("hour")
            .order_by("hour")
            .build();

        Ok(ctx.finish(sql))
    }
}

/// Efficiency by day of week and hour of day
#[derive(Debug, Clone, Copy, Default)]
pub struct EfficiencyHeatmapMetric;

impl Metric for EfficiencyHeatmapMetric {
    fn name(&self) -> &'static str {
        "efficiency_heatmap"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        let mut list = efficiency_assumptions();
        list.push(Assumption::new("day_of_week", "0 = Sunday through 6 = Saturday"));
        list
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let trips = Trips::PLAIN;
        let pickup = trips.col(TripColumn::PickupAt);
        let day = ctx.fragment(dialect.day_of_week(&pickup)?);
        let hour = ctx.fragment(dialect.hour_of_day(&pickup)?);
        let exprs = Efficiency::new(&mut ctx, trips)?;

        let sql = trips
            .valid(&mut ctx, window)
            .select_as(day, "day_of_week")
            .select_as(hour, "hour_of_day")
            .select_as("COUNT(*)", "total_trips")
            .select_as(&exprs.revenue, "total_revenue")
            .select_as(&exprs.avg_duration, "avg_duration_minutes")
            .select_as(&exprs.efficiency, "efficiency")
            .group_by("day_of_week")
            .group_by("hour_of_day")
            .order_by("day_of_week")
            .order_by("hour_of_day")
            .build();

        Ok(ctx.finish(sql))
    }
}

/// Demand against efficiency per hour
///
/// Hours with 10 or fewer trips are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemandCorrelationMetric;

impl Metric for DemandCorrelationMetric {
    fn name(&self) -> &'static str {
        "demand_correlation"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        let mut list = efficiency_assumptions();
        list.push(Assumption::new("sample", "Only hours with more than 10 trips"));
        list
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let trips = Trips::PLAIN;
        let min_exclusive = ctx.bind("min_trips", DEMAND_CORRELATION_MIN_EXCLUSIVE);
        let hour = ctx.fragment(dialect.hour_bucket(&trips.col(TripColumn::PickupAt))?);
        let exprs = Efficiency::new(&mut ctx, trips)?;

        let sql = trips
            .valid(&mut ctx, window)
            .select_as(hour, "hour")
            .select_as("COUNT(*)", "demand_trips")
            .select_as(&exprs.efficiency, "efficiency")
            .group_by("hour")
            .having(format!("COUNT(*) > {}", min_exclusive))
            .order_by_desc("demand_trips")
            .order_by("hour")
            .build();

        Ok(ctx.finish(sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxi_query::{CapabilityProfile, ParamValue};

    const REDUCED: Dialect = Dialect::new(CapabilityProfile::Reduced);
    const FULL: Dialect = Dialect::new(CapabilityProfile::Full);

    #[test]
    fn test_timeseries_bucket_per_profile() {
        let window = AnalysisWindow::default();
        let reduced = EfficiencyTimeseriesMetric.build(REDUCED, &window).unwrap();
        assert!(reduced
            .sql()
            .starts_with("SELECT strftime('%Y-%m-%d %H:00:00', tpep_pickup_datetime) AS hour"));
        assert!(reduced.sql().ends_with("GROUP BY hour ORDER BY hour"));

        let full = EfficiencyTimeseriesMetric.build(FULL, &window).unwrap();
        assert!(full
            .sql()
            .starts_with("SELECT DATE_TRUNC('hour', tpep_pickup_datetime) AS hour"));
        assert!(full.sql().contains(
            "CAST(SUM(total_amount) AS DOUBLE PRECISION) / NULLIF(COUNT(*) * AVG("
        ));
    }

    #[test]
    fn test_heatmap_groups_by_day_and_hour() {
        let sql = EfficiencyHeatmapMetric
            .build(FULL, &AnalysisWindow::default())
            .unwrap()
            .statement
            .sql;
        assert!(sql.contains("CAST(EXTRACT(DOW FROM tpep_pickup_datetime) AS INTEGER) AS day_of_week"));
        assert!(sql.contains("CAST(EXTRACT(HOUR FROM tpep_pickup_datetime) AS INTEGER) AS hour_of_day"));
        assert!(sql.ends_with(
            "GROUP BY day_of_week, hour_of_day ORDER BY day_of_week, hour_of_day"
        ));
    }

    #[test]
    fn test_demand_correlation_threshold_is_bound() {
        let compiled = DemandCorrelationMetric
            .build(REDUCED, &AnalysisWindow::default())
            .unwrap();
        assert!(compiled.sql().contains("HAVING COUNT(*) > $1"));
        assert!(compiled.sql().ends_with("ORDER BY demand_trips DESC, hour"));
        assert_eq!(compiled.statement.params[0], ParamValue::Integer(10));
    }
}
