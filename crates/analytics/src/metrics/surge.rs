//! Surge detection
//!
//! A trip surges when its fare exceeds its pickup zone's baseline fare by
//! more than a relative margin. The baseline is the zone's median fare over
//! positive fares in the window; on the reduced profile the median is
//! approximated by the mean and labelled as such.

use crate::builder::{CompiledQuery, JoinKind, QueryBuilder, QueryContext};
use crate::dialect::{Dialect, Predicate};
use crate::error::Result;
use crate::metrics::{Metric, Trips, bind_limit, check_non_negative};
use crate::presentation::{Assumption, assumptions};
use crate::schema::{MIN_SURGE_CORRELATION_DAYS, MIN_SURGE_ZONE_TRIPS, TripColumn};
use crate::window::AnalysisWindow;

/// Default relative fare margin (20% above baseline)
pub const DEFAULT_SURGE_THRESHOLD: f64 = 0.2;

/// Default number of surge events returned
pub const DEFAULT_EVENT_LIMIT: u32 = 1000;

fn surge_assumptions() -> Vec<Assumption> {
    assumptions(&[
        ("baseline", "Baseline fare is the pickup zone's median positive fare"),
        ("surge", "A trip surges when fare > baseline × (1 + threshold)"),
        ("pricing", "Surge is inferred from fares; no pricing signal is observed"),
    ])
}

/// Trips joined to their zone's baseline, plus the surge predicate
struct SurgeScope {
    builder: QueryBuilder,
    predicate: Predicate,
}

impl SurgeScope {
    fn new(ctx: &mut QueryContext, window: &AnalysisWindow, threshold: f64) -> Result<Self> {
        let threshold = check_non_negative("threshold", threshold)?;
        let dialect = ctx.dialect();
        let margin = ctx.bind("surge_threshold", threshold);

        let plain = Trips::PLAIN;
        let fare = plain.col(TripColumn::Fare);
        let zone = plain.col(TripColumn::PickupZone);
        let median = ctx.fragment(dialect.median(&fare)?);
        let baseline = plain
            .valid(ctx, window)
            .where_clause(format!("{} > 0", fare))
            .select_as(&zone, "zone_id")
            .select_as(median, "baseline_fare")
            .group_by(zone)
            .build();

        let trips = Trips::ALIASED;
        let builder = trips
            .valid(ctx, window)
            .with_cte("baseline", baseline)
            .join(
                JoinKind::Inner,
                "baseline b",
                format!("{} = b.zone_id", trips.col(TripColumn::PickupZone)),
            );
        let predicate =
            Predicate::exceeds_margin(&trips.col(TripColumn::Fare), "b.baseline_fare", margin)?;

        Ok(Self { builder, predicate })
    }
}

/// Individual surge trips, most recent first
#[derive(Debug, Clone)]
pub struct SurgeEventsMetric {
    threshold: f64,
    limit: u32,
}

impl SurgeEventsMetric {
    /// Create a new surge events metric
    pub fn new(threshold: f64, limit: u32) -> Self {
        Self { threshold, limit }
    }
}

impl Default for SurgeEventsMetric {
    fn default() -> Self {
        Self::new(DEFAULT_SURGE_THRESHOLD, DEFAULT_EVENT_LIMIT)
    }
}

impl Metric for SurgeEventsMetric {
    fn name(&self) -> &'static str {
        "surge_events"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        surge_assumptions()
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let SurgeScope { builder, predicate } = SurgeScope::new(&mut ctx, window, self.threshold)?;
        let limit = bind_limit(&mut ctx, self.limit)?;
        let trips = Trips::ALIASED;
        let fare = trips.col(TripColumn::Fare);

        let sql = builder
            .where_clause(predicate.to_string())
            .select_as(trips.col(TripColumn::PickupAt), "pickup_at")
            .select_as(trips.col(TripColumn::PickupZone), "zone_id")
            .select_as(&fare, "fare_amount")
            .select_as("b.baseline_fare", "baseline_fare")
            .select_as(dialect.ratio(&fare, "b.baseline_fare"), "fare_ratio")
            .order_by_desc("pickup_at")
            .order_by("zone_id")
            .order_by_desc("fare_amount")
            .limit(limit)
            .build();

        Ok(ctx.finish(sql))
    }
}

/// Surge share per zone
#[derive(Debug, Clone)]
pub struct SurgeZonesMetric {
    threshold: f64,
}

impl SurgeZonesMetric {
    /// Create a new surge zones metric
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for SurgeZonesMetric {
    fn default() -> Self {
        Self::new(DEFAULT_SURGE_THRESHOLD)
    }
}

impl Metric for SurgeZonesMetric {
    fn name(&self) -> &'static str {
        "surge_zones"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        let mut list = surge_assumptions();
        list.push(Assumption::new("sample", "Only zones with at least 100 trips"));
        list
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let SurgeScope { builder, predicate } = SurgeScope::new(&mut ctx, window, self.threshold)?;
        let min_trips = ctx.bind("min_trips", MIN_SURGE_ZONE_TRIPS);
        let trips = Trips::ALIASED;
        let zone = trips.col(TripColumn::PickupZone);
        let surge_trips = ctx.fragment(dialect.conditional_count(&predicate));

        let mut builder = builder
            .select_as(&zone, "zone_id")
            .select_as("COUNT(*)", "total_trips")
            .select_as(&surge_trips, "surge_trips")
            .select_as(dialect.ratio(&surge_trips, "COUNT(*)"), "surge_share")
            .select_as(
                format!("SUM({})", trips.col(TripColumn::Total)),
                "total_revenue",
            )
            .group_by(zone)
            .having(format!("COUNT(*) >= {}", min_trips));
        for key in dialect.nulls_last("surge_share", true) {
            builder = builder.order_by(key);
        }
        let sql = builder.order_by("zone_id").build();

        Ok(ctx.finish(sql))
    }
}

/// Average daily surge events against average daily revenue, per zone
#[derive(Debug, Clone)]
pub struct SurgeCorrelationMetric {
    threshold: f64,
}

impl SurgeCorrelationMetric {
    /// Create a new surge correlation metric
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for SurgeCorrelationMetric {
    fn default() -> Self {
        Self::new(DEFAULT_SURGE_THRESHOLD)
    }
}

impl Metric for SurgeCorrelationMetric {
    fn name(&self) -> &'static str {
        "surge_correlation"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        let mut list = surge_assumptions();
        list.push(Assumption::new(
            "sample",
            "Only zones with at least 5 days of data",
        ));
        list
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let SurgeScope { builder, predicate } = SurgeScope::new(&mut ctx, window, self.threshold)?;
        let min_days = ctx.bind("min_days", MIN_SURGE_CORRELATION_DAYS);
        let trips = Trips::ALIASED;
        let zone = trips.col(TripColumn::PickupZone);
        let day = ctx.fragment(dialect.date(&trips.col(TripColumn::PickupAt))?);
        let surge_count = ctx.fragment(dialect.conditional_count(&predicate));

        let daily = builder
            .select_as(day, "trip_date")
            .select_as(&zone, "zone_id")
            .select_as(surge_count, "surge_count")
            .select_as(
                format!("SUM({})", trips.col(TripColumn::Total)),
                "daily_revenue",
            )
            .group_by("trip_date")
            .group_by(zone)
            .build();

        let mut outer = QueryBuilder::new("daily_surge")
            .with_cte("daily_surge", daily)
            .select("zone_id")
            .select_as(
                format!("AVG({})", dialect.real("surge_count")),
                "avg_surge_events",
            )
            .select_as("AVG(daily_revenue)", "avg_daily_revenue")
            .select_as("COUNT(*)", "days_with_data")
            .group_by("zone_id")
            .having(format!("COUNT(*) >= {}", min_days));
        for key in dialect.nulls_last("avg_surge_events", true) {
            outer = outer.order_by(key);
        }
        let sql = outer.order_by("zone_id").build();

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
    fn test_baseline_uses_median_per_zone() {
        let window = AnalysisWindow::default();

        let full = SurgeZonesMetric::default().build(FULL, &window).unwrap();
        assert!(full.sql().starts_with(
            "WITH baseline AS (SELECT pulocationid AS zone_id, \
             PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY fare_amount) AS baseline_fare"
        ));
        assert!(full.sql().contains("AND fare_amount > 0 GROUP BY pulocationid)"));
        assert!(full.is_exact());

        let reduced = SurgeZonesMetric::default().build(REDUCED, &window).unwrap();
        assert!(reduced.sql().contains("AVG(fare_amount) AS baseline_fare"));
        assert_eq!(reduced.approximations.len(), 1);
        assert_eq!(reduced.approximations[0].primitive, "median");
        assert_eq!(reduced.approximations[0].operand, "fare_amount");
    }

    #[test]
    fn test_surge_predicate_is_parameterised() {
        let compiled = SurgeEventsMetric::new(0.35, 50)
            .build(REDUCED, &AnalysisWindow::default())
            .unwrap();
        let sql = compiled.sql();

        assert!(sql.contains("FROM trips t JOIN baseline b ON t.pulocationid = b.zone_id"));
        assert!(sql.contains("t.fare_amount > b.baseline_fare * (1 + $1)"));
        assert!(sql.ends_with("ORDER BY pickup_at DESC, zone_id, fare_amount DESC LIMIT $4"));
        assert_eq!(compiled.statement.params[0], ParamValue::Real(0.35));
        assert_eq!(compiled.statement.params[3], ParamValue::Integer(50));
    }

    #[test]
    fn test_window_bound_once_across_ctes() {
        let compiled = SurgeZonesMetric::default()
            .build(FULL, &AnalysisWindow::default())
            .unwrap();
        // threshold, window start, window end, min_trips
        assert_eq!(compiled.statement.params.len(), 4);
        assert!(compiled
            .sql()
            .contains("t.tpep_pickup_datetime >= $2 AND t.tpep_pickup_datetime < $3"));
    }

    #[test]
    fn test_surge_zones_conditional_count() {
        let sql = SurgeZonesMetric::default()
            .build(FULL, &AnalysisWindow::default())
            .unwrap()
            .statement
            .sql;
        assert!(sql.contains(
            "COUNT(*) FILTER (WHERE t.fare_amount > b.baseline_fare * (1 + $1)) AS surge_trips"
        ));
        assert!(sql.contains("HAVING COUNT(*) >= $4"));
    }

    #[test]
    fn test_surge_correlation_daily_rollup() {
        let compiled = SurgeCorrelationMetric::default()
            .build(REDUCED, &AnalysisWindow::default())
            .unwrap();
        let sql = compiled.sql();

        assert!(sql.starts_with("WITH daily_surge AS (WITH baseline AS"));
        assert!(sql.contains("date(t.tpep_pickup_datetime) AS trip_date"));
        assert!(sql.contains("AVG(CAST(surge_count AS REAL)) AS avg_surge_events"));
        assert!(sql.contains("HAVING COUNT(*) >= $4"));
        assert_eq!(compiled.statement.params[3], ParamValue::Integer(5));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        assert!(SurgeZonesMetric::new(-0.2)
            .build(REDUCED, &AnalysisWindow::default())
            .is_err());
    }

    #[test]
    fn test_ranked_surge_full_ordering() {
        let window = AnalysisWindow::default();

        let zones = SurgeZonesMetric::default().build(FULL, &window).unwrap();
        assert!(zones.sql().ends_with("ORDER BY surge_share DESC NULLS LAST, zone_id"));

        let correlation = SurgeCorrelationMetric::default().build(FULL, &window).unwrap();
        assert!(correlation
            .sql()
            .ends_with("ORDER BY avg_surge_events DESC NULLS LAST, zone_id"));

        let reduced = SurgeZonesMetric::default().build(REDUCED, &window).unwrap();
        assert!(reduced
            .sql()
            .ends_with("ORDER BY surge_share IS NULL, surge_share DESC, zone_id"));
    }
}
