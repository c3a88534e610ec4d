//! Congestion, throughput and short-trip impact per pickup zone

use crate::builder::{CompiledQuery, QueryContext};
use crate::dialect::{Dialect, Predicate};
use crate::error::Result;
use crate::metrics::{Metric, Trips, check_non_negative};
use crate::presentation::{Assumption, assumptions};
use crate::schema::{
    MIN_CONGESTION_TRIPS, MIN_SHORT_TRIP_TRIPS, MIN_THROUGHPUT_TRIPS, TripColumn,
};
use crate::window::AnalysisWindow;

/// Default distance (miles) below which a trip is short
pub const DEFAULT_SHORT_TRIP_THRESHOLD: f64 = 1.0;

/// Minutes per mile, per zone
///
/// Zones need at least 50 trips with positive distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct CongestionZonesMetric;

impl Metric for CongestionZonesMetric {
    fn name(&self) -> &'static str {
        "congestion_zones"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        assumptions(&[
            (
                "congestion_index",
                "Average duration / Average distance (minutes per mile)",
            ),
            ("sample", "Only zones with at least 50 trips of positive distance"),
        ])
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let trips = Trips::PLAIN;
        let min_trips = ctx.bind("min_trips", MIN_CONGESTION_TRIPS);
        let duration = trips.duration(&mut ctx)?;
        let zone = trips.col(TripColumn::PickupZone);
        let distance = trips.col(TripColumn::Distance);
        let avg_duration = format!("AVG({})", duration);
        let avg_distance = format!("AVG({})", distance);

        let sql = trips
            .valid(&mut ctx, window)
            .where_clause(format!("{} > 0", distance))
            .select_as(&zone, "zone_id")
            .select_as("COUNT(*)", "trip_count")
            .select_as(&avg_duration, "avg_duration_minutes")
            .select_as(&avg_distance, "avg_distance")
            .select_as(dialect.ratio(&avg_duration, &avg_distance), "congestion_index")
            .group_by(zone)
            .having(format!("COUNT(*) >= {}", min_trips))
            .order_by_desc("congestion_index")
            .order_by("zone_id")
            .build();

        Ok(ctx.finish(sql))
    }
}

/// Trips per active hour, per zone
///
/// Active hours span the first to the last pickup in the zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThroughputMetric;

impl Metric for ThroughputMetric {
    fn name(&self) -> &'static str {
        "throughput"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        assumptions(&[
            (
                "throughput",
                "Trips / hours between first and last pickup in the zone",
            ),
            ("sample", "Only zones with at least 50 trips"),
            ("null", "Throughput is NULL when all pickups share one instant"),
        ])
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let trips = Trips::PLAIN;
        let min_trips = ctx.bind("min_trips", MIN_THROUGHPUT_TRIPS);
        let duration = trips.duration(&mut ctx)?;
        let span = ctx.fragment(dialect.span_hours(&trips.col(TripColumn::PickupAt))?);
        let zone = trips.col(TripColumn::PickupZone);

        let mut builder = trips
            .valid(&mut ctx, window)
            .select_as(&zone, "zone_id")
            .select_as("COUNT(*)", "trip_count")
            .select_as(format!("AVG({})", duration), "avg_duration_minutes")
            .select_as(&span, "active_hours")
            .select_as(dialect.ratio("COUNT(*)", &span), "throughput_per_hour")
            .group_by(zone)
            .having(format!("COUNT(*) >= {}", min_trips))
            .order_by_desc("trip_count");
        for key in dialect.nulls_last("throughput_per_hour", false) {
            builder = builder.order_by(key);
        }
        let sql = builder.order_by("zone_id").build();

        Ok(ctx.finish(sql))
    }
}

/// Share of trips shorter than a distance threshold, per zone
#[derive(Debug, Clone)]
pub struct ShortTripImpactMetric {
    threshold: f64,
}

impl ShortTripImpactMetric {
    /// Create a new short-trip metric with a threshold in miles
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for ShortTripImpactMetric {
    fn default() -> Self {
        Self::new(DEFAULT_SHORT_TRIP_THRESHOLD)
    }
}

impl Metric for ShortTripImpactMetric {
    fn name(&self) -> &'static str {
        "short_trip_impact"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        assumptions(&[
            ("short_trip", "A trip is short when its distance is below the threshold"),
            ("short_trip_share", "Short trips / all trips in the zone (0-1)"),
            ("sample", "Only zones with at least 50 trips"),
        ])
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let threshold = check_non_negative("threshold", self.threshold)?;
        let mut ctx = QueryContext::new(dialect);
        let trips = Trips::PLAIN;
        let threshold = ctx.bind("threshold", threshold);
        let min_trips = ctx.bind("min_trips", MIN_SHORT_TRIP_TRIPS);
        let duration = trips.duration(&mut ctx)?;
        let zone = trips.col(TripColumn::PickupZone);
        let distance = trips.col(TripColumn::Distance);
        let total = trips.col(TripColumn::Total);

        let short = Predicate::less_than(&distance, threshold)?;
        let short_trips = ctx.fragment(dialect.conditional_count(&short));

        let mut builder = trips
            .valid(&mut ctx, window)
            .select_as(&zone, "zone_id")
            .select_as("COUNT(*)", "total_trips")
            .select_as(&short_trips, "short_trips")
            .select_as(dialect.ratio(&short_trips, "COUNT(*)"), "short_trip_share")
            .select_as(format!("AVG({})", distance), "avg_distance")
            .select_as(format!("AVG({})", duration), "avg_duration_minutes")
            .select_as(format!("SUM({})", total), "total_revenue")
            .select_as(
                dialect.ratio(format!("SUM({})", total), "COUNT(*)"),
                "revenue_per_trip",
            )
            .group_by(zone)
            .having(format!("COUNT(*) >= {}", min_trips));
        for key in dialect.nulls_last("short_trip_share", true) {
            builder = builder.order_by(key);
        }
        let sql = builder.order_by("zone_id").build();

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
    fn test_congestion_query() {
        let compiled = CongestionZonesMetric
            .build(REDUCED, &AnalysisWindow::default())
            .unwrap();
        let sql = compiled.sql();

        assert!(sql.contains("AND trip_distance > 0"));
        assert!(sql.contains(
            "CAST(AVG(((julianday(tpep_dropoff_datetime) - julianday(tpep_pickup_datetime)) * 1440.0)) AS REAL) \
             / NULLIF(AVG(trip_distance), 0) AS congestion_index"
        ));
        assert!(sql.contains("HAVING COUNT(*) >= $1"));
        assert!(sql.ends_with("ORDER BY congestion_index DESC, zone_id"));
        assert_eq!(compiled.statement.params[0], ParamValue::Integer(50));
    }

    #[test]
    fn test_throughput_full_uses_epoch_span() {
        let sql = ThroughputMetric
            .build(FULL, &AnalysisWindow::default())
            .unwrap()
            .statement
            .sql;

        assert!(sql.contains(
            "CAST(COUNT(*) AS DOUBLE PRECISION) / NULLIF((CAST(EXTRACT(EPOCH FROM \
             (MAX(tpep_pickup_datetime) - MIN(tpep_pickup_datetime))) AS DOUBLE PRECISION) / 3600.0), 0)"
        ));
        assert!(sql.ends_with(
            "ORDER BY trip_count DESC, throughput_per_hour ASC NULLS LAST, zone_id"
        ));
    }

    #[test]
    fn test_short_trip_profiles() {
        let window = AnalysisWindow::default();

        let reduced = ShortTripImpactMetric::default().build(REDUCED, &window).unwrap();
        assert!(reduced
            .sql()
            .contains("SUM(CASE WHEN trip_distance < $1 THEN 1 ELSE 0 END) AS short_trips"));
        assert_eq!(reduced.statement.params[0], ParamValue::Real(1.0));

        let full = ShortTripImpactMetric::new(2.5).build(FULL, &window).unwrap();
        assert!(full
            .sql()
            .contains("COUNT(*) FILTER (WHERE trip_distance < $1) AS short_trips"));
        assert!(full.sql().contains("HAVING COUNT(*) >= $2"));
        assert_eq!(full.statement.params[0], ParamValue::Real(2.5));
    }

    #[test]
    fn test_short_trip_rejects_negative_threshold() {
        assert!(ShortTripImpactMetric::new(-0.1)
            .build(REDUCED, &AnalysisWindow::default())
            .is_err());
    }
}
