//! Trip duration variability
//!
//! Variability is measured by the coefficient of variation (population
//! standard deviation / mean) of trip duration. Only trips with positive
//! distance are considered.

use crate::builder::{CompiledQuery, QueryBuilder, QueryContext};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::metrics::{Metric, Trips};
use crate::presentation::{Assumption, assumptions};
use crate::schema::{MIN_VARIABILITY_HEATMAP_TRIPS, MIN_VARIABILITY_TREND_TRIPS, TripColumn};
use crate::window::AnalysisWindow;

const TRIP_METRICS: &str = "trip_metrics";
const DURATION: &str = "duration_minutes";

/// Distance bins: label and exclusive upper bound in miles
const DISTANCE_BINS: [(&str, Option<u32>); 4] = [
    ("0-2", Some(2)),
    ("2-5", Some(5)),
    ("5-10", Some(10)),
    ("10+", None),
];

fn variability_assumptions() -> Vec<Assumption> {
    assumptions(&[
        (
            "coefficient_of_variation",
            "Population standard deviation of duration / mean duration",
        ),
        ("distance", "Only trips with positive distance"),
    ])
}

/// `CASE` expression mapping distance to its bin label, and to its bin order
fn distance_bins(distance: &str) -> (String, String) {
    let mut label = String::from("CASE");
    let mut order = String::from("CASE");
    for (i, (name, upper)) in DISTANCE_BINS.iter().enumerate() {
        match upper {
            Some(upper) => {
                label.push_str(&format!(" WHEN {} < {} THEN '{}'", distance, upper, name));
                order.push_str(&format!(" WHEN {} < {} THEN {}", distance, upper, i));
            }
            None => {
                label.push_str(&format!(" ELSE '{}' END", name));
                order.push_str(&format!(" ELSE {} END", i));
            }
        }
    }
    (label, order)
}

/// Per-trip projection: pickup hour plus duration, positive distance only
fn trip_metrics(
    ctx: &mut QueryContext,
    window: &AnalysisWindow,
    trips: Trips,
) -> Result<QueryBuilder> {
    let dialect = ctx.dialect();
    let hour = ctx.fragment(dialect.hour_of_day(&trips.col(TripColumn::PickupAt))?);
    let duration = trips.duration(ctx)?;
    Ok(trips
        .valid(ctx, window)
        .where_clause(format!("{} > 0", trips.col(TripColumn::Distance)))
        .select_as(hour, "hour_of_day")
        .select_as(duration, DURATION))
}

/// Count, mean, standard deviation and CV of duration over the current grouping
fn add_spread(builder: QueryBuilder, ctx: &mut QueryContext) -> Result<QueryBuilder> {
    let dialect = ctx.dialect();
    let std = ctx.fragment(dialect.standard_deviation(DURATION)?);
    let mean = format!("AVG({})", DURATION);
    Ok(builder
        .select_as("COUNT(*)", "trip_count")
        .select_as(&mean, "mean_duration")
        .select_as(&std, "std_duration")
        .select_as(dialect.ratio(&std, &mean), "coefficient_of_variation"))
}

/// Duration CV by hour of day and distance bin
#[derive(Debug, Clone, Copy, Default)]
pub struct VariabilityHeatmapMetric;

impl Metric for VariabilityHeatmapMetric {
    fn name(&self) -> &'static str {
        "variability_heatmap"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        let mut list = variability_assumptions();
        list.push(Assumption::new(
            "distance_bin",
            "Distance bins: 0-2, 2-5, 5-10 and 10+ miles",
        ));
        list.push(Assumption::new(
            "sample",
            "Only hour × bin buckets with at least 20 trips",
        ));
        list
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let trips = Trips::PLAIN;
        let min_trips = ctx.bind("min_trips", MIN_VARIABILITY_HEATMAP_TRIPS);
        let (bin, bin_order) = distance_bins(&trips.col(TripColumn::Distance));
        let per_trip = trip_metrics(&mut ctx, window, trips)?
            .select_as(bin, "distance_bin")
            .select_as(bin_order, "bin_order")
            .build();

        let builder = QueryBuilder::new(TRIP_METRICS)
            .with_cte(TRIP_METRICS, per_trip)
            .select("hour_of_day")
            .select("distance_bin");
        let sql = add_spread(builder, &mut ctx)?
            .group_by("hour_of_day")
            .group_by("bin_order")
            .group_by("distance_bin")
            .having(format!("COUNT(*) >= {}", min_trips))
            .order_by("hour_of_day")
            .order_by("bin_order")
            .build();

        Ok(ctx.finish(sql))
    }
}

/// Duration distribution by hour of day
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationDistributionMetric;

impl Metric for DurationDistributionMetric {
    fn name(&self) -> &'static str {
        "duration_distribution"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        let mut list = variability_assumptions();
        list.push(Assumption::new(
            "percentiles",
            "Quartiles are continuous (interpolated) percentiles",
        ));
        list
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let trips = Trips::PLAIN;
        let per_trip = trip_metrics(&mut ctx, window, trips)?.build();
        let p25 = ctx.fragment(dialect.percentile(DURATION, 0.25)?);
        let median = ctx.fragment(dialect.median(DURATION)?);
        let p75 = ctx.fragment(dialect.percentile(DURATION, 0.75)?);

        let builder = QueryBuilder::new(TRIP_METRICS)
            .with_cte(TRIP_METRICS, per_trip)
            .select("hour_of_day")
            .select_as(format!("MIN({})", DURATION), "min_duration")
            .select_as(p25, "p25_duration")
            .select_as(median, "median_duration")
            .select_as(p75, "p75_duration")
            .select_as(format!("MAX({})", DURATION), "max_duration");
        let sql = add_spread(builder, &mut ctx)?
            .group_by("hour_of_day")
            .order_by("hour_of_day")
            .build();

        Ok(ctx.finish(sql))
    }
}

/// Duration CV by date and hour of day
#[derive(Debug, Clone, Copy, Default)]
pub struct VariabilityTrendsMetric;

impl Metric for VariabilityTrendsMetric {
    fn name(&self) -> &'static str {
        "variability_trends"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        let mut list = variability_assumptions();
        list.push(Assumption::new(
            "sample",
            "Only date × hour buckets with at least 10 trips",
        ));
        list
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let trips = Trips::PLAIN;
        let min_trips = ctx.bind("min_trips", MIN_VARIABILITY_TREND_TRIPS);
        let day = ctx.fragment(dialect.date(&trips.col(TripColumn::PickupAt))?);
        let per_trip = trip_metrics(&mut ctx, window, trips)?
            .select_as(day, "trip_date")
            .build();

        let builder = QueryBuilder::new(TRIP_METRICS)
            .with_cte(TRIP_METRICS, per_trip)
            .select("trip_date")
            .select("hour_of_day");
        let sql = add_spread(builder, &mut ctx)?
            .group_by("trip_date")
            .group_by("hour_of_day")
            .having(format!("COUNT(*) >= {}", min_trips))
            .order_by("trip_date")
            .order_by("hour_of_day")
            .build();

        Ok(ctx.finish(sql))
    }
}
