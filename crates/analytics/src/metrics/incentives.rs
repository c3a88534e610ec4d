//! Driver incentives versus system efficiency
//!
//! Both scores are computed per pickup zone and hour of day:
//!
//! - driver score: average fare + tip per trip / average duration (dollars
//!   per minute a driver earns on a trip)
//! - system score: revenue per occupied vehicle-hour
//!
//! A zone-hour is misaligned when drivers are strongly drawn to it (driver
//! score above the 75th percentile) while the fleet earns little there
//! (system score below the median).

use crate::builder::{CompiledQuery, QueryBuilder, QueryContext};
use crate::dialect::{Approximation, Dialect};
use crate::error::Result;
use crate::metrics::{Metric, Trips, bind_limit};
use crate::presentation::{Assumption, assumptions};
use crate::schema::{MIN_INCENTIVE_TRIPS, TripColumn};
use crate::window::AnalysisWindow;

/// Default number of zone-hours in the driver ranking
pub const DEFAULT_DRIVER_LIMIT: u32 = 1000;

/// Default number of misaligned zone-hours
pub const DEFAULT_MISALIGNMENT_LIMIT: u32 = 100;

/// Scale applied to the mean driver score when percentiles are unavailable
pub const DRIVER_THRESHOLD_INFLATION: f64 = 1.2;

/// Scale applied to the mean system score when percentiles are unavailable
pub const SYSTEM_THRESHOLD_DEFLATION: f64 = 0.8;

/// Score expressions over one zone-hour group
struct Scores {
    zone: String,
    hour: String,
    earnings: String,
    avg_duration: String,
    revenue: String,
    driver: String,
    system: String,
}

impl Scores {
    fn new(ctx: &mut QueryContext, trips: Trips) -> Result<Self> {
        let dialect = ctx.dialect();
        let duration = trips.duration(ctx)?;
        let hour = ctx.fragment(dialect.hour_of_day(&trips.col(TripColumn::PickupAt))?);
        let earnings = format!(
            "AVG({} + {})",
            trips.col(TripColumn::Fare),
            trips.col(TripColumn::Tip)
        );
        let avg_duration = format!("AVG({})", duration);
        let revenue = format!("SUM({})", trips.col(TripColumn::Total));
        let driver = dialect.ratio(&earnings, &avg_duration);
        let system = dialect.ratio(&revenue, format!("COUNT(*) * {} / 60.0", avg_duration));
        Ok(Self {
            zone: trips.col(TripColumn::PickupZone),
            hour,
            earnings,
            avg_duration,
            revenue,
            driver,
            system,
        })
    }

    /// Valid trips grouped by zone and hour with the minimum-sample filter
    fn grouped(
        &self,
        ctx: &mut QueryContext,
        window: &AnalysisWindow,
        trips: Trips,
    ) -> QueryBuilder {
        let min_trips = ctx.bind("min_trips", MIN_INCENTIVE_TRIPS);
        trips
            .valid(ctx, window)
            .select_as(&self.zone, "zone_id")
            .select_as(&self.hour, "hour_of_day")
            .select_as("COUNT(*)", "trip_count")
            .group_by(self.zone.clone())
            .group_by("hour_of_day")
            .having(format!("COUNT(*) >= {}", min_trips))
    }
}

fn score_assumptions() -> Vec<Assumption> {
    assumptions(&[
        (
            "driver_score",
            "Average (fare + tip) per trip / average duration in minutes",
        ),
        (
            "system_score",
            "Revenue per occupied vehicle-hour: total_amount / (trips × average duration)",
        ),
        ("sample", "Only zone-hours with at least 10 trips"),
    ])
}

/// Driver incentive score per zone-hour
#[derive(Debug, Clone)]
pub struct DriverIncentivesMetric {
    limit: u32,
}

impl DriverIncentivesMetric {
    /// Create a new driver incentives metric
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }
}

impl Default for DriverIncentivesMetric {
    fn default() -> Self {
        Self::new(DEFAULT_DRIVER_LIMIT)
    }
}

impl Metric for DriverIncentivesMetric {
    fn name(&self) -> &'static str {
        "driver_incentives"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        score_assumptions()
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let limit = bind_limit(&mut ctx, self.limit)?;
        let trips = Trips::PLAIN;
        let scores = Scores::new(&mut ctx, trips)?;

        let mut builder = scores
            .grouped(&mut ctx, window, trips)
            .select_as(&scores.earnings, "avg_earnings_per_trip")
            .select_as(&scores.avg_duration, "avg_duration_minutes")
            .select_as(&scores.driver, "driver_incentive_score");
        for key in dialect.nulls_last("driver_incentive_score", true) {
            builder = builder.order_by(key);
        }
        let sql = builder
            .order_by("zone_id")
            .order_by("hour_of_day")
            .limit(limit)
            .build();

        Ok(ctx.finish(sql))
    }
}

/// System efficiency score per zone-hour
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEfficiencyMetric;

impl Metric for SystemEfficiencyMetric {
    fn name(&self) -> &'static str {
        "system_efficiency"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        score_assumptions()
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let trips = Trips::PLAIN;
        let scores = Scores::new(&mut ctx, trips)?;

        let mut builder = scores
            .grouped(&mut ctx, window, trips)
            .select_as(&scores.revenue, "total_revenue")
            .select_as(&scores.avg_duration, "avg_duration_minutes")
            .select_as(&scores.system, "system_efficiency_score");
        for key in dialect.nulls_last("system_efficiency_score", true) {
            builder = builder.order_by(key);
        }
        let sql = builder
            .order_by("zone_id")
            .order_by("hour_of_day")
            .build();

        Ok(ctx.finish(sql))
    }
}

/// Zone-hours attractive to drivers but poor for the system
#[derive(Debug, Clone)]
pub struct MisalignmentMetric {
    limit: u32,
}

impl MisalignmentMetric {
    /// Create a new misalignment metric
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }
}

impl Default for MisalignmentMetric {
    fn default() -> Self {
        Self::new(DEFAULT_MISALIGNMENT_LIMIT)
    }
}

impl Metric for MisalignmentMetric {
    fn name(&self) -> &'static str {
        "incentive_misalignment"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        let mut list = score_assumptions();
        list.push(Assumption::new(
            "misalignment",
            "Driver score above its 75th percentile while system score is below its median",
        ));
        list
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let limit = bind_limit(&mut ctx, self.limit)?;
        let trips = Trips::PLAIN;
        let scores = Scores::new(&mut ctx, trips)?;

        let zone_scores = scores
            .grouped(&mut ctx, window, trips)
            .select_as(&scores.driver, "driver_score")
            .select_as(&scores.system, "system_score")
            .build();

        let (driver_threshold, system_threshold) = if dialect.profile().has_exact_percentiles() {
            (
                ctx.fragment(dialect.percentile("driver_score", 0.75)?),
                ctx.fragment(dialect.median("system_score")?),
            )
        } else {
            // Scaled means stand in for the quartile cut-offs
            let inflation = ctx.bind("driver_inflation", DRIVER_THRESHOLD_INFLATION);
            let deflation = ctx.bind("system_deflation", SYSTEM_THRESHOLD_DEFLATION);
            (
                format!("AVG(driver_score) * {}", inflation),
                format!("AVG(system_score) * {}", deflation),
            )
        };
        let thresholds = QueryBuilder::new("zone_scores")
            .select_as(driver_threshold, "driver_threshold")
            .select_as(system_threshold, "system_threshold")
            .build();

        let sql = QueryBuilder::aliased("zone_scores", "s")
            .with_cte("zone_scores", zone_scores)
            .with_cte("thresholds", thresholds)
            .cross_join("thresholds th")
            .select_as("s.zone_id", "zone_id")
            .select_as("s.hour_of_day", "hour_of_day")
            .select_as("s.trip_count", "trip_count")
            .select_as("s.driver_score", "driver_score")
            .select_as("s.system_score", "system_score")
            .select_as("th.driver_threshold", "driver_threshold")
            .select_as("th.system_threshold", "system_threshold")
            .where_clause("s.driver_score > th.driver_threshold")
            .where_clause("s.system_score < th.system_threshold")
            .order_by_desc("driver_score")
            .order_by("system_score")
            .order_by("zone_id")
            .order_by("hour_of_day")
            .limit(limit)
            .build();

        let mut compiled = ctx.finish(sql);
        if !dialect.profile().has_exact_percentiles() {
            compiled.approximations.push(Approximation {
                primitive: "percentile(0.75)".to_string(),
                operand: "driver_score".to_string(),
                method: "arithmetic mean × 1.2",
            });
            compiled.approximations.push(Approximation {
                primitive: "median".to_string(),
                operand: "system_score".to_string(),
                method: "arithmetic mean × 0.8",
            });
        }
        Ok(compiled)
    }
}
