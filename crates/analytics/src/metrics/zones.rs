//! Zone revenue and profitability
//!
//! Revenue rankings use `fare_amount`; net profit uses `total_amount` and
//! subtracts an idle-time cost proxy of `trips × cost/hour × avg duration`.

use crate::builder::{CompiledQuery, QueryBuilder, QueryContext};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::metrics::{Metric, Trips, bind_limit, check_non_negative};
use crate::presentation::{Assumption, assumptions};
use crate::schema::{TAXI_ZONES, TripColumn, ZoneColumn};
use crate::window::AnalysisWindow;

/// Default number of zones in the revenue ranking
pub const DEFAULT_LIMIT: u32 = 20;

/// Default cost of one idle vehicle-hour
pub const DEFAULT_IDLE_COST_PER_HOUR: f64 = 30.0;

/// Top zones by fare revenue
#[derive(Debug, Clone)]
pub struct ZoneRevenueMetric {
    limit: u32,
}

impl ZoneRevenueMetric {
    /// Create a new zone revenue metric
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }
}

impl Default for ZoneRevenueMetric {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl Metric for ZoneRevenueMetric {
    fn name(&self) -> &'static str {
        "zone_revenue"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        assumptions(&[
            ("revenue", "Revenue is the sum of fare_amount"),
            ("zone", "Trips are attributed to their pickup zone"),
        ])
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let trips = Trips::PLAIN;
        let limit = bind_limit(&mut ctx, self.limit)?;
        let duration = trips.duration(&mut ctx)?;
        let zone = trips.col(TripColumn::PickupZone);
        let fare = trips.col(TripColumn::Fare);
        let tip = trips.col(TripColumn::Tip);
        let total = trips.col(TripColumn::Total);

        let sql = trips
            .valid(&mut ctx, window)
            .select_as(&zone, "zone_id")
            .select_as("COUNT(*)", "trip_count")
            .select_as(format!("SUM({})", fare), "total_revenue")
            .select_as(format!("AVG({})", fare), "avg_fare")
            .select_as(format!("SUM({})", tip), "total_tips")
            .select_as(format!("AVG({})", tip), "avg_tip")
            .select_as(format!("SUM({})", total), "total_amount")
            .select_as(format!("AVG({})", total), "avg_total_amount")
            .select_as(
                format!("AVG({})", trips.col(TripColumn::Distance)),
                "avg_distance",
            )
            .select_as(format!("AVG({})", duration), "avg_duration_minutes")
            .group_by(zone)
            .order_by_desc("total_revenue")
            .order_by("zone_id")
            .limit(limit)
            .build();

        Ok(ctx.finish(sql))
    }
}

/// Net profit per zone
#[derive(Debug, Clone)]
pub struct NetProfitMetric {
    idle_cost_per_hour: f64,
}

impl NetProfitMetric {
    /// Create a new net profit metric
    pub fn new(idle_cost_per_hour: f64) -> Self {
        Self { idle_cost_per_hour }
    }
}

impl Default for NetProfitMetric {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_COST_PER_HOUR)
    }
}

impl Metric for NetProfitMetric {
    fn name(&self) -> &'static str {
        "net_profit"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        profit_assumptions()
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let base = profit_select(&mut ctx, window, self.idle_cost_per_hour)?;
        let sql = base
            .order_by_desc("net_profit")
            .order_by("zone_id")
            .build();
        Ok(ctx.finish(sql))
    }
}

/// Zones whose net profit is negative, most negative first
#[derive(Debug, Clone)]
pub struct NegativeZonesMetric {
    idle_cost_per_hour: f64,
}

impl NegativeZonesMetric {
    /// Create a new negative zones metric
    pub fn new(idle_cost_per_hour: f64) -> Self {
        Self { idle_cost_per_hour }
    }
}

impl Default for NegativeZonesMetric {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_COST_PER_HOUR)
    }
}

impl Metric for NegativeZonesMetric {
    fn name(&self) -> &'static str {
        "negative_zones"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        profit_assumptions()
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let profits = profit_select(&mut ctx, window, self.idle_cost_per_hour)?.build();
        let sql = QueryBuilder::new("zone_profit")
            .with_cte("zone_profit", profits)
            .where_clause("net_profit < 0")
            .order_by("net_profit")
            .order_by("zone_id")
            .build();
        Ok(ctx.finish(sql))
    }
}

fn profit_assumptions() -> Vec<Assumption> {
    assumptions(&[
        ("gross_revenue", "Gross revenue is the sum of total_amount"),
        (
            "idle_cost",
            "Idle cost = trips × idle cost per hour × average duration (hours)",
        ),
        ("net_profit", "Net profit = gross revenue - idle cost"),
    ])
}

/// Per-zone profitability rows, unordered
fn profit_select(
    ctx: &mut QueryContext,
    window: &AnalysisWindow,
    idle_cost_per_hour: f64,
) -> Result<QueryBuilder> {
    let cost = check_non_negative("idle_cost_per_hour", idle_cost_per_hour)?;
    let trips = Trips::PLAIN;
    let cost = ctx.bind("idle_cost_per_hour", cost);
    let duration = trips.duration(ctx)?;
    let zone = trips.col(TripColumn::PickupZone);

    let zone_metrics = trips
        .valid(ctx, window)
        .select_as(&zone, "zone_id")
        .select_as("COUNT(*)", "trip_count")
        .select_as(
            format!("SUM({})", trips.col(TripColumn::Total)),
            "gross_revenue",
        )
        .select_as(format!("AVG({})", duration), "avg_duration_minutes")
        .group_by(zone)
        .build();

    let idle_cost = format!("trip_count * {} * avg_duration_minutes / 60.0", cost);

    Ok(QueryBuilder::new("zone_metrics")
        .with_cte("zone_metrics", zone_metrics)
        .select("zone_id")
        .select("trip_count")
        .select("gross_revenue")
        .select("avg_duration_minutes")
        .select_as(&idle_cost, "idle_cost")
        .select_as(format!("gross_revenue - {}", idle_cost), "net_profit"))
}

/// Zone reference rows
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneLookupMetric;

impl Metric for ZoneLookupMetric {
    fn name(&self) -> &'static str {
        "zones"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        assumptions(&[("zones", "Zone reference data is not windowed")])
    }

    fn build(&self, dialect: Dialect, _window: &AnalysisWindow) -> Result<CompiledQuery> {
        let ctx = QueryContext::new(dialect);
        let sql = QueryBuilder::new(TAXI_ZONES)
            .select_as(ZoneColumn::LocationId, "zone_id")
            .select(ZoneColumn::Borough.as_str())
            .select(ZoneColumn::Zone.as_str())
            .select(ZoneColumn::ServiceZone.as_str())
            .order_by(ZoneColumn::LocationId.as_str())
            .build();
        Ok(ctx.finish(sql))
    }
}
