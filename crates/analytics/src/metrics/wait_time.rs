//! Wait-time proxy
//!
//! Demand is pickups per zone-hour; supply is dropoffs per zone-hour (a
//! vehicle that just dropped off is available there). Zone-hours present on
//! only one side still appear, with the other side counted as zero.
//!
//! The full profile uses a `FULL OUTER JOIN`. The reduced profile lacks it
//! and takes the union of a left join with the supply-only anti-join.

use crate::builder::{CompiledQuery, JoinKind, QueryBuilder, QueryContext};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::metrics::{Metric, Trips, bind_limit};
use crate::presentation::{Assumption, assumptions};
use crate::schema::TripColumn;
use crate::window::AnalysisWindow;

/// Default number of zone-hours returned
pub const DEFAULT_LIMIT: u32 = 1000;

const JOIN_ON: &str = "d.zone_id = s.zone_id AND d.hour = s.hour";

/// Demand/supply ratio per zone-hour
#[derive(Debug, Clone)]
pub struct WaitTimeMetric {
    limit: u32,
}

impl WaitTimeMetric {
    /// Create a new wait-time metric
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }
}

impl Default for WaitTimeMetric {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl Metric for WaitTimeMetric {
    fn name(&self) -> &'static str {
        "wait_time_proxy"
    }

    fn assumptions(&self) -> Vec<Assumption> {
        assumptions(&[
            ("demand", "Demand is pickups per zone and hour"),
            ("supply", "Supply is dropoffs per zone and hour"),
            (
                "wait_time_proxy",
                "Demand / supply; NULL where no vehicle dropped off",
            ),
            ("observation", "Actual passenger wait times are not observed"),
        ])
    }

    fn build(&self, dialect: Dialect, window: &AnalysisWindow) -> Result<CompiledQuery> {
        let mut ctx = QueryContext::new(dialect);
        let limit = bind_limit(&mut ctx, self.limit)?;
        let trips = Trips::PLAIN;

        let pickup = trips.col(TripColumn::PickupAt);
        let pickup_hour = ctx.fragment(dialect.hour_bucket(&pickup)?);
        let demand = trips
            .valid(&mut ctx, window)
            .select_as(trips.col(TripColumn::PickupZone), "zone_id")
            .select_as(pickup_hour, "hour")
            .select_as("COUNT(*)", "demand")
            .group_by(trips.col(TripColumn::PickupZone))
            .group_by("hour")
            .build();

        // Supply is windowed on dropoff time
        let dropoff = trips.col(TripColumn::DropoffAt);
        let dropoff_hour = ctx.fragment(dialect.hour_bucket(&dropoff)?);
        let in_window = window.clause(&mut ctx, &dropoff);
        let supply = trips
            .builder()
            .where_clause(in_window)
            .where_clause(trips.positive_duration())
            .select_as(trips.col(TripColumn::DropoffZone), "zone_id")
            .select_as(dropoff_hour, "hour")
            .select_as("COUNT(*)", "supply")
            .group_by(trips.col(TripColumn::DropoffZone))
            .group_by("hour")
            .build();

        let combined = if dialect.profile().has_full_outer_join() {
            QueryBuilder::aliased("demand", "d")
                .join(JoinKind::FullOuter, "supply s", JOIN_ON)
                .select_as("COALESCE(d.zone_id, s.zone_id)", "zone_id")
                .select_as("COALESCE(d.hour, s.hour)", "hour")
                .select_as("COALESCE(d.demand, 0)", "demand")
                .select_as("COALESCE(s.supply, 0)", "supply")
                .build()
        } else {
            let matched = QueryBuilder::aliased("demand", "d")
                .join(JoinKind::Left, "supply s", JOIN_ON)
                .select_as("d.zone_id", "zone_id")
                .select_as("d.hour", "hour")
                .select_as("d.demand", "demand")
                .select_as("COALESCE(s.supply, 0)", "supply")
                .build();
            let supply_only = QueryBuilder::aliased("supply", "s")
                .join(JoinKind::Left, "demand d", JOIN_ON)
                .where_clause("d.zone_id IS NULL")
                .select_as("s.zone_id", "zone_id")
                .select_as("s.hour", "hour")
                .select_as("0", "demand")
                .select_as("s.supply", "supply")
                .build();
            format!("{} UNION ALL {}", matched, supply_only)
        };

        let mut builder = QueryBuilder::new("combined")
            .with_cte("demand", demand)
            .with_cte("supply", supply)
            .with_cte("combined", combined)
            .select("zone_id")
            .select("hour")
            .select("demand")
            .select("supply")
            .select_as(dialect.ratio("demand", "supply"), "wait_time_proxy");
        for key in dialect.nulls_last("wait_time_proxy", true) {
            builder = builder.order_by(key);
        }
        let sql = builder
            .order_by("zone_id")
            .order_by("hour")
            .limit(limit)
            .build();

        Ok(ctx.finish(sql))
    }
}
