//! Headline totals for a window

use serde::Serialize;
use taxi_query::{QueryBackend, Value};

use crate::builder::QueryContext;
use crate::dialect::Dialect;
use crate::error::{AnalyticsError, Result};
use crate::metrics::Trips;
use crate::presentation::{MetricReport, assumptions};
use crate::schema::TripColumn;
use crate::window::AnalysisWindow;

/// Headline totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_trips: i64,
    /// Earliest pickup, `None` when the window is empty
    pub first_pickup: Option<String>,
    /// Latest pickup, `None` when the window is empty
    pub last_pickup: Option<String>,
    /// Distinct pickup zones
    pub zone_count: i64,
    /// Sum of total_amount
    pub total_revenue: f64,
}

/// Compose a single-aggregate query over valid trips
fn aggregate(dialect: Dialect, window: &AnalysisWindow, select: &[(String, &str)]) -> taxi_query::Statement {
    let mut ctx = QueryContext::new(dialect);
    let builder = select
        .iter()
        .fold(Trips::PLAIN.valid(&mut ctx, window), |b, (expr, alias)| {
            b.select_as(expr, alias)
        });
    ctx.finish(builder.build()).statement
}

fn timestamp_text(value: Option<&Value>) -> Option<String> {
    value.filter(|v| !v.is_null()).map(|v| v.to_string())
}

/// Fetch headline totals
pub async fn overview(
    backend: &dyn QueryBackend,
    dialect: Dialect,
    window: &AnalysisWindow,
) -> Result<MetricReport<Overview>> {
    let trips = Trips::PLAIN;
    let pickup = trips.col(TripColumn::PickupAt);

    let count = aggregate(dialect, window, &[("COUNT(*)".to_string(), "total_trips")]);
    let total_trips = backend.execute(&count).await?.scalar_i64()?.unwrap_or(0);

    let revenue = aggregate(
        dialect,
        window,
        &[(format!("SUM({})", trips.col(TripColumn::Total)), "total_revenue")],
    );
    let total_revenue = backend.execute(&revenue).await?.scalar_f64()?.unwrap_or(0.0);

    let zones = aggregate(
        dialect,
        window,
        &[(
            format!("COUNT(DISTINCT {})", trips.col(TripColumn::PickupZone)),
            "zone_count",
        )],
    );
    let zone_count = backend.execute(&zones).await?.scalar_i64()?.unwrap_or(0);

    let range = aggregate(
        dialect,
        window,
        &[
            (format!("MIN({})", pickup), "first_pickup"),
            (format!("MAX({})", pickup), "last_pickup"),
        ],
    );
    let range = backend.execute(&range).await?;
    if range.is_empty() {
        return Err(AnalyticsError::Backend(taxi_query::QueryError::EmptyResult));
    }

    let overview = Overview {
        total_trips,
        first_pickup: timestamp_text(range.get(0, "first_pickup")),
        last_pickup: timestamp_text(range.get(0, "last_pickup")),
        zone_count,
        total_revenue,
    };

    tracing::debug!(
        backend = backend.name(),
        total_trips = overview.total_trips,
        zone_count = overview.zone_count,
        "overview computed"
    );

    Ok(MetricReport::new(
        "overview",
        overview,
        assumptions(&[
            ("revenue", "Revenue is the sum of total_amount"),
            ("trips", "Only trips whose dropoff is after pickup"),
        ]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxi_query::CapabilityProfile;

    #[test]
    fn test_aggregate_statement() {
        let statement = aggregate(
            Dialect::new(CapabilityProfile::Reduced),
            &AnalysisWindow::default(),
            &[("COUNT(*)".to_string(), "total_trips")],
        );
        assert_eq!(
            statement.sql,
            "SELECT COUNT(*) AS total_trips FROM trips \
             WHERE tpep_pickup_datetime >= $1 AND tpep_pickup_datetime < $2 \
             AND tpep_dropoff_datetime > tpep_pickup_datetime"
        );
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn test_timestamp_text() {
        assert_eq!(timestamp_text(Some(&Value::Null)), None);
        assert_eq!(timestamp_text(None), None);
        assert_eq!(
            timestamp_text(Some(&Value::Text("2025-01-01 10:00:00".into()))),
            Some("2025-01-01 10:00:00".to_string())
        );
    }
}
