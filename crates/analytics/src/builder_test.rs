//! Tests for query builder

use taxi_query::{CapabilityProfile, ParamValue};

use crate::builder::{JoinKind, QueryBuilder, QueryContext};
use crate::dialect::Dialect;

fn reduced() -> QueryContext {
    QueryContext::new(Dialect::new(CapabilityProfile::Reduced))
}

#[test]
fn test_basic_select() {
    let sql = QueryBuilder::new("trips")
        .select("pulocationid")
        .select("fare_amount")
        .build();

    assert_eq!(sql, "SELECT pulocationid, fare_amount FROM trips");
}

#[test]
fn test_select_star_when_empty() {
    assert_eq!(QueryBuilder::new("taxi_zones").build(), "SELECT * FROM taxi_zones");
}

#[test]
fn test_select_with_alias() {
    let sql = QueryBuilder::new("trips")
        .select_as("COUNT(*)", "trip_count")
        .build();

    assert_eq!(sql, "SELECT COUNT(*) AS trip_count FROM trips");
}

#[test]
fn test_where_clause() {
    let sql = QueryBuilder::new("trips")
        .where_clause("tpep_dropoff_datetime > tpep_pickup_datetime")
        .where_clause("trip_distance > 0")
        .build();

    assert!(sql.ends_with(
        "WHERE tpep_dropoff_datetime > tpep_pickup_datetime AND trip_distance > 0"
    ));
}

#[test]
fn test_group_by_having_order_limit() {
    let mut ctx = reduced();
    let min = ctx.bind("min_trips", 50i64);
    let limit = ctx.bind("limit", 20i64);

    let sql = QueryBuilder::new("trips")
        .select_as("pulocationid", "zone_id")
        .select_as("COUNT(*)", "trip_count")
        .group_by("pulocationid")
        .having(format!("COUNT(*) >= {}", min))
        .order_by_desc("trip_count")
        .order_by("zone_id")
        .limit(limit)
        .build();

    assert_eq!(
        sql,
        "SELECT pulocationid AS zone_id, COUNT(*) AS trip_count FROM trips \
         GROUP BY pulocationid HAVING COUNT(*) >= $1 \
         ORDER BY trip_count DESC, zone_id LIMIT $2"
    );
}

#[test]
fn test_ctes_and_joins() {
    let base = QueryBuilder::new("trips")
        .select_as("pulocationid", "zone_id")
        .select_as("AVG(fare_amount)", "baseline_fare")
        .group_by("pulocationid")
        .build();

    let sql = QueryBuilder::aliased("trips", "t")
        .with_cte("baseline", base)
        .join(JoinKind::Inner, "baseline b", "t.pulocationid = b.zone_id")
        .select("t.fare_amount")
        .build();

    assert!(sql.starts_with("WITH baseline AS (SELECT pulocationid AS zone_id"));
    assert!(sql.contains(") SELECT t.fare_amount FROM trips t JOIN baseline b ON t.pulocationid = b.zone_id"));
}

#[test]
fn test_join_keywords() {
    let sql = QueryBuilder::aliased("demand", "d")
        .join(JoinKind::FullOuter, "supply s", "d.zone_id = s.zone_id")
        .build();
    assert!(sql.contains("FROM demand d FULL OUTER JOIN supply s ON d.zone_id = s.zone_id"));

    let sql = QueryBuilder::aliased("demand", "d")
        .join(JoinKind::Left, "supply s", "d.zone_id = s.zone_id")
        .build();
    assert!(sql.contains("LEFT JOIN supply s"));

    let sql = QueryBuilder::aliased("scores", "s")
        .cross_join("thresholds th")
        .build();
    assert_eq!(sql, "SELECT * FROM scores s CROSS JOIN thresholds th");
}

#[test]
fn test_context_reuses_named_bindings() {
    let mut ctx = reduced();
    let a = ctx.bind("threshold", 1.0);
    let b = ctx.bind("threshold", 2.0);
    assert_eq!(a, b);

    let compiled = ctx.finish(format!("SELECT {}", a));
    assert_eq!(compiled.sql(), "SELECT $1");
    assert_eq!(compiled.statement.params, vec![ParamValue::Real(1.0)]);
}

#[test]
fn test_context_collects_approximations_once() {
    let mut ctx = reduced();
    let dialect = ctx.dialect();

    let a = ctx.fragment(dialect.median("fare_amount").unwrap());
    let b = ctx.fragment(dialect.median("fare_amount").unwrap());
    let c = ctx.fragment(dialect.hour_of_day("tpep_pickup_datetime").unwrap());
    assert_eq!(a, b);
    assert!(c.starts_with("CAST(strftime"));

    let compiled = ctx.finish(format!("SELECT {}", a));
    assert!(!compiled.is_exact());
    assert_eq!(compiled.approximations.len(), 1);
}

#[test]
fn test_full_profile_is_exact() {
    let mut ctx = QueryContext::new(Dialect::new(CapabilityProfile::Full));
    let dialect = ctx.dialect();
    let median = ctx.fragment(dialect.median("fare_amount").unwrap());

    let compiled = ctx.finish(format!("SELECT {} FROM trips", median));
    assert!(compiled.is_exact());
}
