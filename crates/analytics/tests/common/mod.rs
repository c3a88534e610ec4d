//! Shared trip fixtures for the metric integration tests
//!
//! The same trip sets are loaded into SQLite (reduced profile) and, when a
//! server is configured, PostgreSQL (full profile).

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use taxi_analytics::MetricsEngine;
use taxi_query::{
    CapabilityProfile, PoolSettings, QueryBackend, QueryResult, SqliteBackend, TIMESTAMP_FORMAT,
    Value,
};

const CREATE_TRIPS: &str = "CREATE TABLE trips (
    vendorid INTEGER,
    tpep_pickup_datetime TEXT,
    tpep_dropoff_datetime TEXT,
    passenger_count REAL,
    trip_distance REAL,
    ratecodeid REAL,
    pulocationid INTEGER,
    dolocationid INTEGER,
    payment_type INTEGER,
    fare_amount REAL,
    extra REAL,
    mta_tax REAL,
    tip_amount REAL,
    tolls_amount REAL,
    total_amount REAL
)";

const CREATE_ZONES: &str = "CREATE TABLE taxi_zones (
    locationid INTEGER,
    borough TEXT,
    zone TEXT,
    service_zone TEXT
)";

/// Zones loaded into `taxi_zones`
pub const ZONES: [(i64, &str); 2] = [(1, "Alphabet City"), (2, "Battery Park")];

#[derive(Debug, Clone)]
pub struct Trip {
    pub pickup: NaiveDateTime,
    pub dropoff: NaiveDateTime,
    pub pickup_zone: i64,
    pub dropoff_zone: i64,
    pub distance: Option<f64>,
    pub fare: f64,
    pub tip: f64,
}

impl Trip {
    pub fn new(
        pickup_zone: i64,
        pickup: NaiveDateTime,
        minutes: i64,
        distance: f64,
        fare: f64,
    ) -> Self {
        Self {
            pickup,
            dropoff: pickup + Duration::minutes(minutes),
            pickup_zone,
            dropoff_zone: pickup_zone,
            distance: Some(distance),
            fare,
            tip: 0.0,
        }
    }

    pub fn to_zone(mut self, zone: i64) -> Self {
        self.dropoff_zone = zone;
        self
    }

    pub fn without_distance(mut self) -> Self {
        self.distance = None;
        self
    }

    pub fn with_tip(mut self, tip: f64) -> Self {
        self.tip = tip;
        self
    }
}

pub struct Fixture {
    _dir: TempDir,
    pub engine: MetricsEngine,
}

pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// Load trips into a fresh SQLite store
pub async fn fixture(trips: &[Trip]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("nyc_taxi.db").display());
    let backend = SqliteBackend::connect(&url, &PoolSettings::default())
        .await
        .unwrap();

    sqlx::query(CREATE_TRIPS)
        .execute(backend.pool())
        .await
        .unwrap();
    sqlx::query(CREATE_ZONES)
        .execute(backend.pool())
        .await
        .unwrap();

    for trip in trips {
        sqlx::query(
            "INSERT INTO trips (tpep_pickup_datetime, tpep_dropoff_datetime, pulocationid, \
             dolocationid, trip_distance, fare_amount, tip_amount, total_amount) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(trip.pickup.format(TIMESTAMP_FORMAT).to_string())
        .bind(trip.dropoff.format(TIMESTAMP_FORMAT).to_string())
        .bind(trip.pickup_zone)
        .bind(trip.dropoff_zone)
        .bind(trip.distance)
        .bind(trip.fare)
        .bind(trip.tip)
        .bind(trip.fare + trip.tip)
        .execute(backend.pool())
        .await
        .unwrap();
    }

    for (id, zone) in ZONES {
        sqlx::query("INSERT INTO taxi_zones VALUES (?, 'Manhattan', ?, 'Yellow Zone')")
            .bind(id)
            .bind(zone)
            .execute(backend.pool())
            .await
            .unwrap();
    }

    let backend: Arc<dyn QueryBackend> = Arc::new(backend);
    Fixture {
        _dir: dir,
        engine: MetricsEngine::new(backend, CapabilityProfile::Reduced),
    }
}

/// `count` trips in a zone, one minute apart starting at `start`
pub fn repeated(
    zone: i64,
    count: usize,
    start: NaiveDateTime,
    minutes: i64,
    distance: f64,
    fare: f64,
) -> Vec<Trip> {
    (0..count)
        .map(|i| Trip::new(zone, start + Duration::minutes(i as i64), minutes, distance, fare))
        .collect()
}

/// 60 trips in zone 1 and 40 in zone 2, 20 minutes over 4 miles each
pub fn congestion_trips() -> Vec<Trip> {
    let mut trips = repeated(1, 60, at(10, 8, 0), 20, 4.0, 15.0);
    trips.extend(repeated(2, 40, at(10, 8, 0), 20, 4.0, 15.0));
    trips
}

/// Demand-only zone 10 and supply-only zone 20 inside 10:00-11:00 on Jan 10
pub fn wait_time_trips() -> Vec<Trip> {
    let mut trips = Vec::new();
    // Five pickups in zone 10 whose dropoffs fall after the window
    for i in 0..5 {
        trips.push(Trip::new(10, at(10, 10, 5 + i), 85, 3.0, 20.0).to_zone(40));
    }
    // Three pickups before the window dropping off in zone 20 inside it
    for i in 0..3 {
        trips.push(Trip::new(30, at(10, 9, 30 + i), 45, 3.0, 20.0).to_zone(20));
    }
    trips
}

/// Long trips in zone 1 plus short cross-zone trips, enough to clear every
/// minimum-sample threshold
pub fn mixed_trips() -> Vec<Trip> {
    let mut trips = repeated(1, 120, at(10, 8, 0), 20, 4.0, 15.0);
    trips.extend(
        repeated(2, 60, at(11, 18, 0), 9, 0.8, 7.0)
            .into_iter()
            .map(|t| t.to_zone(1)),
    );
    trips
}

pub fn find_row<'a>(result: &'a QueryResult, column: &str, value: &Value) -> Option<&'a Vec<Value>> {
    let idx = result.column_index(column)?;
    result.rows.iter().find(|row| &row[idx] == value)
}

pub fn cell<'a>(result: &'a QueryResult, row: &'a [Value], column: &str) -> &'a Value {
    &row[result.column_index(column).unwrap()]
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}
