//! Trip store schema contract
//!
//! The batch loader writes two tables: `trips` (append-only facts) and
//! `taxi_zones` (replaced wholesale). Only the identifiers enumerated here are
//! ever interpolated into SQL text; everything else is a bound parameter.
//!
//! Money and distance columns are floating point on both stores. Timestamps
//! are `TIMESTAMP` on PostgreSQL and `YYYY-MM-DD HH:MM:SS` text on SQLite.

use std::fmt;

/// Trip fact table
pub const TRIPS: &str = "trips";

/// Zone reference table
pub const TAXI_ZONES: &str = "taxi_zones";

/// Minimum trips per zone for the congestion ranking
pub const MIN_CONGESTION_TRIPS: i64 = 50;

/// Minimum trips per zone for throughput
pub const MIN_THROUGHPUT_TRIPS: i64 = 50;

/// Minimum trips per zone for short-trip impact
pub const MIN_SHORT_TRIP_TRIPS: i64 = 50;

/// Minimum trips per zone-hour for driver and system incentive scores
pub const MIN_INCENTIVE_TRIPS: i64 = 10;

/// Minimum trips per hour × distance-bin bucket in the variability heatmap
pub const MIN_VARIABILITY_HEATMAP_TRIPS: i64 = 20;

/// Minimum trips per date × hour bucket in variability trends
pub const MIN_VARIABILITY_TREND_TRIPS: i64 = 10;

/// Minimum trips per zone for surge zones
pub const MIN_SURGE_ZONE_TRIPS: i64 = 100;

/// Minimum days of data per zone for surge correlation
pub const MIN_SURGE_CORRELATION_DAYS: i64 = 5;

/// Hours with at most this many trips are dropped from demand correlation
pub const DEMAND_CORRELATION_MIN_EXCLUSIVE: i64 = 10;

/// Columns of the `trips` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripColumn {
    PickupAt,
    DropoffAt,
    PickupZone,
    DropoffZone,
    Distance,
    Fare,
    Tip,
    Total,
    Extra,
    MtaTax,
    Tolls,
    PaymentType,
    RateCode,
    PassengerCount,
    Vendor,
}

impl TripColumn {
    /// Every trip column, in table order
    pub const ALL: [TripColumn; 15] = [
        Self::PickupAt,
        Self::DropoffAt,
        Self::PickupZone,
        Self::DropoffZone,
        Self::Distance,
        Self::Fare,
        Self::Tip,
        Self::Total,
        Self::Extra,
        Self::MtaTax,
        Self::Tolls,
        Self::PaymentType,
        Self::RateCode,
        Self::PassengerCount,
        Self::Vendor,
    ];

    /// Column name in the store
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PickupAt => "tpep_pickup_datetime",
            Self::DropoffAt => "tpep_dropoff_datetime",
            Self::PickupZone => "pulocationid",
            Self::DropoffZone => "dolocationid",
            Self::Distance => "trip_distance",
            Self::Fare => "fare_amount",
            Self::Tip => "tip_amount",
            Self::Total => "total_amount",
            Self::Extra => "extra",
            Self::MtaTax => "mta_tax",
            Self::Tolls => "tolls_amount",
            Self::PaymentType => "payment_type",
            Self::RateCode => "ratecodeid",
            Self::PassengerCount => "passenger_count",
            Self::Vendor => "vendorid",
        }
    }

    /// Column name prefixed with a table alias (`t.fare_amount`)
    pub fn qualified(&self, alias: &str) -> String {
        format!("{}.{}", alias, self.as_str())
    }
}

impl fmt::Display for TripColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Columns of the `taxi_zones` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneColumn {
    LocationId,
    Borough,
    Zone,
    ServiceZone,
}

impl ZoneColumn {
    /// Every zone column, in table order
    pub const ALL: [ZoneColumn; 4] = [
        Self::LocationId,
        Self::Borough,
        Self::Zone,
        Self::ServiceZone,
    ];

    /// Column name in the store
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LocationId => "locationid",
            Self::Borough => "borough",
            Self::Zone => "zone",
            Self::ServiceZone => "service_zone",
        }
    }
}

impl fmt::Display for ZoneColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::validate_operand;

    #[test]
    fn test_all_columns_are_valid_operands() {
        for col in TripColumn::ALL {
            assert!(validate_operand(col.as_str()).is_ok(), "{col}");
            assert!(validate_operand(&col.qualified("t")).is_ok(), "{col}");
        }
        for col in ZoneColumn::ALL {
            assert!(validate_operand(col.as_str()).is_ok(), "{col}");
        }
    }

    #[test]
    fn test_qualified() {
        assert_eq!(TripColumn::Fare.qualified("t"), "t.fare_amount");
        assert_eq!(TripColumn::PickupZone.to_string(), "pulocationid");
    }
}
