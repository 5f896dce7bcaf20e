//! Per-source transformers for mobility records
//!
//! Every transformer here is record-level, deterministic and idempotent:
//! running it over its own output is a no-op. Bad values are coerced
//! (to null for timestamps, to `0.0` for numbers) and never fail a record.

mod numeric;
mod timestamps;
mod trips;

pub use numeric::{NumericCoercer, TRAVEL_TIME_FIELDS};
pub use timestamps::{TRANSIT_TIME_FIELDS, TimestampParser};
pub use trips::{
    DISTANCE_COLUMN, DROPOFF_COLUMN, DURATION_COLUMN, PICKUP_COLUMN, SPEED_COLUMN,
    TRIP_NUMERIC_FIELDS, TripEnricher,
};

use crate::table::Table;

/// Enrich a table of taxi trips. An empty table comes back empty.
///
/// Derived columns follow the table's columns, so every record gets
/// `trip_duration_minutes` and `speed_mph` when any record can.
pub fn transform_trip_data(table: Table) -> Table {
    Table::from_records(TripEnricher::new().apply_batch(table.into_records()))
}

/// Normalize a table of ride-hail travel times
pub fn transform_travel_time_data(table: Table) -> Table {
    Table::from_records(NumericCoercer::travel_time_fields().apply_batch(table.into_records()))
}

/// Normalize a table of transit stop events
pub fn transform_transit_data(table: Table) -> Table {
    Table::from_records(TimestampParser::transit_fields().apply_batch(table.into_records()))
}
