//! Taxi trip enrichment
//!
//! Parses the pickup/dropoff timestamps, derives trip duration and average
//! speed, and normalizes the fare columns.

use super::{NumericCoercer, TimestampParser};
use crate::etl::Transformer;
use crate::table::{Record, Value};
use chrono::{DateTime, Utc};
use eyre::Result;

pub const PICKUP_COLUMN: &str = "pickup_datetime";
pub const DROPOFF_COLUMN: &str = "dropoff_datetime";
pub const DISTANCE_COLUMN: &str = "trip_distance";
pub const DURATION_COLUMN: &str = "trip_duration_minutes";
pub const SPEED_COLUMN: &str = "speed_mph";

/// Amount columns normalized to floats
pub const TRIP_NUMERIC_FIELDS: &[&str] =
    &["trip_distance", "fare_amount", "tip_amount", "total_amount"];

/// Transformer for taxi trip records
///
/// Per record:
/// 1. `pickup_datetime` / `dropoff_datetime` become timestamps (null if unparsable)
/// 2. distance and amount columns become floats (`0.0` if unparsable)
/// 3. with both timestamp columns present, `trip_duration_minutes` is derived
///    (null if either timestamp is null)
/// 4. with `trip_distance` present too, `speed_mph` is derived; it is `0.0`
///    whenever the duration is not positive, never null
///
/// Over a batch, column presence is decided for the whole batch: a column
/// any record carries is filled in every record, so the derived columns
/// appear in all of them.
///
/// Re-applying the transformer to its own output changes nothing.
#[derive(Debug, Clone)]
pub struct TripEnricher {
    timestamps: TimestampParser,
    amounts: NumericCoercer,
}

impl Default for TripEnricher {
    fn default() -> Self {
        Self {
            timestamps: TimestampParser::new(vec![PICKUP_COLUMN, DROPOFF_COLUMN]),
            amounts: NumericCoercer::new(TRIP_NUMERIC_FIELDS.to_vec()),
        }
    }
}

impl TripEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enrich a single record, judging column presence from the record alone
    pub fn apply(&self, record: Record) -> Record {
        derive(self.amounts.apply(self.timestamps.apply(record)))
    }

    /// Enrich a batch, judging column presence from the whole batch
    pub fn apply_batch(&self, records: Vec<Record>) -> Vec<Record> {
        let timestamps = self.timestamps.present_in(&records);
        let amounts = self.amounts.present_in(&records);

        records
            .into_iter()
            .map(|record| self.timestamps.fill(record, &timestamps))
            .map(|record| derive(self.amounts.fill(record, &amounts)))
            .collect()
    }
}

fn derive(mut record: Record) -> Record {
    if !(record.contains(PICKUP_COLUMN) && record.contains(DROPOFF_COLUMN)) {
        return record;
    }

    let pickup = record.get(PICKUP_COLUMN).and_then(Value::as_timestamp);
    let dropoff = record.get(DROPOFF_COLUMN).and_then(Value::as_timestamp);
    let duration = match (pickup, dropoff) {
        (Some(pickup), Some(dropoff)) => Some(minutes_between(pickup, dropoff)),
        _ => None,
    };
    record.insert(DURATION_COLUMN, duration);

    if let Some(distance) = record.get(DISTANCE_COLUMN) {
        let distance = distance.to_number().unwrap_or(0.0);
        record.insert(SPEED_COLUMN, average_speed(distance, duration));
    }
    record
}

impl Transformer for TripEnricher {
    type Input = Record;
    type Output = Record;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(self.apply(input))
    }

    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        Ok(self.apply_batch(inputs))
    }
}

fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0 / 60.0
}

/// Miles per hour, or zero when the duration is unknown or not positive
fn average_speed(distance_miles: f64, duration_minutes: Option<f64>) -> f64 {
    match duration_minutes {
        Some(minutes) if minutes > 0.0 => distance_miles / (minutes / 60.0),
        _ => 0.0,
    }
}
