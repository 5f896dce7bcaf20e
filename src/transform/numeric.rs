//! Numeric column coercion
//!
//! Feeds deliver amounts and durations as text. This transformer turns the
//! named columns into floats, filling anything unparsable with `0.0` so that
//! downstream sums and means stay defined.

use crate::etl::Transformer;
use crate::table::Record;
use eyre::Result;

/// Columns of the ride-hail travel-time feed
pub const TRAVEL_TIME_FIELDS: &[&str] = &["mean_travel_time", "standard_deviation", "geometric_mean"];

/// Transformer that coerces the named columns to floats
///
/// Columns a record does not have are skipped; nothing is injected.
///
/// # Example
/// ```
/// use urban_mobility_etl::transform::NumericCoercer;
/// use urban_mobility_etl::etl::Transformer;
/// use urban_mobility_etl::table::{Record, Value};
///
/// let coercer = NumericCoercer::new(vec!["fare_amount"]);
/// let output = coercer
///     .transform(Record::new().with("fare_amount", "15.50"))
///     .unwrap();
/// assert_eq!(output.get("fare_amount"), Some(&Value::Float(15.5)));
/// ```
#[derive(Debug, Clone)]
pub struct NumericCoercer {
    columns: Vec<String>,
}

impl NumericCoercer {
    pub fn new(columns: Vec<&str>) -> Self {
        Self {
            columns: columns.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Coercer for the travel-time feed: mean, standard deviation, geometric mean
    pub fn travel_time_fields() -> Self {
        Self::new(TRAVEL_TIME_FIELDS.to_vec())
    }

    pub fn apply(&self, mut record: Record) -> Record {
        for column in &self.columns {
            record.update(column, |value| value.coerce_numeric());
        }
        record
    }

    /// Coerce a batch; a column present in any record is filled in every
    /// record, missing cells becoming `0.0`
    pub fn apply_batch(&self, records: Vec<Record>) -> Vec<Record> {
        let present = self.present_in(&records);
        records
            .into_iter()
            .map(|record| self.fill(record, &present))
            .collect()
    }

    /// Configured columns that appear in at least one record
    pub(crate) fn present_in(&self, records: &[Record]) -> Vec<&str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|column| records.iter().any(|record| record.contains(column)))
            .collect()
    }

    pub(crate) fn fill(&self, mut record: Record, present: &[&str]) -> Record {
        for column in present {
            let value = record.get(column).cloned().unwrap_or_default();
            record.insert(*column, value.coerce_numeric());
        }
        record
    }
}

impl Transformer for NumericCoercer {
    type Input = Record;
    type Output = Record;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(self.apply(input))
    }

    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        Ok(self.apply_batch(inputs))
    }
}
