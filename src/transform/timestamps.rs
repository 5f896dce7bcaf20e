//! Timestamp column parsing

use crate::etl::Transformer;
use crate::table::Record;
use eyre::Result;

/// Columns of the transit stop-event feed
pub const TRANSIT_TIME_FIELDS: &[&str] = &["arrival_time", "departure_time"];

/// Transformer that parses the named columns into UTC timestamps
///
/// Unparsable values become null instead of failing the record. Columns
/// already holding timestamps pass through unchanged.
#[derive(Debug, Clone)]
pub struct TimestampParser {
    columns: Vec<String>,
}

impl TimestampParser {
    pub fn new(columns: Vec<&str>) -> Self {
        Self {
            columns: columns.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Parser for the transit feed: arrival and departure times
    pub fn transit_fields() -> Self {
        Self::new(TRANSIT_TIME_FIELDS.to_vec())
    }

    pub fn apply(&self, mut record: Record) -> Record {
        for column in &self.columns {
            record.update(column, |value| value.coerce_timestamp());
        }
        record
    }

    /// Parse a batch; a column present in any record is filled in every
    /// record, missing cells becoming null
    pub fn apply_batch(&self, records: Vec<Record>) -> Vec<Record> {
        let present = self.present_in(&records);
        records
            .into_iter()
            .map(|record| self.fill(record, &present))
            .collect()
    }

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
            record.insert(*column, value.coerce_timestamp());
        }
        record
    }
}

impl Transformer for TimestampParser {
    type Input = Record;
    type Output = Record;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(self.apply(input))
    }

    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        Ok(self.apply_batch(inputs))
    }
}
