//! In-process tabular data
//!
//! A [`Table`] is an ordered list of [`Record`]s. There is no declared
//! schema: a table's columns are whatever keys its records carry, in the
//! order they are first seen.

mod record;
mod value;

pub use record::Record;
pub use value::{Value, format_timestamp, parse_timestamp};

use crate::etl::Extractor;
use eyre::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    records: Vec<Record>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Build a table from JSON objects, one per record
    pub fn from_json_rows(rows: Vec<serde_json::Value>) -> Result<Self> {
        rows.into_iter()
            .map(Record::try_from)
            .collect::<Result<Vec<_>>>()
            .map(Self::from_records)
    }

    pub fn to_json_rows(&self) -> Vec<serde_json::Value> {
        self.records.iter().map(Into::into).collect()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Union of all record keys, in first-seen order
    pub fn columns(&self) -> Vec<String> {
        let mut columns = indexmap::IndexSet::new();
        for record in &self.records {
            for column in record.columns() {
                if !columns.contains(column) {
                    columns.insert(column.to_string());
                }
            }
        }
        columns.into_iter().collect()
    }

    /// Values of one column, with `None` for records that lack it
    pub fn column(&self, name: &str) -> Vec<Option<&Value>> {
        self.records.iter().map(|r| r.get(name)).collect()
    }
}

impl FromIterator<Record> for Table {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::from_records(iter.into_iter().collect())
    }
}

impl IntoIterator for Table {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// A raw table in hand extracts as a copy of itself

impl Extractor for Table {
    type Item = Record;

    fn extract(&self) -> Result<Vec<Self::Item>> {
        Ok(self.records.clone())
    }
}
