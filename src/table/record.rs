use super::Value;
use eyre::{Result, eyre};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One row: an ordered mapping from column name to [`Value`]
///
/// Column order follows insertion order. Replacing an existing column keeps
/// its position, so re-deriving a column does not reshuffle the record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `column`, or `None` when the record has no such column
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Set `column`, returning the previous value if there was one
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(column.into(), value.into())
    }

    /// Builder-style [`Record::insert`]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Rewrite `column` in place if present
    pub fn update(&mut self, column: &str, f: impl FnOnce(&Value) -> Value) {
        if let Some(value) = self.0.get_mut(column) {
            *value = f(value);
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = eyre::Report;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(column, value)| {
                    let value = Value::try_from(value)
                        .map_err(|e| eyre!("Column '{}': {}", column, e))?;
                    Ok((column, value))
                })
                .collect::<Result<IndexMap<_, _>>>()
                .map(Record),
            other => Err(eyre!("Expected a JSON object per record, found: {}", other)),
        }
    }
}

impl From<&Record> for serde_json::Value {
    fn from(record: &Record) -> Self {
        serde_json::Value::Object(
            record
                .iter()
                .map(|(column, value)| (column.to_string(), value.into()))
                .collect(),
        )
    }
}
