//! Scalar cell values
//!
//! A [`Value`] is what a single column of a [`super::Record`] holds. Raw
//! extracted data is mostly text; the transformers coerce it into numbers
//! and timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use eyre::{Result, eyre};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Naive layouts accepted when a timestamp carries no offset. Read as UTC.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A single cell of a table
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Interpret the value as a number, if it reasonably is one
    ///
    /// Text is trimmed and parsed; booleans count as 1 and 0. NaN is treated
    /// as "not a number" so callers can apply their own fill policy.
    pub fn to_number(&self) -> Option<f64> {
        let number = match self {
            Value::Integer(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Text(s) => s.trim().parse::<f64>().ok()?,
            Value::Null | Value::Timestamp(_) => return None,
        };
        (!number.is_nan()).then_some(number)
    }

    /// Interpret the value as a UTC timestamp, if it reasonably is one
    ///
    /// Integers are read as epoch seconds.
    pub fn to_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => parse_timestamp(s),
            Value::Integer(secs) => DateTime::from_timestamp(*secs, 0),
            _ => None,
        }
    }

    /// Numeric coercion: anything unparsable becomes `0.0`
    pub fn coerce_numeric(&self) -> Value {
        Value::Float(self.to_number().unwrap_or(0.0))
    }

    /// Timestamp coercion: anything unparsable becomes null
    pub fn coerce_timestamp(&self) -> Value {
        self.to_timestamp().map_or(Value::Null, Value::Timestamp)
    }
}

/// Parse the timestamp layouts we see in mobility feeds
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical text form of a timestamp, used for NDJSON and the external store
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = eyre::Report;

    /// Convert a JSON scalar. Strings stay text; typing is the transformers' job.
    fn try_from(value: serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;

        Ok(match value {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(
                    n.as_f64()
                        .ok_or_else(|| eyre!("Unrepresentable number: {}", n))?,
                ),
            },
            Json::String(s) => Value::Text(s),
            other @ (Json::Array(_) | Json::Object(_)) => {
                return Err(eyre!("Expected a scalar value, found: {}", other));
            }
        })
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(ts) => serde_json::Value::String(format_timestamp(ts)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Timestamp(ts) => serializer.serialize_str(&format_timestamp(ts)),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::try_from(json).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::from("5.2").coerce_numeric(), Value::Float(5.2));
        assert_eq!(Value::from(" 15.50 ").coerce_numeric(), Value::Float(15.5));
        assert_eq!(Value::Integer(12).coerce_numeric(), Value::Float(12.0));
        assert_eq!(Value::from("not_a_number").coerce_numeric(), Value::Float(0.0));
        assert_eq!(Value::from("NaN").coerce_numeric(), Value::Float(0.0));
        assert_eq!(Value::Null.coerce_numeric(), Value::Float(0.0));
    }

    #[test]
    fn test_timestamp_layouts() {
        let expected = Utc.with_ymd_and_hms(2025, 11, 6, 10, 0, 0).unwrap();

        for input in [
            "2025-11-06T10:00:00Z",
            "2025-11-06T10:00:00+00:00",
            "2025-11-06 10:00:00",
            "2025-11-06T10:00:00",
            "2025-11-06 10:00:00+00:00",
        ] {
            assert_eq!(parse_timestamp(input), Some(expected), "layout: {}", input);
        }

        assert_eq!(
            parse_timestamp("2025-11-06T12:00:00+02:00"),
            Some(expected),
            "offsets are normalized to UTC"
        );
        assert_eq!(
            parse_timestamp("2025-11-06"),
            Utc.with_ymd_and_hms(2025, 11, 6, 0, 0, 0).single()
        );
        assert_eq!(parse_timestamp("invalid_date"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_timestamp_coercion() {
        assert!(Value::from("invalid_date").coerce_timestamp().is_null());
        assert!(Value::from(1.5).coerce_timestamp().is_null());
        assert_eq!(
            Value::Integer(0).coerce_timestamp(),
            Value::Timestamp(DateTime::UNIX_EPOCH)
        );

        let ts = Value::from("2025-11-06T10:00:00Z").coerce_timestamp();
        assert_eq!(ts.coerce_timestamp(), ts);
    }

    #[test]
    fn test_json_conversion() {
        let value: Value = serde_json::from_str("\"2025-11-06T10:00:00Z\"").unwrap();
        assert_eq!(value, Value::from("2025-11-06T10:00:00Z"));

        let value: Value = serde_json::from_str("42").unwrap();
        assert_eq!(value, Value::Integer(42));

        assert!(serde_json::from_str::<Value>("[1, 2]").is_err());
        assert!(serde_json::from_str::<Value>("{\"a\": 1}").is_err());

        let ts = Value::Timestamp(Utc.with_ymd_and_hms(2025, 11, 6, 10, 30, 0).unwrap());
        assert_eq!(
            serde_json::to_string(&ts).unwrap(),
            "\"2025-11-06T10:30:00Z\""
        );
    }
}
