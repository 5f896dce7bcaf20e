//! Positional to named parameter translation
//!
//! Queries are bound by name. Callers may still write positional markers
//! (`?` or `%s`); the Nth marker is rewritten to `:pN` and the Nth parameter
//! is bound under `pN`. Numbered markers (`?N`) refer to the Nth parameter
//! directly. Markers inside quoted literals and comments are left alone.

use crate::table::Value;
use eyre::{Result, bail};
use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static POSITIONAL_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)'(?:[^']|'')*'|"(?:[^"]|"")*"|--[^\n]*|/\*.*?\*/|\?(\d+)|\?|%s"#)
        .expect("positional marker pattern")
});

/// A query rewritten to named markers, with its bindings in marker order
#[derive(Debug, Clone, PartialEq)]
pub struct NamedQuery {
    pub sql: String,
    pub params: IndexMap<String, Value>,
}

/// Rewrite positional markers in `query` to named ones and bind `params`
///
/// # Errors
/// Returns an error when the markers and parameters do not line up: the
/// number of `?`/`%s` markers, or the highest `?N`, must equal the number of
/// parameters.
pub fn to_named(query: &str, params: &[Value]) -> Result<NamedQuery> {
    let mut markers = 0;
    let mut highest_numbered = 0;
    let mut invalid_numbered = None;

    let sql = POSITIONAL_MARKER
        .replace_all(query, |caps: &Captures| {
            let matched = &caps[0];
            if let Some(number) = caps.get(1) {
                match number.as_str().parse::<usize>() {
                    Ok(n) if n > 0 => {
                        highest_numbered = highest_numbered.max(n);
                        format!(":p{}", n)
                    }
                    _ => {
                        invalid_numbered.get_or_insert_with(|| matched.to_string());
                        matched.to_string()
                    }
                }
            } else if matched.starts_with(['\'', '"', '-', '/']) {
                matched.to_string()
            } else {
                markers += 1;
                format!(":p{}", markers)
            }
        })
        .into_owned();

    if let Some(marker) = invalid_numbered {
        bail!("Invalid numbered marker: {}", marker);
    }

    let expected = markers.max(highest_numbered);
    if expected != params.len() {
        bail!(
            "Query has {} positional marker(s) but {} parameter(s) were given",
            expected,
            params.len()
        );
    }

    let params = params
        .iter()
        .enumerate()
        .map(|(i, value)| (format!("p{}", i + 1), value.clone()))
        .collect();

    Ok(NamedQuery { sql, params })
}
