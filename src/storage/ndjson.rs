//! NDJSON (Newline Delimited JSON) record files
//!
//! One JSON object per line, one record per object. Values must be scalars.

use crate::etl::{Extractor, Loader};
use crate::table::Record;

use eyre::{Context, Result};
use std::path::{Path, PathBuf};

/// Read records from an NDJSON file
pub struct NdjsonReader {
    path: PathBuf,
}

impl NdjsonReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read all lines as records
    pub fn read(&self) -> Result<Vec<Record>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read NDJSON file: {}", self.path.display()))?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!(
                        "Failed to parse record on line {} of {}",
                        number + 1,
                        self.path.display()
                    )
                })
            })
            .collect()
    }
}

// Implement Extractor trait for reading NDJSON files

impl Extractor for NdjsonReader {
    type Item = Record;

    fn extract(&self) -> Result<Vec<Self::Item>> {
        self.read()
    }
}

/// Write records to an NDJSON file
pub struct NdjsonWriter {
    path: PathBuf,
}

impl NdjsonWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write records as NDJSON, replacing the file
    pub fn write(&self, records: &[Record]) -> Result<()> {
        let ndjson = to_ndjson(records)?;
        std::fs::write(&self.path, ndjson)
            .with_context(|| format!("Failed to write NDJSON file: {}", self.path.display()))?;

        Ok(())
    }
}

/// Render records as NDJSON text, with a trailing newline unless empty
pub fn to_ndjson(records: &[Record]) -> Result<String> {
    let ndjson = records
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?
        .join("\n");

    Ok(if ndjson.is_empty() {
        String::new()
    } else {
        format!("{}\n", ndjson)
    })
}

// Implement Loader trait for writing NDJSON files

impl Loader for NdjsonWriter {
    type Item = Record;

    fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
        self.write(&items)?;
        Ok(items.len())
    }
}
