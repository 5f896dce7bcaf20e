//! CLI helper functions

use crate::{
    etl::Pipeline,
    mobility::{MobilityPipeline, PipelineResults, Source},
    storage::{DatabaseManager, DbConfig, NdjsonReader, NdjsonWriter, to_ndjson},
    table::Value,
};
use eyre::{Result, bail};
use std::path::Path;

/// Open the persistence layer from `DB_*` environment variables
///
/// Never fails: an unreachable or misconfigured database leaves the manager
/// in memory mode.
pub fn open_database() -> DatabaseManager {
    let config = DbConfig::from_env();
    log::debug!("Database configuration: {}", config);
    DatabaseManager::new(config)
}

/// Run the full mobility pipeline over three NDJSON files
///
/// A missing or malformed file fails only its own source.
pub fn run_pipeline(
    database: &DatabaseManager,
    trips: impl AsRef<Path>,
    travel_times: impl AsRef<Path>,
    transit: impl AsRef<Path>,
) -> PipelineResults {
    log::info!("Running mobility pipeline ({} backend)", database.backend());

    let pipeline = MobilityPipeline::new(database);
    pipeline.run_full_pipeline(
        &NdjsonReader::new(trips),
        &NdjsonReader::new(travel_times),
        &NdjsonReader::new(transit),
    )
}

/// Transform one NDJSON file into another without touching the database
///
/// Pipeline: NdjsonReader → source transformer → NdjsonWriter
pub fn transform_file(
    source: Source,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<usize> {
    let pipeline = Pipeline::new(
        NdjsonReader::new(input),
        source.default_transformer(),
        NdjsonWriter::new(output),
    );
    pipeline.run()
}

/// Render a stored table as NDJSON, optionally truncated to `limit` records
pub fn show_table(database: &DatabaseManager, name: &str, limit: Option<usize>) -> Result<String> {
    if !database.table_exists(name) {
        bail!("Table not found: {}", name);
    }

    let table = database.load_data(name);
    let records = table.records();
    let shown = match limit {
        Some(limit) => &records[..limit.min(records.len())],
        None => records,
    };

    to_ndjson(shown)
}

/// Run a read query with positional parameters and render the rows as NDJSON
pub fn run_query(database: &DatabaseManager, sql: &str, params: &[String]) -> Result<String> {
    let params: Vec<Value> = params.iter().map(|p| parse_param(p)).collect();
    let result = database.execute_query_cached(sql, &params);
    to_ndjson(result.records())
}

/// Execute a schema script against the database
pub fn init_schema(database: &DatabaseManager, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("Schema file not found: {}", path.display());
    }

    if !database.initialize_schema(path) {
        bail!("Failed to initialize schema from {}", path.display());
    }
    Ok(())
}

/// Interpret a command-line query parameter
///
/// `null`, `true` and `false` are literals; numbers become integers or
/// floats; anything else is text.
pub fn parse_param(raw: &str) -> Value {
    match raw {
        "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| raw.parse::<f64>().map(Value::Float))
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
    }
}
