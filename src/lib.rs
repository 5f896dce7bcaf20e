//! Urban Mobility ETL
//!
//! Extracts taxi trips, ride-hail travel times and transit stop events,
//! normalizes them, and stores them in a relational database with an
//! in-memory fallback.

pub mod cli;
pub mod etl;
pub mod mobility;
pub mod storage;
pub mod table;
pub mod transform;

// Re-exports for convenience
pub use etl::{Extractor, IdentityTransformer, Loader, Pipeline, Transformer};
pub use mobility::{MobilityPipeline, PipelineResults, Source};
pub use storage::{Backend, DatabaseManager, DbConfig, NdjsonReader, NdjsonWriter, TableStore};
pub use table::{Record, Table, Value};
pub use transform::{transform_transit_data, transform_travel_time_data, transform_trip_data};
