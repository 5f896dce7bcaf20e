//! Table persistence
//!
//! This module handles storing and retrieving named tables:
//! - External relational store (embedded SQLite file)
//! - In-memory fallback slots
//! - Parameter translation and query result caching
//! - NDJSON record files

mod cache;
mod config;
mod manager;
mod memory;
mod ndjson;
mod params;
mod sqlite;

pub use cache::{DEFAULT_QUERY_CACHE_CAPACITY, QueryCache};
pub use config::DbConfig;
pub use manager::{Backend, DatabaseManager};
pub use memory::MemoryStore;
pub use ndjson::{NdjsonReader, NdjsonWriter, to_ndjson};
pub use params::{NamedQuery, to_named};
pub use sqlite::SqliteStore;

use crate::table::Table;
use std::sync::Arc;

/// Named-table storage as seen by the pipeline
///
/// Implementations never fail outright: `save_data` reports success as a
/// flag and `load_data` yields an empty table for unknown names.
pub trait TableStore: Send + Sync {
    /// Persist `table` under `name`, replacing prior content
    fn save_data(&self, table: &Table, name: &str) -> bool;

    fn load_data(&self, name: &str) -> Table;

    fn table_exists(&self, name: &str) -> bool;
}

impl<S: TableStore + ?Sized> TableStore for &S {
    fn save_data(&self, table: &Table, name: &str) -> bool {
        (**self).save_data(table, name)
    }

    fn load_data(&self, name: &str) -> Table {
        (**self).load_data(name)
    }

    fn table_exists(&self, name: &str) -> bool {
        (**self).table_exists(name)
    }
}

impl<S: TableStore + ?Sized> TableStore for Arc<S> {
    fn save_data(&self, table: &Table, name: &str) -> bool {
        (**self).save_data(table, name)
    }

    fn load_data(&self, name: &str) -> Table {
        (**self).load_data(name)
    }

    fn table_exists(&self, name: &str) -> bool {
        (**self).table_exists(name)
    }
}
