//! Database-or-memory persistence
//!
//! [`DatabaseManager`] fronts the external store and falls back to
//! process-local slots whenever the store is unreachable or a write fails.
//! None of its operations return errors: failures are logged and turned into
//! a `false`, an empty table, or a memory-store result.

use super::cache::QueryCache;
use super::config::DbConfig;
use super::memory::MemoryStore;
use super::params::to_named;
use super::sqlite::SqliteStore;
use super::TableStore;
use crate::table::{Table, Value};
use eyre::{Context, Result};
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Which store currently answers reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    External,
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::External => write!(f, "external"),
            Backend::Memory => write!(f, "memory"),
        }
    }
}

/// Persistence handle, built once at start-up and passed to whoever needs it
pub struct DatabaseManager {
    config: Option<DbConfig>,
    connection: Mutex<Option<SqliteStore>>,
    memory: MemoryStore,
    cache: QueryCache,
}

impl DatabaseManager {
    /// Build a manager for `config` and try to connect right away
    pub fn new(config: DbConfig) -> Self {
        let manager = Self {
            config: Some(config),
            connection: Mutex::new(None),
            memory: MemoryStore::new(),
            cache: QueryCache::default(),
        };
        manager.connect();
        manager
    }

    /// A manager that never reaches for an external store
    pub fn memory_only() -> Self {
        Self {
            config: None,
            connection: Mutex::new(None),
            memory: MemoryStore::new(),
            cache: QueryCache::default(),
        }
    }

    fn connection(&self) -> MutexGuard<'_, Option<SqliteStore>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect to the external store if not already connected
    ///
    /// Returns whether an external store is available. A failure is logged
    /// and leaves the manager in memory mode.
    pub fn connect(&self) -> bool {
        let mut connection = self.connection();
        if connection.is_some() {
            return true;
        }

        let Some(config) = &self.config else {
            log::debug!("No external store configured, using in-memory storage");
            return false;
        };

        let opened = config
            .database_path()
            .and_then(|path| SqliteStore::open(path));
        match opened {
            Ok(store) => {
                log::info!(
                    "Connected to database {} ({})",
                    config,
                    store.path().display()
                );
                *connection = Some(store);
                true
            }
            Err(e) => {
                log::warn!("Failed to connect to database {}: {:#}", config, e);
                log::info!("Using in-memory storage as fallback");
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_some()
    }

    pub fn backend(&self) -> Backend {
        match self.is_connected() {
            true => Backend::External,
            false => Backend::Memory,
        }
    }

    /// Drop the cached connection; later calls run in memory mode
    pub fn close(&self) {
        if self.connection().take().is_some() {
            log::info!("Database connection closed");
        }
        self.cache.clear();
    }

    fn store_in_memory(&self, table: &Table, name: &str) -> bool {
        self.memory.store(name, table);
        log::info!("Data stored in memory: {} ({} records)", name, table.len());
        true
    }

    /// Persist `table` under `name`, replacing whatever was there
    ///
    /// If the external write fails, the external copy is dropped so the
    /// memory slot is the only content under `name`.
    pub fn save_data(&self, table: &Table, name: &str) -> bool {
        let saved = self.write(table, name);
        self.cache.clear();
        saved
    }

    fn write(&self, table: &Table, name: &str) -> bool {
        let mut connection = self.connection();
        let Some(store) = connection.as_mut() else {
            return self.store_in_memory(table, name);
        };

        match store.write_table(table, name) {
            Ok(count) => {
                self.memory.remove(name);
                log::info!("Data saved to database table: {} ({} records)", name, count);
                true
            }
            Err(e) => {
                log::error!("Database error saving {}: {:#}", name, e);
                if let Err(e) = store.drop_table(name) {
                    log::warn!("Could not drop stale database table {}: {:#}", name, e);
                }
                self.store_in_memory(table, name)
            }
        }
    }

    /// Load `name`, preferring a memory slot, then the external store, else empty
    ///
    /// A memory slot only exists while it holds the latest write, so it
    /// wins over anything left in the external store.
    pub fn load_data(&self, name: &str) -> Table {
        if self.memory.contains(name) {
            return self.memory.load(name);
        }

        let connection = self.connection();
        let Some(store) = connection.as_ref() else {
            return Table::new();
        };

        match store.table_exists(name) {
            Ok(true) => match store.read_table(name) {
                Ok(table) => {
                    log::info!("Data loaded from database table: {}", name);
                    table
                }
                Err(e) => {
                    log::error!("Error loading {} from database: {:#}", name, e);
                    Table::new()
                }
            },
            Ok(false) => Table::new(),
            Err(e) => {
                log::error!("Error looking up table {}: {:#}", name, e);
                Table::new()
            }
        }
    }

    /// Whether `name` has been stored
    ///
    /// With an external store, tables that fell back to memory still count.
    pub fn table_exists(&self, name: &str) -> bool {
        if self.memory.contains(name) {
            return true;
        }

        let connection = self.connection();
        let Some(store) = connection.as_ref() else {
            return false;
        };

        store.table_exists(name).unwrap_or_else(|e| {
            log::error!("Error looking up table {}: {:#}", name, e);
            false
        })
    }

    /// Run a read query against the external store
    ///
    /// Positional markers (`?`, `%s`) are bound to `params` in order. Without
    /// an external store, or on any error, the result is an empty table.
    pub fn execute_query(&self, query: &str, params: &[Value]) -> Table {
        self.query_external(query, params).unwrap_or_default()
    }

    /// [`DatabaseManager::execute_query`] memoized by query text and parameters
    ///
    /// The cache is cleared on every write. Failed or disconnected lookups
    /// are not cached.
    pub fn execute_query_cached(&self, query: &str, params: &[Value]) -> Table {
        let key = QueryCache::key(query, params);
        if let Some(table) = self.cache.get(&key) {
            log::debug!("Query cache hit: {}", query);
            return table;
        }

        match self.query_external(query, params) {
            Some(table) => {
                self.cache.put(key, table.clone());
                table
            }
            None => Table::new(),
        }
    }

    fn query_external(&self, query: &str, params: &[Value]) -> Option<Table> {
        let connection = self.connection();
        let Some(store) = connection.as_ref() else {
            log::warn!("Cannot execute query: No database connection");
            return None;
        };

        let result = to_named(query, params).and_then(|named| store.query(&named));
        match result {
            Ok(table) => Some(table),
            Err(e) => {
                log::error!("Query execution error: {:#}", e);
                None
            }
        }
    }

    /// Execute a SQL script, split on `;`, in one transaction
    pub fn execute_script(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut connection = self.connection();
        let Some(store) = connection.as_mut() else {
            log::warn!("Cannot execute script: No database connection");
            return false;
        };

        let executed = match run_script(store, path) {
            Ok(count) => {
                log::info!(
                    "Successfully executed script: {} ({} statements)",
                    path.display(),
                    count
                );
                true
            }
            Err(e) => {
                log::error!("Error executing script {}: {:#}", path.display(), e);
                false
            }
        };
        self.cache.clear();
        executed
    }

    /// Apply the schema script at `path`; a missing file is only a warning
    pub fn initialize_schema(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Schema file not found: {}", path.display());
            return false;
        }
        self.execute_script(path)
    }

    /// Names held in the memory store
    pub fn memory_tables(&self) -> Vec<String> {
        self.memory.names()
    }
}

fn run_script(store: &mut SqliteStore, path: &Path) -> Result<usize> {
    let script = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    let statements = script.split(';').map(str::trim).filter(|s| !s.is_empty());
    store.execute_statements(statements)
}

impl TableStore for DatabaseManager {
    fn save_data(&self, table: &Table, name: &str) -> bool {
        DatabaseManager::save_data(self, table, name)
    }

    fn load_data(&self, name: &str) -> Table {
        DatabaseManager::load_data(self, name)
    }

    fn table_exists(&self, name: &str) -> bool {
        DatabaseManager::table_exists(self, name)
    }
}
