//! Process-local named table slots

use crate::table::Table;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Named in-memory tables, used when no external store is reachable
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Table>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a copy of `table` under `name`, replacing prior content
    pub fn store(&self, name: &str, table: &Table) {
        self.slots().insert(name.to_string(), table.clone());
    }

    /// Copy of the slot, or an empty table when unset
    pub fn load(&self, name: &str) -> Table {
        self.slots().get(name).cloned().unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Table> {
        self.slots().remove(name)
    }

    /// Slot names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots().keys().cloned().collect();
        names.sort();
        names
    }
}
