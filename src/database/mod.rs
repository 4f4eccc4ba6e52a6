pub mod mock;
pub mod sqlite;

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// One row of the `geojson` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: i64,
    pub body: String,
}

/// An open database. Owned by exactly one scanning thread.
pub trait Connection: Send {
    /// Run the documents query and feed every row to `visit`, stopping early
    /// when it returns `false`.
    ///
    /// Per-row read failures are passed to `visit`. Failing to run the query,
    /// or the cursor breaking mid-scan, is returned as the outer error.
    fn scan_documents(&mut self, visit: &mut dyn FnMut(Result<Row>) -> bool) -> Result<()>;
}

/// Opens connections for one database engine. Blocking.
pub trait Driver: Send + Sync {
    fn open(&self, dsn: &str) -> Result<Box<dyn Connection>>;
}

/// Engine name → driver. Built once at startup.
#[derive(Clone)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// A registry with the built-in SQLite driver under `sqlite3` and `sqlite`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let sqlite: Arc<dyn Driver> = Arc::new(sqlite::SqliteDriver);
        registry.register("sqlite3", Arc::clone(&sqlite));
        registry.register("sqlite", sqlite);
        registry
    }

    pub fn register(&mut self, engine: impl Into<String>, driver: Arc<dyn Driver>) {
        self.drivers.insert(engine.into(), driver);
    }

    pub fn get(&self, engine: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(engine).cloned()
    }

    /// Registered engine names, sorted.
    pub fn engines(&self) -> Vec<String> {
        let mut names: Vec<_> = self.drivers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_include_sqlite() {
        let registry = DriverRegistry::default();
        assert_eq!(registry.engines(), vec!["sqlite", "sqlite3"]);
        assert!(registry.get("sqlite3").is_some());
        assert!(registry.get("postgres").is_none());
    }

    #[test]
    fn register_adds_engine() {
        let mut registry = DriverRegistry::new();
        assert!(registry.engines().is_empty());

        registry.register("mock", Arc::new(mock::MockDriver::new(Vec::new())));
        assert_eq!(registry.engines(), vec!["mock"]);
    }
}
