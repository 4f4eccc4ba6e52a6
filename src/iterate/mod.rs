pub mod records;
pub mod sql;
pub mod throttle;

mod scan;
mod worker;

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::database::DriverRegistry;
use crate::error::{Error, Result};
pub use records::Records;
pub use sql::SqlIterator;

/// A source of documents, constructed once from a URI and iterated any
/// number of times.
pub trait DocumentIterator: Send + Sync {
    /// Crawl `uris` in order. Each call gets its own cancellation token,
    /// derived from `cancel`, and its own lazy, one-shot [`Records`] stream.
    fn iterate(&self, cancel: &CancellationToken, uris: &[String]) -> Records;

    /// Rows scanned so far, across every call. Never decreases.
    fn seen(&self) -> u64;

    /// Whether any call is currently running.
    fn is_iterating(&self) -> bool;

    /// Release iterator-level resources before the iterator is dropped.
    fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

type Constructor = Arc<dyn Fn(&str) -> Result<Arc<dyn DocumentIterator>> + Send + Sync>;

/// Maps URI schemes to iterator constructors. Built explicitly at startup.
#[derive(Clone, Default)]
pub struct IteratorRegistry {
    constructors: HashMap<String, Constructor>,
}

impl IteratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in iterator (`sql`) over the default drivers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        SqlIterator::register(&mut registry, Arc::new(DriverRegistry::with_defaults()));
        registry
    }

    pub fn register<F>(&mut self, scheme: impl Into<String>, constructor: F)
    where
        F: Fn(&str) -> Result<Arc<dyn DocumentIterator>> + Send + Sync + 'static,
    {
        self.constructors.insert(scheme.into(), Arc::new(constructor));
    }

    /// Build the iterator registered for the scheme of `uri`.
    pub fn new_iterator(&self, uri: &str) -> Result<Arc<dyn DocumentIterator>> {
        let Some((scheme, _)) = uri.split_once("://") else {
            return Err(Error::config(uri, "missing scheme"));
        };

        let constructor = self.constructors.get(scheme).ok_or_else(|| {
            Error::config(
                uri,
                format!(
                    "unknown iterator scheme '{scheme}', expected one of: {}",
                    self.schemes().join(", ")
                ),
            )
        })?;

        constructor(uri)
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<_> = self.constructors.keys().cloned().collect();
        schemes.sort();
        schemes
    }
}
