//! Iterator over GeoJSON documents stored in the `geojson` table of a
//! database, one row per document.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::records::Records;
use super::throttle::Throttle;
use super::{DocumentIterator, IteratorRegistry, scan, worker};
use crate::config::IteratorConfig;
use crate::consts::SQL_SCHEME;
use crate::database::{Driver, DriverRegistry, Row};
use crate::error::{Error, Result};
use crate::filters::Filter;
use crate::record::Record;

/// Crawls the `geojson` table of one or more databases.
///
/// Configured by a URI of the form `sql://{engine}?{params}`; see
/// [`IteratorConfig`]. Each input URI passed to [`DocumentIterator::iterate`]
/// is handed to the engine's driver as its DSN.
pub struct SqlIterator {
    engine: String,
    driver: Arc<dyn Driver>,
    filter: Option<Arc<dyn Filter>>,
    throttle: Throttle,
    seen: Arc<AtomicU64>,
    active: Arc<AtomicUsize>,
}

impl SqlIterator {
    pub fn new(uri: &str, drivers: &DriverRegistry) -> Result<Self> {
        let config = IteratorConfig::from_uri(uri)?;
        Self::from_config(uri, config, drivers)
    }

    pub fn from_config(
        uri: &str,
        config: IteratorConfig,
        drivers: &DriverRegistry,
    ) -> Result<Self> {
        let driver = drivers.get(&config.engine).ok_or_else(|| {
            Error::config(
                uri,
                format!(
                    "unknown database engine '{}', expected one of: {}",
                    config.engine,
                    drivers.engines().join(", ")
                ),
            )
        })?;

        let filter = config
            .filters
            .map(|filters| Arc::new(filters) as Arc<dyn Filter>);

        Ok(Self {
            engine: config.engine,
            driver,
            filter,
            throttle: Throttle::new(config.processes),
            seen: Arc::new(AtomicU64::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Replace the filters parsed from the URI.
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Register the `sql` scheme, resolving engines against `drivers`.
    pub fn register(registry: &mut IteratorRegistry, drivers: Arc<DriverRegistry>) {
        registry.register(SQL_SCHEME, move |uri: &str| {
            let iterator: Arc<dyn DocumentIterator> =
                Arc::new(SqlIterator::new(uri, &drivers)?);
            Ok(iterator)
        });
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    fn producer(&self) -> Producer {
        Producer {
            engine: self.engine.clone(),
            driver: Arc::clone(&self.driver),
            filter: self.filter.clone(),
            throttle: self.throttle.clone(),
            seen: Arc::clone(&self.seen),
            active: Arc::clone(&self.active),
        }
    }
}

impl DocumentIterator for SqlIterator {
    fn iterate(&self, cancel: &CancellationToken, uris: &[String]) -> Records {
        let producer = self.producer();
        let uris = uris.to_vec();
        Records::new(cancel, self.throttle.capacity(), move |tx, cancel| {
            producer.run(uris, tx, cancel)
        })
    }

    fn seen(&self) -> u64 {
        self.seen.load(Ordering::SeqCst)
    }

    fn is_iterating(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }
}

/// Marks one call as in progress for as long as it lives.
struct ActiveCall(Arc<AtomicUsize>);

impl ActiveCall {
    fn enter(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(active))
    }
}

impl Drop for ActiveCall {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Per-call state, detached from the iterator so it can run as a task.
struct Producer {
    engine: String,
    driver: Arc<dyn Driver>,
    filter: Option<Arc<dyn Filter>>,
    throttle: Throttle,
    seen: Arc<AtomicU64>,
    active: Arc<AtomicUsize>,
}

impl Producer {
    async fn run(
        self,
        uris: Vec<String>,
        tx: mpsc::Sender<Result<Record>>,
        cancel: CancellationToken,
    ) {
        let _active = ActiveCall::enter(&self.active);

        for uri in uris {
            if cancel.is_cancelled() {
                break;
            }

            let span = tracing::info_span!("iterate", uri = %uri);
            let flow = self.scan_uri(uri.into(), &tx, &cancel).instrument(span).await;
            if let Flow::Stop = flow {
                break;
            }
        }
    }

    /// Scan one URI to completion: every row read, and every worker reported.
    async fn scan_uri(
        &self,
        uri: Arc<str>,
        tx: &mpsc::Sender<Result<Record>>,
        cancel: &CancellationToken,
    ) -> Flow {
        let mut rows = scan::spawn_scanner(
            Arc::clone(&self.driver),
            self.engine.clone(),
            Arc::clone(&uri),
            cancel.clone(),
        );
        let mut tasks: JoinSet<Result<Option<Record>>> = JoinSet::new();
        // A row waiting for a slot. Slots are only taken once a row is in hand.
        let mut pending: Option<Row> = None;
        let mut scanning = true;

        loop {
            if !scanning && pending.is_none() && tasks.is_empty() {
                tracing::debug!("Finished scanning rows");
                return Flow::Continue;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::debug!(in_flight = tasks.len(), "Iteration cancelled");
                    tasks.shutdown().await;
                    return Flow::Stop;
                }

                Some(joined) = tasks.join_next() => {
                    let outcome = joined.unwrap_or_else(|e| {
                        Err(Error::Task {
                            uri: uri.to_string(),
                            reason: e.to_string(),
                        })
                    });

                    let item = match outcome {
                        Ok(Some(record)) => Ok(record),
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to process row");
                            Err(e)
                        }
                    };

                    if !deliver(tx, cancel, item).await {
                        tasks.shutdown().await;
                        return Flow::Stop;
                    }
                }

                acquired = self.throttle.acquire(), if pending.is_some() => {
                    match acquired {
                        Ok(slot) => {
                            if let Some(row) = pending.take() {
                                tasks.spawn(worker::process_row(
                                    row,
                                    self.filter.clone(),
                                    Arc::clone(&uri),
                                    cancel.clone(),
                                    slot,
                                ));
                            }
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                "Throttle closed, no more rows will be processed"
                            );
                            pending = None;
                            scanning = false;
                        }
                    }
                }

                row = rows.recv(), if scanning && pending.is_none() => {
                    match row {
                        None => scanning = false,
                        Some(Ok(row)) => {
                            self.seen.fetch_add(1, Ordering::SeqCst);
                            pending = Some(row);
                        }
                        Some(Err(e)) => {
                            if e.is_fatal_for_uri() {
                                tracing::error!(error = %e, "Failed to read documents");
                            } else {
                                tracing::warn!(error = %e, "Failed to scan row");
                            }
                            if !deliver(tx, cancel, Err(e)).await {
                                tasks.shutdown().await;
                                return Flow::Stop;
                            }
                        }
                    }
                }

                else => return Flow::Continue,
            }
        }
    }
}

/// Send one result to the consumer. `false` once the consumer has stopped.
async fn deliver(
    tx: &mpsc::Sender<Result<Record>>,
    cancel: &CancellationToken,
    item: Result<Record>,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}
