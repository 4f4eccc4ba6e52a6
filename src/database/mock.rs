use anyhow::{Result, anyhow, bail};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Connection, Driver, Row};

/// A scripted row for [`MockDriver`]: a row, or a per-row read failure.
#[derive(Debug, Clone)]
pub enum MockRow {
    Row(Row),
    Broken(String),
}

impl MockRow {
    pub fn row(id: i64, body: impl Into<String>) -> Self {
        MockRow::Row(Row {
            id,
            body: body.into(),
        })
    }
}

/// A scripted driver for tests. Every DSN yields the same rows.
///
/// DSNs listed with [`MockDriver::fail_open`] fail to connect, and those
/// listed with [`MockDriver::fail_query`] fail to run the query.
#[derive(Debug, Default)]
pub struct MockDriver {
    rows: Arc<Vec<MockRow>>,
    unreachable: Vec<String>,
    broken: Vec<String>,
    opened: Arc<AtomicUsize>,
}

impl MockDriver {
    pub fn new(rows: Vec<MockRow>) -> Self {
        Self {
            rows: Arc::new(rows),
            ..Self::default()
        }
    }

    /// `count` rows with ids `1..=count` and bodies from `body`.
    pub fn with_rows(count: i64, body: impl Fn(i64) -> String) -> Self {
        Self::new((1..=count).map(|id| MockRow::row(id, body(id))).collect())
    }

    pub fn fail_open(mut self, dsn: impl Into<String>) -> Self {
        self.unreachable.push(dsn.into());
        self
    }

    pub fn fail_query(mut self, dsn: impl Into<String>) -> Self {
        self.broken.push(dsn.into());
        self
    }

    /// Number of connections opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Driver for MockDriver {
    fn open(&self, dsn: &str) -> Result<Box<dyn Connection>> {
        if self.unreachable.iter().any(|d| d == dsn) {
            bail!("MockDriver: cannot reach '{dsn}'");
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            rows: Arc::clone(&self.rows),
            broken: self.broken.iter().any(|d| d == dsn),
        }))
    }
}

struct MockConnection {
    rows: Arc<Vec<MockRow>>,
    broken: bool,
}

impl Connection for MockConnection {
    fn scan_documents(&mut self, visit: &mut dyn FnMut(Result<Row>) -> bool) -> Result<()> {
        if self.broken {
            bail!("MockDriver: no such table: geojson");
        }
        for row in self.rows.iter() {
            let item = match row {
                MockRow::Row(row) => Ok(row.clone()),
                MockRow::Broken(reason) => Err(anyhow!("{reason}")),
            };
            if !visit(item) {
                break;
            }
        }
        Ok(())
    }
}
