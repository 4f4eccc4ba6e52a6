use anyhow::{Context, Result};
use rusqlite::OpenFlags;

use super::{Connection, Driver, Row};
use crate::consts::DOCUMENTS_QUERY;

/// Opens SQLite database files read-only.
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn open(&self, dsn: &str) -> Result<Box<dyn Connection>> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = rusqlite::Connection::open_with_flags(dsn, flags)
            .with_context(|| format!("failed to open sqlite database '{dsn}'"))?;
        Ok(Box::new(SqliteConnection { conn }))
    }
}

pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl Connection for SqliteConnection {
    fn scan_documents(&mut self, visit: &mut dyn FnMut(Result<Row>) -> bool) -> Result<()> {
        let mut stmt = self.conn.prepare(DOCUMENTS_QUERY)?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let item = read_row(row).map_err(anyhow::Error::from);
            if !visit(item) {
                break;
            }
        }
        Ok(())
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok(Row {
        id: row.get(0)?,
        body: row.get(1)?,
    })
}
