use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::database::{Driver, Row};
use crate::error::{Error, Result};

/// Open `uri` and stream its rows from a blocking thread.
///
/// The connection and cursor never leave that thread. Scanning stops when
/// the receiver is dropped or `cancel` fires. A connection or query failure
/// is sent as the last item before the channel closes.
pub(crate) fn spawn_scanner(
    driver: Arc<dyn Driver>,
    engine: String,
    uri: Arc<str>,
    cancel: CancellationToken,
) -> mpsc::Receiver<Result<Row>> {
    let (tx, rx) = mpsc::channel(1);

    tokio::task::spawn_blocking(move || {
        let mut conn = match driver.open(&uri) {
            Ok(conn) => conn,
            Err(e) => {
                let _ = tx.blocking_send(Err(Error::Connection {
                    engine,
                    uri: uri.to_string(),
                    source: e.into(),
                }));
                return;
            }
        };

        let mut visit = |row: anyhow::Result<Row>| {
            if cancel.is_cancelled() {
                return false;
            }
            let item = row.map_err(|e| Error::RowScan {
                uri: uri.to_string(),
                source: e.into(),
            });
            tx.blocking_send(item).is_ok()
        };

        if let Err(e) = conn.scan_documents(&mut visit) {
            let _ = tx.blocking_send(Err(Error::Query {
                uri: uri.to_string(),
                source: e.into(),
            }));
        }
    });

    rx
}
