use std::io::Seek;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;

use crate::database::Row;
use crate::error::{Error, Result};
use crate::filters::Filter;
use crate::record::{Record, RecordBody};

/// Turn one row into a record.
///
/// `Ok(None)` means the row produced no output: it was filtered out, or the
/// call was already cancelled when the worker started. The body is dropped
/// on every path that does not hand it on. The permit is held until return.
pub(crate) async fn process_row(
    row: Row,
    filter: Option<Arc<dyn Filter>>,
    uri: Arc<str>,
    cancel: CancellationToken,
    permit: OwnedSemaphorePermit,
) -> Result<Option<Record>> {
    let _permit = permit;

    if cancel.is_cancelled() {
        tracing::trace!(id = row.id, "Skipping row, iteration cancelled");
        return Ok(None);
    }

    let Row { id, body } = row;
    let mut body = RecordBody::from(body);

    if let Some(filter) = filter {
        let accepted = filter.accept(&mut body).await.map_err(|e| Error::Filter {
            id,
            uri: uri.to_string(),
            source: e.into(),
        })?;

        if !accepted {
            tracing::trace!(id, "Row filtered out");
            return Ok(None);
        }

        body.rewind().map_err(|source| Error::Stream {
            id,
            uri: uri.to_string(),
            source,
        })?;
    }

    Ok(Some(Record::in_memory(body)))
}
