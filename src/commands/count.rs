use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::consts::format_number;
use crate::iterate::DocumentIterator;

/// What a `count` run found.
#[derive(Debug, Clone, Serialize)]
pub struct CountSummary {
    /// Records yielded after filtering.
    pub records: u64,
    /// Rows scanned during this run.
    pub seen: u64,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

impl CountSummary {
    pub fn describe(&self) -> String {
        format!(
            "Counted {} records (saw {} rows) in {:.3}s",
            format_number(self.records),
            format_number(self.seen),
            self.elapsed.as_secs_f64()
        )
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Count every record in `uris`. Stops at the first error.
pub async fn run(
    iterator: &dyn DocumentIterator,
    cancel: &CancellationToken,
    uris: &[String],
) -> Result<CountSummary> {
    let started = Instant::now();
    let seen_before = iterator.seen();
    let mut records = 0u64;
    let mut failure = None;

    iterator
        .iterate(cancel, uris)
        .until(|item| match item {
            Ok(_record) => {
                records += 1;
                true
            }
            Err(e) => {
                failure = Some(e);
                false
            }
        })
        .await;

    if let Some(e) = failure {
        return Err(anyhow::Error::new(e).context("failed to count records"));
    }

    let summary = CountSummary {
        records,
        seen: iterator.seen() - seen_before,
        elapsed: started.elapsed(),
    };
    tracing::debug!(records = summary.records, seen = summary.seen, "Count complete");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::mock_iterator;

    #[tokio::test]
    async fn counts_every_row() {
        let it = mock_iterator(37, "?processes=10");
        let summary = run(&it, &CancellationToken::new(), &["a.db".to_string()]).await.unwrap();
        assert_eq!(summary.records, 37);
        assert_eq!(summary.seen, 37);
    }

    #[tokio::test]
    async fn counts_filtered_records_but_all_rows() {
        let it = mock_iterator(37, "?exclude=properties.sfomuseum:uri=2019");
        let summary = run(&it, &CancellationToken::new(), &["a.db".to_string()]).await.unwrap();
        assert_eq!(summary.records, 36);
        assert_eq!(summary.seen, 37);
    }

    #[tokio::test]
    async fn seen_is_per_run() {
        let it = mock_iterator(5, "");
        let uris = ["a.db".to_string(), "b.db".to_string()];
        run(&it, &CancellationToken::new(), &uris).await.unwrap();
        let second = run(&it, &CancellationToken::new(), &uris).await.unwrap();
        assert_eq!(second.seen, 10);
        assert_eq!(it.seen(), 20);
    }

    #[test]
    fn summary_serializes_millis() {
        let summary = CountSummary {
            records: 1,
            seen: 37,
            elapsed: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["elapsed_ms"], 1500);
        assert_eq!(json["seen"], 37);
        assert!(summary.describe().starts_with("Counted 1 records (saw 37 rows)"));
    }
}
