use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::record::Record;

/// The output of one call to `iterate`: a lazy, one-shot, cancellable stream.
///
/// Nothing runs until the stream is first polled. Results arrive in the order
/// rows finish processing, not in table order. Dropping the stream cancels
/// the call.
pub struct Records {
    rx: mpsc::Receiver<Result<Record>>,
    pending: Option<BoxFuture<'static, ()>>,
    producer: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl Records {
    /// Wrap a producer that sends results into a channel of `capacity`.
    ///
    /// The producer receives a token derived from `parent` which fires when
    /// the consumer stops.
    pub fn new<F, Fut>(parent: &CancellationToken, capacity: usize, produce: F) -> Self
    where
        F: FnOnce(mpsc::Sender<Result<Record>>, CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = parent.child_token();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let pending: BoxFuture<'static, ()> = Box::pin(produce(tx, cancel.clone()));

        Self {
            rx,
            pending: Some(pending),
            producer: None,
            cancel,
        }
    }

    /// Hand each result to `f` until it returns `false` or the stream ends.
    ///
    /// Returns once the producer has wound down, so every in-flight row
    /// worker has released its slot by then.
    pub async fn until<F>(mut self, mut f: F)
    where
        F: FnMut(Result<Record>) -> bool,
    {
        while let Some(item) = self.next().await {
            if !f(item) {
                break;
            }
        }
        self.stop().await;
    }

    /// Cancel the call and wait for the producer to finish.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        self.pending = None;
        if let Some(producer) = self.producer.take() {
            if let Err(e) = producer.await {
                tracing::error!(error = %e, "Record producer did not shut down cleanly");
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for Records {
    type Item = Result<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(pending) = this.pending.take() {
            this.producer = Some(tokio::spawn(pending));
        }
        this.rx.poll_recv(cx)
    }
}

impl Drop for Records {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordBody;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn counting(
        n: usize,
    ) -> impl FnOnce(mpsc::Sender<Result<Record>>, CancellationToken) -> BoxFuture<'static, ()> {
        move |tx, _cancel| {
            Box::pin(async move {
                for i in 0..n {
                    let record = Record::in_memory(RecordBody::new(i.to_string()));
                    if tx.send(Ok(record)).await.is_err() {
                        return;
                    }
                }
            })
        }
    }

    #[tokio::test]
    async fn producer_is_lazy() {
        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);
        let records = Records::new(&CancellationToken::new(), 1, move |_tx, _cancel| async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::task::yield_now().await;
        assert!(!started.load(Ordering::SeqCst));
        drop(records);
    }

    #[tokio::test]
    async fn yields_everything_sent() {
        let records = Records::new(&CancellationToken::new(), 2, counting(10));
        let items: Vec<_> = records.collect().await;
        assert_eq!(items.len(), 10);
    }

    #[tokio::test]
    async fn until_stops_when_consumer_says_so() {
        let records = Records::new(&CancellationToken::new(), 1, counting(100));
        let mut seen = 0;
        records
            .until(|_| {
                seen += 1;
                seen < 3
            })
            .await;
        assert_eq!(seen, 3);
    }

    #[tokio::test]
    async fn stop_cancels_producer_token() {
        let observed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&observed);
        let mut records = Records::new(&CancellationToken::new(), 1, move |_tx, cancel| async move {
            cancel.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });

        // start the producer, which then waits for cancellation
        let _ = futures::poll!(records.next());
        records.stop().await;
        assert!(records.is_cancelled());
        assert!(observed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn parent_cancellation_reaches_producer() {
        let parent = CancellationToken::new();
        let records = Records::new(&parent, 1, |tx, cancel| async move {
            cancel.cancelled().await;
            drop(tx);
        });
        parent.cancel();

        let items: Vec<_> = records.collect().await;
        assert!(items.is_empty());
    }
}
