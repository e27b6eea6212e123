//! Event merge point: every producer in a run funnels through one task that
//! assigns sequence numbers and timestamps in delivery order.

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::{EventKind, PipelineEvent};

/// Producer handle for a run's event sequence
///
/// Cloned into every article pipeline. Sending waits while the consumer is
/// behind, so a slow consumer stalls production instead of losing events.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::Sender<EventKind>,
}

impl EventSink {
    /// Wrap the sending half of a merge channel
    pub fn new(tx: mpsc::Sender<EventKind>) -> Self {
        Self { tx }
    }

    /// Queue an event for the merge point
    pub async fn emit(&self, kind: EventKind) {
        if let Err(e) = self.tx.send(kind).await {
            tracing::debug!(event = e.0.name(), "Merge point closed, event dropped");
        }
    }
}

/// Spawn the merge task.
///
/// Returns the sink producers write to and the receiver the consumer reads from.
/// The output closes once every clone of the sink has been dropped and the
/// backlog has been forwarded. If the consumer drops its receiver, the run is
/// cancelled and the remaining backlog is drained and discarded so producers
/// never block on a departed consumer.
pub(crate) fn spawn_merge(
    buffer: usize,
    cancel_token: CancellationToken,
) -> (
    EventSink,
    mpsc::Receiver<PipelineEvent>,
    tokio::task::JoinHandle<()>,
) {
    let buffer = buffer.max(1);
    let (kind_tx, mut kind_rx) = mpsc::channel::<EventKind>(buffer);
    let (event_tx, event_rx) = mpsc::channel::<PipelineEvent>(buffer);

    let handle = tokio::spawn(async move {
        let mut seq: u64 = 0;
        let mut consumer_open = true;

        loop {
            let kind = tokio::select! {
                kind = kind_rx.recv() => match kind {
                    Some(kind) => kind,
                    None => break,
                },
                _ = event_tx.closed(), if consumer_open => {
                    tracing::info!(delivered = seq, "Event consumer went away, cancelling run");
                    consumer_open = false;
                    cancel_token.cancel();
                    continue;
                }
            };
            if !consumer_open {
                continue;
            }

            let event = PipelineEvent {
                seq,
                timestamp: Utc::now(),
                kind,
            };

            if event_tx.send(event).await.is_err() {
                tracing::info!(delivered = seq, "Event consumer went away, cancelling run");
                consumer_open = false;
                cancel_token.cancel();
                continue;
            }
            seq += 1;
        }

        tracing::debug!(events = seq, "Event merge finished");
    });

    (EventSink::new(kind_tx), event_rx, handle)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArticleId;

    #[tokio::test]
    async fn sequence_numbers_follow_delivery_order() {
        let (sink, mut rx, handle) = spawn_merge(4, CancellationToken::new());

        let producers: Vec<_> = (0..4)
            .map(|i| {
                let sink = sink.clone();
                tokio::spawn(async move {
                    for _ in 0..5 {
                        sink.emit(EventKind::AnalysisStarted {
                            article_id: ArticleId::new(format!("a{i}")),
                        })
                        .await;
                    }
                })
            })
            .collect();
        drop(sink);

        let mut seqs = Vec::new();
        while let Some(event) = rx.recv().await {
            seqs.push(event.seq);
        }
        for p in producers {
            p.await.unwrap();
        }
        handle.await.unwrap();

        assert_eq!(seqs, (0..20).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn dropped_consumer_cancels_run_and_unblocks_producers() {
        let token = CancellationToken::new();
        let (sink, rx, handle) = spawn_merge(1, token.clone());
        drop(rx);

        for _ in 0..10 {
            sink.emit(EventKind::FetchCompleted {
                count: 0,
                articles: Vec::new(),
            })
            .await;
        }
        drop(sink);
        handle.await.unwrap();

        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn per_producer_order_is_preserved() {
        let (sink, mut rx, handle) = spawn_merge(2, CancellationToken::new());
        let producer = tokio::spawn({
            let sink = sink.clone();
            async move {
                for count in 0..50 {
                    sink.emit(EventKind::FetchCompleted {
                        count,
                        articles: Vec::new(),
                    })
                    .await;
                }
            }
        });
        drop(sink);

        let mut last = None;
        while let Some(event) = rx.recv().await {
            if let EventKind::FetchCompleted { count, .. } = event.kind {
                if let Some(prev) = last {
                    assert!(count > prev);
                }
                last = Some(count);
            }
        }
        producer.await.unwrap();
        handle.await.unwrap();
        assert_eq!(last, Some(49));
    }
}
