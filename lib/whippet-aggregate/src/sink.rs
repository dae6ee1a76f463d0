//! The ingress handle the parser submits metrics through.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendError, TrySendError};
use whippet_metric::Metric;

/// A cheaply cloneable handle onto the aggregator's ingress queue.
///
/// The queue is bounded and sharded per ingest worker, with the shard chosen by hashing the
/// metric's series identity, so every sample for a given `(name, tag key)` is folded by the same
/// worker in submission order. Between distinct series there is no ordering guarantee.
#[derive(Clone)]
pub struct MetricSink {
    shards: Arc<Vec<mpsc::Sender<Metric>>>,
    hasher: ahash::RandomState,
}

impl MetricSink {
    pub(crate) fn new(shards: Vec<mpsc::Sender<Metric>>) -> Self {
        Self {
            shards: Arc::new(shards),
            hasher: ahash::RandomState::new(),
        }
    }

    /// Submits a metric, waiting for queue capacity if necessary.
    ///
    /// # Errors
    ///
    /// If the aggregator has shut down, the metric is handed back in the error.
    pub async fn send(&self, metric: Metric) -> Result<(), SendError<Metric>> {
        self.shard(&metric).send(metric).await
    }

    /// Submits a metric without waiting.
    ///
    /// # Errors
    ///
    /// If the shard's queue is full or the aggregator has shut down, the metric is handed back in
    /// the error; overload handling (typically dropping the sample) is the caller's call.
    pub fn try_send(&self, metric: Metric) -> Result<(), TrySendError<Metric>> {
        self.shard(&metric).try_send(metric)
    }

    fn shard(&self, metric: &Metric) -> &mpsc::Sender<Metric> {
        let key = self.hasher.hash_one((metric.name(), metric.tags_key()));
        &self.shards[(key % self.shards.len() as u64) as usize]
    }
}
