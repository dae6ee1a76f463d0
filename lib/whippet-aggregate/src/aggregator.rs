use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, error};
use whippet_backends::MetricSender;
use whippet_metric::Metric;

use crate::config::AggregatorConfiguration;
use crate::sink::MetricSink;
use crate::state::{AggregationState, StatsHandle};
use crate::time::get_unix_timestamp;

/// Upper bound on queued-but-unfolded metrics across the whole ingress queue.
const MAX_QUEUE_SIZE: usize = 10_000;

/// The aggregation pipeline: ingest workers, shared state, and the flush orchestrator.
///
/// Constructing an aggregator allocates the sharded ingress queue; [`run`][Self::run] then spawns
/// one folder task per shard and drives the flush cycle until the process exits. Each flush
/// finalizes a detached snapshot, resets the live state, and dispatches the snapshot to every
/// registered backend on its own task; send results are collected on a shared channel to stamp the
/// health counters.
pub struct Aggregator {
    state: Arc<Mutex<AggregationState>>,
    senders: Vec<Arc<dyn MetricSender>>,
    flush_interval: Duration,
    receivers: Vec<mpsc::Receiver<Metric>>,
    sink: MetricSink,
}

impl Aggregator {
    /// Creates an aggregator from its configuration and the backends to flush to.
    pub fn new(config: &AggregatorConfiguration, senders: Vec<Arc<dyn MetricSender>>) -> Self {
        let state = Arc::new(Mutex::new(AggregationState::new(
            config.flush_interval(),
            config.expiry_interval(),
            config.percent_thresholds().to_vec(),
        )));

        let num_workers = config.max_workers();
        let shard_capacity = (MAX_QUEUE_SIZE / num_workers).max(1);
        let mut shards = Vec::with_capacity(num_workers);
        let mut receivers = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let (shard, receiver) = mpsc::channel(shard_capacity);
            shards.push(shard);
            receivers.push(receiver);
        }

        Self {
            state,
            senders,
            flush_interval: config.flush_interval(),
            receivers,
            sink: MetricSink::new(shards),
        }
    }

    /// Returns a handle for submitting metrics to this aggregator.
    pub fn sink(&self) -> MetricSink {
        self.sink.clone()
    }

    /// Returns a reader for this aggregator's health counters.
    pub fn stats_handle(&self) -> StatsHandle {
        StatsHandle::new(Arc::clone(&self.state))
    }

    /// Runs the aggregation pipeline until the process exits.
    pub async fn run(mut self) {
        let num_workers = self.receivers.len();
        for receiver in self.receivers.drain(..) {
            tokio::spawn(process_queue(receiver, Arc::clone(&self.state)));
        }
        debug!(num_workers, "Aggregator started.");

        // A fixed-cadence ticker: flush latency must not skew the flush schedule, and a stalled
        // flush must not be followed by a burst of catch-up flushes.
        let mut flush = interval_at(tokio::time::Instant::now() + self.flush_interval, self.flush_interval);
        flush.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let (results, mut results_receiver) = mpsc::channel(self.senders.len().max(1) * 2);

        loop {
            select! {
                _ = flush.tick() => {
                    let snapshot = self.state.lock().unwrap().snapshot_and_finalize();
                    self.state.lock().unwrap().reset(get_unix_timestamp());

                    counter!("aggregator_flushes_total").increment(1);
                    debug!(
                        num_stats = snapshot.num_stats(),
                        processing_time_us = snapshot.processing_time().as_micros() as u64,
                        "Flushed aggregation state."
                    );

                    let snapshot = Arc::new(snapshot);
                    for sender in &self.senders {
                        let sender = Arc::clone(sender);
                        let snapshot = Arc::clone(&snapshot);
                        let results = results.clone();
                        tokio::spawn(async move {
                            debug!(backend = sender.name(), "Sending snapshot to backend.");
                            let result = sender.send_metrics(snapshot).await;
                            // The orchestrator outlives every send task, so delivery of the
                            // result can only fail at process teardown.
                            let _ = results.send((sender.name(), result)).await;
                        });
                    }
                }
                Some((backend, result)) = results_receiver.recv() => {
                    let now = get_unix_timestamp();
                    let mut state = self.state.lock().unwrap();
                    match result {
                        Ok(()) => state.stats_mut().last_flush = now,
                        Err(e) => {
                            error!(backend, error = %e, "Failed to send snapshot to backend.");
                            counter!("aggregator_send_failures_total").increment(1);
                            state.stats_mut().last_flush_error = now;
                        }
                    }
                }
            }
        }
    }
}

async fn process_queue(mut receiver: mpsc::Receiver<Metric>, state: Arc<Mutex<AggregationState>>) {
    while let Some(metric) = receiver.recv().await {
        counter!("aggregator_metrics_received_total").increment(1);
        state.lock().unwrap().fold(metric, get_unix_timestamp());
    }
}

#[cfg(test)]
mod tests {
    use whippet_backends::Blackhole;

    use super::*;

    async fn drain_pending_tasks() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn folds_flushes_and_dispatches_to_backends() {
        let blackhole = Arc::new(Blackhole::default());
        let config = AggregatorConfiguration::with_defaults().with_max_workers(2);

        let aggregator = Aggregator::new(&config, vec![Arc::clone(&blackhole) as Arc<dyn MetricSender>]);
        let sink = aggregator.sink();
        let stats = aggregator.stats_handle();
        tokio::spawn(aggregator.run());

        sink.send(Metric::counter("hits", 1.0)).await.unwrap();
        sink.send(Metric::timer("latency", 5.0)).await.unwrap();
        drain_pending_tasks().await;

        assert!(stats.read().last_message > 0);

        // Cross the flush boundary and let the send task and result bookkeeping run.
        tokio::time::advance(Duration::from_millis(1100)).await;
        drain_pending_tasks().await;

        assert_eq!(blackhole.snapshots_received(), 1);
        let stats = stats.read();
        assert!(stats.last_flush > 0);
        assert_eq!(stats.last_flush_error, 0);
        assert_eq!(stats.num_stats, 0, "num_stats is zeroed by the post-flush reset");
    }
}
