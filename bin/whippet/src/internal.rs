//! Internal self-metrics source.

use std::time::{Duration, Instant};

use tokio::time::interval;
use tracing::trace;
use whippet_aggregate::MetricSink;
use whippet_metric::{Metric, TagSet};

/// Folds the daemon's own liveness metrics through the ingress sink, once per second.
///
/// Samples are submitted without waiting; if the ingress queue is saturated with real traffic,
/// internal samples are the ones dropped.
pub(crate) async fn run_internal_source(sink: MetricSink) {
    let started = Instant::now();
    let tags: TagSet = [concat!("version:", env!("CARGO_PKG_VERSION"))].into_iter().collect();

    let mut tick = interval(Duration::from_secs(1));
    loop {
        tick.tick().await;

        let uptime = Metric::gauge("whippet.uptime_seconds", started.elapsed().as_secs_f64())
            .with_tags(tags.clone());
        let heartbeat = Metric::counter("whippet.heartbeat", 1.0).with_tags(tags.clone());

        for metric in [uptime, heartbeat] {
            if sink.try_send(metric).is_err() {
                trace!("Ingress queue saturated; dropped internal sample.");
            }
        }
    }
}
