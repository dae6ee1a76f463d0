use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt as _;
use whippet_metric::MetricSnapshot;

use crate::MetricSender;

/// Console backend.
///
/// Renders every series of a snapshot as a human-readable line on standard output. Handy when
/// standing up an instance, and the default backend when none is configured.
pub struct Console;

#[async_trait]
impl MetricSender for Console {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send_metrics(&self, snapshot: Arc<MetricSnapshot>) -> Result<(), anyhow::Error> {
        let rendered = render(&snapshot);

        let mut stdout = tokio::io::stdout();
        stdout.write_all(rendered.as_bytes()).await?;
        stdout.flush().await?;

        Ok(())
    }
}

fn render(snapshot: &MetricSnapshot) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail, so the write! results below are ignored wholesale.
    let _ = writeln!(
        out,
        "flush: {} stats, finalized in {:?}, interval {:?}",
        snapshot.num_stats(),
        snapshot.processing_time(),
        snapshot.flush_interval(),
    );

    for (name, tags_key, counter) in snapshot.counters() {
        let _ = writeln!(
            out,
            "counter {}{{{}}} value={} per_second={}",
            name, tags_key, counter.value, counter.per_second,
        );
    }

    for (name, tags_key, gauge) in snapshot.gauges() {
        let _ = writeln!(out, "gauge {}{{{}}} value={}", name, tags_key, gauge.value);
    }

    for (name, tags_key, timer) in snapshot.timers() {
        let _ = write!(
            out,
            "timer {}{{{}}} count={} per_second={}",
            name, tags_key, timer.count, timer.per_second,
        );
        if timer.count > 0 {
            let _ = write!(
                out,
                " min={} max={} mean={} median={} std_dev={} sum={} sum_squares={}",
                timer.min, timer.max, timer.mean, timer.median, timer.std_dev, timer.sum, timer.sum_squares,
            );
            for (field, value) in timer.percentiles.iter() {
                let _ = write!(out, " {}={}", field, value);
            }
        }
        out.push('\n');
    }

    for (name, tags_key, set) in snapshot.sets() {
        let _ = writeln!(out, "set {}{{{}}} cardinality={}", name, tags_key, set.cardinality());
    }

    out
}
