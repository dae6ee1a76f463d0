use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use whippet_metric::MetricSnapshot;

use crate::MetricSender;

/// Blackhole backend.
///
/// Does nothing with the snapshots it receives beyond counting them. It's useful for testing,
/// providing a valid sender implementation without any downstream dependency.
#[derive(Default)]
pub struct Blackhole {
    snapshots: AtomicU64,
}

impl Blackhole {
    /// Returns the number of snapshots received so far.
    pub fn snapshots_received(&self) -> u64 {
        self.snapshots.load(Relaxed)
    }
}

#[async_trait]
impl MetricSender for Blackhole {
    fn name(&self) -> &'static str {
        "blackhole"
    }

    async fn send_metrics(&self, snapshot: Arc<MetricSnapshot>) -> Result<(), anyhow::Error> {
        let received = self.snapshots.fetch_add(1, Relaxed) + 1;
        debug!(
            num_stats = snapshot.num_stats(),
            snapshots_received = received,
            "Discarded snapshot."
        );
        Ok(())
    }
}
