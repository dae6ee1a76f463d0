//! Backend senders for finalized metric snapshots.
#![deny(warnings)]
#![deny(missing_docs)]

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use whippet_metric::MetricSnapshot;

mod blackhole;
pub use self::blackhole::Blackhole;

mod console;
pub use self::console::Console;

mod sanitize;
pub use self::sanitize::coerce_to_numeric;

/// A downstream destination for finalized snapshots.
///
/// Senders receive each flush's snapshot on their own task and are oblivious to the aggregator:
/// the snapshot is fully detached, so implementations may iterate it for as long as a send takes.
/// A sender must tolerate concurrent invocations across distinct snapshots, since a slow send can
/// overlap the next flush.
#[async_trait]
pub trait MetricSender: Send + Sync {
    /// Returns the name of this backend.
    fn name(&self) -> &'static str;

    /// Delivers one snapshot to the backend.
    async fn send_metrics(&self, snapshot: Arc<MetricSnapshot>) -> Result<(), anyhow::Error>;
}

/// Constructs a backend sender by name.
///
/// # Errors
///
/// If the name does not refer to a known backend, an error is returned.
pub fn from_name(name: &str) -> Result<Arc<dyn MetricSender>, anyhow::Error> {
    match name {
        "blackhole" => Ok(Arc::new(Blackhole::default())),
        "console" => Ok(Arc::new(Console)),
        _ => Err(anyhow!("unknown backend '{}'", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_backends_resolve_by_name() {
        assert_eq!(from_name("console").unwrap().name(), "console");
        assert_eq!(from_name("blackhole").unwrap().name(), "blackhole");
        assert!(from_name("graphite-ng").is_err());
    }
}
