use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const fn default_flush_interval() -> u64 {
    1
}

const fn default_expiry_interval() -> u64 {
    300
}

fn default_max_workers() -> usize {
    std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1)
}

fn default_percent_thresholds() -> Vec<f64> {
    vec![90.0]
}

/// Aggregator configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct AggregatorConfiguration {
    /// How often to flush aggregated metrics to the backends, in seconds.
    ///
    /// Also the interval stamped onto newly-created series records. Values below one second are
    /// clamped to one second.
    ///
    /// Defaults to 1 second.
    #[serde(rename = "flush_interval", default = "default_flush_interval")]
    flush_interval_seconds: u64,

    /// How long a series may go without updates before it is evicted, in seconds.
    ///
    /// A value of 0 disables expiry entirely.
    ///
    /// Defaults to 300 seconds (5 minutes).
    #[serde(rename = "expiry_interval", default = "default_expiry_interval")]
    expiry_interval_seconds: u64,

    /// Number of ingest worker tasks draining the ingress queue.
    ///
    /// Defaults to the available parallelism of the host.
    #[serde(default = "default_max_workers")]
    max_workers: usize,

    /// Percentile thresholds computed for every timer at flush.
    ///
    /// Each threshold is a signed percentage: positive thresholds summarize the lowest portion of
    /// the sorted samples and report its upper boundary, negative thresholds summarize the highest
    /// portion and report its lower boundary.
    ///
    /// Defaults to `[90.0]`.
    #[serde(default = "default_percent_thresholds")]
    percent_thresholds: Vec<f64>,
}

impl AggregatorConfiguration {
    /// Creates an `AggregatorConfiguration` with default values.
    pub fn with_defaults() -> Self {
        Self {
            flush_interval_seconds: default_flush_interval(),
            expiry_interval_seconds: default_expiry_interval(),
            max_workers: default_max_workers(),
            percent_thresholds: default_percent_thresholds(),
        }
    }

    /// Overrides the flush interval, in seconds.
    pub fn with_flush_interval(mut self, seconds: u64) -> Self {
        self.flush_interval_seconds = seconds;
        self
    }

    /// Overrides the expiry interval, in seconds.
    pub fn with_expiry_interval(mut self, seconds: u64) -> Self {
        self.expiry_interval_seconds = seconds;
        self
    }

    /// Overrides the number of ingest workers.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Overrides the percentile thresholds.
    pub fn with_percent_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.percent_thresholds = thresholds;
        self
    }

    /// Returns the flush interval, never shorter than one second.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds.max(1))
    }

    /// Returns the expiry interval.
    pub fn expiry_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_interval_seconds)
    }

    /// Returns the number of ingest workers, never less than one.
    pub fn max_workers(&self) -> usize {
        self.max_workers.max(1)
    }

    /// Returns the configured percentile thresholds.
    pub fn percent_thresholds(&self) -> &[f64] {
        &self.percent_thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = AggregatorConfiguration::with_defaults();
        assert_eq!(config.flush_interval(), Duration::from_secs(1));
        assert_eq!(config.expiry_interval(), Duration::from_secs(300));
        assert!(config.max_workers() >= 1);
        assert_eq!(config.percent_thresholds(), &[90.0]);
    }

    #[test]
    fn zero_workers_is_clamped_to_one() {
        let config = AggregatorConfiguration::with_defaults().with_max_workers(0);
        assert_eq!(config.max_workers(), 1);
    }

    #[test]
    fn zero_flush_interval_is_clamped_to_one_second() {
        let config = AggregatorConfiguration::with_defaults().with_flush_interval(0);
        assert_eq!(config.flush_interval(), Duration::from_secs(1));
    }
}
