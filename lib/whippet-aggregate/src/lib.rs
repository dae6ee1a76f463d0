//! The aggregation core of the Whippet data plane.
//!
//! Parsed StatsD metrics arrive on a bounded, sharded ingress queue ([`MetricSink`]), where a
//! configurable number of worker tasks fold them into the shared [`AggregationState`]. On a fixed
//! cadence, the [`Aggregator`] finalizes the state into a detached [`MetricSnapshot`], resets the
//! live state, and fans the snapshot out to every registered backend sender, collecting send
//! results to keep the aggregator health counters current.
//!
//! [`MetricSnapshot`]: whippet_metric::MetricSnapshot
#![deny(warnings)]
#![deny(missing_docs)]

mod aggregator;
pub use self::aggregator::Aggregator;

mod config;
pub use self::config::AggregatorConfiguration;

mod sink;
pub use self::sink::MetricSink;

mod state;
pub use self::state::{AggregationState, AggregatorStats, StatsHandle};

mod statistics;

mod time;
pub use self::time::get_unix_timestamp;
