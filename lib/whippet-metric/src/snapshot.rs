//! Finalized flush snapshots.

use std::time::Duration;

use crate::record::{Counter, Counters, Gauge, Gauges, Set, Sets, Timer, Timers};

/// An immutable, detached copy of the aggregator state at a flush instant.
///
/// The snapshot owns deep copies of the four kind maps in their finalized state, so backend
/// senders can iterate it concurrently with ongoing ingestion without ever touching the live
/// aggregator.
#[derive(Clone, Debug, Default)]
pub struct MetricSnapshot {
    num_stats: usize,
    processing_time: Duration,
    flush_interval: Duration,
    counters: Counters,
    gauges: Gauges,
    timers: Timers,
    sets: Sets,
}

impl MetricSnapshot {
    /// Creates a snapshot from finalized kind maps.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        num_stats: usize, processing_time: Duration, flush_interval: Duration, counters: Counters, gauges: Gauges,
        timers: Timers, sets: Sets,
    ) -> Self {
        Self {
            num_stats,
            processing_time,
            flush_interval,
            counters,
            gauges,
            timers,
            sets,
        }
    }

    /// Returns the total number of finalized statistics in the snapshot.
    pub fn num_stats(&self) -> usize {
        self.num_stats
    }

    /// Returns the wall-clock time spent finalizing the snapshot.
    pub fn processing_time(&self) -> Duration {
        self.processing_time
    }

    /// Returns the flush interval the snapshot was produced under.
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Returns `true` if the snapshot contains no series at all.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.gauges.is_empty() && self.timers.is_empty() && self.sets.is_empty()
    }

    /// Returns an iterator over `(name, tag key, record)` for every counter series.
    pub fn counters(&self) -> impl Iterator<Item = (&str, &str, &Counter)> {
        Self::each(&self.counters)
    }

    /// Returns an iterator over `(name, tag key, record)` for every gauge series.
    pub fn gauges(&self) -> impl Iterator<Item = (&str, &str, &Gauge)> {
        Self::each(&self.gauges)
    }

    /// Returns an iterator over `(name, tag key, record)` for every timer series.
    pub fn timers(&self) -> impl Iterator<Item = (&str, &str, &Timer)> {
        Self::each(&self.timers)
    }

    /// Returns an iterator over `(name, tag key, record)` for every set series.
    pub fn sets(&self) -> impl Iterator<Item = (&str, &str, &Set)> {
        Self::each(&self.sets)
    }

    fn each<V>(map: &ahash::AHashMap<String, ahash::AHashMap<String, V>>) -> impl Iterator<Item = (&str, &str, &V)> {
        map.iter().flat_map(|(name, by_tags)| {
            by_tags
                .iter()
                .map(move |(tags_key, record)| (name.as_str(), tags_key.as_str(), record))
        })
    }
}

#[cfg(test)]
mod tests {
    use ahash::AHashMap;

    use super::*;

    #[test]
    fn iterates_every_series() {
        let mut counters = Counters::new();
        let mut by_tags = AHashMap::new();
        by_tags.insert(String::new(), Counter::new(0, Duration::from_secs(1), 3));
        by_tags.insert("env:prod".to_string(), Counter::new(0, Duration::from_secs(1), 5));
        counters.insert("requests".to_string(), by_tags);

        let snapshot = MetricSnapshot::from_parts(
            4,
            Duration::default(),
            Duration::from_secs(1),
            counters,
            Gauges::new(),
            Timers::new(),
            Sets::new(),
        );

        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.num_stats(), 4);

        let mut series = snapshot
            .counters()
            .map(|(name, tags_key, counter)| (name, tags_key, counter.value))
            .collect::<Vec<_>>();
        series.sort_unstable();
        assert_eq!(series, vec![("requests", "", 3), ("requests", "env:prod", 5)]);

        assert_eq!(snapshot.gauges().count(), 0);
        assert_eq!(snapshot.timers().count(), 0);
        assert_eq!(snapshot.sets().count(), 0);
    }
}
