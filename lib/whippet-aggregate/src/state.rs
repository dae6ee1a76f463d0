//! Aggregator state and its three locked operations.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use whippet_metric::{
    Counter, Counters, Gauge, Gauges, Metric, MetricSnapshot, MetricValue, Set, Sets, Timer, Timers,
};

use crate::statistics;

/// Synthetic counter folded by the parser for unparseable datagrams; its value is absorbed into
/// the `bad_lines` health counter at flush.
const BAD_LINES_COUNTER: &str = "statsd.bad_lines_seen";

/// Health counters of an aggregator.
///
/// Timestamps are unix seconds, with zero meaning "never".
#[derive(Clone, Copy, Debug, Default)]
pub struct AggregatorStats {
    /// Cumulative count of unparseable datagrams observed across flushes.
    pub bad_lines: i64,

    /// When the most recent metric was folded.
    pub last_message: u64,

    /// When a backend most recently acknowledged a snapshot.
    pub last_flush: u64,

    /// When a backend send most recently failed.
    pub last_flush_error: u64,

    /// Number of statistics finalized by the most recent flush.
    pub num_stats: usize,

    /// Wall-clock time the most recent flush spent finalizing.
    pub processing_time: Duration,
}

/// A cheap, cloneable reader for the health counters of a running aggregator.
#[derive(Clone)]
pub struct StatsHandle {
    state: Arc<Mutex<AggregationState>>,
}

impl StatsHandle {
    pub(crate) fn new(state: Arc<Mutex<AggregationState>>) -> Self {
        Self { state }
    }

    /// Reads the current health counters.
    pub fn read(&self) -> AggregatorStats {
        self.state.lock().unwrap().stats()
    }
}

/// Live aggregation state: one record per `(name, tag key)` within each kind's map.
///
/// The state is guarded by a single exclusive lock; [`fold`][Self::fold],
/// [`snapshot_and_finalize`][Self::snapshot_and_finalize], and [`reset`][Self::reset] each hold it
/// for their entire duration, and none of them performs I/O.
pub struct AggregationState {
    counters: Counters,
    gauges: Gauges,
    timers: Timers,
    sets: Sets,
    flush_interval: Duration,
    expiry_interval: Duration,
    percent_thresholds: Vec<f64>,
    stats: AggregatorStats,
}

impl AggregationState {
    /// Creates an empty aggregation state.
    pub fn new(flush_interval: Duration, expiry_interval: Duration, percent_thresholds: Vec<f64>) -> Self {
        Self {
            counters: Counters::new(),
            gauges: Gauges::new(),
            timers: Timers::new(),
            sets: Sets::new(),
            flush_interval,
            expiry_interval,
            percent_thresholds,
            stats: AggregatorStats::default(),
        }
    }

    /// Returns a copy of the health counters.
    pub fn stats(&self) -> AggregatorStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut AggregatorStats {
        &mut self.stats
    }

    /// Returns `true` if no series of any kind is being tracked.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.gauges.is_empty() && self.timers.is_empty() && self.sets.is_empty()
    }

    /// Folds one metric into the state.
    ///
    /// Counters accumulate the integer truncation of the sample, gauges replace their value
    /// outright, timers append the sample to their window buffer, and sets count one occurrence of
    /// the member. The series record's timestamp is advanced to `now` on every fold, and a new
    /// record is stamped with the configured flush interval on creation.
    pub fn fold(&mut self, metric: Metric, now: u64) {
        let flush_interval = self.flush_interval;
        let (name, value, tags) = metric.into_parts();
        let tags_key = tags.to_tags_key();

        match value {
            MetricValue::Counter(sample) => {
                self.counters
                    .entry(name)
                    .or_default()
                    .entry(tags_key)
                    .and_modify(|counter| {
                        counter.value = counter.value.wrapping_add(sample as i64);
                        counter.timestamp = now;
                    })
                    .or_insert_with(|| Counter::new(now, flush_interval, sample as i64));
            }
            MetricValue::Gauge(sample) => {
                self.gauges
                    .entry(name)
                    .or_default()
                    .entry(tags_key)
                    .and_modify(|gauge| {
                        gauge.value = sample;
                        gauge.timestamp = now;
                    })
                    .or_insert_with(|| Gauge::new(now, flush_interval, sample));
            }
            MetricValue::Timer(sample) => {
                self.timers
                    .entry(name)
                    .or_default()
                    .entry(tags_key)
                    .and_modify(|timer| {
                        timer.values.push(sample);
                        timer.timestamp = now;
                    })
                    .or_insert_with(|| Timer::new(now, flush_interval, vec![sample]));
            }
            MetricValue::Set(member) => {
                let set = self
                    .sets
                    .entry(name)
                    .or_default()
                    .entry(tags_key)
                    .or_insert_with(|| Set::new(now, flush_interval));
                set.insert(member);
                set.timestamp = now;
            }
        }

        self.stats.last_message = now;
    }

    /// Finalizes the state and returns a detached snapshot of it.
    ///
    /// Counter rates and timer statistics are computed in place, `num_stats` is tallied (two per
    /// counter, one per gauge and set series, nine plus the emitted percentile fields per
    /// non-empty timer), the `statsd.bad_lines_seen` counter under the empty tag key is absorbed
    /// into the cumulative `bad_lines` health counter, and deep copies of the four kind maps are
    /// handed back so senders never touch live state.
    pub fn snapshot_and_finalize(&mut self) -> MetricSnapshot {
        let start = Instant::now();
        let mut num_stats = 0;

        let flush_interval_seconds = self.flush_interval.as_secs_f64();

        for by_tags in self.counters.values_mut() {
            for counter in by_tags.values_mut() {
                counter.per_second = counter.value as f64 / flush_interval_seconds;
                num_stats += 2;
            }
        }

        for by_tags in self.gauges.values() {
            num_stats += by_tags.len();
        }

        for by_tags in self.timers.values_mut() {
            for timer in by_tags.values_mut() {
                if timer.values.is_empty() {
                    timer.count = 0;
                    timer.per_second = 0.0;
                } else {
                    statistics::finalize_timer(timer, &self.percent_thresholds, self.flush_interval);
                    num_stats += 9 + timer.percentiles.len();
                }
            }
        }

        for by_tags in self.sets.values() {
            num_stats += by_tags.len();
        }

        self.stats.num_stats = num_stats;
        self.stats.processing_time = start.elapsed();

        if let Some(bad_lines) = self.counters.get(BAD_LINES_COUNTER).and_then(|by_tags| by_tags.get("")) {
            self.stats.bad_lines += bad_lines.value;
        }

        MetricSnapshot::from_parts(
            num_stats,
            self.stats.processing_time,
            self.flush_interval,
            self.counters.clone(),
            self.gauges.clone(),
            self.timers.clone(),
            self.sets.clone(),
        )
    }

    /// Resets the state after a snapshot has been taken.
    ///
    /// Series idle for longer than the expiry interval are evicted outright, with the metric name
    /// removed once its last tag key goes. Surviving counters, timers, and sets are replaced with
    /// fresh zero-state records that keep their interval and last-fold timestamp; surviving gauges
    /// carry their value forward untouched. The `num_stats` health counter is zeroed.
    pub fn reset(&mut self, now: u64) {
        self.stats.num_stats = 0;

        let expiry_interval = self.expiry_interval;

        self.counters.retain(|_, by_tags| {
            by_tags.retain(|_, counter| {
                if is_expired(expiry_interval, now, counter.timestamp) {
                    return false;
                }
                *counter = Counter::new(counter.timestamp, counter.interval, 0);
                true
            });
            !by_tags.is_empty()
        });

        self.timers.retain(|_, by_tags| {
            by_tags.retain(|_, timer| {
                if is_expired(expiry_interval, now, timer.timestamp) {
                    return false;
                }
                *timer = Timer::new(timer.timestamp, timer.interval, Vec::new());
                true
            });
            !by_tags.is_empty()
        });

        self.sets.retain(|_, by_tags| {
            by_tags.retain(|_, set| {
                if is_expired(expiry_interval, now, set.timestamp) {
                    return false;
                }
                *set = Set::new(set.timestamp, set.interval);
                true
            });
            !by_tags.is_empty()
        });

        // Gauges keep their last value until they expire.
        self.gauges.retain(|_, by_tags| {
            by_tags.retain(|_, gauge| !is_expired(expiry_interval, now, gauge.timestamp));
            !by_tags.is_empty()
        });
    }
}

fn is_expired(expiry_interval: Duration, now: u64, timestamp: u64) -> bool {
    !expiry_interval.is_zero() && now.saturating_sub(timestamp) > expiry_interval.as_secs()
}

#[cfg(test)]
mod tests {
    use whippet_metric::TagSet;

    use super::*;

    const FLUSH_INTERVAL: Duration = Duration::from_secs(1);
    const NO_EXPIRY: Duration = Duration::ZERO;

    fn state_with_expiry(expiry_interval: Duration) -> AggregationState {
        AggregationState::new(FLUSH_INTERVAL, expiry_interval, vec![90.0])
    }

    fn tagged(metric: Metric, tags: &[&str]) -> Metric {
        metric.with_tags(tags.iter().copied().collect::<TagSet>())
    }

    #[test]
    fn counter_round_trip() {
        let mut state = state_with_expiry(NO_EXPIRY);
        for _ in 0..3 {
            state.fold(Metric::counter("hits", 1.0), 10);
        }

        let snapshot = state.snapshot_and_finalize();
        let (_, _, counter) = snapshot.counters().next().unwrap();
        assert_eq!(counter.value, 3);
        assert_eq!(counter.per_second, 3.0);
        assert_eq!(snapshot.num_stats(), 2);
    }

    #[test]
    fn counter_truncates_fractional_samples() {
        let mut state = state_with_expiry(NO_EXPIRY);
        state.fold(Metric::counter("hits", 2.7), 10);

        let snapshot = state.snapshot_and_finalize();
        let (_, _, counter) = snapshot.counters().next().unwrap();
        assert_eq!(counter.value, 2);
    }

    #[test]
    fn gauge_replaces_and_carries_forward() {
        let mut state = state_with_expiry(NO_EXPIRY);
        state.fold(Metric::gauge("temperature", 20.0), 10);
        state.fold(Metric::gauge("temperature", 21.5), 11);

        let snapshot = state.snapshot_and_finalize();
        let (_, _, gauge) = snapshot.gauges().next().unwrap();
        assert_eq!(gauge.value, 21.5);

        // Gauges survive the reset with their value intact.
        state.reset(12);
        let snapshot = state.snapshot_and_finalize();
        let (_, _, gauge) = snapshot.gauges().next().unwrap();
        assert_eq!(gauge.value, 21.5);
    }

    #[test]
    fn set_counts_distinct_members() {
        let mut state = state_with_expiry(NO_EXPIRY);
        state.fold(Metric::set("users", "a"), 10);
        state.fold(Metric::set("users", "a"), 10);
        state.fold(Metric::set("users", "b"), 10);

        let snapshot = state.snapshot_and_finalize();
        assert_eq!(snapshot.num_stats(), 1);

        let (_, _, set) = snapshot.sets().next().unwrap();
        assert_eq!(set.cardinality(), 2);
        assert_eq!(set.values.get("a"), Some(&2));
        assert_eq!(set.values.get("b"), Some(&1));
    }

    #[test]
    fn kinds_are_independent_namespaces() {
        let mut state = state_with_expiry(NO_EXPIRY);
        state.fold(Metric::counter("app.events", 1.0), 10);
        state.fold(Metric::timer("app.events", 5.0), 10);

        let snapshot = state.snapshot_and_finalize();
        assert_eq!(snapshot.counters().count(), 1);
        assert_eq!(snapshot.timers().count(), 1);
    }

    #[test]
    fn distinct_tag_sets_are_distinct_series() {
        let mut state = state_with_expiry(NO_EXPIRY);
        state.fold(tagged(Metric::counter("requests", 1.0), &["env:prod"]), 10);
        state.fold(tagged(Metric::counter("requests", 1.0), &["env:staging"]), 10);
        // Same membership, different attachment order: same series.
        state.fold(
            tagged(Metric::counter("requests", 1.0), &["region:us", "env:prod"]),
            10,
        );
        state.fold(
            tagged(Metric::counter("requests", 1.0), &["env:prod", "region:us"]),
            10,
        );

        let snapshot = state.snapshot_and_finalize();
        let mut series = snapshot
            .counters()
            .map(|(_, tags_key, counter)| (tags_key.to_string(), counter.value))
            .collect::<Vec<_>>();
        series.sort_unstable();
        assert_eq!(
            series,
            vec![
                ("env:prod".to_string(), 1),
                ("env:prod,region:us".to_string(), 2),
                ("env:staging".to_string(), 1),
            ]
        );
    }

    #[test]
    fn timer_flush_emits_statistics_and_tallies_num_stats() {
        let mut state = state_with_expiry(NO_EXPIRY);
        for sample in [1.0, 2.0, 3.0, 4.0, 5.0] {
            state.fold(Metric::timer("latency", sample), 10);
        }

        let snapshot = state.snapshot_and_finalize();
        let (_, _, timer) = snapshot.timers().next().unwrap();
        assert_eq!(timer.count, 5);
        assert_eq!(timer.mean, 3.0);
        assert_eq!(timer.percentiles.get("upper_90"), Some(5.0));

        // 9 aggregate fields plus 5 percentile fields for the single threshold.
        assert_eq!(snapshot.num_stats(), 14);
    }

    #[test]
    fn empty_timer_flushes_with_zero_count_and_rate() {
        let mut state = state_with_expiry(NO_EXPIRY);
        state.fold(Metric::timer("latency", 5.0), 10);
        state.snapshot_and_finalize();
        state.reset(10);

        // The series survived the reset with an empty window.
        let snapshot = state.snapshot_and_finalize();
        let (_, _, timer) = snapshot.timers().next().unwrap();
        assert_eq!(timer.count, 0);
        assert_eq!(timer.per_second, 0.0);
        assert!(timer.values.is_empty());
        assert_eq!(snapshot.num_stats(), 0);
    }

    #[test]
    fn reset_zeroes_surviving_accumulators() {
        let mut state = state_with_expiry(NO_EXPIRY);
        state.fold(Metric::counter("hits", 7.0), 10);
        state.fold(Metric::timer("latency", 5.0), 10);
        state.fold(Metric::set("users", "a"), 10);
        state.snapshot_and_finalize();
        state.reset(11);

        let snapshot = state.snapshot_and_finalize();
        let (_, _, counter) = snapshot.counters().next().unwrap();
        assert_eq!(counter.value, 0);
        assert_eq!(counter.interval, FLUSH_INTERVAL);

        let (_, _, timer) = snapshot.timers().next().unwrap();
        assert!(timer.values.is_empty());

        let (_, _, set) = snapshot.sets().next().unwrap();
        assert_eq!(set.cardinality(), 0);

        assert_eq!(state.stats().num_stats, 0);
    }

    #[test]
    fn expiry_evicts_idle_series_and_spares_refreshed_ones() {
        let mut state = state_with_expiry(Duration::from_secs(2));
        state.fold(Metric::counter("idle", 1.0), 0);
        state.fold(Metric::counter("busy", 1.0), 0);
        state.fold(Metric::counter("busy", 1.0), 1);

        state.reset(3);

        let snapshot = state.snapshot_and_finalize();
        let series = snapshot.counters().map(|(name, _, _)| name.to_string()).collect::<Vec<_>>();
        assert_eq!(series, vec!["busy"]);
    }

    #[test]
    fn zero_expiry_interval_disables_eviction() {
        let mut state = state_with_expiry(NO_EXPIRY);
        state.fold(Metric::counter("idle", 1.0), 0);
        state.fold(Metric::gauge("idle_gauge", 1.0), 0);

        state.reset(1_000_000);

        let snapshot = state.snapshot_and_finalize();
        assert_eq!(snapshot.counters().count(), 1);
        assert_eq!(snapshot.gauges().count(), 1);
    }

    #[test]
    fn expiry_removes_the_name_key_with_its_last_tag_key() {
        let mut state = state_with_expiry(Duration::from_secs(2));
        state.fold(tagged(Metric::gauge("temperature", 1.0), &["room:a"]), 0);
        state.fold(tagged(Metric::gauge("temperature", 2.0), &["room:b"]), 10);

        state.reset(5);
        let snapshot = state.snapshot_and_finalize();
        assert_eq!(snapshot.gauges().count(), 1);
        assert!(!state.is_empty());

        state.reset(100);
        assert!(state.is_empty());
    }

    #[test]
    fn idle_series_expire_even_after_surviving_resets() {
        let mut state = state_with_expiry(Duration::from_secs(5));
        state.fold(Metric::counter("hits", 1.0), 0);

        // A couple of windows pass without folds; the surviving zero-state record keeps its
        // last-fold timestamp rather than being re-stamped.
        state.reset(2);
        state.reset(4);
        assert!(!state.is_empty());

        state.reset(6);
        assert!(state.is_empty());
    }

    #[test]
    fn fold_stamps_last_message() {
        let mut state = state_with_expiry(NO_EXPIRY);
        assert_eq!(state.stats().last_message, 0);

        state.fold(Metric::counter("hits", 1.0), 123);
        assert_eq!(state.stats().last_message, 123);
    }

    #[test]
    fn bad_lines_counter_is_absorbed_cumulatively() {
        let mut state = state_with_expiry(NO_EXPIRY);
        state.fold(Metric::counter(BAD_LINES_COUNTER, 4.0), 10);
        state.snapshot_and_finalize();
        assert_eq!(state.stats().bad_lines, 4);

        state.reset(10);
        state.fold(Metric::counter(BAD_LINES_COUNTER, 2.0), 11);
        state.snapshot_and_finalize();
        assert_eq!(state.stats().bad_lines, 6);
    }

    #[test]
    fn bad_lines_only_counts_the_untagged_series() {
        let mut state = state_with_expiry(NO_EXPIRY);
        state.fold(tagged(Metric::counter(BAD_LINES_COUNTER, 4.0), &["host:a"]), 10);

        state.snapshot_and_finalize();
        assert_eq!(state.stats().bad_lines, 0);
    }
}
