//! Per-series aggregation records.
//!
//! One record exists per `(name, tag key)` pair within a kind's map, accumulating every sample
//! folded into the series since the last reset. The flush computation finalizes the derived
//! fields (rates, timer statistics) in place before the snapshot is taken.

use std::time::Duration;

use ahash::AHashMap;

/// Aggregation state for the counters of a single series.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Counter {
    /// Cumulative value since the last reset.
    pub value: i64,

    /// Per-second rate over the flush interval, computed at flush.
    pub per_second: f64,

    /// Unix timestamp of the most recent fold.
    pub timestamp: u64,

    /// The flush interval configured when this record was created.
    pub interval: Duration,
}

impl Counter {
    /// Creates a counter record with an initial value.
    pub fn new(timestamp: u64, interval: Duration, value: i64) -> Self {
        Self {
            value,
            per_second: 0.0,
            timestamp,
            interval,
        }
    }
}

/// Aggregation state for the gauge of a single series.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gauge {
    /// The most recently observed value.
    pub value: f64,

    /// Unix timestamp of the most recent fold.
    pub timestamp: u64,

    /// The flush interval configured when this record was created.
    pub interval: Duration,
}

impl Gauge {
    /// Creates a gauge record with an initial value.
    pub fn new(timestamp: u64, interval: Duration, value: f64) -> Self {
        Self {
            value,
            timestamp,
            interval,
        }
    }
}

/// Aggregation state for the timer of a single series.
///
/// Samples accumulate in `values` between flushes; every other field is derived from the sorted
/// samples by the flush computation. A timer with no samples in the window carries a zero count
/// and zero rate, and no statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timer {
    /// Every sample observed since the last reset.
    pub values: Vec<f64>,

    /// Smallest sample in the window.
    pub min: f64,

    /// Largest sample in the window.
    pub max: f64,

    /// Number of samples in the window.
    pub count: u64,

    /// Samples per second over the flush interval.
    pub per_second: f64,

    /// Arithmetic mean of the samples.
    pub mean: f64,

    /// Median of the sorted samples, interpolated for even counts.
    pub median: f64,

    /// Population standard deviation of the samples.
    pub std_dev: f64,

    /// Sum of the samples.
    pub sum: f64,

    /// Sum of the squared samples.
    pub sum_squares: f64,

    /// Per-threshold percentile fields, keyed by emitted field name.
    pub percentiles: Percentiles,

    /// Unix timestamp of the most recent fold.
    pub timestamp: u64,

    /// The flush interval configured when this record was created.
    pub interval: Duration,
}

impl Timer {
    /// Creates a timer record from an initial batch of samples.
    pub fn new(timestamp: u64, interval: Duration, values: Vec<f64>) -> Self {
        Self {
            values,
            timestamp,
            interval,
            ..Self::default()
        }
    }
}

/// Aggregation state for the set of a single series.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Set {
    /// Occurrence counts per distinct member observed since the last reset.
    pub values: AHashMap<String, i64>,

    /// Unix timestamp of the most recent fold.
    pub timestamp: u64,

    /// The flush interval configured when this record was created.
    pub interval: Duration,
}

impl Set {
    /// Creates an empty set record.
    pub fn new(timestamp: u64, interval: Duration) -> Self {
        Self {
            values: AHashMap::new(),
            timestamp,
            interval,
        }
    }

    /// Records one occurrence of the given member.
    pub fn insert<V>(&mut self, member: V)
    where
        V: Into<String>,
    {
        *self.values.entry(member.into()).or_insert(0) += 1;
    }

    /// Returns the number of distinct members observed in the window.
    pub fn cardinality(&self) -> usize {
        self.values.len()
    }
}

/// Percentile fields emitted for a timer, keyed by field name.
///
/// Fields keep their insertion order, and setting an already-present key replaces its value
/// rather than adding a second entry, so the length always reflects the number of distinct
/// emitted fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Percentiles(Vec<(String, f64)>);

impl Percentiles {
    /// Sets the given field, replacing any existing value under the same key.
    pub fn set<K>(&mut self, key: K, value: f64)
    where
        K: Into<String>,
    {
        let key = key.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, existing_value)) => *existing_value = value,
            None => self.0.push((key, value)),
        }
    }

    /// Gets the value of the given field, if present.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| *value)
    }

    /// Returns the number of distinct fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no fields have been set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(key, value)| (key.as_str(), *value))
    }
}

/// Counter records, keyed by metric name and then by tag key.
pub type Counters = AHashMap<String, AHashMap<String, Counter>>;

/// Gauge records, keyed by metric name and then by tag key.
pub type Gauges = AHashMap<String, AHashMap<String, Gauge>>;

/// Timer records, keyed by metric name and then by tag key.
pub type Timers = AHashMap<String, AHashMap<String, Timer>>;

/// Set records, keyed by metric name and then by tag key.
pub type Sets = AHashMap<String, AHashMap<String, Set>>;
