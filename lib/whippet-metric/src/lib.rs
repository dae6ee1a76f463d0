//! Metric model for the Whippet data plane.
#![deny(warnings)]
#![deny(missing_docs)]

use std::fmt;

mod tags;
pub use self::tags::{Tag, TagSet};

mod record;
pub use self::record::{Counter, Counters, Gauge, Gauges, Percentiles, Set, Sets, Timer, Timers};

mod snapshot;
pub use self::snapshot::MetricSnapshot;

/// The kind of a metric.
///
/// Each kind is an independent namespace: the same metric name may exist as both a counter and a
/// gauge, and the two never interact.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MetricKind {
    /// A counter, accumulated by summing.
    Counter,

    /// A gauge, holding the last observed value.
    Gauge,

    /// A timer, collecting every observed sample.
    Timer,

    /// A set, tracking occurrences of distinct string values.
    Set,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Gauge => write!(f, "gauge"),
            Self::Timer => write!(f, "timer"),
            Self::Set => write!(f, "set"),
        }
    }
}

/// A single metric sample, discriminated by kind.
///
/// Counters, gauges, and timers carry a numeric sample; sets carry the string member whose
/// occurrence is being recorded.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue {
    /// A counter increment.
    Counter(f64),

    /// An absolute gauge value.
    Gauge(f64),

    /// A single timer sample.
    Timer(f64),

    /// A set member.
    Set(String),
}

impl MetricValue {
    /// Returns the kind of this sample.
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Timer(_) => MetricKind::Timer,
            Self::Set(_) => MetricKind::Set,
        }
    }
}

/// A metric as submitted by the parser.
///
/// ## Structure
///
/// A metric is composed of three parts: the name, the sample value, and the tags.
///
/// The name and tags together identify the series the sample belongs to. Two metrics whose tag
/// sets have equal membership address the same series regardless of the order the tags were
/// attached in: series identity goes through the canonical tag key (see [`TagSet::to_tags_key`]).
///
/// The value carries both the metric kind and the sample itself, which ensures a sample can never
/// be folded with the semantics of the wrong kind.
#[derive(Clone, Debug)]
pub struct Metric {
    name: String,
    value: MetricValue,
    tags: TagSet,
}

impl Metric {
    /// Creates a metric with no tags.
    pub fn new<N>(name: N, value: MetricValue) -> Self
    where
        N: Into<String>,
    {
        Self {
            name: name.into(),
            value,
            tags: TagSet::default(),
        }
    }

    /// Creates a counter increment.
    pub fn counter<N>(name: N, value: f64) -> Self
    where
        N: Into<String>,
    {
        Self::new(name, MetricValue::Counter(value))
    }

    /// Creates an absolute gauge observation.
    pub fn gauge<N>(name: N, value: f64) -> Self
    where
        N: Into<String>,
    {
        Self::new(name, MetricValue::Gauge(value))
    }

    /// Creates a timer sample.
    pub fn timer<N>(name: N, value: f64) -> Self
    where
        N: Into<String>,
    {
        Self::new(name, MetricValue::Timer(value))
    }

    /// Creates a set member observation.
    pub fn set<N, V>(name: N, member: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self::new(name, MetricValue::Set(member.into()))
    }

    /// Attaches the given tags to this metric.
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    /// Returns the name of this metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the sample value of this metric.
    pub fn value(&self) -> &MetricValue {
        &self.value
    }

    /// Returns the tags of this metric.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Returns the canonical tag key for this metric's tags.
    pub fn tags_key(&self) -> String {
        self.tags.to_tags_key()
    }

    /// Consumes the metric and returns the individual parts.
    pub fn into_parts(self) -> (String, MetricValue, TagSet) {
        (self.name, self.value, self.tags)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]{{{}}}", self.name, self.value.kind(), self.tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_kind_mapping() {
        assert_eq!(MetricValue::Counter(1.0).kind(), MetricKind::Counter);
        assert_eq!(MetricValue::Gauge(1.0).kind(), MetricKind::Gauge);
        assert_eq!(MetricValue::Timer(1.0).kind(), MetricKind::Timer);
        assert_eq!(MetricValue::Set("a".to_string()).kind(), MetricKind::Set);
    }

    #[test]
    fn tags_key_ignores_attachment_order() {
        let forwards = Metric::counter("requests", 1.0)
            .with_tags(["env:prod", "service:web"].into_iter().collect());
        let backwards = Metric::counter("requests", 1.0)
            .with_tags(["service:web", "env:prod"].into_iter().collect());

        assert_eq!(forwards.tags_key(), backwards.tags_key());
    }
}
