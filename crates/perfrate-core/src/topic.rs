//! Metric topic names.
//!
//! A topic is the dotted name a derived rate is published under, e.g.
//! `perf.proc.stat.cpu3.user`. It is also the key the rate tracker and the
//! CSV table use to join samples across ticks.

use std::fmt;

/// Prefix shared by every published topic.
pub const TOPIC_PREFIX: &str = "perf";

/// Immutable metric topic: `perf.<group>.<subgroup>[.<scope>].<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricTopic(String);

impl MetricTopic {
    /// Builds a topic without a sub-scope (`perf.proc.stat.user`).
    pub fn new(group: &str, subgroup: &str, key: &str) -> Self {
        Self(format!("{TOPIC_PREFIX}.{group}.{subgroup}.{key}"))
    }

    /// Builds a topic scoped below the subgroup (`perf.proc.stat.cpu3.user`).
    pub fn scoped(group: &str, subgroup: &str, scope: &str, key: &str) -> Self {
        Self(format!("{TOPIC_PREFIX}.{group}.{subgroup}.{scope}.{key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MetricTopic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscoped_topic() {
        let topic = MetricTopic::new("proc", "stat", "user");
        assert_eq!(topic.as_str(), "perf.proc.stat.user");
    }

    #[test]
    fn scoped_topic() {
        let topic = MetricTopic::scoped("proc", "stat", "cpu3", "idle");
        assert_eq!(topic.to_string(), "perf.proc.stat.cpu3.idle");
    }

    #[test]
    fn scoped_and_unscoped_differ() {
        assert_ne!(
            MetricTopic::new("proc", "stat", "user"),
            MetricTopic::scoped("proc", "stat", "cpu0", "user")
        );
    }
}
