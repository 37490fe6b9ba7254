//! Average rate of change over a sliding window of raw counter samples.
//!
//! Every metric topic owns a bounded window of its most recent raw values.
//! While the window is filling up, the rate is normalized by the number of
//! samples held; once it overflows and evicts, the rate is normalized by the
//! configured period. The switch happens exactly at the first eviction.

use std::collections::{HashMap, VecDeque};

use crate::topic::MetricTopic;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default averaging period, in samples.
pub const DEFAULT_AROC_PERIOD: usize = 3;

// ---------------------------------------------------------------------------
// Delta helpers
// ---------------------------------------------------------------------------

/// Signed difference between two raw counter values.
///
/// A counter that went backwards (reset, wrap) yields a negative delta
/// instead of overflowing.
pub fn counter_delta(curr: u64, prev: u64) -> f64 {
    (i128::from(curr) - i128::from(prev)) as f64
}

// ---------------------------------------------------------------------------
// Rate tracker
// ---------------------------------------------------------------------------

/// Per-topic rate history for one sampling run.
///
/// Windows are created lazily on first observation and live until the
/// tracker is dropped or reset. Newest samples sit at the back.
#[derive(Debug, Default)]
pub struct RateTracker {
    windows: HashMap<MetricTopic, VecDeque<u64>>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` for `topic` and returns the average rate of change.
    ///
    /// The first observation of a topic returns `0.0`. `period` is floored
    /// at 1, so the denominator is never zero.
    pub fn observe(&mut self, topic: &MetricTopic, value: u64, period: usize) -> f64 {
        let period = period.max(1);

        let Some(window) = self.windows.get_mut(topic) else {
            let mut window = VecDeque::with_capacity(period + 1);
            window.push_back(value);
            self.windows.insert(topic.clone(), window);
            return 0.0;
        };

        window.push_back(value);

        // Normally at most one eviction; more only if the period shrank.
        let mut evicted = None;
        while window.len() > period {
            evicted = window.pop_front();
        }

        match evicted {
            Some(oldest) => counter_delta(value, oldest) / period as f64,
            None => {
                let oldest = window.front().copied().unwrap_or(value);
                counter_delta(value, oldest) / window.len() as f64
            }
        }
    }

    /// Current history for `topic`, oldest first.
    pub fn window(&self, topic: &MetricTopic) -> Option<&VecDeque<u64>> {
        self.windows.get(topic)
    }

    /// Number of topics with history.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn reset(&mut self) {
        self.windows.clear();
    }

    pub fn shrink_to_fit(&mut self) {
        self.windows.shrink_to_fit();
    }
}
