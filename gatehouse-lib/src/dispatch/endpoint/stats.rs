use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::Serialize;

/// A [`HashMap`] mapping endpoints to their [`EndpointStats`]
#[derive(Debug, Default, Serialize)]
pub struct EndpointStatsMap(HashMap<String, EndpointStats>);

impl EndpointStatsMap {
    /// Sort endpoint statistics by submitted task count (descending order)
    #[must_use]
    pub fn sorted(&self) -> Vec<(String, EndpointStats)> {
        let mut sorted: Vec<_> = self.0.clone().into_iter().collect();
        sorted.sort_by(|(a_key, a), (b_key, b)| {
            b.submitted.cmp(&a.submitted).then_with(|| a_key.cmp(b_key))
        });
        sorted
    }

    /// Statistics for one endpoint, keyed by its `scheme://host:port` form
    #[must_use]
    pub fn get(&self, endpoint: &str) -> Option<&EndpointStats> {
        self.0.get(endpoint)
    }

    /// Number of endpoints with statistics
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no endpoint has been used yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, EndpointStats>> for EndpointStatsMap {
    fn from(value: HashMap<String, EndpointStats>) -> Self {
        Self(value)
    }
}

/// Number of recent request durations kept for the median
const REQUEST_TIME_WINDOW: usize = 100;

/// Record and report statistics for a [`crate::dispatch::EndpointQueue`]
///
/// Statistics are observational only; admission never consults them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EndpointStats {
    /// Tasks handed to the queue
    pub submitted: u64,
    /// Tasks that obtained a running slot
    pub started: u64,
    /// Tasks that settled successfully
    pub succeeded: u64,
    /// Tasks that settled with an error of their own
    pub failed: u64,
    /// Tasks abandoned because they exceeded the queue timeout
    pub timed_out: u64,
    /// Tasks discarded by a queue clear before they started
    pub cancelled: u64,
    /// Requests that joined an already in-flight fetch instead of
    /// submitting a task
    pub coalesced: u64,
    /// Highest number of simultaneously running tasks observed
    pub peak_running: usize,
    /// Sum of the durations of all settled tasks
    #[serde(skip)]
    total_request_time: Duration,
    /// Durations of the most recent settled tasks, oldest first
    #[serde(skip)]
    recent_request_times: VecDeque<Duration>,
}

impl EndpointStats {
    pub(crate) fn record_submitted(&mut self) {
        self.submitted += 1;
    }

    pub(crate) fn record_started(&mut self, running: usize) {
        self.started += 1;
        self.peak_running = self.peak_running.max(running);
    }

    pub(crate) fn record_settled(&mut self, success: bool, request_time: Duration) {
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.total_request_time = self.total_request_time.saturating_add(request_time);
        if self.recent_request_times.len() == REQUEST_TIME_WINDOW {
            self.recent_request_times.pop_front();
        }
        self.recent_request_times.push_back(request_time);
    }

    pub(crate) fn record_timeout(&mut self) {
        self.timed_out += 1;
    }

    pub(crate) fn record_cancelled(&mut self) {
        self.cancelled += 1;
    }

    pub(crate) fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }

    /// Tasks that reached a final state (settled, timed out or cancelled)
    #[must_use]
    pub const fn finished(&self) -> u64 {
        self.succeeded + self.failed + self.timed_out + self.cancelled
    }

    /// Tasks that settled on their own, with success or error
    #[must_use]
    pub const fn settled(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Get the current success rate (0.0 to 1.0)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let finished = self.finished();
        if finished == 0 {
            1.0 // Assume success until proven otherwise
        } else {
            #[allow(clippy::cast_precision_loss)]
            let success_rate = self.succeeded as f64 / finished as f64;
            success_rate
        }
    }

    /// Average duration of every settled task
    #[must_use]
    pub fn average_request_time(&self) -> Option<Duration> {
        let settled = self.settled();
        if settled == 0 {
            return None;
        }

        let nanos = self.total_request_time.as_nanos() / u128::from(settled);
        Some(Duration::from_nanos(
            u64::try_from(nanos).unwrap_or(u64::MAX),
        ))
    }

    /// Median duration of the most recent settled tasks
    #[must_use]
    pub fn median_request_time(&self) -> Option<Duration> {
        if self.recent_request_times.is_empty() {
            return None;
        }

        let mut times: Vec<_> = self.recent_request_times.iter().copied().collect();
        times.sort();
        let mid = times.len() / 2;

        if times.len() % 2 == 0 {
            // Average of two middle values
            Some((times[mid - 1] + times[mid]) / 2)
        } else {
            Some(times[mid])
        }
    }

    /// Number of durations currently kept for [`Self::median_request_time`]
    #[must_use]
    pub fn request_time_samples(&self) -> usize {
        self.recent_request_times.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_stats() {
        let stats = EndpointStats::default();
        assert_eq!(stats.finished(), 0);
        assert!((stats.success_rate() - 1.0).abs() < f64::EPSILON);
        assert_eq!(stats.average_request_time(), None);
        assert_eq!(stats.median_request_time(), None);
    }

    #[test]
    fn test_outcomes_and_timings() {
        let mut stats = EndpointStats::default();
        stats.record_submitted();
        stats.record_submitted();
        stats.record_submitted();
        stats.record_started(1);
        stats.record_started(2);
        stats.record_settled(true, Duration::from_millis(100));
        stats.record_settled(false, Duration::from_millis(300));
        stats.record_timeout();

        assert_eq!(stats.finished(), 3);
        assert_eq!(stats.peak_running, 2);
        assert!((stats.success_rate() - 1.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(
            stats.average_request_time(),
            Some(Duration::from_millis(200))
        );
        assert_eq!(
            stats.median_request_time(),
            Some(Duration::from_millis(200))
        );
    }

    #[test]
    fn test_request_times_stay_bounded() {
        let mut stats = EndpointStats::default();
        for millis in 1..=10_000 {
            stats.record_settled(true, Duration::from_millis(millis));
        }

        assert_eq!(stats.settled(), 10_000);
        assert_eq!(stats.request_time_samples(), REQUEST_TIME_WINDOW);
        // The average covers every task, the median only the recent window
        assert_eq!(
            stats.average_request_time(),
            Some(Duration::from_micros(5_000_500))
        );
        assert_eq!(
            stats.median_request_time(),
            Some(Duration::from_micros(9_950_500))
        );
    }

    #[test]
    fn test_sorted_by_submitted() {
        let busy = EndpointStats {
            submitted: 10,
            ..EndpointStats::default()
        };
        let quiet = EndpointStats {
            submitted: 2,
            ..EndpointStats::default()
        };
        let map = EndpointStatsMap::from(HashMap::from([
            ("http://quiet:80".to_string(), quiet),
            ("http://busy:80".to_string(), busy),
        ]));

        let sorted = map.sorted();
        assert_eq!(sorted[0].0, "http://busy:80");
        assert_eq!(sorted[1].0, "http://quiet:80");
        assert_eq!(map.get("http://busy:80").map(|s| s.submitted), Some(10));
        assert_eq!(map.len(), 2);
    }
}
