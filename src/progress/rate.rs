//! Transfer rate and time-remaining estimation.

use indicatif::{HumanBytes, HumanDuration};
use std::time::{Duration, Instant};

/// Default minimum time between two rate samples.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(3);

/// Tracks the byte rate of a transfer, resampled at most once per interval.
///
/// ```rust
/// use modcore::progress::RateCounter;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let mut rate = RateCounter::with_interval(Duration::from_secs(1), start);
/// rate.update_at(1000, 1000, start);
/// rate.update_at(1000, 500, start + Duration::from_secs(1));
/// assert_eq!(rate.bytes_per_second(), 500);
/// assert_eq!(rate.percent(), 50);
/// ```
#[derive(Debug, Clone)]
pub struct RateCounter {
    size: u64,
    bytes_left: u64,
    bytes_per_second: u64,
    interval: Duration,
    last_sample: Instant,
    last_bytes_left: Option<u64>,
}

impl Default for RateCounter {
    fn default() -> Self {
        Self::with_interval(DEFAULT_SAMPLE_INTERVAL, Instant::now())
    }
}

impl RateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(interval: Duration, now: Instant) -> Self {
        Self {
            size: 0,
            bytes_left: 0,
            bytes_per_second: 0,
            interval,
            last_sample: now,
            last_bytes_left: None,
        }
    }

    /// Record the current size and remaining bytes.
    pub fn update(&mut self, size: u64, bytes_left: u64) {
        self.update_at(size, bytes_left, Instant::now());
    }

    /// Record the current size and remaining bytes as of `now`.
    pub fn update_at(&mut self, size: u64, bytes_left: u64, now: Instant) {
        self.size = size;
        self.bytes_left = bytes_left;

        let Some(previous_left) = self.last_bytes_left else {
            self.last_bytes_left = Some(bytes_left);
            self.last_sample = now;
            return;
        };

        let elapsed = now.saturating_duration_since(self.last_sample);
        if elapsed < self.interval || elapsed.is_zero() {
            return;
        }

        let transferred = previous_left.saturating_sub(bytes_left);
        let sample = (transferred as f64 / elapsed.as_secs_f64()) as u64;
        self.bytes_per_second = if self.bytes_per_second == 0 {
            sample
        } else {
            (self.bytes_per_second + sample) / 2
        };
        self.last_bytes_left = Some(bytes_left);
        self.last_sample = now;
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn bytes_left(&self) -> u64 {
        self.bytes_left
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.bytes_per_second
    }

    /// Percentage done, 0 when the size is unknown.
    pub fn percent(&self) -> u8 {
        percent_of(self.size, self.bytes_left)
    }

    /// Estimated time left, unknown until a rate has been measured.
    pub fn time_left(&self) -> Option<Duration> {
        if self.bytes_per_second == 0 {
            return None;
        }
        Some(Duration::from_secs(self.bytes_left / self.bytes_per_second))
    }

    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        match self.time_left() {
            Some(left) => format!(
                "{}/s - {} left - {}%",
                HumanBytes(self.bytes_per_second),
                HumanDuration(left),
                self.percent()
            ),
            None => format!("{}%", self.percent()),
        }
    }
}

/// Percentage of `size` already transferred.
pub fn percent_of(size: u64, bytes_left: u64) -> u8 {
    if size == 0 {
        return 0;
    }
    let done = size.saturating_sub(bytes_left) as u128;
    (done * 100 / size as u128).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rate_before_interval() {
        let start = Instant::now();
        let mut rate = RateCounter::with_interval(Duration::from_secs(3), start);
        rate.update_at(100, 100, start);
        rate.update_at(100, 50, start + Duration::from_secs(1));

        assert_eq!(rate.bytes_per_second(), 0);
        assert_eq!(rate.time_left(), None);
        assert_eq!(rate.bytes_left(), 50);
        assert_eq!(rate.percent(), 50);
    }

    #[test]
    fn test_rate_is_smoothed() {
        let start = Instant::now();
        let mut rate = RateCounter::with_interval(Duration::from_secs(1), start);
        rate.update_at(10_000, 10_000, start);
        rate.update_at(10_000, 8_000, start + Duration::from_secs(1));
        assert_eq!(rate.bytes_per_second(), 2_000);

        rate.update_at(10_000, 4_000, start + Duration::from_secs(2));
        assert_eq!(rate.bytes_per_second(), 3_000);
        assert_eq!(rate.time_left(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 0), 0);
        assert_eq!(percent_of(200, 50), 75);
        assert_eq!(percent_of(200, 0), 100);
        assert_eq!(percent_of(200, 500), 0);
    }
}
