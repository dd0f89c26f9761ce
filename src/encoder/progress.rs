use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DURATION_RE: Regex =
        Regex::new(r"Duration: (\d{2}):(\d{2}):(\d{2})\.(\d{2})").unwrap();
    static ref TIME_RE: Regex = Regex::new(r"time=(\d{2}):(\d{2}):(\d{2})\.(\d{2})").unwrap();
}

fn hms_to_duration(hours: u64, minutes: u64, seconds: u64, centis: u64) -> Duration {
    Duration::from_millis(((hours * 3600 + minutes * 60 + seconds) * 1000) + centis * 10)
}

fn captures_to_duration(caps: &regex::Captures) -> Duration {
    // The patterns only admit digits, so the parses cannot fail.
    hms_to_duration(
        caps[1].parse().unwrap(),
        caps[2].parse().unwrap(),
        caps[3].parse().unwrap(),
        caps[4].parse().unwrap(),
    )
}

/// Scans a diagnostic line for the total-duration marker
/// `Duration: HH:MM:SS.ff`.
pub fn parse_duration_line(line: &str) -> Option<Duration> {
    DURATION_RE.captures(line).map(|c| captures_to_duration(&c))
}

/// Scans a diagnostic line for the streamed position marker
/// `time=HH:MM:SS.ff`.
pub fn parse_time_line(line: &str) -> Option<Duration> {
    TIME_RE.captures(line).map(|c| captures_to_duration(&c))
}

/// Turns the encoder's diagnostic stream into clamped, monotone
/// non-decreasing percentages. With an unknown or zero total no percentage
/// is ever produced; raw lines still reach the caller via the tail.
pub struct ProgressTracker {
    total: Option<Duration>,
    last_percent: u8,
}

impl ProgressTracker {
    pub fn new(total: Option<Duration>) -> Self {
        let total = total.filter(|d| !d.is_zero());
        Self {
            total,
            last_percent: 0,
        }
    }

    /// May also learn the total from a `Duration:` header line mid-stream.
    pub fn observe_line(&mut self, line: &str) -> Option<u8> {
        if self.total.is_none() {
            if let Some(total) = parse_duration_line(line).filter(|d| !d.is_zero()) {
                self.total = Some(total);
                return None;
            }
        }

        let total = self.total?;
        let current = parse_time_line(line)?;
        let raw = 100.0 * current.as_secs_f64() / total.as_secs_f64();
        let percent = raw.min(100.0) as u8;
        if percent < self.last_percent {
            return None;
        }
        self.last_percent = percent;
        Some(percent)
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_header() {
        let line = "  Duration: 00:01:00.00, start: 0.000000, bitrate: 1205 kb/s";
        assert_eq!(parse_duration_line(line), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration_line("no marker here"), None);
    }

    #[test]
    fn parses_streamed_time_marker() {
        let line = "frame=  720 fps=120 q=28.0 size=2048kB time=00:00:30.00 bitrate= 559.1kbits/s";
        assert_eq!(parse_time_line(line), Some(Duration::from_secs(30)));
        assert_eq!(
            parse_time_line("time=01:02:03.45"),
            Some(Duration::from_millis(3_723_450))
        );
    }

    #[test]
    fn halfway_reports_fifty_and_overshoot_clamps_to_hundred() {
        let mut tracker = ProgressTracker::new(Some(Duration::from_secs(60)));
        assert_eq!(tracker.observe_line("time=00:00:30.00"), Some(50));
        // Beyond the total: clamp, never exceed.
        assert_eq!(tracker.observe_line("time=00:02:00.00"), Some(100));
        assert_eq!(tracker.last_percent(), 100);
    }

    #[test]
    fn progress_is_monotone_non_decreasing() {
        let mut tracker = ProgressTracker::new(Some(Duration::from_secs(100)));
        assert_eq!(tracker.observe_line("time=00:00:40.00"), Some(40));
        // A regressed timestamp must not walk the percentage backwards.
        assert_eq!(tracker.observe_line("time=00:00:10.00"), None);
        assert_eq!(tracker.observe_line("time=00:00:50.00"), Some(50));
    }

    #[test]
    fn no_percentage_without_a_total() {
        let mut tracker = ProgressTracker::new(None);
        assert_eq!(tracker.observe_line("time=00:00:30.00"), None);

        // Total learned from the stream itself.
        assert_eq!(tracker.observe_line("Duration: 00:01:00.00, start"), None);
        assert_eq!(tracker.observe_line("time=00:00:30.00"), Some(50));
    }

    #[test]
    fn zero_total_reports_nothing() {
        let mut tracker = ProgressTracker::new(Some(Duration::ZERO));
        assert_eq!(tracker.observe_line("time=00:00:30.00"), None);
    }
}
