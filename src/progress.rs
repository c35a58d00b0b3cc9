//! Progress bar and logging utilities.
//!
//! Interactive runs get indicatif bars. In log-only mode bars are hidden and
//! phases report through tagged stderr lines instead (`[INDEX] ...`), which
//! stay readable under `tail -f` or in a CI log.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Set log-only mode globally
pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

/// Check if log-only mode is enabled
pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Print to stderr only in log-only mode.
#[macro_export]
macro_rules! log_only {
    ($($arg:tt)*) => {
        if $crate::progress::is_log_only() {
            eprintln!($($arg)*);
        }
    };
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Format a count with thousands separators: 60000000 -> "60,000,000".
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Progress bar measured in bytes of the source file.
/// In log-only mode, the progress bar is hidden.
pub fn create_bytes_bar(total_bytes: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else if let Ok(style) = ProgressStyle::default_bar().template(
        "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA: {eta})",
    ) {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Create a spinner for indeterminate progress.
/// In log-only mode, the spinner is hidden.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg} {spinner} [{elapsed_precise}]") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Tracks when the next periodic row-count log line is due.
///
/// Chunks rarely end on an exact multiple of the interval, so the check is
/// "crossed a boundary" rather than `rows % interval == 0`.
pub struct RowLogger {
    phase: &'static str,
    interval: u64,
    next_at: u64,
}

impl RowLogger {
    pub fn new(phase: &'static str, interval: u64) -> Self {
        let interval = interval.max(1);
        Self {
            phase,
            interval,
            next_at: interval,
        }
    }

    /// Returns true (and logs in log-only mode) when `rows` crossed the next boundary.
    pub fn observe(&mut self, rows: u64, detail: impl FnOnce() -> String) -> bool {
        if rows < self.next_at {
            return false;
        }
        self.next_at = (rows / self.interval + 1) * self.interval;
        crate::log_only!("[{}] {} rows ({})", self.phase, format_count(rows), detail());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(60_123_456), "60,123,456");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_row_logger_fires_once_per_boundary() {
        let mut logger = RowLogger::new("TEST", 1_000_000);
        assert!(!logger.observe(999_999, String::new));
        assert!(logger.observe(1_000_000, String::new));
        assert!(!logger.observe(1_500_000, String::new));
        // A big chunk can jump several boundaries at once
        assert!(logger.observe(3_200_000, String::new));
        assert!(!logger.observe(3_900_000, String::new));
        assert!(logger.observe(4_000_000, String::new));
    }
}
