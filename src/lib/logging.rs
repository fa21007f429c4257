//! Logging helpers for formatted counts, rates and run summaries.

use std::time::{Duration, Instant};

use crate::metrics::SanitizeMetrics;

/// Formats an integer with comma thousands separators.
///
/// # Examples
///
/// ```
/// use fgrevert_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i).is_multiple_of(3) {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a fraction (0.0-1.0) as a percentage with the given number of decimals.
///
/// # Examples
///
/// ```
/// use fgrevert_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.011, 3), "1.100%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration in human-readable form (e.g. "45s", "2m 15s", "1h 30m").
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a processing rate in records per second (or per minute when slow).
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} records/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} records/s", format_count(rate as u64))
    } else {
        let per_min = count as f64 / (secs / 60.0);
        format!("{per_min:.1} records/min")
    }
}

/// Logs the outcome of a sanitization pass.
///
/// The first line mirrors the message operators grep for in pipeline logs; the
/// per-reason breakdown follows only when something was discarded.
pub fn log_sanitize_summary(metrics: &SanitizeMetrics) {
    log::info!(
        "Discarded {} out of {} ({}) reads in order to sanitize output.",
        format_count(metrics.discarded_records),
        format_count(metrics.total_records),
        format_percent(metrics.discard_fraction, 3)
    );
    if metrics.discarded_records > 0 {
        log::info!("  Length mismatch: {}", format_count(metrics.discarded_length_mismatch));
        log::info!(
            "  Unpaired with multiple records: {}",
            format_count(metrics.discarded_unpaired_multiplicity)
        );
        log::info!("  Broken pairing: {}", format_count(metrics.discarded_broken_pairing));
    }
}

/// Operation timing and summary helper.
///
/// ```no_run
/// use fgrevert_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Reverting records");
/// // ... do work ...
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Logs the completion with record count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
