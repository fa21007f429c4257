//! Progress tracking for the sequential record passes.
//!
//! A [`ProgressTracker`] is an explicit handle owned by whichever pass is running; it
//! counts records and logs a line each time the count crosses an interval boundary,
//! naming the last record seen so a stalled run can be located in the input.

use bstr::ByteSlice;
use log::info;

use crate::logging::format_count;

/// Default number of records between progress lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000_000;

/// Counts records and logs progress at regular intervals.
///
/// # Example
/// ```
/// use fgrevert_lib::progress::ProgressTracker;
///
/// let mut tracker = ProgressTracker::new("Reverted");
/// for i in 0..250 {
///     tracker.record(format!("q{i}").as_bytes());
/// }
/// tracker.log_final(); // logs "Reverted 250 records (complete)"
/// assert_eq!(tracker.count(), 250);
/// ```
pub struct ProgressTracker {
    interval: u64,
    verb: String,
    count: u64,
}

impl ProgressTracker {
    /// Creates a tracker whose log lines start with `verb` (e.g. "Reverted").
    #[must_use]
    pub fn new(verb: impl Into<String>) -> Self {
        Self { interval: DEFAULT_PROGRESS_INTERVAL, verb: verb.into(), count: 0 }
    }

    /// Counts one record, logging when an interval boundary is reached.
    ///
    /// Returns `true` if a progress line was logged.
    pub fn record(&mut self, read_name: &[u8]) -> bool {
        self.count += 1;
        if self.count.is_multiple_of(self.interval) {
            info!(
                "{} {} records. Last read: {}",
                self.verb,
                format_count(self.count),
                read_name.as_bstr()
            );
            true
        } else {
            false
        }
    }

    /// Logs the final count unless the last [`record`](Self::record) call already did.
    pub fn log_final(&self) {
        if self.count > 0 && !self.count.is_multiple_of(self.interval) {
            info!("{} {} records (complete)", self.verb, format_count(self.count));
        }
    }

    /// Number of records counted so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }
}
