//! Metrics produced by fgrevert operations.
//!
//! - [`sanitize`] - Counts of records kept and discarded while sanitizing
//! - [`writer`] - Metrics file I/O utilities

pub mod sanitize;
pub mod writer;

use serde::{Deserialize, Serialize, Serializer};

/// Number of decimal places used for float metrics.
pub const FLOAT_PRECISION: usize = 6;

/// Formats a float value with the standard precision for metrics.
///
/// ```
/// use fgrevert_lib::metrics::format_float;
/// assert_eq!(format_float(0.25), "0.250000");
/// ```
#[must_use]
pub fn format_float(value: f64) -> String {
    format!("{value:.FLOAT_PRECISION$}")
}

/// Serializes a float metric with [`format_float`].
#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires &T signature
pub fn serialize_float<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_float(*value))
}

/// A metric type that can be serialized to TSV files.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name for this metric type, used in error messages.
    fn metric_name() -> &'static str;
}

pub use sanitize::SanitizeMetrics;
pub use writer::{write_metrics, write_metrics_auto};
