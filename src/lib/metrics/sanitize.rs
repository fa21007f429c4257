//! Sanitization metrics.

use serde::{Deserialize, Serialize};

use super::Metric;

/// Counts of records seen, kept and discarded while sanitizing reverted output.
///
/// Every discarded record is attributed to exactly one reason, checked in the order
/// length mismatch, unpaired multiplicity, broken pairing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SanitizeMetrics {
    /// Primary records that reached the sanitizer
    pub total_records: u64,
    /// Records written to an output
    pub kept_records: u64,
    /// Records dropped for any reason
    pub discarded_records: u64,
    /// Records dropped because some record in their cluster had a base/quality length mismatch
    pub discarded_length_mismatch: u64,
    /// Records dropped because an unpaired read name appeared more than once
    pub discarded_unpaired_multiplicity: u64,
    /// Records dropped because a paired read name lacked exactly one first and one second of pair
    pub discarded_broken_pairing: u64,
    /// `discarded_records / total_records`, or 0 when nothing was seen
    #[serde(serialize_with = "super::serialize_float")]
    pub discard_fraction: f64,
}

impl SanitizeMetrics {
    /// Recomputes `discard_fraction` from the counts.
    pub fn finalize(&mut self) {
        self.discard_fraction = if self.total_records == 0 {
            0.0
        } else {
            #[expect(clippy::cast_precision_loss, reason = "read counts never exceed 2^53")]
            let fraction = self.discarded_records as f64 / self.total_records as f64;
            fraction
        };
    }
}

impl Metric for SanitizeMetrics {
    fn metric_name() -> &'static str {
        "sanitize"
    }
}
