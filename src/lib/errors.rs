//! Custom error types for fgrevert operations.

use thiserror::Error;

/// Result type alias for fgrevert operations
pub type Result<T> = std::result::Result<T, RevertError>;

/// Error type for fgrevert operations
#[derive(Error, Debug)]
pub enum RevertError {
    /// One or more configuration problems detected before any record was read
    #[error("Invalid configuration:\n  {}", messages.join("\n  "))]
    InvalidConfiguration {
        /// Every problem found, in the order it was detected
        messages: Vec<String>,
    },

    /// A read group declared in the header has no output destination
    #[error("Read group '{read_group}' has no output destination in {source_name}")]
    UnmappedReadGroup {
        /// The read group ID
        read_group: String,
        /// Where destinations were looked up (e.g. the output map path)
        source_name: String,
    },

    /// A record carried no RG tag while writing one output per read group
    #[error("Record '{read_name}' has no read group; cannot route it to a per-read-group output")]
    MissingReadGroup {
        /// Name of the offending record
        read_name: String,
    },

    /// A record referenced a read group that is not declared in the header
    #[error("Record '{read_name}' references read group '{read_group}' not present in the header")]
    UnknownReadGroup {
        /// The read group ID on the record
        read_group: String,
        /// Name of the offending record
        read_name: String,
    },

    /// The quality encoding of a read group cannot be converted to Phred+33
    #[error("No quality score encoding conversion implemented for {encoding}")]
    UnsupportedQualityEncoding {
        /// The detected encoding
        encoding: String,
    },

    /// Quality scores fall outside any known encoding
    #[error(
        "Quality scores for read group '{read_group}' span ASCII {min}..={max}, outside any known encoding"
    )]
    InvalidQualityScores {
        /// Read group ID, or a placeholder for records without one
        read_group: String,
        /// Lowest ASCII value observed
        min: u16,
        /// Highest ASCII value observed
        max: u16,
    },

    /// Sanitization discarded more reads than allowed
    #[error(
        "Discarded {discarded} of {total} reads ({:.3}%) which is above the maximum discard fraction of {max}",
        rate * 100.0
    )]
    DiscardRateExceeded {
        /// Number of records discarded
        discarded: u64,
        /// Number of records examined
        total: u64,
        /// Observed discard fraction
        rate: f64,
        /// Configured maximum discard fraction
        max: f64,
    },

    /// The file format implied by a path is not supported
    #[error("Unsupported alignment format '{format}' for '{path}'")]
    UnsupportedFormat {
        /// Path to the file
        path: String,
        /// Format name
        format: String,
    },
}
