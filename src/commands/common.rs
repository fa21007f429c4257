//! Option groups shared by commands, embedded with `#[command(flatten)]`.

use clap::Args;
use fgrevert_lib::bam_io::DEFAULT_COMPRESSION_LEVEL;
use fgrevert_lib::sort::DEFAULT_MAX_RECORDS_IN_RAM;
use std::path::PathBuf;

/// Options for output compression.
///
/// Controls BGZF compression level for BAM output files.
#[derive(Debug, Clone, Args)]
pub struct CompressionOptions {
    /// Compression level for output BAM (0-12).
    ///
    /// Level 1 is fastest with larger files.
    /// Level 12 produces smallest files but is slowest.
    #[arg(long, default_value_t = DEFAULT_COMPRESSION_LEVEL, value_parser = clap::value_parser!(u32).range(0..=12))]
    pub compression_level: u32,
}

/// Options for spill-to-disk sorting.
#[derive(Debug, Clone, Args)]
pub struct SortingOptions {
    /// Maximum number of records held in memory per output before spilling to disk.
    #[arg(long = "max-records-in-ram", default_value_t = DEFAULT_MAX_RECORDS_IN_RAM)]
    pub max_records_in_ram: usize,

    /// Temporary directory for spill files.
    ///
    /// If not specified, uses the system default temp directory.
    #[arg(short = 'T', long = "tmp-dir")]
    pub tmp_dir: Option<PathBuf>,
}

/// Options for threading.
#[derive(Debug, Clone, Args)]
pub struct ThreadingOptions {
    /// Number of threads for BGZF compression and decompression and for sorting
    /// in-memory chunks. Records are always reverted and sanitized in input order.
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    pub threads: usize,
}
