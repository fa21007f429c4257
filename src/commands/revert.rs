//! Revert aligned SAM/BAM records to an unaligned state.
//!
//! Removes alignment information, restores original base qualities, clears the
//! duplicate flag and drops alignment-derived tags. Optionally sanitizes the output
//! so that every read name is a well-formed fragment or pair, and optionally writes
//! one output per read group.

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use fgrevert_lib::config::{DEFAULT_MAX_DISCARD_FRACTION, RevertConfig};
use fgrevert_lib::pipeline;
use fgrevert_lib::revert::DEFAULT_ATTRIBUTES_TO_CLEAR;
use fgrevert_lib::sort::SortOrder;
use log::info;
use std::path::PathBuf;

use crate::commands::command::Command;
use crate::commands::common::{CompressionOptions, SortingOptions, ThreadingOptions};
use crate::version::VERSION;

/// Sort order of the reverted output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortOrderArg {
    /// Queryname sort (read name with natural ordering)
    Queryname,
    /// Coordinate sort (tid → pos → strand)
    Coordinate,
    /// Input order
    Unsorted,
}

impl From<SortOrderArg> for SortOrder {
    fn from(arg: SortOrderArg) -> Self {
        match arg {
            SortOrderArg::Queryname => SortOrder::Queryname,
            SortOrderArg::Coordinate => SortOrder::Coordinate,
            SortOrderArg::Unsorted => SortOrder::Unsorted,
        }
    }
}

/// Revert a SAM/BAM file to an unaligned state.
#[derive(Debug, Parser)]
#[command(
    name = "revert",
    about = "\x1b[38;5;72m[ALIGNMENT]\x1b[0m      \x1b[36mRevert aligned reads to an unaligned state\x1b[0m",
    long_about = r#"
Revert aligned SAM/BAM records to their pre-alignment state.

For every primary record:

  1. Base qualities are replaced with the OQ tag, if present, and OQ is removed.
  2. The duplicate flag is cleared.
  3. Alignment information is removed: reverse-strand reads are reverse-complemented
     back to sequencing orientation, the read and its mate are marked unmapped,
     coordinates, CIGAR and mapping quality are cleared, and the tags listed by
     --attributes-to-clear are removed.

Secondary and supplementary records are dropped.

SANITIZING:

  With --sanitize, records are sorted by read name and every read name must form a
  single fragment or exactly one first and one second of pair with matching base and
  quality lengths; other read names are discarded in full. Qualities in the Illumina
  1.3-1.7 (Phred+64) scale are converted to Phred+33. The run fails, after writing its
  output, if more than --max-discard-fraction of the records were discarded.

OUTPUTS:

  By default all records go to --output. With --output-by-read-group each read group
  is written to its own file: either <output>/<read group ID><ext> where <ext> follows
  the input's extension, or the file named for it in --output-map, a tab-separated
  file with the header READ_GROUP_ID<TAB>OUTPUT.

EXAMPLES:

  # Revert to a queryname-sorted unmapped BAM
  fgrevert revert -i aligned.bam -o unmapped.bam

  # Revert, sanitize, and write one BAM per read group
  fgrevert revert -i aligned.bam -o out_dir/ --output-by-read-group --sanitize
"#
)]
pub struct Revert {
    /// Input SAM or BAM file.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output file, or output directory with --output-by-read-group.
    #[arg(short = 'o', long = "output", conflicts_with = "output_map")]
    pub output: Option<PathBuf>,

    /// Tab-separated file with columns READ_GROUP_ID and OUTPUT giving the output of
    /// every read group. Requires --output-by-read-group.
    #[arg(long = "output-map")]
    pub output_map: Option<PathBuf>,

    /// Write one output per read group.
    #[arg(long = "output-by-read-group", default_value = "false")]
    pub output_by_read_group: bool,

    /// Sort order of the output. Must be queryname with --sanitize.
    #[arg(long = "sort-order", value_enum, default_value = "queryname")]
    pub sort_order: SortOrderArg,

    /// Replace base qualities with the original qualities from the OQ tag.
    #[arg(long = "restore-original-qualities", default_value = "true", action = ArgAction::Set)]
    pub restore_original_qualities: bool,

    /// Clear the duplicate flag.
    #[arg(long = "remove-duplicate-information", default_value = "true", action = ArgAction::Set)]
    pub remove_duplicate_information: bool,

    /// Remove alignment information and the tags in --attributes-to-clear.
    #[arg(long = "remove-alignment-information", default_value = "true", action = ArgAction::Set)]
    pub remove_alignment_information: bool,

    /// Tags removed with the alignment information.
    #[arg(
        long = "attributes-to-clear",
        value_delimiter = ',',
        default_values_t = DEFAULT_ATTRIBUTES_TO_CLEAR.map(String::from)
    )]
    pub attributes_to_clear: Vec<String>,

    /// Discard read names that do not form a well-formed fragment or pair, and convert
    /// Phred+64 qualities to Phred+33.
    #[arg(long = "sanitize", default_value = "false")]
    pub sanitize: bool,

    /// Fail if sanitizing discards more than this fraction of records.
    #[arg(long = "max-discard-fraction", default_value_t = DEFAULT_MAX_DISCARD_FRACTION)]
    pub max_discard_fraction: f64,

    /// Set the sample of every read group. All read groups must share one sample.
    #[arg(long = "sample-alias")]
    pub sample_alias: Option<String>,

    /// Set the library of every read group. All read groups must share one library.
    #[arg(long = "library-name")]
    pub library_name: Option<String>,

    /// Optional output file for sanitization metrics. Requires --sanitize.
    #[arg(long = "metrics")]
    pub metrics: Option<PathBuf>,

    /// Sorting options.
    #[command(flatten)]
    pub sorting: SortingOptions,

    /// Threading options.
    #[command(flatten)]
    pub threading: ThreadingOptions,

    /// Compression options for output BAM.
    #[command(flatten)]
    pub compression: CompressionOptions,
}

impl Revert {
    /// Builds the run configuration from the parsed options.
    fn to_config(&self) -> RevertConfig {
        RevertConfig {
            input: self.input.clone(),
            output: self.output.clone(),
            output_map: self.output_map.clone(),
            output_by_read_group: self.output_by_read_group,
            sort_order: self.sort_order.into(),
            restore_original_qualities: self.restore_original_qualities,
            remove_duplicate_information: self.remove_duplicate_information,
            remove_alignment_information: self.remove_alignment_information,
            attributes_to_clear: self.attributes_to_clear.clone(),
            sanitize: self.sanitize,
            max_discard_fraction: self.max_discard_fraction,
            sample_alias: self.sample_alias.clone(),
            library_name: self.library_name.clone(),
            max_records_in_ram: self.sorting.max_records_in_ram,
            tmp_dir: self.sorting.tmp_dir.clone(),
            threads: self.threading.threads,
            compression_level: self.compression.compression_level,
            metrics: self.metrics.clone(),
        }
    }
}

impl Command for Revert {
    fn execute(&self, command_line: &str) -> Result<()> {
        info!("Reverting {}", self.input.display());
        let summary = pipeline::run(&self.to_config(), VERSION.as_str(), command_line)?;
        if summary.sanitize.is_none() {
            info!("Wrote {} reverted records", summary.records_reverted);
        }
        Ok(())
    }
}
