//! Output destinations and read-group routing.
//!
//! A run writes either to a single output, or to one output per read group. In the
//! per-read-group case the outputs come from an explicit `READ_GROUP_ID<TAB>OUTPUT`
//! table, or are generated as `<dir>/<read group id><extension>`. Every read group in
//! the input header must have a destination before any record is read.

use ahash::AHashMap;
use anyhow::{Context, Result};
use bstr::ByteSlice;
use fgoxide::io::DelimFile;
use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::bam_io::AlignmentFormat;
use crate::errors::RevertError;
use crate::sam::{read_group_id, read_name};

/// Column names of the output map header line.
pub const OUTPUT_MAP_HEADER: [&str; 2] = ["READ_GROUP_ID", "OUTPUT"];

/// Index of a destination, shared by writers and sorters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationKey(pub usize);

/// One row of an output map file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMapEntry {
    /// Read group identifier
    #[serde(rename = "READ_GROUP_ID")]
    pub read_group_id: String,
    /// Output file for the read group
    #[serde(rename = "OUTPUT")]
    pub output: PathBuf,
}

/// A single output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Output path
    pub path: PathBuf,
    /// Read group owning this output when fanning out by read group
    pub read_group: Option<String>,
}

/// The set of outputs for a run and the rule mapping records onto them.
#[derive(Debug)]
pub struct Destinations {
    outputs: Vec<Destination>,
    by_read_group: Option<AHashMap<Vec<u8>, DestinationKey>>,
}

impl Destinations {
    /// Every record goes to `path`.
    #[must_use]
    pub fn single(path: PathBuf) -> Self {
        Self { outputs: vec![Destination { path, read_group: None }], by_read_group: None }
    }

    /// One output per header read group, taken from an output map.
    ///
    /// Map rows for read groups absent from the header are ignored.
    ///
    /// # Errors
    /// Returns [`RevertError::UnmappedReadGroup`] if a header read group has no row.
    pub fn from_output_map(
        header: &Header,
        entries: &[OutputMapEntry],
        source_name: &str,
    ) -> std::result::Result<Self, RevertError> {
        let paths: AHashMap<&str, &PathBuf> =
            entries.iter().map(|e| (e.read_group_id.as_str(), &e.output)).collect();

        let mut outputs = Vec::with_capacity(header.read_groups().len());
        for id in header.read_groups().keys() {
            let id = id.to_str_lossy();
            let path = paths.get(&*id).ok_or_else(|| RevertError::UnmappedReadGroup {
                read_group: id.to_string(),
                source_name: source_name.to_string(),
            })?;
            outputs.push(Destination { path: (*path).clone(), read_group: Some(id.to_string()) });
        }
        Ok(Self::per_read_group(outputs))
    }

    /// One output per header read group, named `<dir>/<id><extension>`.
    #[must_use]
    pub fn from_directory(header: &Header, dir: &Path, extension: &str) -> Self {
        let outputs = header
            .read_groups()
            .keys()
            .map(|id| {
                let id = id.to_str_lossy().into_owned();
                Destination { path: dir.join(format!("{id}{extension}")), read_group: Some(id) }
            })
            .collect();
        Self::per_read_group(outputs)
    }

    fn per_read_group(outputs: Vec<Destination>) -> Self {
        let by_read_group = outputs
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.read_group.as_ref().map(|rg| (rg.as_bytes().to_vec(), DestinationKey(i))))
            .collect();
        Self { outputs, by_read_group: Some(by_read_group) }
    }

    /// Returns the destination for a record.
    ///
    /// # Errors
    /// When fanning out, fails if the record has no `RG` tag or names a read group
    /// that is not in the header.
    pub fn route(&self, record: &RecordBuf) -> std::result::Result<DestinationKey, RevertError> {
        let Some(by_read_group) = &self.by_read_group else {
            return Ok(DestinationKey(0));
        };
        let read_group = read_group_id(record).ok_or_else(|| RevertError::MissingReadGroup {
            read_name: read_name(record).to_str_lossy().into_owned(),
        })?;
        by_read_group.get(read_group).copied().ok_or_else(|| RevertError::UnknownReadGroup {
            read_group: read_group.to_str_lossy().into_owned(),
            read_name: read_name(record).to_str_lossy().into_owned(),
        })
    }

    /// Destinations with their keys, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (DestinationKey, &Destination)> {
        self.outputs.iter().enumerate().map(|(i, d)| (DestinationKey(i), d))
    }
}

/// Extension given to generated per-read-group outputs: `.sam` and `.cram` inputs keep
/// their extension, anything else writes `.bam`.
#[must_use]
pub fn default_extension(input: &Path) -> &'static str {
    match AlignmentFormat::from_path(input) {
        AlignmentFormat::Sam => AlignmentFormat::Sam.extension(),
        AlignmentFormat::Cram => AlignmentFormat::Cram.extension(),
        AlignmentFormat::Bam => AlignmentFormat::Bam.extension(),
    }
}

/// Checks that an output map starts with the expected header line.
///
/// Returns a description of the problem, or `None` if the header is valid.
#[must_use]
pub fn check_output_map_header(path: &Path) -> Option<String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => return Some(format!("Cannot read output map {}: {e}", path.display())),
    };
    let mut line = String::new();
    if let Err(e) = BufReader::new(file).read_line(&mut line) {
        return Some(format!("Cannot read output map {}: {e}", path.display()));
    }
    let columns: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    if columns == OUTPUT_MAP_HEADER {
        None
    } else {
        Some(format!(
            "Invalid header in output map {}: expected '{}', found '{}'",
            path.display(),
            OUTPUT_MAP_HEADER.join("\t"),
            line.trim_end()
        ))
    }
}

/// Reads all rows of an output map.
///
/// # Errors
/// Returns an error if the file cannot be read or a row cannot be parsed.
pub fn read_output_map(path: &Path) -> Result<Vec<OutputMapEntry>> {
    DelimFile::default()
        .read_tsv(&path)
        .with_context(|| format!("Failed to read output map: {}", path.display()))
}
