//! Per-destination output sinks.
//!
//! An [`OutputSink`] owns the writer for one destination and, when records cannot be
//! written in arrival order, the sorter that buffers them. Closing a sink drains any
//! remaining sorted records into the writer before finishing it; aborting a sink drops
//! them and only finishes the writer.
//!
//! Records awaiting sanitization are held in a separate [`SanitizeBuffer`] so that
//! nothing reaches the writer unless it passed the sanitizer.

use anyhow::{Context, Result};
use log::debug;
use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::mem;
use std::path::{Path, PathBuf};

use crate::bam_io::{AlignmentWriter, create_alignment_writer};
use crate::logging::format_count;
use crate::pool::Close;
use crate::sanitize::MismatchedNames;
use crate::sort::{CoordinateKey, QuerynameKey, SortOrder, SortingCollection};

/// Boxed stream of sorted records.
pub type SortedStream = Box<dyn Iterator<Item = Result<RecordBuf>>>;

/// Where and how sorters spill.
#[derive(Debug, Clone)]
pub struct SorterSettings {
    /// Records held in memory before spilling
    pub max_records_in_ram: usize,
    /// Parent directory for spill files; system temp when `None`
    pub tmp_dir: Option<PathBuf>,
    /// Threads used to sort in-memory chunks
    pub threads: usize,
}

/// A spillable sorter for one of the supported orders.
pub enum RecordSorter {
    /// Sorted by read name
    Queryname(SortingCollection<QuerynameKey>),
    /// Sorted by reference, position and strand
    Coordinate(SortingCollection<CoordinateKey>),
}

impl RecordSorter {
    /// Creates a sorter for `order`, or `None` for [`SortOrder::Unsorted`].
    #[must_use]
    pub fn new(order: SortOrder, header: &Header, settings: &SorterSettings) -> Option<Self> {
        match order {
            SortOrder::Unsorted => None,
            SortOrder::Queryname => Some(Self::Queryname(
                SortingCollection::new(header.clone(), settings.max_records_in_ram)
                    .temp_dir(settings.tmp_dir.clone())
                    .threads(settings.threads),
            )),
            SortOrder::Coordinate => Some(Self::Coordinate(
                SortingCollection::new(header.clone(), settings.max_records_in_ram)
                    .temp_dir(settings.tmp_dir.clone())
                    .threads(settings.threads),
            )),
        }
    }

    /// Adds a record.
    ///
    /// # Errors
    /// Returns an error if the record cannot be keyed or a spill fails.
    pub fn add(&mut self, record: RecordBuf) -> Result<()> {
        match self {
            Self::Queryname(s) => s.add(record),
            Self::Coordinate(s) => s.add(record),
        }
    }

    /// Consumes the sorter, returning its records in order.
    ///
    /// # Errors
    /// Returns an error if spilled chunks cannot be reopened.
    pub fn into_sorted(self) -> Result<SortedStream> {
        Ok(match self {
            Self::Queryname(s) => Box::new(s.into_sorted()?),
            Self::Coordinate(s) => Box::new(s.into_sorted()?),
        })
    }
}

/// Writer and optional sorter for one destination.
pub struct OutputSink {
    path: PathBuf,
    header: Header,
    writer: AlignmentWriter,
    sorter: Option<RecordSorter>,
    records_written: u64,
}

impl OutputSink {
    /// Creates the output file and writes its header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or the header cannot be written.
    pub fn open(
        path: &Path,
        header: Header,
        sorter: Option<RecordSorter>,
        threads: usize,
        compression_level: u32,
    ) -> Result<Self> {
        let writer = create_alignment_writer(path, &header, threads, compression_level)?;
        Ok(Self {
            path: path.to_path_buf(),
            header,
            writer,
            sorter,
            records_written: 0,
        })
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepts a record: moved into the sorter if there is one, otherwise written and
    /// left in place for reuse.
    ///
    /// # Errors
    /// Returns an error if sorting or writing fails.
    pub fn accept(&mut self, record: &mut RecordBuf) -> Result<()> {
        match &mut self.sorter {
            Some(sorter) => sorter.add(mem::take(record)),
            None => self.write(record),
        }
    }

    /// Writes a record directly to the file.
    ///
    /// # Errors
    /// Returns an error if the record cannot be encoded or written.
    pub fn write(&mut self, record: &RecordBuf) -> Result<()> {
        self.writer
            .write_record(&self.header, record)
            .with_context(|| format!("Failed to write record to: {}", self.path.display()))?;
        self.records_written += 1;
        Ok(())
    }
}

/// Queryname-sorted holding area for one destination's records before sanitization.
pub struct SanitizeBuffer {
    sorter: RecordSorter,
    mismatched: MismatchedNames,
}

impl SanitizeBuffer {
    /// Creates a buffer whose spill files are described by `header`.
    #[must_use]
    pub fn new(header: &Header, settings: &SorterSettings) -> Self {
        let sorter = SortingCollection::new(header.clone(), settings.max_records_in_ram)
            .temp_dir(settings.tmp_dir.clone())
            .threads(settings.threads);
        Self { sorter: RecordSorter::Queryname(sorter), mismatched: MismatchedNames::new() }
    }

    /// Buffers a record, stripping the qualities of length-mismatched records so they
    /// can be spilled.
    ///
    /// # Errors
    /// Returns an error if sorting fails.
    pub fn add(&mut self, mut record: RecordBuf) -> Result<()> {
        self.mismatched.strip(&mut record);
        self.sorter.add(record)
    }

    /// Consumes the buffer, returning its records by name and the names stripped on the way in.
    ///
    /// # Errors
    /// Returns an error if spilled chunks cannot be reopened.
    pub fn into_sorted(self) -> Result<(SortedStream, MismatchedNames)> {
        Ok((self.sorter.into_sorted()?, self.mismatched))
    }
}

impl Close for OutputSink {
    fn close(mut self) -> Result<()> {
        if let Some(sorter) = self.sorter.take() {
            for record in sorter.into_sorted()? {
                self.write(&record?)?;
            }
        }
        debug!("Wrote {} records to {}", format_count(self.records_written), self.path.display());
        self.writer
            .finish()
            .with_context(|| format!("Failed to close output: {}", self.path.display()))
    }

    fn abort(mut self) -> Result<()> {
        drop(self.sorter.take());
        self.writer
            .finish()
            .with_context(|| format!("Failed to close output: {}", self.path.display()))
    }
}
