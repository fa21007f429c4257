//! SAM/BAM file I/O utilities.
//!
//! This module provides readers and writers that pick their format from the file
//! extension, with consistent error handling and header management.
//!
//! # Threading Model
//!
//! BAM files use BGZF compression, which can be parallelized for both reading and writing:
//!
//! - **Single-threaded**: Use `threads=1` (lower overhead, good for small files)
//! - **Multi-threaded**: Use `threads>1` (higher throughput for large files)
//!
//! SAM files are plain text and ignore the thread count.
//!
//! SAM records are decoded field by field rather than with the strict record parser, so
//! a record whose QUAL length differs from its SEQ length is still read and can be
//! dealt with downstream.

use anyhow::{Context, Result};
use noodles::sam::Header;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles_bgzf::io::{
    MultithreadedReader, MultithreadedWriter, Reader as BgzfReader, Writer as BgzfWriter,
    multithreaded_writer, writer::CompressionLevel,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::num::NonZero;
use std::path::Path;

use crate::errors::RevertError;

/// Default BGZF compression level for final outputs.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 5;

/// Alignment container format, chosen from a path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentFormat {
    /// BGZF-compressed binary alignment map
    Bam,
    /// Plain-text alignment map
    Sam,
    /// Reference-compressed alignment map
    Cram,
}

impl AlignmentFormat {
    /// Determines the format from the extension of `path`; anything that is not
    /// `.sam` or `.cram` is treated as BAM.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("sam") => Self::Sam,
            Some("cram") => Self::Cram,
            _ => Self::Bam,
        }
    }

    /// File extension including the leading dot.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Bam => ".bam",
            Self::Sam => ".sam",
            Self::Cram => ".cram",
        }
    }

    /// Returns an error if records cannot be read from or written to this format.
    pub fn ensure_supported<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), RevertError> {
        match self {
            Self::Bam | Self::Sam => Ok(()),
            Self::Cram => Err(RevertError::UnsupportedFormat {
                path: path.as_ref().display().to_string(),
                format: "CRAM".to_string(),
            }),
        }
    }
}

/// Enum wrapping single-threaded and multi-threaded BGZF readers.
pub enum BgzfReaderEnum {
    /// Single-threaded BGZF reader (lower overhead for small files)
    SingleThreaded(BgzfReader<File>),
    /// Multi-threaded BGZF reader
    MultiThreaded(MultithreadedReader<File>),
}

impl Read for BgzfReaderEnum {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.read(buf),
            BgzfReaderEnum::MultiThreaded(r) => r.read(buf),
        }
    }
}

impl BufRead for BgzfReaderEnum {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.fill_buf(),
            BgzfReaderEnum::MultiThreaded(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.consume(amt),
            BgzfReaderEnum::MultiThreaded(r) => r.consume(amt),
        }
    }
}

/// Type alias for a BAM reader that supports both single and multi-threaded BGZF.
pub type BamReaderAuto = noodles::bam::io::Reader<BgzfReaderEnum>;

/// Enum wrapping single-threaded and multi-threaded BGZF writers
pub enum BgzfWriterEnum {
    /// Single-threaded BGZF writer
    SingleThreaded(BgzfWriter<File>),
    /// Multi-threaded BGZF writer
    MultiThreaded(MultithreadedWriter<File>),
}

impl Write for BgzfWriterEnum {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.write(buf),
            BgzfWriterEnum::MultiThreaded(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.flush(),
            BgzfWriterEnum::MultiThreaded(w) => w.flush(),
        }
    }
}

impl BgzfWriterEnum {
    /// Finish writing, flushing all blocks and writing the EOF marker.
    ///
    /// # Errors
    /// Returns an error if flushing or finalizing the writer fails.
    pub fn finish(self) -> io::Result<()> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => {
                w.finish()?;
                Ok(())
            }
            BgzfWriterEnum::MultiThreaded(mut w) => {
                w.finish()?;
                Ok(())
            }
        }
    }
}

/// Type alias for a BAM writer that supports both single and multi-threaded BGZF
pub type BamWriter = noodles::bam::io::Writer<BgzfWriterEnum>;

/// A record source over either a BAM or a SAM file.
pub enum AlignmentReader {
    /// BAM input
    Bam(BamReaderAuto),
    /// SAM input, with the raw record reused between reads
    Sam(noodles::sam::io::Reader<BufReader<File>>, Box<noodles::sam::Record>),
}

impl AlignmentReader {
    /// Reads the next record into `record`, returning 0 at end of file.
    ///
    /// # Errors
    /// Returns an error if the record cannot be decoded.
    pub fn read_record_buf(&mut self, header: &Header, record: &mut RecordBuf) -> io::Result<usize> {
        match self {
            AlignmentReader::Bam(r) => r.read_record_buf(header, record),
            AlignmentReader::Sam(r, raw) => {
                let n = r.read_record(raw)?;
                if n > 0 {
                    *record = RecordBuf::try_from_alignment_record(header, &**raw)?;
                }
                Ok(n)
            }
        }
    }
}

/// A record sink over either a BAM or a SAM file.
pub enum AlignmentWriter {
    /// BAM output
    Bam(BamWriter),
    /// SAM output
    Sam(noodles::sam::io::Writer<BufWriter<File>>),
}

impl AlignmentWriter {
    /// Writes one record.
    ///
    /// # Errors
    /// Returns an error if the record cannot be encoded or written.
    pub fn write_record(&mut self, header: &Header, record: &RecordBuf) -> io::Result<()> {
        match self {
            AlignmentWriter::Bam(w) => w.write_alignment_record(header, record),
            AlignmentWriter::Sam(w) => w.write_alignment_record(header, record),
        }
    }

    /// Flushes and closes the writer. BAM outputs get their BGZF EOF marker here.
    ///
    /// # Errors
    /// Returns an error if flushing or finalizing the writer fails.
    pub fn finish(self) -> io::Result<()> {
        match self {
            AlignmentWriter::Bam(w) => w.into_inner().finish(),
            AlignmentWriter::Sam(w) => w.into_inner().flush(),
        }
    }
}

/// Create a BAM reader and read its header.
///
/// # Errors
/// Returns an error if the file cannot be opened or the header cannot be read
///
/// # Panics
/// Panics if `threads > 1` but `NonZero::new` fails (should not happen).
pub fn create_bam_reader<P: AsRef<Path>>(
    path: P,
    threads: usize,
) -> Result<(BamReaderAuto, Header)> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open input BAM: {}", path_ref.display()))?;

    let bgzf_reader = if threads > 1 {
        let worker_count = NonZero::new(threads).expect("threads > 1 checked above");
        BgzfReaderEnum::MultiThreaded(MultithreadedReader::with_worker_count(worker_count, file))
    } else {
        BgzfReaderEnum::SingleThreaded(BgzfReader::new(file))
    };

    let mut reader = noodles::bam::io::Reader::from(bgzf_reader);
    let header = reader
        .read_header()
        .with_context(|| format!("Failed to read header from: {}", path_ref.display()))?;

    Ok((reader, header))
}

/// Open a SAM or BAM file (by extension) and read its header.
///
/// # Errors
/// Returns an error if the format is unsupported, the file cannot be opened, or the
/// header cannot be read.
pub fn open_alignment_reader<P: AsRef<Path>>(
    path: P,
    threads: usize,
) -> Result<(AlignmentReader, Header)> {
    let path_ref = path.as_ref();
    let format = AlignmentFormat::from_path(path_ref);
    format.ensure_supported(path_ref)?;

    match format {
        AlignmentFormat::Sam => {
            let file = File::open(path_ref)
                .with_context(|| format!("Failed to open input SAM: {}", path_ref.display()))?;
            let mut reader = noodles::sam::io::Reader::new(BufReader::new(file));
            let header = reader
                .read_header()
                .with_context(|| format!("Failed to read header from: {}", path_ref.display()))?;
            Ok((AlignmentReader::Sam(reader, Box::default()), header))
        }
        _ => {
            let (reader, header) = create_bam_reader(path_ref, threads)?;
            Ok((AlignmentReader::Bam(reader), header))
        }
    }
}

/// Create a BAM writer and write the header in one operation
///
/// # Errors
/// Returns an error if the file cannot be created or the header cannot be written
///
/// # Panics
/// Panics if `threads > 1` but `NonZero::new` fails (should not happen).
pub fn create_bam_writer<P: AsRef<Path>>(
    path: P,
    header: &Header,
    threads: usize,
    compression_level: u32,
) -> Result<BamWriter> {
    let path_ref = path.as_ref();
    let output_file = File::create(path_ref)
        .with_context(|| format!("Failed to create output BAM: {}", path_ref.display()))?;

    #[allow(clippy::cast_possible_truncation)]
    let level = CompressionLevel::new(compression_level as u8);

    let bgzf_writer = if threads > 1 {
        let worker_count = NonZero::new(threads).expect("threads > 1 checked above");
        let mut builder = multithreaded_writer::Builder::default().set_worker_count(worker_count);
        if let Some(level) = level {
            builder = builder.set_compression_level(level);
        }
        BgzfWriterEnum::MultiThreaded(builder.build_from_writer(output_file))
    } else {
        let mut builder = noodles_bgzf::io::writer::Builder::default();
        if let Some(level) = level {
            builder = builder.set_compression_level(level);
        }
        BgzfWriterEnum::SingleThreaded(builder.build_from_writer(output_file))
    };

    let mut writer = noodles::bam::io::Writer::from(bgzf_writer);
    writer
        .write_header(header)
        .with_context(|| format!("Failed to write header to: {}", path_ref.display()))?;
    Ok(writer)
}

/// Create a SAM or BAM writer (by extension) and write the header.
///
/// # Errors
/// Returns an error if the format is unsupported, the file cannot be created, or the
/// header cannot be written.
pub fn create_alignment_writer<P: AsRef<Path>>(
    path: P,
    header: &Header,
    threads: usize,
    compression_level: u32,
) -> Result<AlignmentWriter> {
    let path_ref = path.as_ref();
    let format = AlignmentFormat::from_path(path_ref);
    format.ensure_supported(path_ref)?;

    match format {
        AlignmentFormat::Sam => {
            let file = File::create(path_ref)
                .with_context(|| format!("Failed to create output SAM: {}", path_ref.display()))?;
            let mut writer = noodles::sam::io::Writer::new(BufWriter::new(file));
            writer
                .write_header(header)
                .with_context(|| format!("Failed to write header to: {}", path_ref.display()))?;
            Ok(AlignmentWriter::Sam(writer))
        }
        _ => Ok(AlignmentWriter::Bam(create_bam_writer(
            path_ref,
            header,
            threads,
            compression_level,
        )?)),
    }
}
