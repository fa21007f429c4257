//! Spillable sorting collection for records.
//!
//! Records are accumulated in memory until a record-count cap is reached, then the
//! buffer is sorted and spilled to a temporary BAM chunk. Iterating the collection
//! performs a k-way merge over every chunk (plus whatever is still in memory).
//!
//! # Algorithm
//!
//! 1. **Accumulate phase**: Buffer records until `max_records_in_ram` is reached
//! 2. **Sort phase**: Stable sort, in parallel with rayon when `threads > 1`
//! 3. **Spill phase**: Write sorted chunk to a temp file with fast compression
//! 4. **Merge phase**: K-way merge using a binary heap
//!
//! The sort is stable and heap ties resolve to the lower chunk index, so records
//! with equal keys come back in the order they were added.

use crate::bam_io::create_bam_writer;
use crate::sort::keys::SortKey;
use anyhow::{Context, Result};
use log::debug;
use noodles::bam;
use noodles::sam::Header;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record_buf::RecordBuf;
use rayon::prelude::*;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Default number of records held in memory before spilling.
pub const DEFAULT_MAX_RECORDS_IN_RAM: usize = 500_000;

/// Buffer size for reading temp files during merge.
const MERGE_BUFFER_SIZE: usize = 64 * 1024;

/// Compression level for temporary files (fast compression).
const TEMP_COMPRESSION_LEVEL: u32 = 1;

/// A collection that accepts records in any order and yields them sorted by `K`.
pub struct SortingCollection<K: SortKey> {
    header: Header,
    max_records_in_ram: usize,
    temp_dir_base: Option<PathBuf>,
    threads: usize,
    buffer: Vec<(K, RecordBuf)>,
    temp_dir: Option<TempDir>,
    chunk_files: Vec<PathBuf>,
    total_records: u64,
}

impl<K: SortKey> SortingCollection<K> {
    /// Create an empty collection for records described by `header`.
    #[must_use]
    pub fn new(header: Header, max_records_in_ram: usize) -> Self {
        Self {
            header,
            max_records_in_ram: max_records_in_ram.max(1),
            temp_dir_base: None,
            threads: 1,
            buffer: Vec::new(),
            temp_dir: None,
            chunk_files: Vec::new(),
            total_records: 0,
        }
    }

    /// Set the directory under which spill files are created.
    #[must_use]
    pub fn temp_dir(mut self, path: Option<PathBuf>) -> Self {
        self.temp_dir_base = path;
        self
    }

    /// Set the number of threads used to sort in-memory chunks.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Add a record, spilling to disk if the in-memory cap is reached.
    ///
    /// # Errors
    /// Returns an error if the sort key cannot be extracted or a spill fails.
    pub fn add(&mut self, record: RecordBuf) -> Result<()> {
        let key = K::from_record(&record, &self.header)?;
        self.buffer.push((key, record));
        self.total_records += 1;
        if self.buffer.len() >= self.max_records_in_ram {
            self.spill()?;
        }
        Ok(())
    }

    /// Consume the collection, returning an iterator over the records in sorted order.
    ///
    /// # Errors
    /// Returns an error if a spilled chunk cannot be reopened.
    pub fn into_sorted(mut self) -> Result<SortedRecords<K>> {
        self.sort_buffer();
        let in_memory = std::mem::take(&mut self.buffer);

        if self.chunk_files.is_empty() {
            return Ok(SortedRecords {
                header: self.header,
                in_memory: in_memory.into_iter(),
                readers: Vec::new(),
                heap: BinaryHeap::new(),
                _temp_dir: None,
            });
        }

        debug!(
            "Merging {} records from {} spilled chunks and {} in-memory records",
            self.total_records,
            self.chunk_files.len(),
            in_memory.len()
        );

        let mut readers = self
            .chunk_files
            .iter()
            .enumerate()
            .map(|(idx, path)| ChunkReader::new(path, idx))
            .collect::<Result<Vec<_>>>()?;

        let mut heap = BinaryHeap::with_capacity(readers.len() + 1);
        for reader in &mut readers {
            if let Some((key, record)) = reader.next::<K>(&self.header)? {
                heap.push(Reverse(HeapEntry { key, record, chunk_idx: reader.idx }));
            }
        }

        // The in-memory tail is the newest data, so it takes the highest chunk index.
        let mut sorted = SortedRecords {
            header: self.header,
            in_memory: in_memory.into_iter(),
            readers,
            heap,
            _temp_dir: self.temp_dir.take(),
        };
        sorted.refill_in_memory();
        Ok(sorted)
    }

    fn sort_buffer(&mut self) {
        if self.threads > 1 {
            self.buffer.par_sort_by(|(k1, _), (k2, _)| k1.cmp(k2));
        } else {
            self.buffer.sort_by(|(k1, _), (k2, _)| k1.cmp(k2));
        }
    }

    fn spill(&mut self) -> Result<()> {
        self.sort_buffer();

        if self.temp_dir.is_none() {
            self.temp_dir = Some(create_temp_dir(self.temp_dir_base.as_deref())?);
        }
        let temp_path = self.temp_dir.as_ref().map(TempDir::path).context("temp dir missing")?;
        let chunk_path = temp_path.join(format!("chunk_{:04}.bam", self.chunk_files.len()));

        let mut writer = create_bam_writer(&chunk_path, &self.header, 1, TEMP_COMPRESSION_LEVEL)?;
        for (_, record) in &self.buffer {
            writer
                .write_alignment_record(&self.header, record)
                .with_context(|| format!("Failed to write chunk: {}", chunk_path.display()))?;
        }
        writer.into_inner().finish()?;

        debug!("Spilled {} records to {}", self.buffer.len(), chunk_path.display());
        self.chunk_files.push(chunk_path);
        self.buffer.clear();
        Ok(())
    }
}

/// Records in sorted order, drained from a [`SortingCollection`].
///
/// Temporary chunk files are deleted when this iterator is dropped.
pub struct SortedRecords<K: SortKey> {
    header: Header,
    in_memory: std::vec::IntoIter<(K, RecordBuf)>,
    readers: Vec<ChunkReader>,
    heap: BinaryHeap<Reverse<HeapEntry<K>>>,
    _temp_dir: Option<TempDir>,
}

impl<K: SortKey> SortedRecords<K> {
    /// Push the next in-memory record onto the heap when merging.
    fn refill_in_memory(&mut self) {
        if let Some((key, record)) = self.in_memory.next() {
            let chunk_idx = self.readers.len();
            self.heap.push(Reverse(HeapEntry { key, record, chunk_idx }));
        }
    }

    fn next_merged(&mut self) -> Result<Option<RecordBuf>> {
        let Some(Reverse(entry)) = self.heap.pop() else {
            return Ok(None);
        };
        if entry.chunk_idx == self.readers.len() {
            self.refill_in_memory();
        } else {
            let reader = &mut self.readers[entry.chunk_idx];
            if let Some((key, record)) = reader.next::<K>(&self.header)? {
                self.heap.push(Reverse(HeapEntry { key, record, chunk_idx: reader.idx }));
            }
        }
        Ok(Some(entry.record))
    }
}

impl<K: SortKey> Iterator for SortedRecords<K> {
    type Item = Result<RecordBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.readers.is_empty() {
            return self.in_memory.next().map(|(_, record)| Ok(record));
        }
        self.next_merged().transpose()
    }
}

/// Create temporary directory for spill files.
fn create_temp_dir(base: Option<&Path>) -> Result<TempDir> {
    match base {
        Some(base) => {
            std::fs::create_dir_all(base)
                .with_context(|| format!("Failed to create temp directory: {}", base.display()))?;
            TempDir::new_in(base).context("Failed to create temp directory")
        }
        None => TempDir::new().context("Failed to create temp directory"),
    }
}

/// Reader for a sorted chunk file.
struct ChunkReader {
    reader: bam::io::Reader<noodles::bgzf::io::Reader<BufReader<File>>>,
    idx: usize,
}

impl ChunkReader {
    fn new(path: &Path, idx: usize) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open chunk file: {}", path.display()))?;
        let buf_reader = BufReader::with_capacity(MERGE_BUFFER_SIZE, file);
        let mut reader = bam::io::Reader::new(buf_reader);

        // Read and discard header
        reader.read_header()?;

        Ok(Self { reader, idx })
    }

    fn next<K: SortKey>(&mut self, header: &Header) -> Result<Option<(K, RecordBuf)>> {
        let mut record = RecordBuf::default();
        match self.reader.read_record_buf(header, &mut record) {
            Ok(0) => Ok(None),
            Ok(_) => {
                let key = K::from_record(&record, header)?;
                Ok(Some((key, record)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Entry in the merge heap.
struct HeapEntry<K> {
    key: K,
    record: RecordBuf,
    chunk_idx: usize,
}

impl<K: Ord> PartialEq for HeapEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord> Eq for HeapEntry<K> {}

impl<K: Ord> PartialOrd for HeapEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord> Ord for HeapEntry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then_with(|| self.chunk_idx.cmp(&other.chunk_idx))
    }
}
