//! Read-name cluster sanitization.
//!
//! Consumes a queryname-sorted stream of reverted records, groups consecutive records
//! sharing a read name, drops clusters that cannot form a consistent fragment or pair,
//! and converts Illumina-scaled qualities of the survivors to Phred.
//!
//! Each cluster is checked in order, and the first failing check discards the whole
//! cluster:
//!
//! 1. **Length mismatch** - any record's base and quality lengths differ
//! 2. **Spurious multiplicity** - the first record is unpaired but the cluster has more
//!    than one record
//! 3. **Broken pairing** - the first record is paired but the cluster does not hold
//!    exactly one first-of-pair, exactly one second-of-pair and no unpaired records

use ahash::AHashSet;
use anyhow::Result;
use bstr::ByteSlice;
use log::debug;
use noodles::sam::alignment::record_buf::{QualityScores, RecordBuf};
use std::fmt;

use crate::errors::RevertError;
use crate::metrics::SanitizeMetrics;
use crate::progress::ProgressTracker;
use crate::quality::{QualityEncoding, QualityEncodings};
use crate::sam::{read_group_id, read_name};

/// Why a cluster was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    /// A record's base and quality lengths differ
    LengthMismatch,
    /// An unpaired read name occurs more than once
    SpuriousMultiplicity,
    /// A paired read name lacks exactly one first and one second of pair
    BrokenPairing,
}

impl DiscardReason {
    /// Returns a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::LengthMismatch => "bases and qualities have different lengths",
            Self::SpuriousMultiplicity => "unpaired read name occurs more than once",
            Self::BrokenPairing => "paired read name is not exactly one first and one second of pair",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Returns true if the record's base and quality counts differ.
///
/// A record with bases but no qualities (`*`) counts as a mismatch.
#[must_use]
pub fn has_length_mismatch(record: &RecordBuf) -> bool {
    record.sequence().len() != record.quality_scores().len()
}

/// Names of records whose qualities were dropped before sorting.
///
/// Spill files are BAM, which cannot hold a record whose quality length differs from
/// its base length. Such records have their qualities emptied before entering the
/// sorter, and their names are remembered here so the sanitizer still discards their
/// cluster as a length mismatch.
#[derive(Debug, Default)]
pub struct MismatchedNames {
    names: AHashSet<Vec<u8>>,
}

impl MismatchedNames {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records and strips the qualities of `record` if its lengths mismatch.
    ///
    /// Returns true if the record was stripped.
    pub fn strip(&mut self, record: &mut RecordBuf) -> bool {
        if !has_length_mismatch(record) {
            return false;
        }
        self.names.insert(read_name(record).to_vec());
        *record.quality_scores_mut() = QualityScores::default();
        true
    }

    /// Returns true if a record with this name was stripped.
    #[must_use]
    pub fn contains(&self, name: &[u8]) -> bool {
        self.names.contains(name)
    }

    /// Number of distinct names recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no names were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Decides whether a cluster must be discarded.
///
/// Returns `None` for an empty cluster or one that passes every check.
#[must_use]
pub fn evaluate_cluster(cluster: &[RecordBuf], mismatched: &MismatchedNames) -> Option<DiscardReason> {
    let first = cluster.first()?;

    if cluster.iter().any(|r| has_length_mismatch(r) || mismatched.contains(read_name(r))) {
        return Some(DiscardReason::LengthMismatch);
    }

    if !first.flags().is_segmented() {
        return (cluster.len() > 1).then_some(DiscardReason::SpuriousMultiplicity);
    }

    let mut unpaired = 0usize;
    let mut firsts = 0usize;
    let mut seconds = 0usize;
    for record in cluster {
        let flags = record.flags();
        if !flags.is_segmented() {
            unpaired += 1;
            continue;
        }
        if flags.is_first_segment() {
            firsts += 1;
        }
        if flags.is_last_segment() {
            seconds += 1;
        }
    }

    (unpaired > 0 || firsts != 1 || seconds != 1).then_some(DiscardReason::BrokenPairing)
}

/// Converts a record's qualities to Phred according to its read group's encoding.
///
/// Values are shifted without clamping.
pub fn normalize_qualities(record: &mut RecordBuf, encoding: QualityEncoding) {
    let Some(subtrahend) = encoding.phred_subtrahend() else {
        return;
    };
    let quals: Vec<u8> =
        record.quality_scores().as_ref().iter().map(|q| q.wrapping_sub(subtrahend)).collect();
    *record.quality_scores_mut() = QualityScores::from(quals);
}

/// Groups a name-sorted record stream into runs of records sharing a read name.
pub struct ReadNameClusters<I> {
    records: I,
    lookahead: Option<RecordBuf>,
}

impl<I> ReadNameClusters<I>
where
    I: Iterator<Item = Result<RecordBuf>>,
{
    /// Wraps a name-sorted record stream.
    pub fn new(records: I) -> Self {
        Self { records, lookahead: None }
    }
}

impl<I> Iterator for ReadNameClusters<I>
where
    I: Iterator<Item = Result<RecordBuf>>,
{
    type Item = Result<Vec<RecordBuf>>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = match self.lookahead.take() {
            Some(record) => record,
            None => match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            },
        };

        let mut cluster = vec![first];
        loop {
            match self.records.next() {
                None => break,
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(record)) => {
                    if read_name(&record) == read_name(&cluster[0]) {
                        cluster.push(record);
                    } else {
                        self.lookahead = Some(record);
                        break;
                    }
                }
            }
        }
        Some(Ok(cluster))
    }
}

/// Applies the cluster checks and quality normalization to one or more streams,
/// accumulating counts across all of them.
pub struct Sanitizer<'a> {
    encodings: &'a QualityEncodings,
    metrics: SanitizeMetrics,
}

impl<'a> Sanitizer<'a> {
    /// Creates a sanitizer for the detected encodings.
    ///
    /// # Errors
    /// Returns [`RevertError::UnsupportedQualityEncoding`] if any read group is Solexa-scaled.
    pub fn new(encodings: &'a QualityEncodings) -> std::result::Result<Self, RevertError> {
        encodings.ensure_convertible()?;
        Ok(Self { encodings, metrics: SanitizeMetrics::default() })
    }

    /// Drains one name-sorted stream, passing every surviving record to `emit`.
    ///
    /// # Errors
    /// Returns the first error from the stream or from `emit`.
    pub fn sanitize_stream<I, F>(
        &mut self,
        records: I,
        mismatched: &MismatchedNames,
        progress: &mut ProgressTracker,
        mut emit: F,
    ) -> Result<()>
    where
        I: Iterator<Item = Result<RecordBuf>>,
        F: FnMut(RecordBuf) -> Result<()>,
    {
        for cluster in ReadNameClusters::new(records) {
            let cluster = cluster?;
            let size = cluster.len() as u64;
            self.metrics.total_records += size;
            for record in &cluster {
                progress.record(read_name(record));
            }

            if let Some(reason) = evaluate_cluster(&cluster, mismatched) {
                debug!(
                    "Discarding {} record(s) named {}: {}",
                    size,
                    read_name(&cluster[0]).as_bstr(),
                    reason
                );
                self.count_discard(reason, size);
                continue;
            }

            self.metrics.kept_records += size;
            for mut record in cluster {
                let encoding = self.encodings.get(read_group_id(&record));
                normalize_qualities(&mut record, encoding);
                emit(record)?;
            }
        }
        Ok(())
    }

    fn count_discard(&mut self, reason: DiscardReason, size: u64) {
        self.metrics.discarded_records += size;
        match reason {
            DiscardReason::LengthMismatch => self.metrics.discarded_length_mismatch += size,
            DiscardReason::SpuriousMultiplicity => {
                self.metrics.discarded_unpaired_multiplicity += size;
            }
            DiscardReason::BrokenPairing => self.metrics.discarded_broken_pairing += size,
        }
    }

    /// Returns the accumulated counts with the discard fraction computed.
    #[must_use]
    pub fn into_metrics(mut self) -> SanitizeMetrics {
        self.metrics.finalize();
        self.metrics
    }
}

/// Fails if the discard fraction is above `max_discard_fraction`.
///
/// # Errors
/// Returns [`RevertError::DiscardRateExceeded`] when the gate fails.
pub fn check_discard_rate(
    metrics: &SanitizeMetrics,
    max_discard_fraction: f64,
) -> std::result::Result<(), RevertError> {
    if metrics.discard_fraction > max_discard_fraction {
        return Err(RevertError::DiscardRateExceeded {
            discarded: metrics.discarded_records,
            total: metrics.total_records,
            rate: metrics.discard_fraction,
            max: max_discard_fraction,
        });
    }
    Ok(())
}
