//! Builders for creating test SAM/BAM records and headers.
//!
//! ```rust
//! use fgrevert_lib::sam::builder::RecordBuilder;
//!
//! let record = RecordBuilder::new()
//!     .name("read1")
//!     .sequence("ACGT")
//!     .tag("RG", "A")
//!     .build();
//! assert_eq!(record.quality_scores().as_ref(), &[30, 30, 30, 30]);
//! ```

use bstr::BString;
use noodles::core::Position;
use noodles::sam::Header;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value as BufValue;
use noodles::sam::alignment::record_buf::{QualityScores, RecordBuf, Sequence};
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use noodles::sam::header::record::value::map::read_group::tag as rg_tag;
use noodles::sam::header::record::value::map::{Program, ReadGroup, ReferenceSequence};
use std::num::NonZeroUsize;

/// Default base quality assigned when a sequence is set without qualities.
pub const DEFAULT_BASE_QUALITY: u8 = 30;

/// Builder for individual `RecordBuf`s.
///
/// ```rust
/// use fgrevert_lib::sam::builder::RecordBuilder;
///
/// let r1 = RecordBuilder::new()
///     .name("read1")
///     .sequence("ACGTACGT")
///     .first_segment(true)
///     .reference_sequence_id(0)
///     .alignment_start(100)
///     .cigar("8M")
///     .build();
/// assert!(r1.flags().is_first_segment());
/// ```
#[derive(Debug, Default)]
pub struct RecordBuilder {
    name: Option<Vec<u8>>,
    flags: Flags,
    reference_sequence_id: Option<usize>,
    alignment_start: Option<usize>,
    mapping_quality: Option<u8>,
    cigar: Option<String>,
    sequence: Vec<u8>,
    qualities: Option<Vec<u8>>,
    tags: Vec<(Tag, BufValue)>,
    mate_reference_sequence_id: Option<usize>,
    mate_alignment_start: Option<usize>,
    template_length: Option<i32>,
}

impl RecordBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for a mapped fragment at `ref_id:start` with mapping quality 60.
    #[must_use]
    pub fn mapped_read(ref_id: usize, start: usize) -> Self {
        Self {
            reference_sequence_id: Some(ref_id),
            alignment_start: Some(start),
            mapping_quality: Some(60),
            ..Self::new()
        }
    }

    /// Sets the read name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.as_bytes().to_vec());
        self
    }

    /// Sets the sequence.
    #[must_use]
    pub fn sequence(mut self, seq: &str) -> Self {
        self.sequence = seq.as_bytes().to_vec();
        self
    }

    /// Sets the quality scores (raw Phred values, not ASCII).
    ///
    /// The length is not checked against the sequence so malformed records can be built.
    #[must_use]
    pub fn qualities(mut self, quals: &[u8]) -> Self {
        self.qualities = Some(quals.to_vec());
        self
    }

    /// Sets all flags at once.
    #[must_use]
    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the paired flag.
    #[must_use]
    pub fn paired(mut self, paired: bool) -> Self {
        self.flags.set(Flags::SEGMENTED, paired);
        self
    }

    /// Sets the first segment (R1) flag, or the last segment (R2) flag when `false`.
    /// Implies paired.
    #[must_use]
    pub fn first_segment(mut self, is_first: bool) -> Self {
        self.flags.set(Flags::SEGMENTED, true);
        self.flags.set(Flags::FIRST_SEGMENT, is_first);
        self.flags.set(Flags::LAST_SEGMENT, !is_first);
        self
    }

    /// Sets the properly paired flag. Implies paired.
    #[must_use]
    pub fn properly_paired(mut self, properly_paired: bool) -> Self {
        if properly_paired {
            self.flags.set(Flags::SEGMENTED, true);
        }
        self.flags.set(Flags::PROPERLY_SEGMENTED, properly_paired);
        self
    }

    /// Sets the unmapped flag.
    #[must_use]
    pub fn unmapped(mut self, unmapped: bool) -> Self {
        self.flags.set(Flags::UNMAPPED, unmapped);
        self
    }

    /// Sets the reverse complement flag.
    #[must_use]
    pub fn reverse_complement(mut self, reverse: bool) -> Self {
        self.flags.set(Flags::REVERSE_COMPLEMENTED, reverse);
        self
    }

    /// Sets the secondary alignment flag.
    #[must_use]
    pub fn secondary(mut self, secondary: bool) -> Self {
        self.flags.set(Flags::SECONDARY, secondary);
        self
    }

    /// Sets the supplementary alignment flag.
    #[must_use]
    pub fn supplementary(mut self, supplementary: bool) -> Self {
        self.flags.set(Flags::SUPPLEMENTARY, supplementary);
        self
    }

    /// Sets the duplicate flag.
    #[must_use]
    pub fn duplicate(mut self, duplicate: bool) -> Self {
        self.flags.set(Flags::DUPLICATE, duplicate);
        self
    }

    /// Sets the reference sequence ID (0-based).
    #[must_use]
    pub fn reference_sequence_id(mut self, id: usize) -> Self {
        self.reference_sequence_id = Some(id);
        self
    }

    /// Sets the alignment start position (1-based).
    #[must_use]
    pub fn alignment_start(mut self, pos: usize) -> Self {
        self.alignment_start = Some(pos);
        self
    }

    /// Sets the mapping quality.
    #[must_use]
    pub fn mapping_quality(mut self, mapq: u8) -> Self {
        self.mapping_quality = Some(mapq);
        self
    }

    /// Sets the CIGAR string.
    #[must_use]
    pub fn cigar(mut self, cigar: &str) -> Self {
        self.cigar = Some(cigar.to_string());
        self
    }

    /// Sets the mate reference sequence ID (0-based).
    #[must_use]
    pub fn mate_reference_sequence_id(mut self, id: usize) -> Self {
        self.mate_reference_sequence_id = Some(id);
        self
    }

    /// Sets the mate alignment start position (1-based).
    #[must_use]
    pub fn mate_alignment_start(mut self, pos: usize) -> Self {
        self.mate_alignment_start = Some(pos);
        self
    }

    /// Sets the template length (insert size).
    #[must_use]
    pub fn template_length(mut self, tlen: i32) -> Self {
        self.template_length = Some(tlen);
        self
    }

    /// Sets the mate reverse complement flag.
    #[must_use]
    pub fn mate_reverse_complement(mut self, reverse: bool) -> Self {
        self.flags.set(Flags::MATE_REVERSE_COMPLEMENTED, reverse);
        self
    }

    /// Sets the mate unmapped flag.
    #[must_use]
    pub fn mate_unmapped(mut self, unmapped: bool) -> Self {
        self.flags.set(Flags::MATE_UNMAPPED, unmapped);
        self
    }

    /// Adds a SAM tag. Tags that are not exactly two characters are ignored.
    #[must_use]
    pub fn tag<V: Into<BufValue>>(mut self, tag: &str, value: V) -> Self {
        let tag_bytes = tag.as_bytes();
        if tag_bytes.len() == 2 {
            let tag = Tag::from([tag_bytes[0], tag_bytes[1]]);
            self.tags.push((tag, value.into()));
        }
        self
    }

    /// Builds the `RecordBuf`.
    ///
    /// # Panics
    ///
    /// Panics if a position is zero, the mapping quality is 255, or the CIGAR is invalid.
    #[must_use]
    pub fn build(self) -> RecordBuf {
        let mut record = RecordBuf::default();

        if let Some(name) = self.name {
            *record.name_mut() = Some(name.into());
        }

        *record.flags_mut() = self.flags;

        if let Some(ref_id) = self.reference_sequence_id {
            *record.reference_sequence_id_mut() = Some(ref_id);
        }
        if let Some(pos) = self.alignment_start {
            *record.alignment_start_mut() =
                Some(Position::try_from(pos).expect("alignment_start must be >= 1"));
        }

        if let Some(mate_ref_id) = self.mate_reference_sequence_id {
            *record.mate_reference_sequence_id_mut() = Some(mate_ref_id);
        }
        if let Some(mate_pos) = self.mate_alignment_start {
            *record.mate_alignment_start_mut() =
                Some(Position::try_from(mate_pos).expect("mate_alignment_start must be >= 1"));
        }
        if let Some(tlen) = self.template_length {
            *record.template_length_mut() = tlen;
        }

        if let Some(mapq) = self.mapping_quality {
            *record.mapping_quality_mut() = Some(
                noodles::sam::alignment::record::MappingQuality::new(mapq)
                    .expect("mapping_quality must be valid"),
            );
        }

        if let Some(cigar) = self.cigar {
            *record.cigar_mut() = parse_cigar(&cigar).into_iter().collect();
        }

        let qualities =
            self.qualities.unwrap_or_else(|| vec![DEFAULT_BASE_QUALITY; self.sequence.len()]);
        *record.sequence_mut() = Sequence::from(self.sequence);
        *record.quality_scores_mut() = QualityScores::from(qualities);

        for (tag, value) in self.tags {
            record.data_mut().insert(tag, value);
        }

        record
    }
}

/// Parses a CIGAR string into operations.
///
/// # Panics
///
/// Panics on malformed CIGAR strings.
#[must_use]
pub fn parse_cigar(cigar_str: &str) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut num_str = String::new();

    for c in cigar_str.chars() {
        if c.is_ascii_digit() {
            num_str.push(c);
        } else {
            let len: usize = num_str.parse().expect("Invalid CIGAR: expected number");
            let kind = match c {
                'M' => Kind::Match,
                'I' => Kind::Insertion,
                'D' => Kind::Deletion,
                'N' => Kind::Skip,
                'S' => Kind::SoftClip,
                'H' => Kind::HardClip,
                'P' => Kind::Pad,
                '=' => Kind::SequenceMatch,
                'X' => Kind::SequenceMismatch,
                _ => panic!("Unknown CIGAR operation: {c}"),
            };
            ops.push(Op::new(kind, len));
            num_str.clear();
        }
    }

    ops
}

/// Builder for test headers with reference sequences, read groups and programs.
///
/// ```rust
/// use fgrevert_lib::sam::builder::HeaderBuilder;
///
/// let header = HeaderBuilder::new()
///     .sort_order("coordinate")
///     .reference("chr1", 1000)
///     .read_group("rg1", Some("S1"), Some("L1"))
///     .build();
/// assert_eq!(header.read_groups().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct HeaderBuilder {
    sort_order: Option<String>,
    references: Vec<(String, usize)>,
    read_groups: Vec<(String, Option<String>, Option<String>)>,
    programs: Vec<String>,
}

impl HeaderBuilder {
    /// Creates an empty header builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `@HD SO` value.
    #[must_use]
    pub fn sort_order(mut self, sort_order: &str) -> Self {
        self.sort_order = Some(sort_order.to_string());
        self
    }

    /// Adds a reference sequence.
    #[must_use]
    pub fn reference(mut self, name: &str, length: usize) -> Self {
        self.references.push((name.to_string(), length));
        self
    }

    /// Adds a read group with optional sample and library.
    #[must_use]
    pub fn read_group(mut self, id: &str, sample: Option<&str>, library: Option<&str>) -> Self {
        self.read_groups.push((
            id.to_string(),
            sample.map(str::to_string),
            library.map(str::to_string),
        ));
        self
    }

    /// Adds an empty program record.
    #[must_use]
    pub fn program(mut self, id: &str) -> Self {
        self.programs.push(id.to_string());
        self
    }

    /// Builds the header.
    ///
    /// # Panics
    ///
    /// Panics if a reference length is zero.
    #[must_use]
    pub fn build(self) -> Header {
        let mut builder = Header::builder();

        if let Some(so) = self.sort_order {
            let hd = Map::<noodles::sam::header::record::value::map::Header>::builder()
                .insert(header_tag::SORT_ORDER, BString::from(so))
                .build()
                .expect("valid header");
            builder = builder.set_header(hd);
        }

        for (name, length) in self.references {
            let length = NonZeroUsize::new(length).expect("reference length must be > 0");
            builder = builder
                .add_reference_sequence(name.as_bytes(), Map::<ReferenceSequence>::new(length));
        }

        for (id, sample, library) in self.read_groups {
            let mut rg = Map::<ReadGroup>::builder();
            if let Some(sample) = sample {
                rg = rg.insert(rg_tag::SAMPLE, sample);
            }
            if let Some(library) = library {
                rg = rg.insert(rg_tag::LIBRARY, library);
            }
            builder = builder.add_read_group(id.as_bytes(), rg.build().expect("valid read group"));
        }

        for id in self.programs {
            builder = builder.add_program(id.as_bytes(), Map::<Program>::default());
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_qualities_follow_sequence() {
        let record = RecordBuilder::new().name("q").sequence("ACGTA").build();
        assert_eq!(record.quality_scores().as_ref(), &[DEFAULT_BASE_QUALITY; 5]);
    }

    #[test]
    fn test_mismatched_qualities_are_kept() {
        let record = RecordBuilder::new().name("q").sequence("ACGT").qualities(&[20; 3]).build();
        assert_eq!(record.sequence().len(), 4);
        assert_eq!(record.quality_scores().as_ref().len(), 3);
    }

    #[test]
    fn test_first_and_second_segment_flags() {
        let r1 = RecordBuilder::new().first_segment(true).build();
        let r2 = RecordBuilder::new().first_segment(false).build();
        assert!(r1.flags().is_segmented() && r1.flags().is_first_segment());
        assert!(!r1.flags().is_last_segment());
        assert!(r2.flags().is_segmented() && r2.flags().is_last_segment());
        assert!(!r2.flags().is_first_segment());
    }

    #[test]
    fn test_mapped_read() {
        let record = RecordBuilder::mapped_read(1, 50).name("q").sequence("ACGT").cigar("4M").build();
        assert_eq!(record.reference_sequence_id(), Some(1));
        assert_eq!(record.alignment_start().map(usize::from), Some(50));
        assert_eq!(record.cigar().as_ref().len(), 1);
    }

    #[test]
    fn test_header_builder() {
        let header = HeaderBuilder::new()
            .sort_order("queryname")
            .reference("chr1", 100)
            .read_group("A", Some("S"), None)
            .read_group("B", None, Some("L"))
            .program("bwa")
            .build();
        assert_eq!(header.reference_sequences().len(), 1);
        assert_eq!(header.read_groups().len(), 2);
        assert_eq!(header.programs().as_ref().len(), 1);
        let rg = header.read_groups().get(b"A".as_slice()).unwrap();
        assert_eq!(rg.other_fields().get(&rg_tag::SAMPLE).map(AsRef::as_ref), Some(b"S".as_slice()));
    }
}
