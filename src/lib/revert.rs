//! Per-record reversion to an unaligned baseline.
//!
//! [`revert_record`] rewrites one record in place according to [`RevertOptions`]:
//!
//! 1. Restore original qualities from `OQ` (then drop `OQ`)
//! 2. Clear the duplicate flag
//! 3. Remove alignment information: undo reverse-complementing, reset coordinates,
//!    CIGAR, mapping quality and template length, mark the read and its mate
//!    unmapped, and drop tags derived from the alignment
//!
//! The transform never fails and is idempotent when alignment removal is enabled.

use bstr::BString;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::{Cigar, QualityScores, RecordBuf, Sequence};

use crate::dna::{reverse_complement_in_place, reverse_complement};

/// Original base qualities (Phred+33 ASCII string).
pub const ORIGINAL_QUALITIES_TAG: Tag = Tag::new(b'O', b'Q');

/// Offset between ASCII-encoded and raw Phred quality scores.
const PHRED_ASCII_OFFSET: u8 = 33;

/// Tags removed by default when alignment information is removed.
pub const DEFAULT_ATTRIBUTES_TO_CLEAR: [&str; 8] = ["NM", "UQ", "PG", "MD", "MQ", "SA", "MC", "AS"];

/// Per-base string tags that are reverse-complemented with the read bases.
const REVERSE_COMPLEMENT_TAGS: [Tag; 2] = [Tag::new(b'E', b'2'), Tag::new(b'S', b'Q')];

/// Per-base string tags that are reversed with the read qualities.
const REVERSE_TAGS: [Tag; 2] = [ORIGINAL_QUALITIES_TAG, Tag::new(b'U', b'2')];

/// Options controlling [`revert_record`].
#[derive(Debug, Clone)]
pub struct RevertOptions {
    /// Replace base qualities with the `OQ` tag when present.
    pub restore_original_qualities: bool,
    /// Clear the duplicate flag.
    pub remove_duplicate_information: bool,
    /// Reset all alignment state and drop alignment-derived tags.
    pub remove_alignment_information: bool,
    /// Tags dropped when alignment information is removed.
    pub attributes_to_clear: Vec<Tag>,
}

impl Default for RevertOptions {
    fn default() -> Self {
        Self {
            restore_original_qualities: true,
            remove_duplicate_information: true,
            remove_alignment_information: true,
            attributes_to_clear: default_attributes_to_clear(),
        }
    }
}

/// The default clear-set as tags.
#[must_use]
pub fn default_attributes_to_clear() -> Vec<Tag> {
    DEFAULT_ATTRIBUTES_TO_CLEAR
        .iter()
        .map(|t| {
            let b = t.as_bytes();
            Tag::new(b[0], b[1])
        })
        .collect()
}

/// Reverts `record` in place.
pub fn revert_record(record: &mut RecordBuf, options: &RevertOptions) {
    if options.restore_original_qualities {
        restore_original_qualities(record);
    }

    if options.remove_duplicate_information {
        record.flags_mut().set(Flags::DUPLICATE, false);
    }

    if options.remove_alignment_information {
        if record.flags().is_reverse_complemented() {
            reverse_complement_record(record);
            record.flags_mut().set(Flags::REVERSE_COMPLEMENTED, false);
        }

        *record.reference_sequence_id_mut() = None;
        *record.alignment_start_mut() = None;
        *record.cigar_mut() = Cigar::default();
        *record.mapping_quality_mut() = None;
        *record.template_length_mut() = 0;

        let flags = record.flags_mut();
        flags.set(Flags::SECONDARY, false);
        flags.set(Flags::PROPERLY_SEGMENTED, false);
        flags.set(Flags::UNMAPPED, true);

        *record.mate_alignment_start_mut() = None;
        *record.mate_reference_sequence_id_mut() = None;
        let flags = record.flags_mut();
        flags.set(Flags::MATE_REVERSE_COMPLEMENTED, false);
        flags.set(Flags::MATE_UNMAPPED, true);

        let data = record.data_mut();
        for tag in &options.attributes_to_clear {
            data.remove(tag);
        }
    }
}

/// Replaces the base qualities with the decoded `OQ` tag and removes the tag.
fn restore_original_qualities(record: &mut RecordBuf) {
    let Some((_, Value::String(oq))) = record.data_mut().remove(&ORIGINAL_QUALITIES_TAG) else {
        return;
    };
    let quals: Vec<u8> = oq.iter().map(|&q| q.saturating_sub(PHRED_ASCII_OFFSET)).collect();
    *record.quality_scores_mut() = QualityScores::from(quals);
}

/// Reverse-complements bases and per-base string tags, and reverses qualities.
fn reverse_complement_record(record: &mut RecordBuf) {
    let mut bases = record.sequence().as_ref().to_vec();
    reverse_complement_in_place(&mut bases);
    *record.sequence_mut() = Sequence::from(bases);

    let mut quals = record.quality_scores().as_ref().to_vec();
    quals.reverse();
    *record.quality_scores_mut() = QualityScores::from(quals);

    for tag in REVERSE_COMPLEMENT_TAGS {
        if let Some(Value::String(value)) = record.data().get(&tag) {
            let rc = reverse_complement(value.as_slice());
            record.data_mut().insert(tag, Value::String(BString::from(rc)));
        }
    }

    for tag in REVERSE_TAGS {
        if let Some(Value::String(value)) = record.data().get(&tag) {
            let mut reversed = value.to_vec();
            reversed.reverse();
            record.data_mut().insert(tag, Value::String(BString::from(reversed)));
        }
    }
}
