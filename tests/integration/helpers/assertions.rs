//! Custom assertion helpers for integration tests.

#![allow(dead_code)]

use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::process::Output;

/// Asserts that a record carries no alignment information.
///
/// # Panics
///
/// Panics if any alignment field is set or any strand/pairing flag survived.
pub fn assert_unaligned(record: &RecordBuf) {
    let flags = record.flags();
    let name = record.name();
    assert!(flags.is_unmapped(), "record {name:?} should be unmapped");
    assert!(flags.is_mate_unmapped(), "record {name:?} mate should be unmapped");
    assert!(!flags.is_reverse_complemented(), "record {name:?} should be forward");
    assert!(!flags.is_mate_reverse_complemented(), "record {name:?} mate should be forward");
    assert!(!flags.is_properly_segmented(), "record {name:?} should not be properly paired");
    assert!(!flags.is_duplicate(), "record {name:?} should not be a duplicate");
    assert!(record.reference_sequence_id().is_none());
    assert!(record.alignment_start().is_none());
    assert!(record.mate_reference_sequence_id().is_none());
    assert!(record.mate_alignment_start().is_none());
    assert!(record.mapping_quality().is_none());
    assert!(record.cigar().as_ref().is_empty());
    assert_eq!(record.template_length(), 0);
}

/// Asserts that none of `tags` is present on the record.
pub fn assert_tags_absent(record: &RecordBuf, tags: &[&str]) {
    for tag in tags {
        let bytes = tag.as_bytes();
        let tag = Tag::new(bytes[0], bytes[1]);
        assert!(record.data().get(&tag).is_none(), "tag {tag:?} should be absent");
    }
}

/// Asserts that the process succeeded, printing its stderr if not.
pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "fgrevert failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Asserts that the process failed with `message` in its stderr.
pub fn assert_failure_with(output: &Output, message: &str) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "fgrevert should have failed");
    assert!(stderr.contains(message), "stderr should contain '{message}', got: {stderr}");
}
