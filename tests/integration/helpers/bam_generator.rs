//! Utilities for generating and reading test SAM/BAM data.

#![allow(dead_code)]

use fgrevert_lib::bam_io::{create_alignment_writer, open_alignment_reader};
use fgrevert_lib::sam::builder::{HeaderBuilder, RecordBuilder};
use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::path::Path;
use std::process::{Command, Output};

/// Header of an aligned, coordinate-sorted file with read groups `A` (library `lib1`)
/// and `B` (library `lib2`), both from sample `s1`.
pub fn create_aligned_header() -> Header {
    HeaderBuilder::new()
        .sort_order("coordinate")
        .reference("chr1", 10_000)
        .read_group("A", Some("s1"), Some("lib1"))
        .read_group("B", Some("s1"), Some("lib2"))
        .program("bwa")
        .build()
}

/// Creates a mapped pair: R1 forward at `pos`, R2 reverse-strand at `pos + 100`.
pub fn create_mapped_pair(name: &str, read_group: &str, pos: usize) -> [RecordBuf; 2] {
    let r1 = RecordBuilder::new()
        .name(name)
        .sequence("ACGTACGT")
        .qualities(&[30, 31, 32, 33, 34, 35, 36, 37])
        .paired(true)
        .first_segment(true)
        .properly_paired(true)
        .reference_sequence_id(0)
        .alignment_start(pos)
        .mapping_quality(60)
        .cigar("8M")
        .mate_reference_sequence_id(0)
        .mate_alignment_start(pos + 100)
        .mate_reverse_complement(true)
        .template_length(108)
        .tag("RG", read_group)
        .tag("NM", 0i32)
        .tag("MD", "8")
        .build();
    let r2 = RecordBuilder::new()
        .name(name)
        .sequence("AACCGGTT")
        .qualities(&[20, 21, 22, 23, 24, 25, 26, 27])
        .paired(true)
        .first_segment(false)
        .properly_paired(true)
        .reverse_complement(true)
        .reference_sequence_id(0)
        .alignment_start(pos + 100)
        .mapping_quality(60)
        .cigar("8M")
        .mate_reference_sequence_id(0)
        .mate_alignment_start(pos)
        .template_length(-108)
        .tag("RG", read_group)
        .tag("AS", 8i32)
        .build();
    [r1, r2]
}

/// Creates an unpaired unmapped fragment in `read_group`.
pub fn create_fragment(name: &str, read_group: &str) -> RecordBuf {
    RecordBuilder::new().name(name).sequence("ACGTA").unmapped(true).tag("RG", read_group).build()
}

/// Writes records to a SAM or BAM file (chosen by extension).
pub fn write_alignment_file(path: &Path, header: &Header, records: &[RecordBuf]) {
    let mut writer = create_alignment_writer(path, header, 1, 1).expect("Failed to create writer");
    for record in records {
        writer.write_record(header, record).expect("Failed to write record");
    }
    writer.finish().expect("Failed to finish writer");
}

/// Reads every record of a SAM or BAM file.
pub fn read_alignment_file(path: &Path) -> (Header, Vec<RecordBuf>) {
    let (mut reader, header) = open_alignment_reader(path, 1).expect("Failed to open output");
    let mut records = Vec::new();
    let mut record = RecordBuf::default();
    while reader.read_record_buf(&header, &mut record).expect("Failed to read record") != 0 {
        records.push(record.clone());
    }
    (header, records)
}

/// Read names of `records`, in order.
pub fn read_names(records: &[RecordBuf]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.name().map(|n| n.to_string()).unwrap_or_default())
        .collect()
}

/// Runs `fgrevert revert` with `args`.
pub fn run_revert(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fgrevert"))
        .arg("revert")
        .args(args)
        .output()
        .expect("Failed to run fgrevert")
}
