//! End-to-end CLI tests for the revert command.
//!
//! These tests run the actual `fgrevert revert` binary and validate:
//! 1. Reversion of aligned pairs and the output header
//! 2. Sanitization, its metrics and the discard-rate gate
//! 3. Per-read-group outputs from a directory or an output map
//! 4. Configuration errors reported before any output is written

use fgrevert_lib::sam::builder::{HeaderBuilder, RecordBuilder};
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::header::record::value::map::program::tag as pg_tag;
use noodles::sam::header::record::value::map::read_group::tag as rg_tag;
use std::fs;
use tempfile::TempDir;

use crate::helpers::{
    assert_failure_with, assert_success, assert_tags_absent, assert_unaligned,
    create_aligned_header, create_fragment, create_mapped_pair, read_alignment_file, read_names,
    run_revert, write_alignment_file,
};

fn path_str(path: &std::path::Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_revert_aligned_pairs() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");

    let [r1, mut r2] = create_mapped_pair("pair1", "A", 100);
    r2.flags_mut().insert(Flags::DUPLICATE);
    *r2.sequence_mut() = b"AAACCCGT".to_vec().into();
    let mut records = vec![r1, r2];
    records.extend(create_mapped_pair("pair0", "B", 500));
    write_alignment_file(&input, &create_aligned_header(), &records);

    let result = run_revert(&["-i", path_str(&input), "-o", path_str(&output)]);
    assert_success(&result);

    let (header, records) = read_alignment_file(&output);
    assert_eq!(read_names(&records), vec!["pair0", "pair0", "pair1", "pair1"]);
    for record in &records {
        assert_unaligned(record);
        assert_tags_absent(record, &["NM", "MD", "AS"]);
    }

    let r2 = &records[3];
    assert!(r2.flags().is_last_segment());
    assert_eq!(r2.sequence().as_ref(), b"ACGGGTTT");
    assert_eq!(r2.quality_scores().as_ref(), &[27, 26, 25, 24, 23, 22, 21, 20]);

    let hd = header.header().unwrap();
    assert_eq!(hd.other_fields().get(b"SO").map(|v| v.as_slice()), Some(b"queryname".as_slice()));
    assert!(header.reference_sequences().is_empty());
    assert_eq!(header.read_groups().len(), 2);
    let programs: Vec<&[u8]> = header.programs().as_ref().keys().map(|k| k.as_slice()).collect();
    assert_eq!(programs, vec![b"fgrevert".as_slice()]);
}

#[test]
fn test_keep_alignment_information() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");

    let mut records = Vec::new();
    records.extend(create_mapped_pair("q2", "A", 100));
    records.extend(create_mapped_pair("q1", "A", 300));
    write_alignment_file(&input, &create_aligned_header(), &records);

    let result = run_revert(&[
        "-i",
        path_str(&input),
        "-o",
        path_str(&output),
        "--remove-alignment-information",
        "false",
    ]);
    assert_success(&result);

    let (header, records) = read_alignment_file(&output);
    assert_eq!(read_names(&records), vec!["q1", "q1", "q2", "q2"]);
    assert!(records.iter().all(|r| !r.flags().is_unmapped()));
    assert!(records[0].data().get(&Tag::MISMATCHED_POSITIONS).is_some());

    assert_eq!(header.reference_sequences().len(), 1);
    let pg = header.programs().as_ref().get(b"fgrevert".as_slice()).unwrap();
    assert_eq!(
        pg.other_fields().get(&pg_tag::PREVIOUS_PROGRAM_ID).map(|v| v.as_slice()),
        Some(b"bwa".as_slice())
    );
}

#[test]
fn test_restore_original_qualities_and_skip_secondary() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.sam");
    let output = temp_dir.path().join("output.sam");

    let header = HeaderBuilder::new().read_group("A", None, None).build();
    let primary = RecordBuilder::new()
        .name("q1")
        .sequence("ACGT")
        .qualities(&[10, 10, 10, 10])
        .tag("RG", "A")
        .tag("OQ", "I5+!")
        .build();
    let secondary = RecordBuilder::new().name("q1").sequence("ACGT").secondary(true).tag("RG", "A").build();
    write_alignment_file(&input, &header, &[primary, secondary]);

    let result = run_revert(&["-i", path_str(&input), "-o", path_str(&output), "--sort-order", "unsorted"]);
    assert_success(&result);

    let (_, records) = read_alignment_file(&output);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].quality_scores().as_ref(), &[40, 20, 10, 0]);
    assert_tags_absent(&records[0], &["OQ"]);
}

#[test]
fn test_sanitize_with_metrics() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    let metrics = temp_dir.path().join("sanitize.tsv");

    let mut records: Vec<RecordBuf> = create_mapped_pair("good", "A", 100).into();
    for _ in 0..3 {
        records.push(create_fragment("spurious", "A"));
    }
    let [r1, _] = create_mapped_pair("orphan", "A", 200);
    records.push(r1);
    write_alignment_file(&input, &create_aligned_header(), &records);

    let result = run_revert(&[
        "-i",
        path_str(&input),
        "-o",
        path_str(&output),
        "--sanitize",
        "--max-discard-fraction",
        "1",
        "--metrics",
        path_str(&metrics),
    ]);
    assert_success(&result);
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("Discarded 4 out of 6 (66.667%) reads in order to sanitize output."));

    let (_, records) = read_alignment_file(&output);
    assert_eq!(read_names(&records), vec!["good", "good"]);

    let contents = fs::read_to_string(&metrics).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "6\t2\t4\t0\t3\t1\t0.666667");
}

#[test]
fn test_discard_rate_gate_fails_after_writing_output() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.sam");
    let output = temp_dir.path().join("output.bam");
    let metrics = temp_dir.path().join("sanitize.tsv");

    // SEQ and QUAL lengths disagree on 11 of the 1000 records.
    let mut sam = String::from("@HD\tVN:1.6\tSO:unsorted\n@RG\tID:A\tSM:s1\n");
    for i in 0..1000 {
        let quals = if i < 11 { "II" } else { "IIII" };
        sam.push_str(&format!("read{i}\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t{quals}\tRG:Z:A\n"));
    }
    fs::write(&input, sam).unwrap();

    let result = run_revert(&[
        "-i",
        path_str(&input),
        "-o",
        path_str(&output),
        "--sanitize",
        "--max-records-in-ram",
        "100",
        "--metrics",
        path_str(&metrics),
    ]);
    assert_failure_with(&result, "Discarded 11 of 1000 reads (1.100%)");

    let (_, records) = read_alignment_file(&output);
    assert_eq!(records.len(), 989);
    assert!(records.iter().all(|r| r.quality_scores().as_ref().len() == 4));

    let contents = fs::read_to_string(&metrics).unwrap();
    assert_eq!(contents.lines().nth(1), Some("1000\t989\t11\t11\t0\t0\t0.011000"));
}

#[test]
fn test_output_by_read_group_directory() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.sam");
    let out_dir = temp_dir.path().join("out");
    fs::create_dir(&out_dir).unwrap();

    let mut records: Vec<RecordBuf> = create_mapped_pair("a1", "A", 100).into();
    records.extend(create_mapped_pair("b1", "B", 100));
    records.push(create_fragment("b2", "B"));
    write_alignment_file(&input, &create_aligned_header(), &records);

    let result = run_revert(&[
        "-i",
        path_str(&input),
        "-o",
        path_str(&out_dir),
        "--output-by-read-group",
        "--library-name",
        "ignored",
    ]);
    assert_failure_with(&result, "multiple values for library name");
    assert!(!out_dir.join("A.sam").exists());

    let result = run_revert(&[
        "-i",
        path_str(&input),
        "-o",
        path_str(&out_dir),
        "--output-by-read-group",
        "--sample-alias",
        "renamed",
    ]);
    assert_success(&result);

    let (header_a, records_a) = read_alignment_file(&out_dir.join("A.sam"));
    let (header_b, records_b) = read_alignment_file(&out_dir.join("B.sam"));
    assert_eq!(read_names(&records_a), vec!["a1", "a1"]);
    assert_eq!(read_names(&records_b), vec!["b1", "b1", "b2"]);

    for header in [&header_a, &header_b] {
        assert_eq!(header.read_groups().len(), 1);
        let rg = header.read_groups().values().next().unwrap();
        assert_eq!(rg.other_fields().get(&rg_tag::SAMPLE).map(|v| v.as_slice()), Some(b"renamed".as_slice()));
    }
    assert!(header_b.read_groups().contains_key(b"B".as_slice()));
}

#[test]
fn test_output_map() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let out_a = temp_dir.path().join("first.bam");
    let out_b = temp_dir.path().join("second.sam");
    let map = temp_dir.path().join("map.tsv");

    let records = vec![create_fragment("a", "A"), create_fragment("b", "B")];
    write_alignment_file(&input, &create_aligned_header(), &records);

    fs::write(&map, format!("READ_GROUP_ID\tOUTPUT\nA\t{}\n", out_a.display())).unwrap();
    let args = ["-i", path_str(&input), "--output-map", path_str(&map), "--output-by-read-group"];
    let result = run_revert(&args);
    assert_failure_with(&result, "Read group 'B' has no output destination");
    assert!(!out_a.exists());

    fs::write(&map, format!("READ_GROUP_ID\tOUTPUT\nA\t{}\nB\t{}\n", out_a.display(), out_b.display()))
        .unwrap();
    assert_success(&run_revert(&args));
    assert_eq!(read_names(&read_alignment_file(&out_a).1), vec!["a"]);
    assert_eq!(read_names(&read_alignment_file(&out_b).1), vec!["b"]);
}

#[test]
fn test_configuration_errors_are_reported_together() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    write_alignment_file(&input, &create_aligned_header(), &[]);

    let result = run_revert(&[
        "-i",
        path_str(&input),
        "--sanitize",
        "--sort-order",
        "coordinate",
        "--attributes-to-clear",
        "NM,BAD",
    ]);
    assert_failure_with(&result, "--sort-order must be queryname when --sanitize is enabled");
    assert_failure_with(&result, "--output is required");
    assert_failure_with(&result, "Invalid attribute to clear 'BAD'");
}

#[test]
fn test_cram_output_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.cram");
    write_alignment_file(&input, &create_aligned_header(), &[create_fragment("a", "A")]);

    let result = run_revert(&["-i", path_str(&input), "-o", path_str(&output)]);
    assert_failure_with(&result, "Unsupported alignment format 'CRAM'");
    assert!(!output.exists());
}

#[test]
fn test_illumina_qualities_normalized() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");

    let header = HeaderBuilder::new().read_group("A", None, None).build();
    let record = RecordBuilder::new()
        .name("q1")
        .sequence("ACGT")
        .qualities(&[65, 70, 40, 31])
        .tag("RG", "A")
        .build();
    write_alignment_file(&input, &header, &[record]);

    let result = run_revert(&["-i", path_str(&input), "-o", path_str(&output), "--sanitize"]);
    assert_success(&result);
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("Detected quality format for A: Illumina"));

    let (_, records) = read_alignment_file(&output);
    assert_eq!(records[0].quality_scores().as_ref(), &[34, 39, 9, 0]);
}

#[test]
fn test_cram_input_reported_with_other_configuration_errors() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.cram");
    fs::write(&input, b"CRAM").unwrap();

    let result = run_revert(&["-i", path_str(&input), "--max-discard-fraction", "2"]);
    assert_failure_with(&result, "Unsupported alignment format 'CRAM'");
    assert_failure_with(&result, "--output is required");
    assert_failure_with(&result, "--max-discard-fraction");
}
