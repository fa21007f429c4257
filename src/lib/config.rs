//! Run configuration for reverting.
//!
//! [`RevertConfig::validate`] checks everything that can be checked from the arguments
//! alone. [`RevertConfig::plan_destinations`] runs the checks that need the input header
//! and resolves the set of outputs. Both report every problem found at once.

use noodles::sam::Header;
use noodles::sam::alignment::record::data::field::Tag;
use std::path::PathBuf;

use crate::bam_io::{AlignmentFormat, DEFAULT_COMPRESSION_LEVEL};
use crate::destination::{
    Destinations, check_output_map_header, default_extension, read_output_map,
};
use crate::errors::{Result, RevertError};
use crate::header::check_read_group_overrides;
use crate::output::SorterSettings;
use crate::revert::{DEFAULT_ATTRIBUTES_TO_CLEAR, RevertOptions};
use crate::sort::{DEFAULT_MAX_RECORDS_IN_RAM, SortOrder};
use crate::validation::{
    Problems, check_directory_exists, check_file_exists, check_fraction, check_writable_file,
    string_to_tag,
};

/// Default maximum fraction of records that sanitization may discard.
pub const DEFAULT_MAX_DISCARD_FRACTION: f64 = 0.01;

/// Everything a revert run needs to know.
#[derive(Debug, Clone)]
pub struct RevertConfig {
    /// Input SAM or BAM
    pub input: PathBuf,
    /// Output file, or output directory when writing one output per read group
    pub output: Option<PathBuf>,
    /// `READ_GROUP_ID<TAB>OUTPUT` table naming one output per read group
    pub output_map: Option<PathBuf>,
    /// Write one output per read group
    pub output_by_read_group: bool,
    /// Sort order of the outputs
    pub sort_order: SortOrder,
    /// Restore qualities from the `OQ` tag
    pub restore_original_qualities: bool,
    /// Clear the duplicate flag
    pub remove_duplicate_information: bool,
    /// Reset alignment state and drop alignment tags
    pub remove_alignment_information: bool,
    /// Tags to drop when removing alignment information
    pub attributes_to_clear: Vec<String>,
    /// Discard inconsistent read-name clusters and normalize qualities
    pub sanitize: bool,
    /// Fail if sanitization discards a larger fraction of records than this
    pub max_discard_fraction: f64,
    /// Replace the sample of every read group
    pub sample_alias: Option<String>,
    /// Replace the library of every read group
    pub library_name: Option<String>,
    /// Records held in memory per sorter before spilling
    pub max_records_in_ram: usize,
    /// Directory for spill files
    pub tmp_dir: Option<PathBuf>,
    /// Threads for BGZF compression and in-memory sorting
    pub threads: usize,
    /// BGZF compression level of BAM outputs
    pub compression_level: u32,
    /// Optional sanitization metrics TSV
    pub metrics: Option<PathBuf>,
}

impl Default for RevertConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: None,
            output_map: None,
            output_by_read_group: false,
            sort_order: SortOrder::Queryname,
            restore_original_qualities: true,
            remove_duplicate_information: true,
            remove_alignment_information: true,
            attributes_to_clear: DEFAULT_ATTRIBUTES_TO_CLEAR.iter().map(|t| (*t).to_string()).collect(),
            sanitize: false,
            max_discard_fraction: DEFAULT_MAX_DISCARD_FRACTION,
            sample_alias: None,
            library_name: None,
            max_records_in_ram: DEFAULT_MAX_RECORDS_IN_RAM,
            tmp_dir: None,
            threads: 1,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            metrics: None,
        }
    }
}

impl RevertConfig {
    /// Checks the arguments without opening the input.
    ///
    /// # Errors
    /// Returns [`crate::errors::RevertError::InvalidConfiguration`] listing every problem.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Problems::new();

        problems.check(check_file_exists(&self.input, "Input"));
        if let Err(e) = AlignmentFormat::from_path(&self.input).ensure_supported(&self.input) {
            problems.push(e.to_string());
        }

        if self.sanitize && self.sort_order != SortOrder::Queryname {
            problems.push("--sort-order must be queryname when --sanitize is enabled");
        }
        if self.metrics.is_some() && !self.sanitize {
            problems.push("--metrics can only be written when --sanitize is enabled");
        }

        if self.output_by_read_group {
            self.validate_outputs_by_read_group(&mut problems);
        } else {
            self.validate_single_output(&mut problems);
        }

        problems.check(check_fraction(self.max_discard_fraction, "--max-discard-fraction"));
        if self.max_records_in_ram == 0 {
            problems.push("--max-records-in-ram must be greater than 0");
        }
        if self.threads == 0 {
            problems.push("--threads must be greater than 0");
        }
        for tag in &self.attributes_to_clear {
            if let Err(message) = string_to_tag(tag, "attribute to clear") {
                problems.push(message);
            }
        }
        if let Some(tmp_dir) = &self.tmp_dir {
            problems.check(check_directory_exists(tmp_dir, "Temporary directory"));
        }
        if let Some(metrics) = &self.metrics {
            problems.check(check_writable_file(metrics, "Metrics output"));
        }

        problems.into_result()
    }

    fn validate_outputs_by_read_group(&self, problems: &mut Problems) {
        if let Some(output) = &self.output {
            if self.output_map.is_some() {
                problems.push("Provide only one of --output and --output-map with --output-by-read-group");
            }
            if !output.is_dir() {
                problems.push(format!(
                    "With --output-by-read-group, --output must be an existing directory: {}",
                    output.display()
                ));
            }
            return;
        }
        match &self.output_map {
            None => problems.push("Must provide either --output or --output-map with --output-by-read-group"),
            Some(map) => problems.check(check_output_map_header(map)),
        }
    }

    fn validate_single_output(&self, problems: &mut Problems) {
        if self.output_map.is_some() {
            problems.push("Cannot provide --output-map without --output-by-read-group; provide --output instead");
        }
        match &self.output {
            None => problems.push("--output is required without --output-by-read-group"),
            Some(output) if output.is_dir() => problems.push(format!(
                "--output should not be a directory without --output-by-read-group: {}",
                output.display()
            )),
            Some(_) => {}
        }
    }

    /// Runs the header-dependent checks and resolves the outputs.
    ///
    /// Call after [`Self::validate`] succeeded.
    ///
    /// # Errors
    /// Returns [`crate::errors::RevertError::InvalidConfiguration`] listing every problem:
    /// conflicting read group overrides, read groups without an output, unwritable or
    /// unsupported outputs.
    pub fn plan_destinations(&self, header: &Header) -> Result<Destinations> {
        let mut problems = Problems::new();
        problems.extend(check_read_group_overrides(
            header,
            self.sample_alias.as_deref(),
            self.library_name.as_deref(),
        ));

        let destinations = if self.output_by_read_group {
            if header.read_groups().is_empty() {
                problems.push("Input header has no read groups; cannot write one output per read group");
            }
            match (&self.output, &self.output_map) {
                (Some(dir), _) => Some(Destinations::from_directory(header, dir, default_extension(&self.input))),
                (None, Some(map)) => match read_output_map(map) {
                    Ok(entries) => {
                        match Destinations::from_output_map(header, &entries, &map.display().to_string()) {
                            Ok(destinations) => Some(destinations),
                            Err(e) => {
                                problems.push(e.to_string());
                                None
                            }
                        }
                    }
                    Err(e) => {
                        problems.push(format!("{e:#}"));
                        None
                    }
                },
                (None, None) => None,
            }
        } else {
            self.output.clone().map(Destinations::single)
        };

        if let Some(destinations) = &destinations {
            for (_, destination) in destinations.iter() {
                let format = AlignmentFormat::from_path(&destination.path);
                if let Err(e) = format.ensure_supported(&destination.path) {
                    problems.push(e.to_string());
                }
                problems.check(check_writable_file(&destination.path, "Output"));
            }
        }

        problems.into_result()?;
        destinations.ok_or_else(|| RevertError::InvalidConfiguration {
            messages: vec!["No output destination configured".to_string()],
        })
    }

    /// Reversion options; tags that fail to parse are skipped, so call after [`Self::validate`].
    #[must_use]
    pub fn revert_options(&self) -> RevertOptions {
        let attributes_to_clear: Vec<Tag> = self
            .attributes_to_clear
            .iter()
            .filter_map(|t| string_to_tag(t, "attribute to clear").ok())
            .collect();
        RevertOptions {
            restore_original_qualities: self.restore_original_qualities,
            remove_duplicate_information: self.remove_duplicate_information,
            remove_alignment_information: self.remove_alignment_information,
            attributes_to_clear,
        }
    }

    /// Spill settings shared by every sorter of the run.
    #[must_use]
    pub fn sorter_settings(&self) -> SorterSettings {
        SorterSettings {
            max_records_in_ram: self.max_records_in_ram,
            tmp_dir: self.tmp_dir.clone(),
            threads: self.threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sam::builder::HeaderBuilder;
    use std::fs;
    use tempfile::{NamedTempFile, TempDir};

    fn messages(result: Result<impl std::fmt::Debug>) -> Vec<String> {
        match result {
            Err(RevertError::InvalidConfiguration { messages }) => messages,
            other => panic!("expected invalid configuration, got {other:?}"),
        }
    }

    fn base_config(input: &NamedTempFile, dir: &TempDir) -> RevertConfig {
        RevertConfig {
            input: input.path().to_path_buf(),
            output: Some(dir.path().join("out.bam")),
            ..RevertConfig::default()
        }
    }

    #[test]
    fn test_valid_single_output() {
        let input = NamedTempFile::new().unwrap();
        let dir = TempDir::new().unwrap();
        base_config(&input, &dir).validate().unwrap();
    }

    #[test]
    fn test_all_problems_reported_together() {
        let input = NamedTempFile::new().unwrap();
        let dir = TempDir::new().unwrap();
        let config = RevertConfig {
            sanitize: true,
            sort_order: SortOrder::Coordinate,
            output_map: Some(dir.path().join("map.tsv")),
            max_discard_fraction: 1.5,
            attributes_to_clear: vec!["NM".into(), "XYZ".into()],
            ..base_config(&input, &dir)
        };
        let problems = messages(config.validate());
        assert_eq!(problems.len(), 4, "{problems:?}");
        assert!(problems[0].contains("queryname"));
        assert!(problems[1].contains("--output-map"));
        assert!(problems[2].contains("--max-discard-fraction"));
        assert!(problems[3].contains("XYZ"));
    }

    #[test]
    fn test_single_output_requirements() {
        let input = NamedTempFile::new().unwrap();
        let dir = TempDir::new().unwrap();
        let missing = RevertConfig { output: None, ..base_config(&input, &dir) };
        assert!(messages(missing.validate())[0].contains("--output is required"));

        let directory = RevertConfig { output: Some(dir.path().to_path_buf()), ..base_config(&input, &dir) };
        assert!(messages(directory.validate())[0].contains("should not be a directory"));
    }

    #[test]
    fn test_by_read_group_requirements() {
        let input = NamedTempFile::new().unwrap();
        let dir = TempDir::new().unwrap();

        let not_dir = RevertConfig { output_by_read_group: true, ..base_config(&input, &dir) };
        assert!(messages(not_dir.validate())[0].contains("existing directory"));

        let neither = RevertConfig { output_by_read_group: true, output: None, ..base_config(&input, &dir) };
        assert!(messages(neither.validate())[0].contains("either --output or --output-map"));

        let map = dir.path().join("map.tsv");
        fs::write(&map, "RG\tFILE\n").unwrap();
        let bad_map = RevertConfig {
            output_by_read_group: true,
            output: None,
            output_map: Some(map),
            ..base_config(&input, &dir)
        };
        assert!(messages(bad_map.validate())[0].contains("Invalid header"));

        let good_dir = RevertConfig {
            output_by_read_group: true,
            output: Some(dir.path().to_path_buf()),
            ..base_config(&input, &dir)
        };
        good_dir.validate().unwrap();
    }

    #[test]
    fn test_missing_input_and_metrics_without_sanitize() {
        let input = NamedTempFile::new().unwrap();
        let dir = TempDir::new().unwrap();
        let config = RevertConfig {
            input: dir.path().join("nope.bam"),
            metrics: Some(dir.path().join("m.tsv")),
            ..base_config(&input, &dir)
        };
        let problems = messages(config.validate());
        assert!(problems[0].contains("Input does not exist"));
        assert!(problems[1].contains("--metrics"));
    }

    #[test]
    fn test_plan_destinations_from_directory() {
        let input = NamedTempFile::new().unwrap();
        let dir = TempDir::new().unwrap();
        let config = RevertConfig {
            input: PathBuf::from("reads.sam"),
            output_by_read_group: true,
            output: Some(dir.path().to_path_buf()),
            ..base_config(&input, &dir)
        };
        let header = HeaderBuilder::new().read_group("A", None, None).read_group("B", None, None).build();
        let destinations = config.plan_destinations(&header).unwrap();
        let paths: Vec<PathBuf> = destinations.iter().map(|(_, d)| d.path.clone()).collect();
        assert_eq!(paths, vec![dir.path().join("A.sam"), dir.path().join("B.sam")]);
    }

    #[test]
    fn test_plan_destinations_collects_header_problems() {
        let input = NamedTempFile::new().unwrap();
        let dir = TempDir::new().unwrap();
        let map = dir.path().join("map.tsv");
        fs::write(&map, format!("READ_GROUP_ID\tOUTPUT\nA\t{}\n", dir.path().join("a.cram").display()))
            .unwrap();
        let config = RevertConfig {
            output_by_read_group: true,
            output: None,
            output_map: Some(map),
            sample_alias: Some("new".into()),
            ..base_config(&input, &dir)
        };
        let header = HeaderBuilder::new()
            .read_group("A", Some("s1"), None)
            .read_group("B", Some("s2"), None)
            .build();
        let problems = messages(config.plan_destinations(&header));
        assert_eq!(problems.len(), 2, "{problems:?}");
        assert!(problems[0].contains("multiple values for sample"));
        assert!(problems[1].contains("'B' has no output destination"));

        let header = HeaderBuilder::new().read_group("A", Some("s1"), None).build();
        let problems = messages(config.plan_destinations(&header));
        assert!(problems[0].contains("Unsupported alignment format"));
    }

    #[test]
    fn test_cram_input_reported_with_other_problems() {
        let input = tempfile::Builder::new().suffix(".cram").tempfile().unwrap();
        let dir = TempDir::new().unwrap();
        let config = RevertConfig { max_records_in_ram: 0, ..base_config(&input, &dir) };
        let problems = messages(config.validate());
        assert_eq!(problems.len(), 2, "{problems:?}");
        assert!(problems[0].contains("Unsupported alignment format"));
        assert!(problems[0].contains("CRAM"));
        assert!(problems[1].contains("--max-records-in-ram"));
    }

    #[test]
    fn test_revert_options_from_config() {
        let config = RevertConfig {
            remove_duplicate_information: false,
            attributes_to_clear: vec!["XS".into()],
            ..RevertConfig::default()
        };
        let options = config.revert_options();
        assert!(!options.remove_duplicate_information);
        assert_eq!(options.attributes_to_clear, vec![Tag::new(b'X', b'S')]);
    }
}
