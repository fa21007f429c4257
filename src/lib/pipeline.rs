//! End-to-end revert run.
//!
//! One forward pass reads the input, skips secondary and supplementary records,
//! reverts the rest and routes each to its destination. In direct mode records go
//! straight to the destination's writer (through a sorter when the input is not
//! already in the requested order). In sanitize mode they are buffered by read name
//! per destination, and a second pass drains each buffer through the [`Sanitizer`].
//!
//! Outputs are always closed before a failure is returned, and the discard-rate gate
//! is evaluated only after every output has been closed.

use anyhow::{Context, Result};
use log::info;
use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::path::PathBuf;

use crate::bam_io::open_alignment_reader;
use crate::config::RevertConfig;
use crate::destination::{DestinationKey, Destinations};
use crate::header::{add_pg_record, apply_read_group_overrides, build_output_header};
use crate::logging::{OperationTimer, format_count, log_sanitize_summary};
use crate::metrics::{SanitizeMetrics, write_metrics_auto};
use crate::output::{OutputSink, RecordSorter, SanitizeBuffer};
use crate::pool::KeyedPool;
use crate::progress::ProgressTracker;
use crate::quality::QualityEncodingDetector;
use crate::revert::{RevertOptions, revert_record};
use crate::sam::{header_sort_order, read_group_id, read_name};
use crate::sanitize::{Sanitizer, check_discard_rate};
use crate::sort::SortOrder;

/// Counts reported by a completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevertSummary {
    /// Primary records read and reverted
    pub records_reverted: u64,
    /// Secondary and supplementary records dropped
    pub records_skipped: u64,
    /// Sanitization counts, when sanitizing
    pub sanitize: Option<SanitizeMetrics>,
}

/// Runs a revert with `config`.
///
/// `version` and `command_line` are recorded in the `@PG` record of every output.
///
/// # Errors
/// Returns [`crate::errors::RevertError::InvalidConfiguration`] before any output is
/// created if the configuration is invalid for the input, and otherwise the first I/O,
/// routing or quality-encoding error. When sanitizing, returns
/// [`crate::errors::RevertError::DiscardRateExceeded`] after all outputs (and metrics)
/// were written if too many records were discarded.
pub fn run(config: &RevertConfig, version: &str, command_line: &str) -> Result<RevertSummary> {
    config.validate()?;
    let timer = OperationTimer::new("Reverting records");

    let (mut reader, input_header) = open_alignment_reader(&config.input, config.threads)?;
    let destinations = config.plan_destinations(&input_header)?;

    let mut base_header = input_header.clone();
    apply_read_group_overrides(
        &mut base_header,
        config.sample_alias.as_deref(),
        config.library_name.as_deref(),
    );

    let presorted = config.sanitize || header_sort_order(&input_header) == Some(config.sort_order);
    if !presorted && config.sort_order != SortOrder::Unsorted {
        info!("Input is not {}-sorted; outputs will be sorted before writing", config.sort_order.header_so_tag());
    }

    let headers = output_headers(config, &base_header, &destinations, version, command_line)?;
    let paths: Vec<PathBuf> = destinations.iter().map(|(_, d)| d.path.clone()).collect();
    let settings = config.sorter_settings();
    let sink_order = if presorted { SortOrder::Unsorted } else { config.sort_order };

    let buffers: Vec<SanitizeBuffer> = if config.sanitize {
        headers.iter().map(|h| SanitizeBuffer::new(h, &settings)).collect()
    } else {
        Vec::new()
    };

    let pool = KeyedPool::open(paths.len(), |key| {
        let header = headers[key.0].clone();
        let sorter = RecordSorter::new(sink_order, &header, &settings);
        info!("Writing output: {}", paths[key.0].display());
        OutputSink::open(&paths[key.0], header, sorter, config.threads, config.compression_level)
    })?;

    let options = config.revert_options();
    let summary = pool.scoped(|pool| {
        let mut pass = FirstPass::new(&options, &destinations, config.sanitize, buffers);
        loop {
            let n = reader
                .read_record_buf(&input_header, &mut pass.record)
                .with_context(|| format!("Failed to read record from: {}", config.input.display()))?;
            if n == 0 {
                break;
            }
            pass.process(pool)?;
        }
        pass.progress.log_final();
        if pass.skipped > 0 {
            info!("Skipped {} secondary and supplementary records", format_count(pass.skipped));
        }

        let records_reverted = pass.progress.count();
        let records_skipped = pass.skipped;
        let sanitize = match pass.sanitizing {
            Some((detector, buffers)) => Some(sanitize_buffers(&detector, buffers, pool)?),
            None => None,
        };
        Ok(RevertSummary { records_reverted, records_skipped, sanitize })
    })?;

    timer.log_completion(summary.records_reverted);

    if let Some(metrics) = &summary.sanitize {
        if let Some(path) = &config.metrics {
            write_metrics_auto(path, std::slice::from_ref(metrics))?;
        }
        log_sanitize_summary(metrics);
        check_discard_rate(metrics, config.max_discard_fraction)?;
    }

    Ok(summary)
}

/// Builds the header of every destination, in key order.
fn output_headers(
    config: &RevertConfig,
    base_header: &Header,
    destinations: &Destinations,
    version: &str,
    command_line: &str,
) -> Result<Vec<Header>> {
    destinations
        .iter()
        .map(|(_, destination)| {
            let header = build_output_header(
                base_header,
                config.sort_order,
                !config.remove_alignment_information,
                destination.read_group.as_deref(),
            )?;
            add_pg_record(header, version, command_line)
        })
        .collect()
}

/// State of the forward pass over the input.
struct FirstPass<'a> {
    options: &'a RevertOptions,
    destinations: &'a Destinations,
    record: RecordBuf,
    progress: ProgressTracker,
    skipped: u64,
    sanitizing: Option<(QualityEncodingDetector, Vec<SanitizeBuffer>)>,
}

impl<'a> FirstPass<'a> {
    fn new(
        options: &'a RevertOptions,
        destinations: &'a Destinations,
        sanitize: bool,
        buffers: Vec<SanitizeBuffer>,
    ) -> Self {
        Self {
            options,
            destinations,
            record: RecordBuf::default(),
            progress: ProgressTracker::new("Reverted"),
            skipped: 0,
            sanitizing: sanitize.then(|| (QualityEncodingDetector::default(), buffers)),
        }
    }

    /// Reverts and routes the record last read into `self.record`.
    fn process(&mut self, pool: &mut KeyedPool<OutputSink>) -> Result<()> {
        let flags = self.record.flags();
        if flags.is_secondary() || flags.is_supplementary() {
            self.skipped += 1;
            return Ok(());
        }

        self.progress.record(read_name(&self.record));
        revert_record(&mut self.record, self.options);
        let key = self.destinations.route(&self.record)?;

        match &mut self.sanitizing {
            Some((detector, buffers)) => {
                detector.observe(read_group_id(&self.record), self.record.quality_scores().as_ref());
                buffers[key.0].add(std::mem::take(&mut self.record))
            }
            None => pool.get_mut(key)?.accept(&mut self.record),
        }
    }
}

/// Drains every sanitize buffer into its output, returning the combined counts.
fn sanitize_buffers(
    detector: &QualityEncodingDetector,
    buffers: Vec<SanitizeBuffer>,
    pool: &mut KeyedPool<OutputSink>,
) -> Result<SanitizeMetrics> {
    let encodings = detector.detect()?;
    let mut sanitizer = Sanitizer::new(&encodings)?;
    let mut progress = ProgressTracker::new("Sanitized");

    for (i, buffer) in buffers.into_iter().enumerate() {
        let (records, mismatched) = buffer.into_sorted()?;
        let sink = pool.get_mut(DestinationKey(i))?;
        if !mismatched.is_empty() {
            info!(
                "{} read names in {} have records whose base and quality lengths differ",
                format_count(mismatched.len() as u64),
                sink.path().display()
            );
        }
        sanitizer.sanitize_stream(records, &mismatched, &mut progress, |record| sink.write(&record))?;
    }
    progress.log_final();

    Ok(sanitizer.into_metrics())
}
