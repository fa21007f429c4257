//! Output header construction.
//!
//! - Building the header of a reverted output from the input header
//! - Overriding sample and library on every read group
//! - Appending an fgrevert @PG record, chained to the last kept program

use anyhow::Result;
use bstr::BString;
use noodles::sam::Header;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use noodles::sam::header::record::value::map::program::tag;
use noodles::sam::header::record::value::map::read_group::tag as rg_tag;
use noodles::sam::header::record::value::map::{self, Program, ReadGroup};
use std::collections::HashSet;

use crate::sort::SortOrder;

/// ID and name used for the @PG record added to outputs.
pub const PROGRAM_ID: &str = "fgrevert";

/// Returns the ID of the last program in the @PG chain: the one no other program
/// references through `PP`.
#[must_use]
pub fn get_last_program_id(header: &Header) -> Option<String> {
    let program_map = header.programs().as_ref();
    if program_map.is_empty() {
        return None;
    }

    let referenced: HashSet<&[u8]> = program_map
        .values()
        .filter_map(|pg| pg.other_fields().get(&tag::PREVIOUS_PROGRAM_ID))
        .map(|pp| pp.as_slice())
        .collect();

    program_map
        .keys()
        .find(|id| !referenced.contains(id.as_slice()))
        .or_else(|| program_map.keys().next())
        .map(|id| String::from_utf8_lossy(id).to_string())
}

/// Returns `base_id`, or `base_id.N` for the smallest N that is not already a program ID.
#[must_use]
pub fn make_unique_program_id(header: &Header, base_id: &str) -> String {
    let program_map = header.programs().as_ref();
    if !program_map.contains_key(base_id.as_bytes()) {
        return base_id.to_string();
    }
    (1..)
        .map(|i| format!("{base_id}.{i}"))
        .find(|candidate| !program_map.contains_key(candidate.as_bytes()))
        .unwrap_or_else(|| base_id.to_string())
}

/// Builds the @PG record for this program. `CL` is left out when `command_line` is
/// empty since SAM header values may not be empty.
///
/// # Errors
/// Returns an error if the program record cannot be built.
pub fn build_program_record(
    version: &str,
    command_line: &str,
    previous_program: Option<&str>,
) -> Result<Map<Program>> {
    let mut builder = Map::<Program>::builder()
        .insert(tag::NAME, PROGRAM_ID)
        .insert(tag::VERSION, version);

    if !command_line.is_empty() {
        builder = builder.insert(tag::COMMAND_LINE, command_line);
    }
    if let Some(pp) = previous_program {
        builder = builder.insert(tag::PREVIOUS_PROGRAM_ID, pp);
    }

    Ok(builder.build()?)
}

/// Adds a @PG record for this program, chained to the existing chain's last program.
///
/// # Errors
/// Returns an error if the program record cannot be added to the header.
pub fn add_pg_record(mut header: Header, version: &str, command_line: &str) -> Result<Header> {
    let previous_program = get_last_program_id(&header);
    let unique_id = make_unique_program_id(&header, PROGRAM_ID);
    let pg_record = build_program_record(version, command_line, previous_program.as_deref())?;

    header.programs_mut().add(BString::from(unique_id), pg_record)?;

    Ok(header)
}

/// Builds the header of a reverted output.
///
/// The result declares `sort_order`. Reference sequences and programs are copied only
/// when alignment information is kept. Read groups are copied in full, or only
/// `read_group` when given.
///
/// # Errors
/// Returns an error if the `@HD` record cannot be built.
pub fn build_output_header(
    input: &Header,
    sort_order: SortOrder,
    keep_alignment_information: bool,
    read_group: Option<&str>,
) -> Result<Header> {
    let hd = Map::<map::Header>::builder()
        .insert(header_tag::SORT_ORDER, BString::from(sort_order.header_so_tag()))
        .build()?;
    let mut builder = Header::builder().set_header(hd);

    if keep_alignment_information {
        for (name, reference) in input.reference_sequences() {
            builder = builder.add_reference_sequence(name.clone(), reference.clone());
        }
        for (id, program) in input.programs().as_ref() {
            builder = builder.add_program(id.clone(), program.clone());
        }
    }

    for (id, rg) in input.read_groups() {
        if read_group.is_none_or(|wanted| id.as_slice() == wanted.as_bytes()) {
            builder = builder.add_read_group(id.clone(), rg.clone());
        }
    }

    Ok(builder.build())
}

fn all_read_groups_agree<F>(header: &Header, field: F) -> bool
where
    F: Fn(&Map<ReadGroup>) -> Option<&BString>,
{
    let mut values = header.read_groups().values().map(field);
    match values.next() {
        Some(first) => values.all(|v| v == first),
        None => true,
    }
}

/// Returns a message for every requested override that the read groups cannot take
/// because they disagree on the current value.
#[must_use]
pub fn check_read_group_overrides(
    header: &Header,
    sample_alias: Option<&str>,
    library_name: Option<&str>,
) -> Vec<String> {
    let mut problems = Vec::new();
    if sample_alias.is_some() && !all_read_groups_agree(header, |rg| rg.other_fields().get(&rg_tag::SAMPLE)) {
        problems.push(
            "Read groups have multiple values for sample. A value for --sample-alias cannot be supplied."
                .to_string(),
        );
    }
    if library_name.is_some() && !all_read_groups_agree(header, |rg| rg.other_fields().get(&rg_tag::LIBRARY)) {
        problems.push(
            "Read groups have multiple values for library name. A value for --library-name cannot be supplied."
                .to_string(),
        );
    }
    problems
}

/// Sets the sample and/or library of every read group.
pub fn apply_read_group_overrides(
    header: &mut Header,
    sample_alias: Option<&str>,
    library_name: Option<&str>,
) {
    for rg in header.read_groups_mut().values_mut() {
        if let Some(sample) = sample_alias {
            rg.other_fields_mut().insert(rg_tag::SAMPLE, BString::from(sample));
        }
        if let Some(library) = library_name {
            rg.other_fields_mut().insert(rg_tag::LIBRARY, BString::from(library));
        }
    }
}
