//! SAM/BAM header and record helpers.
//!
//! - Reading the declared sort order from an `@HD` line
//! - Extracting the read group of a record
//! - Test builders for records and headers ([`builder`])

pub mod builder;

pub use builder::{HeaderBuilder, RecordBuilder, parse_cigar};

use noodles::sam::Header;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::alignment::record_buf::data::field::Value as BufValue;

use crate::sort::SortOrder;

/// Returns the sort order declared by the header's `SO` field, if any.
///
/// Unrecognized values (e.g. `unknown`) yield `None`.
#[must_use]
pub fn header_sort_order(header: &Header) -> Option<SortOrder> {
    header
        .header()
        .and_then(|hd| hd.other_fields().get(b"SO"))
        .and_then(|so| SortOrder::from_header_so_tag(<_ as AsRef<[u8]>>::as_ref(so)))
}

/// Returns the value of the record's `RG` tag, if present and a string.
#[must_use]
pub fn read_group_id(record: &RecordBuf) -> Option<&[u8]> {
    match record.data().get(&Tag::READ_GROUP) {
        Some(BufValue::String(rg)) => Some(rg.as_slice()),
        _ => None,
    }
}

/// Returns the record's read name, or an empty slice if it has none.
#[must_use]
pub fn read_name(record: &RecordBuf) -> &[u8] {
    record.name().map(|n| <_ as AsRef<[u8]>>::as_ref(n)).unwrap_or_default()
}
