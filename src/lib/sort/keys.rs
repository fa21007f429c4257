//! Sort key types for record sorting.
//!
//! - [`QuerynameKey`]: read name with natural numeric ordering
//! - [`CoordinateKey`]: genomic coordinate (tid, pos, strand)
//!
//! Keys compare only the fields their order is defined over; records with equal
//! keys keep their arrival order because the sorter is stable.

use anyhow::Result;
use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::cmp::Ordering;

/// Output sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Records are written in the order they are read
    Unsorted,
    /// Read name with natural ordering
    Queryname,
    /// tid → pos → strand, unmapped last
    Coordinate,
}

impl SortOrder {
    /// Get the SAM header sort order tag value.
    #[must_use]
    pub fn header_so_tag(&self) -> &'static str {
        match self {
            Self::Unsorted => "unsorted",
            Self::Queryname => "queryname",
            Self::Coordinate => "coordinate",
        }
    }

    /// Parses the `SO` value of an `@HD` line. Unknown or absent values yield `None`.
    #[must_use]
    pub fn from_header_so_tag(value: &[u8]) -> Option<Self> {
        match value {
            b"unsorted" => Some(Self::Unsorted),
            b"queryname" => Some(Self::Queryname),
            b"coordinate" => Some(Self::Coordinate),
            _ => None,
        }
    }
}

/// Trait for sort keys that can be extracted from records.
pub trait SortKey: Ord + Clone + Send + Sync {
    /// Extract a sort key from a record.
    fn from_record(record: &RecordBuf, header: &Header) -> Result<Self>;
}

/// Sort key for queryname ordering.
///
/// Uses natural string ordering where numeric runs are compared numerically.
/// Example: "read1" < "read2" < "read10" < "read11"
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct QuerynameKey {
    /// Read name bytes.
    pub name: Vec<u8>,
}

impl Ord for QuerynameKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Names that differ only in zero padding compare equal naturally; fall back to bytes
        // so distinct names never interleave.
        natural_compare(&self.name, &other.name).then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for QuerynameKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl SortKey for QuerynameKey {
    fn from_record(record: &RecordBuf, _header: &Header) -> Result<Self> {
        let name =
            record.name().map_or_else(Vec::new, |n| Vec::from(<_ as AsRef<[u8]>>::as_ref(n)));
        Ok(Self { name })
    }
}

/// Sort key for coordinate ordering.
///
/// Sort order: reference ID → position → reverse strand flag.
/// Unmapped reads are sorted to the end.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CoordinateKey {
    /// Reference sequence ID (tid), or `usize::MAX` for unmapped.
    pub tid: usize,
    /// 1-based alignment start position, or `usize::MAX` for unmapped.
    pub pos: usize,
    /// True if reverse strand.
    pub reverse: bool,
}

impl CoordinateKey {
    /// Create a coordinate key for an unmapped read.
    #[must_use]
    pub fn unmapped() -> Self {
        Self { tid: usize::MAX, pos: usize::MAX, reverse: false }
    }
}

impl Ord for CoordinateKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tid
            .cmp(&other.tid)
            .then_with(|| self.pos.cmp(&other.pos))
            .then_with(|| self.reverse.cmp(&other.reverse))
    }
}

impl PartialOrd for CoordinateKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl SortKey for CoordinateKey {
    fn from_record(record: &RecordBuf, _header: &Header) -> Result<Self> {
        // Unmapped reads placed next to their mate keep the mate's coordinates (samtools).
        let Some(tid) = record.reference_sequence_id() else {
            return Ok(Self::unmapped());
        };
        let pos = record.alignment_start().map_or(0, usize::from);
        let reverse = record.flags().is_reverse_complemented();
        Ok(Self { tid, pos, reverse })
    }
}

/// Natural string comparison that handles numeric runs.
///
/// Compares strings such that "read1" < "read2" < "read10".
fn natural_compare(a: &[u8], b: &[u8]) -> Ordering {
    let mut i = 0;
    let mut j = 0;

    while i < a.len() && j < b.len() {
        let a_digit = a[i].is_ascii_digit();
        let b_digit = b[j].is_ascii_digit();

        match (a_digit, b_digit) {
            (true, true) => {
                let (a_num, a_end) = parse_number(&a[i..]);
                let (b_num, b_end) = parse_number(&b[j..]);

                match a_num.cmp(&b_num) {
                    Ordering::Equal => {
                        i += a_end;
                        j += b_end;
                    }
                    ord => return ord,
                }
            }
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => match a[i].cmp(&b[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                ord => return ord,
            },
        }
    }

    // Shorter string sorts first if one is prefix of other
    a.len().cmp(&b.len())
}

/// Parse a numeric run from the start of a byte slice.
/// Returns (number, bytes consumed).
fn parse_number(bytes: &[u8]) -> (u64, usize) {
    let mut num: u64 = 0;
    let mut i = 0;

    while i < bytes.len() && bytes[i].is_ascii_digit() {
        num = num.saturating_mul(10).saturating_add(u64::from(bytes[i] - b'0'));
        i += 1;
    }

    (num, i)
}
