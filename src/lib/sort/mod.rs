//! Record sorting.
//!
//! - [`SortingCollection`]: bounded-memory external sort that spills sorted chunks to
//!   temporary BAM files and merges them back with a min-heap
//! - [`keys`]: queryname and coordinate sort keys plus the [`SortOrder`] enum
//!
//! Both sort orders are stable: records with equal keys are returned in the order
//! they were added.

pub mod external;
pub mod keys;

pub use external::{DEFAULT_MAX_RECORDS_IN_RAM, SortedRecords, SortingCollection};
pub use keys::{CoordinateKey, QuerynameKey, SortKey, SortOrder};
