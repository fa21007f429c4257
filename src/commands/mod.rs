//! CLI command implementations for fgrevert.
//!
//! - [`revert`] - Revert aligned SAM/BAM records to an unaligned state

pub mod command;
pub mod common;
pub mod revert;
