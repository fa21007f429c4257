//! Integration tests for fgrevert.
//!
//! These tests run the compiled binary end to end and inspect the files it writes.

mod helpers;
mod test_revert_command;
