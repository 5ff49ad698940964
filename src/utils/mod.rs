//!
//! Utility module for the wallet engine.
//!
//! Re-exports formatting helpers and other utility functions for use throughout the codebase.
/// Utility functions for formatting and validation
pub mod index;

pub use index::{is_hex64, pretty_print_amount, unix_timestamp};
