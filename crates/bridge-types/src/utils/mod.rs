//! Utility functions for hex formatting.

pub mod formatting;

pub use formatting::{truncate_id, without_0x_prefix};
