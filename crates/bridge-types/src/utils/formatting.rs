//! String formatting utilities.
//!
//! Hex values travel as strings in confirmation records and CLI output; these
//! helpers strip their `0x` prefix and shorten them for log lines.

/// Shortens a hex string for display, keeping the first 10 characters.
pub fn truncate_id(id: &str) -> String {
	match id.get(..10) {
		Some(head) if id.len() > 10 => format!("{}..", head),
		_ => id.to_string(),
	}
}

/// Removes a "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}
