//! Input validation and sanitization for rulebase bundles and CLI arguments
//!
//! Every value that crosses into the engine from a bundle file or the command
//! line passes through one of these checks first.

use crate::core::rulebase::{RangeDimension, UNIVERSE_MAX};
use uuid::Uuid;

/// Maximum length of a firewall name after trimming
pub const MAX_FIREWALL_NAME_LEN: usize = 128;

/// Maximum number of characters of a rule comment shown in text reports
pub const MAX_COMMENT_LEN: usize = 256;

/// Strips control characters from a rule comment for terminal output.
///
/// Newlines and tabs collapse to a single space so one comment stays on one
/// report line. The result is capped at [`MAX_COMMENT_LEN`] characters.
///
/// # Examples
///
/// ```
/// use fwaudit::validators::sanitize_comment;
///
/// assert_eq!(sanitize_comment("ticket\n4411"), "ticket 4411");
/// assert!(!sanitize_comment("bell\x07").contains('\x07'));
/// ```
pub fn sanitize_comment(input: &str) -> String {
    input
        .chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .take(MAX_COMMENT_LEN)
        .collect()
}

/// Validates a numeric interval against the port/address universe.
///
/// # Errors
///
/// Returns `Err` if:
/// - `start > end`
/// - `end` exceeds [`UNIVERSE_MAX`]
pub fn validate_universe_range(start: u64, end: u64) -> Result<(u64, u64), String> {
    if start > end {
        return Err(format!("Range start {start} is greater than end {end}"));
    }
    if end > UNIVERSE_MAX {
        return Err(format!("Range end {end} exceeds universe maximum {UNIVERSE_MAX}"));
    }
    Ok((start, end))
}

/// Maps a store dimension code to its [`RangeDimension`].
///
/// # Errors
///
/// Returns `Err` for codes outside `0..=3`.
pub fn validate_ctype(ctype: u8) -> Result<RangeDimension, String> {
    RangeDimension::from_ctype(ctype)
        .ok_or_else(|| format!("Unknown range dimension code {ctype} (expected 0-3)"))
}

/// Validates a firewall display name.
///
/// # Errors
///
/// Returns `Err` if the trimmed name is empty, longer than
/// [`MAX_FIREWALL_NAME_LEN`], or contains control characters.
pub fn validate_firewall_name(name: &str) -> Result<String, String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Firewall name cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_FIREWALL_NAME_LEN {
        return Err(format!(
            "Firewall name too long (max {MAX_FIREWALL_NAME_LEN} characters)"
        ));
    }
    if trimmed.chars().any(char::is_control) {
        return Err("Firewall name contains control characters".to_string());
    }
    Ok(trimmed.to_string())
}

/// Parses a snapshot identifier given on the command line.
///
/// # Errors
///
/// Returns `Err` if the input is not a UUID.
pub fn parse_snapshot_id(input: &str) -> Result<Uuid, String> {
    Uuid::parse_str(input.trim()).map_err(|e| format!("Invalid snapshot id '{input}': {e}"))
}
