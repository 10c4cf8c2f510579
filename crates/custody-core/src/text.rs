//! # Free-Text Limits
//!
//! Every caller-supplied string that ends up in the store or in a rendered
//! artifact passes through these checks. Oversized input is rejected rather
//! than silently truncated.

use crate::error::ValidationError;

/// Maximum length, in characters, of any free-text field.
pub const MAX_TEXT_LEN: usize = 2000;

/// Maximum length, in characters, of an email address (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 320;

/// Validate a required field: trimmed, non-empty, at most `max` characters,
/// no control characters. Returns the trimmed value.
pub fn required(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    bounded(field, trimmed, max)?;
    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacters { field });
    }
    Ok(trimmed.to_string())
}

/// Validate an optional free-text field. Blank input collapses to `None`.
///
/// Line breaks and tabs are allowed here (descriptions are multi-line);
/// any other control character is rejected.
pub fn optional(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => {
            bounded(field, v, max)?;
            if v.chars().any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t')) {
                return Err(ValidationError::ControlCharacters { field });
            }
            Ok(Some(v.to_string()))
        }
    }
}

/// Reject values longer than `max` characters.
pub fn bounded(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_accepts() {
        assert_eq!(required("owner", "  Alice ", MAX_TEXT_LEN).unwrap(), "Alice");
    }

    #[test]
    fn required_rejects_blank() {
        assert_eq!(
            required("owner", "   ", MAX_TEXT_LEN),
            Err(ValidationError::Empty { field: "owner" })
        );
    }

    #[test]
    fn required_rejects_control_characters() {
        assert!(matches!(
            required("serial", "S1\nS2", MAX_TEXT_LEN),
            Err(ValidationError::ControlCharacters { .. })
        ));
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let value = "é".repeat(MAX_TEXT_LEN);
        assert!(bounded("name", &value, MAX_TEXT_LEN).is_ok());
        let over = "é".repeat(MAX_TEXT_LEN + 1);
        assert!(matches!(
            bounded("name", &over, MAX_TEXT_LEN),
            Err(ValidationError::TooLong { actual, .. }) if actual == MAX_TEXT_LEN + 1
        ));
    }

    #[test]
    fn optional_collapses_blank_to_none() {
        assert_eq!(optional("desc", Some("  "), MAX_TEXT_LEN).unwrap(), None);
        assert_eq!(optional("desc", None, MAX_TEXT_LEN).unwrap(), None);
        assert_eq!(
            optional("desc", Some("line 1\nline 2"), MAX_TEXT_LEN).unwrap(),
            Some("line 1\nline 2".to_string())
        );
    }

    #[test]
    fn optional_rejects_control_characters_other_than_whitespace() {
        for value in ["a\u{1}b", "Bo\u{b}b", "x\u{1b}[31m", "nul\0"] {
            assert_eq!(
                optional("item_name", Some(value), MAX_TEXT_LEN),
                Err(ValidationError::ControlCharacters { field: "item_name" }),
                "{value:?}"
            );
        }
        assert_eq!(
            optional("item_description", Some("a\tb\r\nc"), MAX_TEXT_LEN).unwrap(),
            Some("a\tb\r\nc".to_string())
        );
    }
}
