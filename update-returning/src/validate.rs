//! SQL identifier validation.
//!
//! Table, column and field names are spliced into SQL text, never bound as
//! parameters, so every name that reaches a compiler goes through here first.

use crate::constants::MAX_IDENTIFIER_LENGTH;
use crate::error::{Error, Result};

/// Validate that a string is a safe SQL identifier.
///
/// A valid SQL identifier:
/// - Starts with a letter (a-z, A-Z) or underscore
/// - Contains only letters, digits (0-9), and underscores
/// - Is not empty and not longer than 63 characters
///
/// # Examples
///
/// ```
/// use update_returning::is_valid_sql_identifier;
///
/// assert!(is_valid_sql_identifier("accounts"));
/// assert!(is_valid_sql_identifier("_balance"));
///
/// assert!(!is_valid_sql_identifier(""));
/// assert!(!is_valid_sql_identifier("9lives"));
/// assert!(!is_valid_sql_identifier("id; DROP"));
/// ```
#[inline]
#[must_use]
pub fn is_valid_sql_identifier(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_IDENTIFIER_LENGTH {
        return false;
    }

    let mut chars = s.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check an identifier, returning [`Error::InvalidIdentifier`] when it is unsafe.
pub fn check_sql_identifier(s: &str, context: &'static str) -> Result<()> {
    if is_valid_sql_identifier(s) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier {
            context,
            name: s.to_string(),
        })
    }
}

/// Assert that a string is a valid SQL identifier.
///
/// # Panics
///
/// Panics if the identifier is invalid. Intended for names written in code
/// (entity declarations), not for user input.
#[inline]
pub fn assert_valid_sql_identifier(s: &str, context: &str) {
    assert!(
        is_valid_sql_identifier(s),
        "Invalid SQL {context} name '{s}': must start with letter/underscore, \
             contain only ASCII alphanumeric/underscore, and be 1-63 chars"
    );
}
