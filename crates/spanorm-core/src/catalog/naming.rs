//! Identifier rules for tables, columns and indexes.

use crate::error::Error;

/// Ensure an identifier is non-empty, within `max_len`, starts with an ASCII
/// letter and otherwise holds only ASCII letters, digits and underscores.
pub(crate) fn validate_identifier(kind: &str, name: &str, max_len: usize) -> Result<(), Error> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(Error::definition(format!("{kind} name is empty")));
    };

    if name.len() > max_len {
        return Err(Error::definition(format!(
            "{kind} name '{name}' exceeds max length {max_len}"
        )));
    }
    if !first.is_ascii_alphabetic() {
        return Err(Error::definition(format!(
            "{kind} name '{name}' must start with an ASCII letter"
        )));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(Error::definition(format!(
            "{kind} name '{name}' contains invalid character '{bad}'"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_identifiers() {
        assert!(validate_identifier("column", "int_", 128).is_ok());
        assert!(validate_identifier("table", "SmallTestModel", 128).is_ok());
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        assert!(validate_identifier("column", "", 128).is_err());
        assert!(validate_identifier("column", "_key", 128).is_err());
        assert!(validate_identifier("column", "1key", 128).is_err());
        assert!(validate_identifier("column", "my-key", 128).is_err());
        assert!(validate_identifier("column", "abcdef", 5).is_err());
    }
}
