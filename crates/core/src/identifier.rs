//! SQL identifier guard
//!
//! DDL cannot bind identifiers as parameters, so every schema, object,
//! grantee and owner name is checked here before it is interpolated into
//! statement text.
//!
//! ## Validation
//!
//! Identifiers must:
//! - Be 1-63 bytes (PostgreSQL's `NAMEDATALEN - 1`)
//! - Contain only `[A-Za-z0-9_.-]`
//!
//! Accepted identifiers are always emitted double-quoted, so mixed case,
//! dashes and dots survive verbatim. The allow-list excludes `"`, which
//! makes the quoting unbreakable.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// Maximum identifier length in bytes
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// A name that is safe to interpolate into DDL
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

/// Error when validating an identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Identifier is empty
    Empty,
    /// Identifier exceeds maximum length
    TooLong {
        /// Actual length in bytes
        length: usize,
        /// Maximum allowed length
        max: usize,
    },
    /// Identifier contains a character outside the allow-list
    InvalidChar {
        /// The invalid character
        char: char,
        /// Position of the invalid character
        position: usize,
    },
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierError::Empty => write!(f, "identifier cannot be empty"),
            IdentifierError::TooLong { length, max } => {
                write!(f, "identifier too long: {} bytes (max {})", length, max)
            }
            IdentifierError::InvalidChar { char, position } => write!(
                f,
                "invalid character {:?} at position {} (only A-Z a-z 0-9 _ . - allowed)",
                char, position
            ),
        }
    }
}

impl std::error::Error for IdentifierError {}

impl Identifier {
    /// Create a new identifier, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, IdentifierError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Identifier(name))
    }

    /// Validate an identifier without allocating
    pub fn validate(name: &str) -> Result<(), IdentifierError> {
        if name.is_empty() {
            return Err(IdentifierError::Empty);
        }

        if name.len() > MAX_IDENTIFIER_LENGTH {
            return Err(IdentifierError::TooLong {
                length: name.len(),
                max: MAX_IDENTIFIER_LENGTH,
            });
        }

        for (pos, ch) in name.chars().enumerate() {
            if !Self::is_valid_char(ch) {
                return Err(IdentifierError::InvalidChar {
                    char: ch,
                    position: pos,
                });
            }
        }

        Ok(())
    }

    #[inline]
    fn is_valid_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
    }

    /// Get the raw name
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The double-quoted form used in DDL
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::new(value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Identifier::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// Validate and quote `name` in one step, mapping failures to [`Error::InvalidIdentifier`]
pub fn quote_identifier(name: &str) -> crate::Result<String> {
    Identifier::new(name)
        .map(|id| id.quoted())
        .map_err(|e| Error::InvalidIdentifier {
            identifier: name.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_valid() {
        assert!(Identifier::new("public").is_ok());
        assert!(Identifier::new("grp_Geo2_2025-2").is_ok());
        assert!(Identifier::new("Teste_001_Esquema").is_ok());
        assert!(Identifier::new("nome.sobrenome").is_ok());
        assert!(Identifier::new("_private").is_ok());
    }

    #[test]
    fn test_identifier_empty() {
        assert_eq!(Identifier::new("").unwrap_err(), IdentifierError::Empty);
    }

    #[test]
    fn test_identifier_too_long() {
        let long = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(matches!(
            Identifier::new(long).unwrap_err(),
            IdentifierError::TooLong { .. }
        ));
        assert!(Identifier::new("a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
    }

    #[test]
    fn test_identifier_rejects_injection() {
        let err = Identifier::new("t; DROP TABLE x").unwrap_err();
        assert!(matches!(err, IdentifierError::InvalidChar { char: ';', .. }));

        let err = Identifier::new("a\"b").unwrap_err();
        assert!(matches!(err, IdentifierError::InvalidChar { char: '"', .. }));

        let err = Identifier::new("has space").unwrap_err();
        assert!(matches!(err, IdentifierError::InvalidChar { char: ' ', .. }));

        let err = Identifier::new("aluno\u{e7}").unwrap_err();
        assert!(matches!(err, IdentifierError::InvalidChar { .. }));
    }

    #[test]
    fn test_quoted_form() {
        let id = Identifier::new("grp_Geo2_2025-2").unwrap();
        assert_eq!(id.quoted(), "\"grp_Geo2_2025-2\"");
    }

    #[test]
    fn test_quote_identifier_maps_error() {
        assert_eq!(quote_identifier("public").unwrap(), "\"public\"");
        let err = quote_identifier("x'y").unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier { ref identifier, .. } if identifier == "x'y"));
    }

    mod proptest_identifier {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Allow-listed names are accepted and quote to exactly `"name"`
            #[test]
            fn allowed_names_round_trip(name in "[A-Za-z0-9_.-]{1,63}") {
                let quoted = quote_identifier(&name).unwrap();
                prop_assert_eq!(quoted, format!("\"{}\"", name));
            }

            /// A single character outside the allow-list poisons the name
            #[test]
            fn forbidden_char_rejected(
                prefix in "[a-z]{0,10}",
                bad in "[\"'; ()\\\\]",
                suffix in "[a-z]{0,10}",
            ) {
                let name = format!("{}{}{}", prefix, bad, suffix);
                prop_assert!(quote_identifier(&name).is_err());
            }

            /// quote_identifier never panics
            #[test]
            fn never_panics(name in "\\PC{0,80}") {
                let _ = quote_identifier(&name);
            }
        }
    }
}
