//! Directive value type.
//!
//! A directive is a target key/value pair to be enforced in a configuration
//! file, e.g. `PermitRootLogin yes`.  Directives are written by operators in
//! the hostkit TOML config or on the command line, so they accept both the
//! `Key value` form used inside `sshd_config` and the `Key=value` form that
//! is easier to type in a shell.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing or constructing a [`Directive`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectiveError {
    /// The input was empty or whitespace only.
    #[error("directive is empty")]
    Empty,

    /// The key contains a character that would make the rendered line ambiguous.
    #[error("invalid directive key {0:?}: keys must not contain whitespace, '#', or '='")]
    InvalidKey(String),

    /// A key was given with no value.
    #[error("directive {0:?} has no value")]
    MissingValue(String),
}

/// A `(key, desired value)` pair.
///
/// Rendering a directive yields the exact line written into the config file:
/// the key, a single space, then the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Directive {
    key: String,
    value: String,
}

impl Directive {
    /// Builds a directive from an explicit key and value.
    ///
    /// Surrounding whitespace is trimmed from both parts.
    ///
    /// # Errors
    ///
    /// Returns [`DirectiveError::InvalidKey`] if the key is empty or contains
    /// whitespace, `#`, or `=`, and [`DirectiveError::MissingValue`] if the
    /// value is empty.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, DirectiveError> {
        let key = key.into().trim().to_string();
        let value = value.into().trim().to_string();

        if key.is_empty() || key.chars().any(|c| c.is_whitespace() || c == '#' || c == '=') {
            return Err(DirectiveError::InvalidKey(key));
        }
        if value.is_empty() {
            return Err(DirectiveError::MissingValue(key));
        }
        Ok(Self { key, value })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// The line this directive enforces, without a trailing newline.
    pub fn line(&self) -> String {
        format!("{} {}", self.key, self.value)
    }

    /// Returns `true` if `key` names the same setting.
    ///
    /// Config keywords in the files hostkit manages are case-insensitive, so
    /// `permitrootlogin` and `PermitRootLogin` refer to one setting.
    pub fn matches_key(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.value)
    }
}

impl FromStr for Directive {
    type Err = DirectiveError;

    /// Parses `Key value` or `Key=value`.
    ///
    /// The key ends at the first whitespace or `=`; everything after that
    /// separator (trimmed) is the value, so values may contain spaces:
    /// `AllowUsers alice bob`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DirectiveError::Empty);
        }

        match s.find(|c: char| c.is_whitespace() || c == '=') {
            Some(idx) => {
                let (key, rest) = s.split_at(idx);
                // Drop exactly one separator character; the rest is trimmed by `new`.
                let sep_len = rest.chars().next().map(char::len_utf8).unwrap_or(0);
                Self::new(key, &rest[sep_len..])
            }
            None => Err(DirectiveError::MissingValue(s.to_string())),
        }
    }
}

impl TryFrom<String> for Directive {
    type Error = DirectiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Directive> for String {
    fn from(d: Directive) -> Self {
        d.line()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_space_separated_directive() {
        // Arrange / Act
        let d: Directive = "PermitRootLogin yes".parse().unwrap();

        // Assert
        assert_eq!(d.key(), "PermitRootLogin");
        assert_eq!(d.value(), "yes");
    }

    #[test]
    fn test_parse_equals_separated_directive() {
        let d: Directive = "Port=2222".parse().unwrap();
        assert_eq!(d.key(), "Port");
        assert_eq!(d.value(), "2222");
    }

    #[test]
    fn test_parse_keeps_spaces_inside_value() {
        let d: Directive = "AllowUsers   alice bob".parse().unwrap();
        assert_eq!(d.value(), "alice bob");
        assert_eq!(d.line(), "AllowUsers alice bob");
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        assert_eq!("   ".parse::<Directive>(), Err(DirectiveError::Empty));
    }

    #[test]
    fn test_parse_rejects_key_without_value() {
        assert_eq!(
            "PermitRootLogin".parse::<Directive>(),
            Err(DirectiveError::MissingValue("PermitRootLogin".to_string()))
        );
        assert!(matches!(
            "Port=".parse::<Directive>(),
            Err(DirectiveError::MissingValue(_))
        ));
    }

    #[test]
    fn test_new_rejects_key_with_comment_marker() {
        let result = Directive::new("#PermitRootLogin", "yes");
        assert!(matches!(result, Err(DirectiveError::InvalidKey(_))));
    }

    #[test]
    fn test_new_rejects_key_with_inner_whitespace() {
        let result = Directive::new("Permit Root", "yes");
        assert!(matches!(result, Err(DirectiveError::InvalidKey(_))));
    }

    #[test]
    fn test_matches_key_is_case_insensitive() {
        let d = Directive::new("PermitRootLogin", "yes").unwrap();
        assert!(d.matches_key("permitrootlogin"));
        assert!(!d.matches_key("PermitRootLoginX"));
    }

    #[test]
    fn test_display_renders_enforced_line() {
        let d = Directive::new("PasswordAuthentication", "yes").unwrap();
        assert_eq!(d.to_string(), "PasswordAuthentication yes");
    }

    #[test]
    fn test_directives_deserialize_from_toml_strings() {
        // Arrange
        #[derive(Deserialize)]
        struct Wrapper {
            directives: Vec<Directive>,
        }
        let toml_str = r#"directives = ["PermitRootLogin yes", "Port=22"]"#;

        // Act
        let w: Wrapper = toml::from_str(toml_str).expect("deserialize");

        // Assert
        assert_eq!(w.directives.len(), 2);
        assert_eq!(w.directives[1].line(), "Port 22");
    }

    #[test]
    fn test_invalid_directive_in_toml_is_a_parse_error() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Wrapper {
            directives: Vec<Directive>,
        }
        let result: Result<Wrapper, _> = toml::from_str(r#"directives = ["NoValue"]"#);
        assert!(result.is_err());
    }
}
