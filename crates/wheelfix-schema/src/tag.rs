//! CPython interpreter tags.
//!
//! An interpreter tag names the runtime an artifact was built for, e.g.
//! `cp311` for CPython 3.11. Only concrete CPython tags are modelled; generic
//! tags such as `py3` never select an interpreter.

use serde::{Deserialize, Serialize};

/// A concrete CPython interpreter tag (`cp` followed by digits).
///
/// # Example
///
/// ```
/// use wheelfix_schema::InterpreterTag;
///
/// let tag = InterpreterTag::parse("cp311").unwrap();
/// assert_eq!(tag.version().as_deref(), Some("3.11"));
/// assert!(InterpreterTag::parse("py3").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterpreterTag(String);

impl InterpreterTag {
    /// Parse a tag, returning `None` unless it is `cp` followed by one or
    /// more ASCII digits.
    pub fn parse(s: &str) -> Option<Self> {
        let digits = s.strip_prefix("cp")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self(s.to_string()))
    }

    /// Return the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dotted interpreter version (`cp39` is `3.9`, `cp311` is `3.11`).
    ///
    /// Returns `None` for single-digit tags that carry no minor version.
    pub fn version(&self) -> Option<String> {
        let digits = &self.0[2..];
        if digits.len() < 2 {
            return None;
        }
        let (major, minor) = digits.split_at(1);
        Some(format!("{major}.{minor}"))
    }
}

impl std::fmt::Display for InterpreterTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InterpreterTag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("Invalid interpreter tag: {value}"))
    }
}

impl From<InterpreterTag> for String {
    fn from(tag: InterpreterTag) -> Self {
        tag.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_non_cpython_tags() {
        assert!(InterpreterTag::parse("cp").is_none());
        assert!(InterpreterTag::parse("cp3x").is_none());
        assert!(InterpreterTag::parse("py311").is_none());
        assert!(InterpreterTag::parse("abi3").is_none());
    }

    #[test]
    fn test_version_rendering() {
        assert_eq!(
            InterpreterTag::parse("cp39").unwrap().version().as_deref(),
            Some("3.9")
        );
        assert_eq!(
            InterpreterTag::parse("cp313").unwrap().version().as_deref(),
            Some("3.13")
        );
        assert_eq!(InterpreterTag::parse("cp3").unwrap().version(), None);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: InterpreterTag = serde_json::from_str("\"cp312\"").unwrap();
        assert_eq!(ok.as_str(), "cp312");
        assert!(serde_json::from_str::<InterpreterTag>("\"py3\"").is_err());
    }
}
