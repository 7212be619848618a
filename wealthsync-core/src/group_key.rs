//! Family group keys.
//!
//! A group key is the shared secret that identifies which devices replicate
//! the same document. Keys are short and human-typable (`ABCD-1234`), read
//! case-insensitively and always stored in uppercase.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters used when generating a new key.
const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of each half of a generated key.
const SEGMENT_LEN: usize = 4;

/// Errors that can occur when parsing a user-entered group key
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupKeyError {
    #[error("Group key is too short: expected at least {min} characters, got {len}")]
    TooShort { len: usize, min: usize },

    #[error("Group key contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// A canonical (uppercase) family group key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(String);

impl GroupKey {
    /// Minimum length accepted when joining an existing group.
    pub const MIN_INPUT_LEN: usize = 5;

    /// Generate a new random key in `XXXX-XXXX` form.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let mut segment = || -> String {
            (0..SEGMENT_LEN)
                .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
                .collect()
        };
        let first = segment();
        let second = segment();
        Self(format!("{}-{}", first, second))
    }

    /// Parse a key typed by a user.
    ///
    /// Surrounding whitespace is ignored and letters are uppercased. Input
    /// shorter than [`GroupKey::MIN_INPUT_LEN`] or containing anything other
    /// than ASCII letters, digits and `-` is rejected.
    pub fn parse(input: &str) -> Result<Self, GroupKeyError> {
        let trimmed = input.trim();
        let len = trimmed.chars().count();
        if len < Self::MIN_INPUT_LEN {
            return Err(GroupKeyError::TooShort {
                len,
                min: Self::MIN_INPUT_LEN,
            });
        }

        if let Some(c) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
        {
            return Err(GroupKeyError::InvalidCharacter(c));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Accept a key read back from storage or from a remote document.
    ///
    /// Stored keys were validated when they were first entered, so this only
    /// canonicalises case and treats a blank value as "no group".
    pub(crate) fn from_stored(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_ascii_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for GroupKey {
    type Err = GroupKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for GroupKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for GroupKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_stored(&s).ok_or_else(|| serde::de::Error::custom("empty group key"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let key = GroupKey::generate();
        let s = key.as_str();
        assert_eq!(s.len(), 9);
        assert_eq!(&s[4..5], "-");
        assert!(s
            .chars()
            .filter(|c| *c != '-')
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generate_is_random() {
        assert_ne!(GroupKey::generate(), GroupKey::generate());
    }

    #[test]
    fn test_parse_canonicalizes_case_and_whitespace() {
        let key = GroupKey::parse("  abcd-1234 ").unwrap();
        assert_eq!(key.as_str(), "ABCD-1234");
    }

    #[test]
    fn test_parse_rejects_short_input() {
        assert_eq!(
            GroupKey::parse("ab-1"),
            Err(GroupKeyError::TooShort { len: 4, min: 5 })
        );
        assert!(GroupKey::parse("     ").is_err());
        assert!(GroupKey::parse("").is_err());
    }

    #[test]
    fn test_parse_accepts_minimum_length() {
        assert!(GroupKey::parse("abcde").is_ok());
    }

    #[test]
    fn test_parse_rejects_path_characters() {
        assert_eq!(
            GroupKey::parse("../../etc"),
            Err(GroupKeyError::InvalidCharacter('.'))
        );
        assert_eq!(
            GroupKey::parse("ABCD/1234"),
            Err(GroupKeyError::InvalidCharacter('/'))
        );
    }

    #[test]
    fn test_serialization() {
        let key = GroupKey::parse("wxyz-0001").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"WXYZ-0001\"");

        let parsed: GroupKey = serde_json::from_str("\"wxyz-0001\"").unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_empty_stored_key_is_rejected() {
        assert!(serde_json::from_str::<GroupKey>("\"\"").is_err());
        assert_eq!(GroupKey::from_stored("  "), None);
    }
}
