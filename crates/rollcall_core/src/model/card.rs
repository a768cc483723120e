//! Card identifiers read from proximity cards.

use super::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const MAX_CARD_UID_CHARS: usize = 64;
const MASK_VISIBLE_CHARS: usize = 4;

/// Opaque card identifier, unique per enrolled student.
///
/// Readers emit values like `0x04 0xA2 0x1F 0x9C`; the core treats the text
/// as opaque apart from trimming surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardUid(String);

impl CardUid {
    /// Parses raw reader output into a card UID.
    ///
    /// # Errors
    /// - `EmptyCardUid` when the trimmed value is empty.
    /// - `CardUidTooLong` when it exceeds 64 characters.
    /// - `CardUidControlChars` when it contains control characters.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyCardUid);
        }
        let len = trimmed.chars().count();
        if len > MAX_CARD_UID_CHARS {
            return Err(ValidationError::CardUidTooLong {
                len,
                max: MAX_CARD_UID_CHARS,
            });
        }
        if trimmed.chars().any(char::is_control) {
            return Err(ValidationError::CardUidControlChars);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Log-safe rendering that keeps only the trailing characters.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= MASK_VISIBLE_CHARS {
            return "*".repeat(chars.len());
        }
        let visible: String = chars[chars.len() - MASK_VISIBLE_CHARS..].iter().collect();
        format!("***{visible}")
    }
}

impl Display for CardUid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CardUid {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CardUid> for String {
    fn from(value: CardUid) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::CardUid;
    use crate::model::validation::ValidationError;

    #[test]
    fn parse_trims_reader_whitespace() {
        let uid = CardUid::parse("  0x04 0xA2  \n").unwrap();
        assert_eq!(uid.as_str(), "0x04 0xA2");
    }

    #[test]
    fn parse_rejects_blank_and_oversized_values() {
        assert_eq!(CardUid::parse("   "), Err(ValidationError::EmptyCardUid));
        assert!(matches!(
            CardUid::parse(&"A".repeat(65)),
            Err(ValidationError::CardUidTooLong { len: 65, max: 64 })
        ));
        assert_eq!(
            CardUid::parse("0x04\u{0}0xA2"),
            Err(ValidationError::CardUidControlChars)
        );
    }

    #[test]
    fn masked_hides_all_but_the_tail() {
        let uid = CardUid::parse("0x04 0xA2 0x1F").unwrap();
        assert_eq!(uid.masked(), "***0x1F");
        assert_eq!(CardUid::parse("AB").unwrap().masked(), "**");
    }
}
