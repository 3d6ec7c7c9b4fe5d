use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::pattern::fnv1a_64;

/// A compiled byte pattern: literal bytes plus a wildcard mask.
///
/// Parsed from the usual whitespace-separated signature syntax where each
/// token is either two hex digits (`48`, `8d`) or a wildcard (`?` / `??`)
/// that matches any byte. Wildcards are byte-granular; there is no
/// nibble-level masking.
///
/// The `hash` covers the raw source text and keys the hint cache. It is a
/// lookup key only: a collision can at worst cost a wasted verification,
/// never a wrong match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<u8>,
    mask: Vec<bool>,
    hash: u64,
}

impl Signature {
    /// Parse a pattern string. Fails on an empty pattern or on any token
    /// that is neither a wildcard nor exactly two hex digits.
    pub fn parse(text: &str) -> Result<Self> {
        let mut bytes = Vec::new();
        let mut mask = Vec::new();

        for (index, token) in text.split_whitespace().enumerate() {
            if token == "??" || token == "?" {
                bytes.push(0);
                mask.push(false);
                continue;
            }

            if token.len() != 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(Error::InvalidToken {
                    token: token.to_string(),
                    index,
                });
            }

            // Length and digit class checked above, radix parse cannot fail.
            let value = u8::from_str_radix(token, 16).map_err(|_| Error::InvalidToken {
                token: token.to_string(),
                index,
            })?;
            bytes.push(value);
            mask.push(true);
        }

        if bytes.is_empty() {
            return Err(Error::EmptyPattern);
        }

        Ok(Self {
            bytes,
            mask,
            hash: fnv1a_64(text.as_bytes()),
        })
    }

    /// Pattern length in bytes (wildcards included).
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// FNV-1a hash of the source text, the hint-cache key.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Wildcard mask, `true` at positions that must match literally.
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Test the pattern against the start of `window`. A window shorter
    /// than the pattern never matches.
    pub fn matches_at(&self, window: &[u8]) -> bool {
        if window.len() < self.bytes.len() {
            return false;
        }
        self.bytes
            .iter()
            .zip(&self.mask)
            .zip(window)
            .all(|((byte, &literal), data)| !literal || byte == data)
    }

    /// Position and value of the first literal byte, if any position is
    /// literal. Scan loops anchor on this byte.
    pub fn first_literal(&self) -> Option<(usize, u8)> {
        self.mask
            .iter()
            .position(|&literal| literal)
            .map(|index| (index, self.bytes[index]))
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (byte, &literal)) in self.bytes.iter().zip(&self.mask).enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            if literal {
                write!(f, "{:02X}", byte)?;
            } else {
                f.write_str("??")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_wildcards() {
        let sig = Signature::parse("48 8D 0D ?? ?? ?? ??").unwrap();
        assert_eq!(sig.len(), 7);
        assert_eq!(sig.bytes()[0], 0x48);
        assert_eq!(sig.bytes()[1], 0x8D);
        assert_eq!(sig.bytes()[2], 0x0D);
        assert!(sig.mask()[2]);
        assert!(!sig.mask()[3]);
    }

    #[test]
    fn test_parse_accepts_short_wildcard_and_lowercase() {
        let sig = Signature::parse("aa ? bb").unwrap();
        assert_eq!(sig.bytes(), &[0xAA, 0x00, 0xBB]);
        assert_eq!(sig.mask(), &[true, false, true]);
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        for (text, bad_token, bad_index) in [
            ("48 8D G0", "G0", 2),
            ("A", "A", 0),
            ("AAA", "AAA", 0),
            ("48 +5", "+5", 1),
            ("48 ???", "???", 1),
        ] {
            match Signature::parse(text) {
                Err(Error::InvalidToken { token, index }) => {
                    assert_eq!(token, bad_token);
                    assert_eq!(index, bad_index);
                }
                other => panic!("expected InvalidToken for {:?}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(Signature::parse(""), Err(Error::EmptyPattern)));
        assert!(matches!(Signature::parse("   "), Err(Error::EmptyPattern)));
    }

    #[test]
    fn test_display_roundtrip() {
        let sig = Signature::parse("48 8D 0D ?? FF").unwrap();
        let formatted = sig.to_string();
        assert_eq!(formatted, "48 8D 0D ?? FF");
        let reparsed = Signature::parse(&formatted).unwrap();
        assert_eq!(reparsed.bytes(), sig.bytes());
        assert_eq!(reparsed.mask(), sig.mask());
    }

    #[test]
    fn test_hash_covers_raw_text() {
        let sig = Signature::parse("48 8D").unwrap();
        assert_eq!(sig.hash(), fnv1a_64(b"48 8D"));
        // Same bytes, different spelling, different key.
        let lower = Signature::parse("48 8d").unwrap();
        assert_eq!(lower.bytes(), sig.bytes());
        assert_ne!(lower.hash(), sig.hash());
    }

    #[test]
    fn test_matches_at() {
        let sig = Signature::parse("AA ?? CC").unwrap();
        assert!(sig.matches_at(&[0xAA, 0x00, 0xCC]));
        assert!(sig.matches_at(&[0xAA, 0xFF, 0xCC, 0xDD]));
        assert!(!sig.matches_at(&[0xAA, 0x00, 0xCD]));
        assert!(!sig.matches_at(&[0xAA, 0x00]));
    }

    #[test]
    fn test_first_literal() {
        let anchored = Signature::parse("?? ?? E8 ??").unwrap();
        assert_eq!(anchored.first_literal(), Some((2, 0xE8)));
        let blind = Signature::parse("?? ??").unwrap();
        assert_eq!(blind.first_literal(), None);
    }
}
