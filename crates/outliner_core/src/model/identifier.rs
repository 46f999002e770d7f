//! Row identifier generation and validation.
//!
//! # Invariants
//! - Generated identifiers are 11 alphanumeric characters.
//! - Callers re-draw until the identifier is unused in their document.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

const IDENTIFIER_LEN: usize = 11;
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

static VALID_IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._:-]+$").expect("valid identifier regex"));

/// Returns whether a parsed identifier can be kept as-is.
pub fn is_valid_identifier(identifier: &str) -> bool {
    VALID_IDENTIFIER_RE.is_match(identifier)
}

/// Draws one random identifier.
pub fn generate_identifier() -> String {
    let mut bits = Uuid::new_v4().as_u128();
    let radix = ALPHABET.len() as u128;
    let mut identifier = String::with_capacity(IDENTIFIER_LEN);
    for _ in 0..IDENTIFIER_LEN {
        identifier.push(ALPHABET[(bits % radix) as usize] as char);
        bits /= radix;
    }
    identifier
}

/// Draws identifiers until `is_taken` rejects none.
pub fn generate_unique_identifier(mut is_taken: impl FnMut(&str) -> bool) -> String {
    loop {
        let candidate = generate_identifier();
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{generate_identifier, generate_unique_identifier, is_valid_identifier};

    #[test]
    fn generated_identifiers_are_valid() {
        let identifier = generate_identifier();
        assert_eq!(identifier.len(), 11);
        assert!(identifier.chars().all(|ch| ch.is_ascii_alphanumeric()));
        assert!(is_valid_identifier(&identifier));
    }

    #[test]
    fn validation_rejects_whitespace_and_empty() {
        assert!(is_valid_identifier("kM3.x:9_-"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a b"));
        assert!(!is_valid_identifier("row<1>"));
    }

    #[test]
    fn unique_generation_redraws_taken_values() {
        let mut calls = 0;
        let identifier = generate_unique_identifier(|_| {
            calls += 1;
            calls < 3
        });
        assert_eq!(calls, 3);
        assert!(is_valid_identifier(&identifier));
    }
}
