//! Text buffer rules and pause-marker insertion.

pub mod breaks;

pub use breaks::{BreakSettings, apply_breaks};

/// Maximum text length accepted by the provider, in characters.
pub const MAX_TEXT_LENGTH: usize = 5000;

/// Cut `text` down to [`MAX_TEXT_LENGTH`] characters.
pub fn clamp_length(text: &str) -> String {
    match text.char_indices().nth(MAX_TEXT_LENGTH) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// True when `text` is longer than the provider accepts.
pub fn is_over_limit(text: &str) -> bool {
    text.chars().nth(MAX_TEXT_LENGTH).is_some()
}

/// True past 90% of the limit.
pub fn is_near_limit(text: &str) -> bool {
    char_count(text) * 10 > MAX_TEXT_LENGTH * 9
}

pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_counts_characters_not_bytes() {
        let text = "é".repeat(MAX_TEXT_LENGTH + 10);
        let clamped = clamp_length(&text);
        assert_eq!(char_count(&clamped), MAX_TEXT_LENGTH);
        assert_eq!(clamp_length("short"), "short");
    }

    #[test]
    fn test_near_limit() {
        assert!(!is_near_limit(&"a".repeat(4500)));
        assert!(is_near_limit(&"a".repeat(4501)));
    }

    #[test]
    fn test_over_limit() {
        assert!(!is_over_limit(&"é".repeat(MAX_TEXT_LENGTH)));
        assert!(is_over_limit(&"é".repeat(MAX_TEXT_LENGTH + 1)));
    }

    #[test]
    fn test_blank() {
        assert!(is_blank(" \n\t "));
        assert!(!is_blank(" a "));
    }
}
