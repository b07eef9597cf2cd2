//! Synthesis languages offered by the front-end.
//!
//! The set is static: the multilingual model accepts more, but these are the
//! languages the application exposes and labels.

/// A selectable synthesis language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

/// Languages in display order. The first entry is the default selection.
pub const LANGUAGES: &[Language] = &[
    Language { code: "en", name: "English" },
    Language { code: "es", name: "Spanish" },
    Language { code: "fr", name: "French" },
    Language { code: "de", name: "German" },
    Language { code: "it", name: "Italian" },
    Language { code: "ar", name: "Arabic" },
];

/// Default language (English).
pub fn default_language() -> &'static Language {
    &LANGUAGES[0]
}

/// Look up a language by its code (case-insensitive).
pub fn get_language(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|lang| lang.code.eq_ignore_ascii_case(code.trim()))
}

/// Parse a language code for clap, rejecting codes outside the table.
pub fn parse_language(s: &str) -> Result<String, String> {
    get_language(s).map(|lang| lang.code.to_string()).ok_or_else(|| {
        let codes: Vec<&str> = LANGUAGES.iter().map(|l| l.code).collect();
        format!("unsupported language '{}', expected one of: {}", s, codes.join(", "))
    })
}

/// Print all languages.
pub fn print_languages() {
    println!("{:<6} LANGUAGE", "CODE");
    println!("{}", "─".repeat(24));
    for lang in LANGUAGES {
        println!("{:<6} {}", lang.code, lang.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(get_language("FR").map(|l| l.name), Some("French"));
        assert_eq!(get_language(" ar ").map(|l| l.code), Some("ar"));
        assert!(get_language("pt").is_none());
    }

    #[test]
    fn test_default_is_english() {
        assert_eq!(default_language().code, "en");
    }

    #[test]
    fn test_parse_language_rejects_unknown() {
        assert_eq!(parse_language("De").unwrap(), "de");
        let err = parse_language("xx").unwrap_err();
        assert!(err.contains("en, es, fr, de, it, ar"));
    }
}
