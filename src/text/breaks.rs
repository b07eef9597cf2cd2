//! Pause-marker insertion.
//!
//! Sentence punctuation is rewritten into `<break time="1.0s"/>` directives
//! understood by the speech provider. Directives from an earlier pass are
//! turned back into the punctuation they replaced before the new pass runs,
//! so applying the same settings twice leaves the text unchanged.

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Allowed pause after a period or ellipsis, in seconds.
pub const PERIOD_BREAK_RANGE: RangeInclusive<f64> = 1.0..=8.0;

/// Allowed pause after a comma, in seconds.
pub const COMMA_BREAK_RANGE: RangeInclusive<f64> = 0.1..=0.9;

pub const DEFAULT_PERIOD_BREAK: f64 = 1.0;

/// Suggested comma pause when comma breaks are switched on.
pub const DEFAULT_COMMA_BREAK: f64 = 0.3;

/// Matches the exact directive grammar emitted by [`apply_breaks`].
static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<break time="([^"]*)s"/>"#).expect("directive pattern is valid"));

#[derive(Debug, Error, PartialEq)]
pub enum BreakSettingsError {
    #[error("period break must be between {min:.1}s and {max:.1}s, got {value}")]
    PeriodOutOfRange { value: f64, min: f64, max: f64 },
    #[error("comma break must be between {min:.1}s and {max:.1}s, got {value}")]
    CommaOutOfRange { value: f64, min: f64, max: f64 },
}

/// Pause durations per punctuation class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakSettings {
    /// Pause after periods and ellipses.
    pub period_break: f64,
    /// Pause after commas; commas are left alone when unset.
    pub comma_break: Option<f64>,
}

impl Default for BreakSettings {
    fn default() -> Self {
        Self { period_break: DEFAULT_PERIOD_BREAK, comma_break: None }
    }
}

impl BreakSettings {
    /// Build settings, checking both durations against their ranges.
    pub fn new(period_break: f64, comma_break: Option<f64>) -> Result<Self, BreakSettingsError> {
        check_period(period_break)?;
        if let Some(comma) = comma_break {
            check_comma(comma)?;
        }
        Ok(Self { period_break, comma_break })
    }

    pub fn with_period(self, period_break: f64) -> Result<Self, BreakSettingsError> {
        Self::new(period_break, self.comma_break)
    }

    pub fn with_comma(self, comma_break: Option<f64>) -> Result<Self, BreakSettingsError> {
        Self::new(self.period_break, comma_break)
    }
}

fn check_period(value: f64) -> Result<(), BreakSettingsError> {
    if PERIOD_BREAK_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(BreakSettingsError::PeriodOutOfRange { value, min: *PERIOD_BREAK_RANGE.start(), max: *PERIOD_BREAK_RANGE.end() })
    }
}

fn check_comma(value: f64) -> Result<(), BreakSettingsError> {
    if COMMA_BREAK_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(BreakSettingsError::CommaOutOfRange { value, min: *COMMA_BREAK_RANGE.start(), max: *COMMA_BREAK_RANGE.end() })
    }
}

/// Parse and validate a period break value for clap.
pub fn parse_period_break(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a valid number of seconds", s))?;
    check_period(value).map(|_| value).map_err(|e| e.to_string())
}

/// Parse and validate a comma break value for clap.
pub fn parse_comma_break(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a valid number of seconds", s))?;
    check_comma(value).map(|_| value).map_err(|e| e.to_string())
}

/// Render a pause directive. One decimal place, always.
pub fn directive(seconds: f64) -> String {
    format!("<break time=\"{:.1}s\"/>", seconds)
}

/// Replace punctuation in `text` with pause directives.
///
/// Runs of three or more periods count as one pause. A period or comma
/// between two digits is a number separator and is kept.
pub fn apply_breaks(text: &str, settings: &BreakSettings) -> String {
    let restored = restore_punctuation(text);
    let period_tag = directive(settings.period_break);
    let comma_tag = settings.comma_break.map(directive);

    let chars: Vec<char> = restored.chars().collect();
    let mut out = String::with_capacity(restored.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                let run = chars[i..].iter().take_while(|&&c| c == '.').count();
                if run >= 3 {
                    out.push_str(&period_tag);
                    i += run;
                    continue;
                }
                if is_number_separator(&chars, i) {
                    out.push('.');
                } else {
                    out.push_str(&period_tag);
                }
            }
            ',' => match &comma_tag {
                Some(tag) if !is_number_separator(&chars, i) => out.push_str(tag),
                _ => out.push(','),
            },
            c => out.push(c),
        }
        i += 1;
    }

    out
}

fn is_number_separator(chars: &[char], i: usize) -> bool {
    i > 0 && chars[i - 1].is_ascii_digit() && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
}

/// Turn existing directives back into punctuation.
///
/// Durations below the period range can only be comma pauses. A period pause
/// sitting between two digits can only have come from an ellipsis.
fn restore_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in DIRECTIVE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);

        let is_comma = caps[1].trim().parse::<f64>().is_ok_and(|secs| secs < *PERIOD_BREAK_RANGE.start());
        let between_digits = text[..whole.start()].chars().next_back().is_some_and(|c| c.is_ascii_digit())
            && text[whole.end()..].chars().next().is_some_and(|c| c.is_ascii_digit());

        out.push_str(match (is_comma, between_digits) {
            (true, _) => ",",
            (false, true) => "...",
            (false, false) => ".",
        });
        last = whole.end();
    }

    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(secs: f64) -> BreakSettings {
        BreakSettings::new(secs, None).unwrap()
    }

    #[test]
    fn test_ellipsis_is_one_pause() {
        let out = apply_breaks("Hello. World... Done.", &period(1.0));
        assert_eq!(out, r#"Hello<break time="1.0s"/> World<break time="1.0s"/> Done<break time="1.0s"/>"#);
    }

    #[test]
    fn test_empty_and_plain_text_unchanged() {
        assert_eq!(apply_breaks("", &BreakSettings::default()), "");
        assert_eq!(apply_breaks("No periods here, just a comma", &BreakSettings::default()), "No periods here, just a comma");
    }

    #[test]
    fn test_idempotent_with_same_settings() {
        let settings = BreakSettings::new(2.5, Some(0.3)).unwrap();
        let inputs = ["Hello. World... Done.", "One, two, three.", "Wait.. what?", "Pi is 3.14, roughly... 1...5", ""];
        for input in inputs {
            let once = apply_breaks(input, &settings);
            let twice = apply_breaks(&once, &settings);
            assert_eq!(once, twice, "input: {input:?}");
        }
    }

    #[test]
    fn test_reapply_with_new_settings_does_not_accumulate() {
        let first = apply_breaks("Hi, there. Bye.", &BreakSettings::new(1.0, Some(0.3)).unwrap());
        let second = apply_breaks(&first, &BreakSettings::new(4.0, Some(0.5)).unwrap());
        assert_eq!(second, r#"Hi<break time="0.5s"/> there<break time="4.0s"/> Bye<break time="4.0s"/>"#);
    }

    #[test]
    fn test_commas_only_when_enabled() {
        let text = "Red, green.";
        assert_eq!(apply_breaks(text, &period(1.0)), r#"Red, green<break time="1.0s"/>"#);
        let with_comma = BreakSettings::new(1.0, Some(0.3)).unwrap();
        assert_eq!(apply_breaks(text, &with_comma), r#"Red<break time="0.3s"/> green<break time="1.0s"/>"#);
    }

    #[test]
    fn test_number_separators_are_kept() {
        let settings = BreakSettings::new(1.0, Some(0.2)).unwrap();
        assert_eq!(apply_breaks("It costs 1,500.75 euros.", &settings), r#"It costs 1,500.75 euros<break time="1.0s"/>"#);
    }

    #[test]
    fn test_duration_has_one_decimal() {
        assert_eq!(directive(8.0), r#"<break time="8.0s"/>"#);
        assert_eq!(directive(1.5), r#"<break time="1.5s"/>"#);
    }

    #[test]
    fn test_foreign_directive_becomes_period_pause() {
        let out = apply_breaks(r#"Stop<break time="abcs"/> Go"#, &period(3.0));
        assert_eq!(out, r#"Stop<break time="3.0s"/> Go"#);
    }

    #[test]
    fn test_settings_ranges() {
        assert!(BreakSettings::new(0.5, None).is_err());
        assert!(BreakSettings::new(8.5, None).is_err());
        assert!(matches!(BreakSettings::new(1.0, Some(1.0)), Err(BreakSettingsError::CommaOutOfRange { .. })));
        assert_eq!(parse_period_break("2").unwrap(), 2.0);
        assert!(parse_comma_break("fast").is_err());
    }
}
