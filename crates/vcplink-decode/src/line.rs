//! Line grammar and checksum verification.
//!
//! Every line the sensor emits carries a trailer of the form `*xxxx`, where
//! `xxxx` is the CRC-16/XMODEM of everything before the `*`, written as four
//! lowercase hex digits. A line is only trusted once both its shape and its
//! checksum check out.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::checksum::crc16_xmodem;

/// Separator between the line content and its checksum trailer.
pub const CHECKSUM_SEPARATOR: char = '*';

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^*]+\*[0-9a-f]{4}(?-u:\s)*$").expect("line pattern is a valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    /// The text does not have the `content*xxxx` shape. No checksum was computed.
    #[error("malformed line: {text:?}")]
    Format { text: String },
    #[error("checksum mismatch (expected {expected:04x}, computed {computed:04x}): {text}")]
    Integrity {
        text: String,
        expected: u16,
        computed: u16,
    },
}

impl LineError {
    /// The raw text that was rejected.
    pub fn text(&self) -> &str {
        match self {
            Self::Format { text } | Self::Integrity { text, .. } => text,
        }
    }
}

/// Line content that passed the grammar and checksum checks, trailer removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedLine(String);

impl ValidatedLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ValidatedLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks `text` against the line grammar, then verifies its checksum.
///
/// The grammar check always runs first: the trailer is only located and
/// parsed once the text is known to contain exactly one `*` followed by four
/// hex digits.
pub fn validate(text: &str) -> Result<ValidatedLine, LineError> {
    if !LINE_PATTERN.is_match(text) {
        return Err(LineError::Format {
            text: text.to_string(),
        });
    }

    let format_error = || LineError::Format {
        text: text.to_string(),
    };
    let (content, trailer) = text
        .split_once(CHECKSUM_SEPARATOR)
        .ok_or_else(format_error)?;
    let expected = trailer
        .get(..4)
        .and_then(|hex| u16::from_str_radix(hex, 16).ok())
        .ok_or_else(format_error)?;

    let computed = crc16_xmodem(content.as_bytes());
    if computed != expected {
        return Err(LineError::Integrity {
            text: text.to_string(),
            expected,
            computed,
        });
    }

    Ok(ValidatedLine(content.to_string()))
}

/// Appends the checksum trailer and a CRLF terminator to `content`, producing
/// a line exactly as the sensor would send it.
pub fn encode(content: &str) -> String {
    format!(
        "{content}{CHECKSUM_SEPARATOR}{:04x}\r\n",
        crc16_xmodem(content.as_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = "D,PTH450,E24753,,101264,Pa,23.53,C,38.47,%";

    #[test]
    fn test_encoded_line_validates_to_content() {
        let line = encode(DATA);
        assert!(line.ends_with("\r\n"));
        assert_eq!(validate(&line).unwrap().as_str(), DATA);
    }

    #[test]
    fn test_bare_lf_and_no_terminator_accepted() {
        let crc = crc16_xmodem(DATA.as_bytes());
        assert!(validate(&format!("{DATA}*{crc:04x}\n")).is_ok());
        assert!(validate(&format!("{DATA}*{crc:04x}")).is_ok());
        assert!(validate(&format!("{DATA}*{crc:04x}  \t\r\n")).is_ok());
    }

    #[test]
    fn test_every_flipped_hex_digit_rejected() {
        let line = encode(DATA);
        let star = line.find('*').unwrap();
        for pos in star + 1..star + 5 {
            for digit in "0123456789abcdefABCDEF".chars() {
                let mut bytes = line.clone().into_bytes();
                if bytes[pos] == digit as u8 {
                    continue;
                }
                bytes[pos] = digit as u8;
                let tampered = String::from_utf8(bytes).unwrap();
                assert!(validate(&tampered).is_err(), "accepted {tampered:?}");
            }
        }
    }

    #[test]
    fn test_integrity_error_reports_whole_text() {
        let line = format!("{DATA}*0000\r\n");
        match validate(&line) {
            Err(LineError::Integrity {
                text,
                expected,
                computed,
            }) => {
                assert_eq!(text, line);
                assert_eq!(expected, 0);
                assert_eq!(computed, crc16_xmodem(DATA.as_bytes()));
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn test_no_separator_is_format_error() {
        for text in ["", "\r\n", "I,PTH450,E24753,hello", "no checksum here\n"] {
            assert_eq!(
                validate(text),
                Err(LineError::Format {
                    text: text.to_string()
                })
            );
        }
    }

    #[test]
    fn test_ungrammatical_trailers_are_format_errors() {
        let crc = crc16_xmodem(DATA.as_bytes());
        let cases = [
            format!("{DATA}*{crc:04X}\r\n"),
            format!("{DATA}*{:03x}\r\n", crc & 0xfff),
            format!("{DATA}*{crc:04x}0\r\n"),
            format!("{DATA}*{crc:04x} x\r\n"),
            format!("*{crc:04x}\r\n"),
            format!("a*b*{crc:04x}\r\n"),
            "*".to_string(),
            "abc*".to_string(),
        ];
        for text in cases {
            assert!(
                matches!(validate(&text), Err(LineError::Format { .. })),
                "{text:?} should be a format error"
            );
        }
    }

    #[test]
    fn test_only_ascii_whitespace_after_trailer() {
        let crc = crc16_xmodem(DATA.as_bytes());
        assert!(validate(&format!("{DATA}*{crc:04x} \t\r\n")).is_ok());
        for space in ['\u{a0}', '\u{2003}', '\u{3000}'] {
            let text = format!("{DATA}*{crc:04x}{space}\r\n");
            assert!(
                matches!(validate(&text), Err(LineError::Format { .. })),
                "{text:?} should be a format error"
            );
        }
    }

    #[test]
    fn test_error_exposes_text() {
        let err = validate("garbage").unwrap_err();
        assert_eq!(err.text(), "garbage");
    }
}
