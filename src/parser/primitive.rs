//! Scalar field conversion shared by the line-oriented readers.
//!
//! Every helper reports the offending raw string on failure so parse errors
//! stay diagnosable without the file at hand.

use crate::error::{ParseError, ParseErrorKind};

pub fn parse_int_value(raw: &str, line: u32) -> Result<i32, ParseError> {
    raw.trim().parse().map_err(|_| {
        ParseError::new(ParseErrorKind::InvalidInteger(raw.trim().to_string()), line)
    })
}

/// Parse a float, tolerating a comma decimal separator as found in charts
/// written with European locales.
pub fn parse_float_value(raw: &str, line: u32) -> Result<f64, ParseError> {
    let fixed = raw.trim().replace(',', ".");
    fixed
        .parse()
        .map_err(|_| ParseError::new(ParseErrorKind::InvalidFloat(raw.trim().to_string()), line))
}

pub fn parse_bool_value(raw: &str, line: u32) -> Result<bool, ParseError> {
    match raw.trim() {
        "YES" | "yes" | "1" => Ok(true),
        "NO" | "no" | "0" => Ok(false),
        other => Err(ParseError::new(
            ParseErrorKind::InvalidBoolean(other.to_string()),
            line,
        )),
    }
}

/// Split a `KEY:VALUE` (or `KEY=VALUE`) line on the first separator.
///
/// Key is trimmed; the value keeps its leading/trailing spaces because some
/// formats treat them as significant (TXT syllables).
pub fn split_key_value(line: &str, separator: char) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(separator)?;
    Some((key.trim(), value))
}
