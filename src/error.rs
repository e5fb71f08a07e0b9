//! Error types for the vocalis library

use std::io;

/// Reason a chart buffer (or a field inside it) could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    /// Buffer size outside the range any supported chart can have.
    #[error("does not look like a song file (wrong size)")]
    WrongSize,

    /// No format signature matched the buffer.
    #[error("does not look like a song file (wrong header)")]
    WrongHeader,

    /// I/O error while reading the chart file.
    #[error("I/O error: {0}")]
    Io(String),

    #[error("\"{0}\" is not a valid integer value")]
    InvalidInteger(String),

    #[error("\"{0}\" is not a valid floating point value")]
    InvalidFloat(String),

    #[error("invalid boolean value: {0}")]
    InvalidBoolean(String),

    #[error("invalid BPM value: {0}")]
    InvalidTempo(String),

    /// Tempo change at a position before an earlier one.
    #[error("tempo changes must be in ascending order")]
    NonMonotonicTempo,

    /// A timestamp was converted before any tempo was declared.
    #[error("BPM data missing")]
    MissingTempo,

    #[error("{0}")]
    MalformedField(String),

    #[error("truncated section: {0}")]
    TruncatedSection(String),
}

/// Parse failure with the 1-based line it was detected at.
///
/// `line` is 0 when the failure is not line-addressable (I/O, size checks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: u32,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, line: u32) -> Self {
        Self { kind, line }
    }

    pub fn no_line(kind: ParseErrorKind) -> Self {
        Self { kind, line: 0 }
    }
}

impl From<ParseErrorKind> for ParseError {
    fn from(kind: ParseErrorKind) -> Self {
        Self::no_line(kind)
    }
}

impl From<io::Error> for ParseError {
    fn from(error: io::Error) -> Self {
        Self::no_line(ParseErrorKind::Io(error.to_string()))
    }
}

/// Parse failure attached to the song it happened in.
///
/// This is the only error type surfaced by the public API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongParserError {
    /// Identity of the offending song (full file path).
    pub song: String,
    pub kind: ParseErrorKind,
    /// 1-based line number, 0 if not line-addressable.
    pub line: u32,
}

impl SongParserError {
    pub fn new(song: String, error: ParseError) -> Self {
        Self {
            song,
            kind: error.kind,
            line: error.line,
        }
    }

    /// True when the file is simply not a supported chart at all, as opposed
    /// to a chart that failed mid-parse. Library scanners skip such files
    /// quietly instead of reporting them.
    pub fn is_not_a_chart(&self) -> bool {
        matches!(
            self.kind,
            ParseErrorKind::WrongSize | ParseErrorKind::WrongHeader
        )
    }
}

impl std::fmt::Display for SongParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{}: {}", self.song, self.line, self.kind)
        } else {
            write!(f, "{}: {}", self.song, self.kind)
        }
    }
}

impl std::error::Error for SongParserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
