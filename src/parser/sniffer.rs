//! Content-based chart format detection.
//!
//! Extensions lie; the first bytes of the buffer do not. Each probe inspects
//! the leading structure of the raw buffer and the first positive match in a
//! fixed priority order wins. Pure classification, no side effects.

use crate::error::{ParseError, ParseErrorKind};

/// Smallest buffer that could be a chart file.
pub const MIN_CHART_SIZE: usize = 10;
/// Largest buffer accepted; real charts are small text files.
pub const MAX_CHART_SIZE: usize = 100_000;

/// The four supported chart dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartFormat {
    /// StepMania `.sm` step chart.
    Sm,
    /// UltraStar `.txt` vocal chart.
    Txt,
    /// Frets on Fire `song.ini`.
    Ini,
    /// SingStar `melody.xml`.
    Xml,
}

impl ChartFormat {
    pub fn name(self) -> &'static str {
        match self {
            ChartFormat::Sm => "SM",
            ChartFormat::Txt => "TXT",
            ChartFormat::Ini => "INI",
            ChartFormat::Xml => "XML",
        }
    }
}

/// Classify a chart buffer.
///
/// Probes run in order SM, TXT, INI, XML; SM must precede TXT because both
/// start with a `#` header key and only the trailing `;` sets SM apart.
pub fn detect(data: &[u8]) -> Result<ChartFormat, ParseError> {
    if data.len() < MIN_CHART_SIZE || data.len() > MAX_CHART_SIZE {
        return Err(ParseError::new(ParseErrorKind::WrongSize, 1));
    }
    let data = strip_bom(data);
    if sm_check(data) {
        Ok(ChartFormat::Sm)
    } else if txt_check(data) {
        Ok(ChartFormat::Txt)
    } else if ini_check(data) {
        Ok(ChartFormat::Ini)
    } else if xml_check(data) {
        Ok(ChartFormat::Xml)
    } else {
        Err(ParseError::new(ParseErrorKind::WrongHeader, 1))
    }
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data)
}

/// `#KEY:VALUE;` with the terminator on the first line.
fn sm_check(data: &[u8]) -> bool {
    if !matches!(data, [b'#', b'A'..=b'Z', ..]) {
        return false;
    }
    data.iter()
        .take_while(|&&b| b != b'\n')
        .any(|&b| b == b';')
}

/// `#KEY:VALUE` header lines without SM's terminator.
fn txt_check(data: &[u8]) -> bool {
    matches!(data, [b'#', b'A'..=b'Z', ..])
}

/// `[song]` section header.
fn ini_check(data: &[u8]) -> bool {
    data.len() >= 6 && data[..6].eq_ignore_ascii_case(b"[song]")
}

/// XML prolog or a bare MELODY root.
fn xml_check(data: &[u8]) -> bool {
    let mut rest = data;
    while let [b' ' | b'\t' | b'\r' | b'\n', tail @ ..] = rest {
        rest = tail;
    }
    rest.starts_with(b"<?xml") || rest.starts_with(b"<MELODY")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(mut data: Vec<u8>) -> Vec<u8> {
        while data.len() < MIN_CHART_SIZE {
            data.push(b'\n');
        }
        data
    }

    #[test]
    fn undersized_buffer_is_wrong_size() {
        let err = detect(b"#TITL").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::WrongSize);
    }

    #[test]
    fn oversized_buffer_is_wrong_size() {
        let data = vec![b'#'; MAX_CHART_SIZE + 1];
        let err = detect(&data).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::WrongSize);
    }

    #[test]
    fn sm_wins_over_txt() {
        // both probes like the leading "#TITLE", the semicolon decides
        let data = pad(b"#TITLE:Some Song;\n".to_vec());
        assert_eq!(detect(&data).unwrap(), ChartFormat::Sm);
    }

    #[test]
    fn txt_detected_without_terminator() {
        let data = pad(b"#TITLE:Some Song\n#BPM:120\n".to_vec());
        assert_eq!(detect(&data).unwrap(), ChartFormat::Txt);
    }

    #[test]
    fn ini_detected_case_insensitively() {
        let data = pad(b"[Song]\nname = Some Song\n".to_vec());
        assert_eq!(detect(&data).unwrap(), ChartFormat::Ini);
    }

    #[test]
    fn xml_detected_by_prolog() {
        let data = pad(b"<?xml version=\"1.0\"?>\n<MELODY/>".to_vec());
        assert_eq!(detect(&data).unwrap(), ChartFormat::Xml);
    }

    #[test]
    fn bom_does_not_hide_the_header() {
        let mut data = vec![0xEF, 0xBB, 0xBF];
        data.extend_from_slice(b"#TITLE:Song\n");
        assert_eq!(detect(&data).unwrap(), ChartFormat::Txt);
    }

    #[test]
    fn unknown_content_is_wrong_header() {
        let err = detect(b"RIFF....WAVEfmt ").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::WrongHeader);
        assert_eq!(err.line, 1);
    }
}
