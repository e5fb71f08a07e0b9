//! Frets on Fire `song.ini` reader.
//!
//! Band-mode songs declare metadata only; their note data lives in a sibling
//! MIDI file handled by an instrument loader outside this crate, so the body
//! pass intentionally produces no vocal tracks.

use crate::error::{ParseError, ParseErrorKind};
use crate::parser::primitive::{parse_float_value, split_key_value};
use crate::parser::tempo::TempoEngine;
use crate::song::Song;

pub fn parse_header(text: &str, song: &mut Song, engine: &mut TempoEngine) -> Result<(), ParseError> {
    let mut in_song_section = false;
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx as u32 + 1;
        let line = line.trim_end_matches('\r').trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_song_section = section.eq_ignore_ascii_case("song");
            continue;
        }
        if !in_song_section {
            continue;
        }
        let Some((key, value)) = split_key_value(line, '=') else {
            return Err(ParseError::new(
                ParseErrorKind::MalformedField(format!("expected key = value: {line}")),
                line_no,
            ));
        };
        let value = value.trim();
        match key.to_ascii_lowercase().as_str() {
            "name" => song.title = value.to_string(),
            "artist" => song.artist = value.to_string(),
            "genre" => song.genre = value.to_string(),
            "year" => song.edition = value.to_string(),
            "video" => song.video = value.to_string(),
            "icon" | "cassettecolor" | "loading_phrase" => {}
            "delay" => engine.set_offset(parse_float_value(value, line_no)? / 1000.0),
            "preview_start_time" => {
                let millis = parse_float_value(value, line_no)?;
                // -1 marks "unset" in the wild
                if millis >= 0.0 {
                    song.preview_start = Some(millis / 1000.0);
                }
            }
            _ => log::debug!("ignoring unknown INI field {key}"),
        }
    }
    Ok(())
}

/// Nothing to do: vocals for INI songs come from the out-of-scope MIDI
/// collaborator, never from the ini file itself.
pub fn parse_body(_text: &str, song: &mut Song, _engine: &mut TempoEngine) -> Result<(), ParseError> {
    log::debug!(
        "{:?}: ini chart carries no vocal notes, leaving tracks empty",
        song.chart_path()
    );
    Ok(())
}
