//! UltraStar TXT chart reader.
//!
//! `#KEY:VALUE` header lines followed by note lines:
//!
//! ```text
//! : 0 4 59 Some
//! * 4 4 61 bo
//! F 8 2 0 (dy)
//! - 12
//! B 16 190
//! E
//! ```
//!
//! `:` normal, `*` golden, `F` freestyle, `-` sentence break, `B` mid-song
//! tempo change, `E` end of chart, `P1`/`P2`/`P3` switch the active duet
//! player (P3 = both). With `#RELATIVE:yes` every timestamp is relative to a
//! running shift advanced by the second value of each `-` line.

use crate::error::{ParseError, ParseErrorKind};
use crate::parser::primitive::{parse_bool_value, parse_float_value, split_key_value};
use crate::parser::tempo::TempoEngine;
use crate::song::{Note, NoteType, Song, VocalTrack};
use nom::character::complete::{char as nom_char, i32 as parse_i32, one_of, space1};
use nom::combinator::{opt, rest};
use nom::sequence::preceded;
use nom::{IResult, Parser};

/// UltraStar timestamps are quarter-beats.
const TICKS_PER_BEAT: f64 = 4.0;

#[derive(Debug, Default)]
struct TxtState {
    relative: bool,
    /// Duet singer names from `#DUETSINGERP1`/`#DUETSINGERP2`.
    singer_p1: Option<String>,
    singer_p2: Option<String>,
    /// Lines consumed by the header block.
    header_lines: usize,
}

impl TxtState {
    fn track_name(&self, player: usize) -> String {
        let declared = match player {
            1 => self.singer_p1.as_deref(),
            _ => self.singer_p2.as_deref(),
        };
        declared.map_or_else(|| format!("P{player}"), str::to_string)
    }
}

/// Metadata-only pass; seeds the tempo engine for a later full parse.
pub fn parse_header(text: &str, song: &mut Song, engine: &mut TempoEngine) -> Result<(), ParseError> {
    parse_header_lines(text, song, engine)?;
    Ok(())
}

fn parse_header_lines(
    text: &str,
    song: &mut Song,
    engine: &mut TempoEngine,
) -> Result<TxtState, ParseError> {
    engine.set_ticks_per_beat(TICKS_PER_BEAT);
    let mut state = TxtState::default();
    let mut bpm = None;
    let mut gap = 0.0;
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx as u32 + 1;
        let line = line.trim_end_matches('\r');
        if !line.starts_with('#') {
            break;
        }
        state.header_lines = idx + 1;
        let Some((key, value)) = split_key_value(&line[1..], ':') else {
            continue;
        };
        let trimmed = value.trim();
        match key.to_ascii_uppercase().as_str() {
            "TITLE" => song.title = trimmed.to_string(),
            "ARTIST" => song.artist = trimmed.to_string(),
            "EDITION" => song.edition = trimmed.to_string(),
            "GENRE" => song.genre = trimmed.to_string(),
            "CREATOR" | "AUTHOR" => song.creator = trimmed.to_string(),
            "LANGUAGE" => song.language = trimmed.to_string(),
            "COVER" => song.cover = trimmed.to_string(),
            "MP3" | "AUDIO" => song.music = trimmed.to_string(),
            "VIDEO" => song.video = trimmed.to_string(),
            "BACKGROUND" => song.background = trimmed.to_string(),
            "START" => song.start = parse_float_value(trimmed, line_no)?,
            "VIDEOGAP" => song.video_gap = parse_float_value(trimmed, line_no)?,
            "PREVIEWSTART" => song.preview_start = Some(parse_float_value(trimmed, line_no)?),
            "RELATIVE" => state.relative = parse_bool_value(trimmed, line_no)?,
            "GAP" => gap = parse_float_value(trimmed, line_no)? / 1000.0,
            "BPM" => bpm = Some((parse_float_value(trimmed, line_no)?, line_no)),
            "DUETSINGERP1" | "P1" => state.singer_p1 = Some(trimmed.to_string()),
            "DUETSINGERP2" | "P2" => state.singer_p2 = Some(trimmed.to_string()),
            _ => log::debug!("ignoring unknown TXT header field {key}"),
        }
    }
    engine.set_offset(gap);
    if let Some((bpm, line_no)) = bpm {
        engine
            .set_global_bpm(bpm)
            .map_err(|e| ParseError::new(e.kind, line_no))?;
    }
    Ok(state)
}

struct NoteLine<'a> {
    kind: NoteType,
    ts: i32,
    length: i32,
    pitch: i32,
    syllable: &'a str,
}

fn note_line(i: &str) -> IResult<&str, NoteLine<'_>> {
    let (i, kind) = one_of(":*F").parse(i)?;
    let (i, ts) = preceded(space1, parse_i32).parse(i)?;
    let (i, length) = preceded(space1, parse_i32).parse(i)?;
    let (i, pitch) = preceded(space1, parse_i32).parse(i)?;
    let (i, syllable) = opt(preceded(nom_char(' '), rest)).parse(i)?;
    let syllable = syllable.unwrap_or("");
    let kind = match kind {
        '*' => NoteType::Golden,
        'F' => NoteType::Freestyle,
        _ if syllable.trim() == "~" => NoteType::Slide,
        _ => NoteType::Normal,
    };
    Ok((
        i,
        NoteLine {
            kind,
            ts,
            length,
            pitch,
            syllable,
        },
    ))
}

fn sleep_line(i: &str) -> IResult<&str, (i32, Option<i32>)> {
    let (i, _) = nom_char('-').parse(i)?;
    let (i, a) = preceded(space1, parse_i32).parse(i)?;
    let (i, b) = opt(preceded(space1, parse_i32)).parse(i)?;
    Ok((i, (a, b)))
}

/// Full note pass. Re-reads the header block itself so it works both on a
/// fresh buffer and when resuming a header-loaded song.
pub fn parse_body(text: &str, song: &mut Song, engine: &mut TempoEngine) -> Result<(), ParseError> {
    let state = parse_header_lines(text, song, engine)?;
    engine.reset_note_parsing_state();

    // players 1 and 2; solo charts only ever touch the first
    let mut active: Vec<usize> = vec![1];
    let mut relative_shift = 0.0;
    let mut last_pitch: [Option<i32>; 2] = [None, None];

    for (idx, line) in text.lines().enumerate().skip(state.header_lines) {
        let line_no = idx as u32 + 1;
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.as_bytes()[0] {
            b'E' => break,
            b'B' => {
                let rest_line = &line[1..];
                let mut fields = rest_line.split_whitespace();
                let (Some(ts_raw), Some(bpm_raw)) = (fields.next(), fields.next()) else {
                    return Err(ParseError::new(
                        ParseErrorKind::MalformedField(format!("malformed tempo change: {line}")),
                        line_no,
                    ));
                };
                let ts = parse_float_value(ts_raw, line_no)?;
                let bpm = parse_float_value(bpm_raw, line_no)?;
                engine
                    .add_bpm(ts + relative_shift, bpm)
                    .map_err(|e| ParseError::new(e.kind, line_no))?;
            }
            b'P' => {
                let player: String = line[1..].chars().filter(|c| !c.is_whitespace()).collect();
                active = match player.as_str() {
                    "1" => vec![1],
                    "2" => vec![2],
                    "3" => vec![1, 2],
                    other => {
                        return Err(ParseError::new(
                            ParseErrorKind::MalformedField(format!("invalid player: P{other}")),
                            line_no,
                        ))
                    }
                };
                // each player section restarts its own clock
                relative_shift = 0.0;
                engine.prev_ts = f64::NEG_INFINITY;
                engine.prev_time = f64::NEG_INFINITY;
            }
            b'-' => {
                let (_, (a, b)) = sleep_line(line).map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::MalformedField(format!("malformed sentence break: {line}")),
                        line_no,
                    )
                })?;
                let ts = f64::from(a) + relative_shift;
                let begin = engine.ts_time(ts).map_err(|e| ParseError::new(e.kind, line_no))?;
                for &player in &active {
                    track_for(song, &state, player).push_note(Note::sleep(begin, begin));
                }
                engine.mark_end(ts);
                if state.relative {
                    relative_shift += f64::from(b.unwrap_or(a));
                }
            }
            b':' | b'*' | b'F' => {
                let (_, parsed) = note_line(line).map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::MalformedField(format!("malformed note line: {line}")),
                        line_no,
                    )
                })?;
                if parsed.length < 0 {
                    return Err(ParseError::new(
                        ParseErrorKind::MalformedField(format!(
                            "note ends before it starts: {line}"
                        )),
                        line_no,
                    ));
                }
                let ts = f64::from(parsed.ts) + relative_shift;
                let begin = engine.ts_time(ts).map_err(|e| ParseError::new(e.kind, line_no))?;
                let end = engine
                    .ts_time(ts + f64::from(parsed.length))
                    .map_err(|e| ParseError::new(e.kind, line_no))?;
                if begin < engine.prev_time {
                    return Err(ParseError::new(
                        ParseErrorKind::MalformedField("notes out of order".to_string()),
                        line_no,
                    ));
                }
                for &player in &active {
                    let pitch_prev = last_pitch[player - 1].unwrap_or(parsed.pitch);
                    last_pitch[player - 1] = Some(parsed.pitch);
                    track_for(song, &state, player).push_note(Note {
                        begin,
                        end,
                        pitch: parsed.pitch,
                        pitch_prev,
                        syllable: parsed.syllable.to_string(),
                        kind: parsed.kind,
                    });
                }
                engine.prev_ts = ts;
                engine.prev_time = begin;
                engine.mark_end(ts + f64::from(parsed.length));
            }
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::MalformedField(format!("unknown note type: {line}")),
                    line_no,
                ))
            }
        }
    }
    Ok(())
}

fn track_for<'a>(song: &'a mut Song, state: &TxtState, player: usize) -> &'a mut VocalTrack {
    let name = state.track_name(player);
    song.vocal_tracks
        .entry(name.clone())
        .or_insert_with(|| VocalTrack::new(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLO: &str = "\
#TITLE:Testing\n\
#ARTIST:Unit\n\
#BPM:120\n\
#GAP:1000\n\
: 0 4 59 So\n\
* 4 4 61 lo\n\
- 8\n\
: 8 4 2 again\n\
E\n";

    fn parse_full(text: &str) -> (Song, TempoEngine) {
        let mut song = Song::new("songs/test", "song.txt");
        let mut engine = TempoEngine::new(1.0);
        parse_body(text, &mut song, &mut engine).unwrap();
        (song, engine)
    }

    #[test]
    fn header_fields_are_assigned() {
        let mut song = Song::new("songs/test", "song.txt");
        let mut engine = TempoEngine::new(1.0);
        parse_header(SOLO, &mut song, &mut engine).unwrap();
        assert_eq!(song.title, "Testing");
        assert_eq!(song.artist, "Unit");
        assert!(song.vocal_tracks.is_empty());
    }

    #[test]
    fn note_times_follow_bpm_and_gap() {
        let (song, _) = parse_full(SOLO);
        let track = &song.vocal_tracks["P1"];
        // 120 BPM quarter-beats: 0.125 s per tick, plus 1 s GAP
        assert_eq!(track.notes[0].begin, 1.0);
        assert_eq!(track.notes[0].end, 1.5);
        assert_eq!(track.notes[1].kind, NoteType::Golden);
        assert_eq!(track.notes[2].kind, NoteType::Sleep);
    }

    #[test]
    fn mid_song_tempo_change_applies() {
        let text = "\
#TITLE:T\n#BPM:60\n\
: 0 4 10 a\n\
B 4 120\n\
: 4 4 10 b\n\
E\n";
        let (song, _) = parse_full(text);
        let notes = &song.vocal_tracks["P1"].notes;
        // 60 BPM: 0.25 s/tick for the first four ticks, then 0.125 s
        assert_eq!(notes[0].end, 1.0);
        assert_eq!(notes[1].end, 1.5);
    }

    #[test]
    fn duet_players_build_separate_tracks() {
        let text = "\
#TITLE:T\n#BPM:120\n\
P1\n\
: 0 2 5 one\n\
P2\n\
: 0 2 7 two\n\
E\n";
        let (song, _) = parse_full(text);
        assert_eq!(song.vocal_tracks.len(), 2);
        assert_eq!(song.vocal_tracks["P1"].notes[0].pitch, 5);
        assert_eq!(song.vocal_tracks["P2"].notes[0].pitch, 7);
    }

    #[test]
    fn relative_mode_accumulates_shift() {
        let text = "\
#TITLE:T\n#BPM:60\n#RELATIVE:yes\n\
: 0 4 10 a\n\
- 4 8\n\
: 0 4 10 b\n\
E\n";
        let (song, _) = parse_full(text);
        let notes = &song.vocal_tracks["P1"].notes;
        // second sentence starts 8 ticks (2 s at 60 BPM) into the song
        assert_eq!(notes[2].begin, 2.0);
    }

    #[test]
    fn out_of_order_notes_fail_hard() {
        let text = "\
#TITLE:T\n#BPM:120\n\
: 8 4 10 a\n\
: 0 4 10 b\n\
E\n";
        let mut song = Song::new("songs/test", "song.txt");
        let mut engine = TempoEngine::new(1.0);
        let err = parse_body(text, &mut song, &mut engine).unwrap_err();
        assert_eq!(err.line, 4);
        assert!(matches!(err.kind, ParseErrorKind::MalformedField(_)));
    }

    #[test]
    fn malformed_bpm_reports_raw_string() {
        let text = "#TITLE:T\n#BPM:fast\n: 0 1 1 a\nE\n";
        let mut song = Song::new("songs/test", "song.txt");
        let mut engine = TempoEngine::new(1.0);
        let err = parse_body(text, &mut song, &mut engine).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidFloat("fast".to_string()));
    }

    #[test]
    fn tilde_syllable_becomes_slide() {
        let text = "#TITLE:T\n#BPM:120\n: 0 2 10 la\n: 2 2 12 ~\nE\n";
        let (song, _) = parse_full(text);
        assert_eq!(song.vocal_tracks["P1"].notes[1].kind, NoteType::Slide);
    }

    #[test]
    fn notes_without_tempo_fail() {
        let text = "#TITLE:T\n: 0 2 10 la\nE\n";
        let mut song = Song::new("songs/test", "song.txt");
        let mut engine = TempoEngine::new(1.0);
        let err = parse_body(text, &mut song, &mut engine).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingTempo);
    }
}
