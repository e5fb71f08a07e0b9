//! SingStar `melody.xml` reader.
//!
//! ```text
//! <MELODY Tempo="96" Resolution="Semiquaver">
//!   <TRACK Name="Player 1">
//!     <SENTENCE>
//!       <NOTE MidiNote="60" Duration="4" Lyric="Hel"/>
//!       <NOTE MidiNote="62" Duration="4" Lyric="lo" Bonus="Yes"/>
//!     </SENTENCE>
//!   </SENTENCE>
//! </MELODY>
//! ```
//!
//! Notes carry durations only; their positions are a running tick cursor per
//! track. `MidiNote="0"` is a rest. Sentence boundaries become Sleep notes so
//! downstream phrasing (and the empty-sentence collapse) works the same as
//! for line-oriented formats.

use crate::error::{ParseError, ParseErrorKind};
use crate::parser::primitive::{parse_float_value, parse_int_value};
use crate::parser::tempo::TempoEngine;
use crate::song::{Note, NoteType, Song, VocalTrack};
use roxmltree::{Document, Node};

fn melody_line(doc: &Document, node: Node) -> u32 {
    doc.text_pos_at(node.range().start).row
}

fn parse_document(text: &str) -> Result<Document<'_>, ParseError> {
    Document::parse(text).map_err(|err| {
        ParseError::new(
            ParseErrorKind::MalformedField(err.to_string()),
            err.pos().row,
        )
    })
}

fn melody_node<'a, 'input>(doc: &'a Document<'input>) -> Result<Node<'a, 'input>, ParseError> {
    doc.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "MELODY")
        .ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::MalformedField("no MELODY element".to_string()),
                1,
            )
        })
}

/// Seed the engine from the MELODY attributes.
fn seed_tempo(
    doc: &Document,
    melody: Node,
    engine: &mut TempoEngine,
) -> Result<(), ParseError> {
    let line = melody_line(doc, melody);
    let tempo_raw = melody.attribute("Tempo").ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::MalformedField("MELODY is missing a Tempo attribute".to_string()),
            line,
        )
    })?;
    let tempo = parse_float_value(tempo_raw, line)?;
    let ticks_per_beat = match melody.attribute("Resolution") {
        None | Some("Semiquaver") => 4.0,
        Some("Demisemiquaver") => 8.0,
        Some(other) => {
            return Err(ParseError::new(
                ParseErrorKind::MalformedField(format!("unknown Resolution: {other}")),
                line,
            ))
        }
    };
    engine.set_ticks_per_beat(ticks_per_beat);
    engine
        .set_global_bpm(tempo)
        .map_err(|e| ParseError::new(e.kind, line))
}

pub fn parse_header(text: &str, song: &mut Song, engine: &mut TempoEngine) -> Result<(), ParseError> {
    let doc = parse_document(text)?;
    let melody = melody_node(&doc)?;
    seed_tempo(&doc, melody, engine)?;
    if let Some(genre) = melody.attribute("Genre") {
        song.genre = genre.to_string();
    }
    if let Some(year) = melody.attribute("Year") {
        song.edition = year.to_string();
    }
    // melody.xml carries no title or artist; follow the library convention
    // of naming the song directory "Artist - Title"
    if song.title.is_empty() && song.artist.is_empty() {
        if let Some(dir) = song.path.file_name().and_then(|n| n.to_str()) {
            match dir.split_once(" - ") {
                Some((artist, title)) => {
                    song.artist = artist.trim().to_string();
                    song.title = title.trim().to_string();
                }
                None => song.title = dir.to_string(),
            }
        }
    }
    Ok(())
}

pub fn parse_body(text: &str, song: &mut Song, engine: &mut TempoEngine) -> Result<(), ParseError> {
    let doc = parse_document(text)?;
    let melody = melody_node(&doc)?;
    seed_tempo(&doc, melody, engine)?;
    engine.reset_note_parsing_state();

    let tracks: Vec<Node> = melody
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "TRACK")
        .collect();
    if tracks.is_empty() {
        // solo charts put sentences straight under MELODY
        parse_track(&doc, melody, "P1", song, engine)?;
    } else {
        for (index, track) in tracks.iter().enumerate() {
            let name = track
                .attribute("Name")
                .or_else(|| track.attribute("Artist"))
                .map_or_else(|| format!("P{}", index + 1), str::to_string);
            parse_track(&doc, *track, &name, song, engine)?;
        }
    }
    Ok(())
}

fn parse_track(
    doc: &Document,
    parent: Node,
    name: &str,
    song: &mut Song,
    engine: &mut TempoEngine,
) -> Result<(), ParseError> {
    let track = song
        .vocal_tracks
        .entry(name.to_string())
        .or_insert_with(|| VocalTrack::new(name));
    let mut cursor: f64 = 0.0;
    let mut last_pitch: Option<i32> = None;
    let mut first_sentence = true;
    for sentence in parent
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "SENTENCE")
    {
        if !first_sentence {
            let at = engine
                .ts_time(cursor)
                .map_err(|e| ParseError::new(e.kind, melody_line(doc, sentence)))?;
            track.push_note(Note::sleep(at, at));
        }
        first_sentence = false;
        for note in sentence
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "NOTE")
        {
            let line = melody_line(doc, note);
            let duration_raw = note.attribute("Duration").ok_or_else(|| {
                ParseError::new(
                    ParseErrorKind::MalformedField("NOTE is missing a Duration attribute".into()),
                    line,
                )
            })?;
            let duration = parse_int_value(duration_raw, line)?;
            if duration < 0 {
                return Err(ParseError::new(
                    ParseErrorKind::MalformedField("note ends before it starts".to_string()),
                    line,
                ));
            }
            let duration = f64::from(duration);
            let pitch = match note.attribute("MidiNote") {
                Some(raw) => parse_int_value(raw, line)?,
                None => 0,
            };
            let begin = engine
                .ts_time(cursor)
                .map_err(|e| ParseError::new(e.kind, line))?;
            let end = engine
                .ts_time(cursor + duration)
                .map_err(|e| ParseError::new(e.kind, line))?;
            if pitch == 0 {
                track.push_note(Note::sleep(begin, end));
            } else {
                let syllable = note.attribute("Lyric").unwrap_or("").to_string();
                let kind = if is_yes(note.attribute("FreeStyle")) {
                    NoteType::Freestyle
                } else if is_yes(note.attribute("Bonus")) {
                    NoteType::Golden
                } else if syllable.trim() == "~" {
                    NoteType::Slide
                } else {
                    NoteType::Normal
                };
                track.push_note(Note {
                    begin,
                    end,
                    pitch,
                    pitch_prev: last_pitch.unwrap_or(pitch),
                    syllable,
                    kind,
                });
                last_pitch = Some(pitch);
            }
            cursor += duration;
            engine.mark_end(cursor);
        }
    }
    Ok(())
}

fn is_yes(attribute: Option<&str>) -> bool {
    attribute.is_some_and(|v| v.eq_ignore_ascii_case("yes"))
}
