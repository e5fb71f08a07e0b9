//! StepMania `.sm` chart reader.
//!
//! `#KEY:VALUE;` sections where values (notably `#NOTES`) span lines:
//!
//! ```text
//! #TITLE:Example;
//! #OFFSET:-0.230;
//! #BPMS:0.000=140.000,64.000=70.000;
//! #NOTES:
//!      dance-single:
//!      author:
//!      Hard:
//!      9:
//!      0.8,0.9,0.6,0.7,0.5:
//!      0010
//!      0001
//!      ,
//!      1000
//!      0100
//!      ;
//! ```
//!
//! Step rows become notes on a beat grid: each measure is four beats and a
//! measure's rows subdivide it evenly. Columns map to pitch numbers so the
//! unified track model applies unchanged.

use crate::error::{ParseError, ParseErrorKind};
use crate::parser::primitive::parse_float_value;
use crate::parser::tempo::TempoEngine;
use crate::song::{Note, NoteType, Song, VocalTrack};
use nom::character::complete::char as nom_char;
use nom::multi::separated_list0;
use nom::number::complete::double;
use nom::sequence::separated_pair;
use nom::{IResult, Parser};

const BEATS_PER_MEASURE: f64 = 4.0;

#[derive(Debug)]
struct Section {
    key: String,
    value: String,
    /// Line the section's value starts on.
    line: u32,
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Split the file into `#KEY:VALUE;` sections, keeping value line structure.
fn scan_sections(text: &str) -> Result<Vec<Section>, ParseError> {
    let mut sections = Vec::new();
    let mut current: Option<Section> = None;
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx as u32 + 1;
        let mut rest = strip_comment(raw.trim_end_matches('\r'));
        loop {
            match current.as_mut() {
                None => {
                    let Some(hash) = rest.find('#') else { break };
                    let after = &rest[hash + 1..];
                    let Some(colon) = after.find(':') else {
                        return Err(ParseError::new(
                            ParseErrorKind::MalformedField(format!(
                                "section key without value: {after}"
                            )),
                            line_no,
                        ));
                    };
                    current = Some(Section {
                        key: after[..colon].trim().to_ascii_uppercase(),
                        value: String::new(),
                        line: line_no,
                    });
                    rest = &after[colon + 1..];
                }
                Some(section) => {
                    if let Some(semi) = rest.find(';') {
                        section.value.push_str(&rest[..semi]);
                        sections.push(current.take().unwrap());
                        rest = &rest[semi + 1..];
                    } else {
                        section.value.push_str(rest);
                        section.value.push('\n');
                        break;
                    }
                }
            }
        }
    }
    if let Some(section) = current {
        return Err(ParseError::new(
            ParseErrorKind::TruncatedSection(format!("#{} never terminated", section.key)),
            section.line,
        ));
    }
    Ok(sections)
}

fn bpm_list(i: &str) -> IResult<&str, Vec<(f64, f64)>> {
    separated_list0(nom_char(','), separated_pair(double, nom_char('='), double)).parse(i)
}

/// Full `.sm` pass.
///
/// The header cannot be separated from the notes cheaply (sections interleave
/// freely), so the header pass runs this too and the orchestrator drops the
/// transient notes afterwards.
pub fn parse(text: &str, song: &mut Song, engine: &mut TempoEngine) -> Result<(), ParseError> {
    engine.set_ticks_per_beat(1.0);
    engine.reset_note_parsing_state();
    let sections = scan_sections(text)?;

    for section in &sections {
        let value = section.value.trim();
        match section.key.as_str() {
            "TITLE" => song.title = value.to_string(),
            "ARTIST" => song.artist = value.to_string(),
            "BANNER" => song.cover = value.to_string(),
            "BACKGROUND" => song.background = value.to_string(),
            "MUSIC" => song.music = value.to_string(),
            "OFFSET" => {
                // OFFSET is where beat 0 sits relative to the audio start
                let offset = parse_float_value(value, section.line)?;
                engine.set_offset(-offset);
            }
            "SAMPLESTART" => {
                song.preview_start = Some(parse_float_value(value, section.line)?);
            }
            "BPMS" => {
                let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
                let (rest, changes) = bpm_list(&compact).map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::MalformedField(format!("malformed #BPMS: {value}")),
                        section.line,
                    )
                })?;
                if !rest.is_empty() {
                    return Err(ParseError::new(
                        ParseErrorKind::MalformedField(format!("malformed #BPMS: {value}")),
                        section.line,
                    ));
                }
                for (beat, bpm) in changes {
                    engine
                        .add_bpm(beat, bpm)
                        .map_err(|e| ParseError::new(e.kind, section.line))?;
                }
            }
            "STOPS" => {
                if !value.is_empty() {
                    log::warn!("#STOPS are not supported, the beat clock ignores them");
                }
            }
            "NOTES" => {} // second pass, once the tempo map is complete
            _ => log::debug!("ignoring unknown SM section #{}", section.key),
        }
    }

    for section in &sections {
        if section.key == "NOTES" {
            parse_chart(section, song, engine)?;
        }
    }
    Ok(())
}

fn parse_chart(
    section: &Section,
    song: &mut Song,
    engine: &mut TempoEngine,
) -> Result<(), ParseError> {
    let mut parts = section.value.splitn(6, ':');
    let (Some(chart_type), Some(_author), Some(difficulty), Some(_meter), Some(_radar)) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(ParseError::new(
            ParseErrorKind::MalformedField("malformed #NOTES section".to_string()),
            section.line,
        ));
    };
    let Some(notedata) = parts.next() else {
        return Err(ParseError::new(
            ParseErrorKind::MalformedField("malformed #NOTES section".to_string()),
            section.line,
        ));
    };
    let name = format!("{} [{}]", chart_type.trim(), difficulty.trim());
    let data_line = section.line
        + section.value[..section.value.len() - notedata.len()]
            .matches('\n')
            .count() as u32;
    let track = song
        .vocal_tracks
        .entry(name.clone())
        .or_insert_with(|| VocalTrack::new(name));

    // rows grouped into measures by ',' separators
    let mut measures: Vec<Vec<(u32, &str)>> = vec![Vec::new()];
    for (offset, raw) in notedata.lines().enumerate() {
        let line_no = data_line + offset as u32;
        let row = raw.trim();
        if row.is_empty() {
            continue;
        }
        for piece in row.split_inclusive(',') {
            match piece.strip_suffix(',') {
                Some(last) => {
                    if !last.is_empty() {
                        measures.last_mut().unwrap().push((line_no, last));
                    }
                    measures.push(Vec::new());
                }
                None => measures.last_mut().unwrap().push((line_no, piece)),
            }
        }
    }

    // open hold per column: (start beat, line it opened on)
    let mut holds: Vec<Option<(f64, u32)>> = Vec::new();
    for (measure_idx, rows) in measures.iter().enumerate() {
        let row_count = rows.len() as f64;
        for (row_idx, &(line_no, row)) in rows.iter().enumerate() {
            let beat = measure_idx as f64 * BEATS_PER_MEASURE
                + row_idx as f64 * BEATS_PER_MEASURE / row_count;
            if holds.len() < row.chars().count() {
                holds.resize(row.chars().count(), None);
            }
            for (column, step) in row.chars().enumerate() {
                match step {
                    '0' => {}
                    '1' => {
                        let at = engine
                            .ts_time(beat)
                            .map_err(|e| ParseError::new(e.kind, line_no))?;
                        track.push_note(step_note(at, at, column));
                        engine.mark_end(beat);
                    }
                    '2' | '4' => holds[column] = Some((beat, line_no)),
                    '3' => {
                        let Some((start, _)) = holds[column].take() else {
                            return Err(ParseError::new(
                                ParseErrorKind::MalformedField(
                                    "hold tail without a matching head".to_string(),
                                ),
                                line_no,
                            ));
                        };
                        let begin = engine
                            .ts_time(start)
                            .map_err(|e| ParseError::new(e.kind, line_no))?;
                        let end = engine
                            .ts_time(beat)
                            .map_err(|e| ParseError::new(e.kind, line_no))?;
                        track.push_note(step_note(begin, end, column));
                        engine.mark_end(beat);
                    }
                    'M' | 'm' => {} // mines are not notes
                    other => {
                        return Err(ParseError::new(
                            ParseErrorKind::MalformedField(format!(
                                "invalid note character: {other}"
                            )),
                            line_no,
                        ))
                    }
                }
            }
        }
    }
    if let Some((_, line_no)) = holds.into_iter().flatten().next() {
        return Err(ParseError::new(
            ParseErrorKind::TruncatedSection("unterminated hold note".to_string()),
            line_no,
        ));
    }
    // holds are appended at their tail row, restore start-time order
    track.notes.sort_by(|a, b| a.begin.total_cmp(&b.begin));
    Ok(())
}

fn step_note(begin: f64, end: f64, column: usize) -> Note {
    Note {
        begin,
        end,
        pitch: column as i32,
        pitch_prev: column as i32,
        syllable: String::new(),
        kind: NoteType::Normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "\
#TITLE:Stepping Out;\n\
#ARTIST:The Examples;\n\
#OFFSET:0.000;\n\
#SAMPLESTART:41.060;\n\
#BPMS:0.000=120.000;\n\
#NOTES:\n\
     dance-single:\n\
     author:\n\
     Hard:\n\
     9:\n\
     0.8,0.9:\n\
1000\n\
0100\n\
0010\n\
0001\n\
,\n\
2000\n\
0000\n\
3000\n\
0000\n\
;\n";

    fn parse_full(text: &str) -> (Song, TempoEngine) {
        let mut song = Song::new("songs/sm", "song.sm");
        let mut engine = TempoEngine::new(1.0);
        parse(text, &mut song, &mut engine).unwrap();
        (song, engine)
    }

    #[test]
    fn header_fields_are_assigned() {
        let (song, _) = parse_full(FIXTURE);
        assert_eq!(song.title, "Stepping Out");
        assert_eq!(song.artist, "The Examples");
        assert_eq!(song.preview_start, Some(41.06));
    }

    #[test]
    fn rows_map_to_beats() {
        let (song, _) = parse_full(FIXTURE);
        let notes = &song.vocal_tracks["dance-single [Hard]"].notes;
        // 120 BPM: half a second per beat, four rows per measure
        assert_eq!(notes.len(), 5);
        assert_eq!(notes[0].begin, 0.0);
        assert_eq!(notes[1].begin, 0.5);
        assert_eq!(notes[3].begin, 1.5);
        assert_eq!(notes[0].pitch, 0);
        assert_eq!(notes[1].pitch, 1);
    }

    #[test]
    fn holds_span_head_to_tail() {
        let (song, _) = parse_full(FIXTURE);
        let hold = song.vocal_tracks["dance-single [Hard]"]
            .notes
            .last()
            .unwrap()
            .clone();
        // head on beat 4, tail on beat 6
        assert_eq!(hold.begin, 2.0);
        assert_eq!(hold.end, 3.0);
    }

    #[test]
    fn offset_shifts_the_clock() {
        let text = FIXTURE.replace("#OFFSET:0.000;", "#OFFSET:-0.250;");
        let (song, _) = parse_full(&text);
        let notes = &song.vocal_tracks["dance-single [Hard]"].notes;
        assert_eq!(notes[0].begin, 0.25);
    }

    #[test]
    fn unterminated_section_is_truncated() {
        let text = "#TITLE:X;\n#BPMS:0.000=120.000\n";
        let mut song = Song::new("songs/sm", "song.sm");
        let mut engine = TempoEngine::new(1.0);
        let err = parse(text, &mut song, &mut engine).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::TruncatedSection(_)));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn non_monotonic_bpms_fail() {
        let text = "#TITLE:X;\n#BPMS:8.000=120.000,4.000=90.000;\n#NOTES:a:b:c:d:e:1000\n;\n";
        let mut song = Song::new("songs/sm", "song.sm");
        let mut engine = TempoEngine::new(1.0);
        let err = parse(text, &mut song, &mut engine).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NonMonotonicTempo);
    }

    #[test]
    fn hold_without_tail_is_truncated() {
        let text = "#BPMS:0.000=120.000;\n#NOTES:a:b:c:d:e:\n2000\n0000\n;\n";
        let mut song = Song::new("songs/sm", "song.sm");
        let mut engine = TempoEngine::new(1.0);
        let err = parse(text, &mut song, &mut engine).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::TruncatedSection(_)));
    }

    #[test]
    fn taps_inside_a_hold_stay_ordered() {
        let text = "#BPMS:0.000=120.000;\n#NOTES:a:b:c:d:e:\n2000\n0100\n3000\n0000\n;\n";
        let (song, _) = parse_full(text);
        let notes = &song.vocal_tracks["a [c]"].notes;
        assert_eq!(notes.len(), 2);
        // hold head beat 0, tap beat 1, tail beat 2: hold still comes first
        assert_eq!(notes[0].begin, 0.0);
        assert_eq!(notes[0].end, 1.0);
        assert_eq!(notes[1].begin, 0.5);
    }

    #[test]
    fn mines_are_skipped() {
        let text = "#BPMS:0.000=120.000;\n#NOTES:a:b:c:d:e:\nM000\n1000\n;\n";
        let (song, _) = parse_full(text);
        assert_eq!(song.vocal_tracks["a [c]"].notes.len(), 1);
    }
}
