//! Parse orchestration: sniff, dispatch, merge, finalize.
//!
//! The flow for one song is Sniffer → header reader → (body reader →
//! Track Merger → Finalizer), with the second half only running for
//! full-depth loads. A private [`TempoEngine`] is threaded through whichever
//! reader is active, so parses of different songs never share state.

use crate::error::{ParseError, ParseErrorKind, SongParserError};
use crate::fs::{NativeFs, SongFs};
use crate::parser::encoding::normalize_utf8;
use crate::parser::sniffer::{self, ChartFormat};
use crate::parser::tempo::TempoEngine;
use crate::parser::{assets, ini, sm, txt, xml};
use crate::song::{LoadDepth, LoadStatus, Note, NoteType, Song, VocalTrack};
use std::path::Path;

/// Name of the synthesized ensemble track.
pub const TOGETHER: &str = "Together";

/// Preview default for band-mode (INI) songs.
const PREVIEW_BAND_MODE: f64 = 5.0;
/// Preview default for everything else.
const PREVIEW_DEFAULT: f64 = 30.0;

/// Chart parser bound to a filesystem view of the song directory.
pub struct SongParser<'a> {
    fs: &'a dyn SongFs,
}

impl<'a> SongParser<'a> {
    pub fn new(fs: &'a dyn SongFs) -> Self {
        SongParser { fs }
    }

    /// Advance `song` to the requested load depth from the chart buffer.
    ///
    /// All mutation is staged on a working copy and committed only on
    /// success, so a failed parse leaves `song` untouched. Parsing past the
    /// current load status is a no-op.
    pub fn parse(
        &self,
        song: &mut Song,
        data: &[u8],
        depth: LoadDepth,
    ) -> Result<(), SongParserError> {
        let mut work = song.clone();
        match self.parse_work(&mut work, data, depth) {
            Ok(()) => {
                *song = work;
                Ok(())
            }
            Err(err) => Err(SongParserError::new(
                song.chart_path().display().to_string(),
                err,
            )),
        }
    }

    fn parse_work(
        &self,
        song: &mut Song,
        data: &[u8],
        depth: LoadDepth,
    ) -> Result<(), ParseError> {
        if song.load_status == LoadStatus::Full {
            return Ok(());
        }
        if song.load_status == LoadStatus::Header {
            if depth == LoadDepth::Header {
                return Ok(());
            }
            return self.resume_full(song, data);
        }

        let format = sniffer::detect(data)?;
        log::debug!("{:?}: detected {} chart", song.chart_path(), format.name());
        song.format = Some(format);
        let text = normalize_utf8(data);
        let mut engine = TempoEngine::new(1.0);

        match format {
            ChartFormat::Txt => txt::parse_header(&text, song, &mut engine)?,
            ChartFormat::Ini => ini::parse_header(&text, song, &mut engine)?,
            ChartFormat::Xml => xml::parse_header(&text, song, &mut engine)?,
            // SM sections interleave, the header pass materializes notes too
            ChartFormat::Sm => sm::parse(&text, song, &mut engine)?,
        }
        if song.preview_start.is_none() {
            song.preview_start = Some(match format {
                ChartFormat::Ini => PREVIEW_BAND_MODE,
                _ => PREVIEW_DEFAULT,
            });
        }
        assets::resolve_assets(song, self.fs);
        song.tempo_seed = Some(engine.snapshot());
        song.load_status = LoadStatus::Header;

        if depth == LoadDepth::Header {
            if format == ChartFormat::Sm {
                // keep the metadata, free the notes
                song.drop_notes();
            }
            return Ok(());
        }

        match format {
            ChartFormat::Txt => txt::parse_body(&text, song, &mut engine)?,
            ChartFormat::Ini => ini::parse_body(&text, song, &mut engine)?,
            ChartFormat::Xml => xml::parse_body(&text, song, &mut engine)?,
            ChartFormat::Sm => {} // already fully parsed above
        }
        finalize(song, &engine)?;
        song.load_status = LoadStatus::Full;
        Ok(())
    }

    /// Header-loaded song to full depth, without re-sniffing the format.
    fn resume_full(&self, song: &mut Song, data: &[u8]) -> Result<(), ParseError> {
        let format = song.format.ok_or_else(|| {
            ParseError::no_line(ParseErrorKind::MalformedField(
                "header-loaded song has no detected format".to_string(),
            ))
        })?;
        let snapshot = song.tempo_seed.unwrap_or_default();
        let mut engine = TempoEngine::from_snapshot(&snapshot);
        let text = normalize_utf8(data);
        match format {
            ChartFormat::Txt => txt::parse_body(&text, song, &mut engine)?,
            ChartFormat::Ini => ini::parse_body(&text, song, &mut engine)?,
            ChartFormat::Xml => xml::parse_body(&text, song, &mut engine)?,
            ChartFormat::Sm => sm::parse(&text, song, &mut engine)?,
        }
        // body passes re-read declared asset names, re-validate them
        assets::resolve_assets(song, self.fs);
        finalize(song, &engine)?;
        song.load_status = LoadStatus::Full;
        Ok(())
    }
}

/// Read and parse the chart file at `path`.
pub fn load_song(path: &Path, depth: LoadDepth) -> Result<Song, SongParserError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut song = Song::new(dir, filename);
    let data = std::fs::read(path)
        .map_err(|err| SongParserError::new(path.display().to_string(), ParseError::from(err)))?;
    SongParser::new(&NativeFs).parse(&mut song, &data, depth)?;
    Ok(song)
}

/// Synthesize the "Together" track by interleaving all non-empty tracks.
///
/// Cursor merge: repeatedly emit the earliest-starting note that begins at or
/// after the previously emitted note's end, skipping concurrent later
/// phrases. Ties go to the first track in name order. Idempotent: an already
/// populated "Together" track is left alone.
pub fn vocals_together(song: &mut Song) {
    if song
        .vocal_tracks
        .get(TOGETHER)
        .is_some_and(|t| !t.notes.is_empty())
    {
        return;
    }
    let merged: Vec<Note> = {
        let sources: Vec<&VocalTrack> = song
            .vocal_tracks
            .values()
            .filter(|t| t.name != TOGETHER && !t.is_empty())
            .collect();
        if sources.len() < 2 {
            return;
        }
        let mut cursors = vec![0usize; sources.len()];
        let mut merged = Vec::new();
        let mut prev_end = f64::NEG_INFINITY;
        loop {
            // skip notes overlapping what was just emitted
            for (cursor, track) in cursors.iter_mut().zip(&sources) {
                while *cursor < track.notes.len() && track.notes[*cursor].begin < prev_end {
                    *cursor += 1;
                }
            }
            let mut best: Option<usize> = None;
            for (index, (&cursor, track)) in cursors.iter().zip(&sources).enumerate() {
                if cursor >= track.notes.len() {
                    continue;
                }
                let begin = track.notes[cursor].begin;
                let earlier = match best {
                    Some(b) => begin < sources[b].notes[cursors[b]].begin,
                    None => true,
                };
                if earlier {
                    best = Some(index);
                }
            }
            let Some(index) = best else { break };
            let note = sources[index].notes[cursors[index]].clone();
            prev_end = note.end;
            merged.push(note);
            cursors[index] += 1;
        }
        merged
    };
    let mut together = VocalTrack::new(TOGETHER);
    for note in merged {
        together.push_note(note);
    }
    song.vocal_tracks.insert(TOGETHER.to_string(), together);
}

/// Post-process all tracks after a full parse.
pub fn finalize(song: &mut Song, engine: &TempoEngine) -> Result<(), ParseError> {
    vocals_together(song);
    for track in song.vocal_tracks.values_mut() {
        // collapse empty sentences: keep the first rest, drop repeats
        let name = track.name.clone();
        let mut last_kind = NoteType::Normal;
        track.notes.retain(|note| {
            let keep = !(note.kind == NoteType::Sleep && last_kind == NoteType::Sleep);
            if !keep {
                log::warn!("discarding empty sentence in track {name}");
            }
            last_kind = note.kind;
            keep
        });

        // transpose out-of-range pitches up by whole octaves
        if !track.notes.is_empty() && track.note_min != i32::MAX && track.note_min <= 0 {
            let shift = (1 - track.note_min / 12) * 12;
            track.note_min += shift;
            track.note_max += shift;
            for note in &mut track.notes {
                note.pitch += shift;
                note.pitch_prev += shift;
            }
        }

        match (track.notes.first(), track.notes.last()) {
            (Some(first), Some(last)) => {
                track.begin_time = first.begin;
                track.end_time = last.end;
            }
            _ => {
                track.begin_time = 0.0;
                track.end_time = 0.0;
            }
        }

        let max_score: f64 = track.notes.iter().map(Note::max_score).sum();
        track.score_factor = (max_score > 0.0).then(|| 1.0 / max_score);
    }

    // song-wide beat grid from the tempo breakpoints
    if engine.has_tempo() && engine.ticks_per_beat() > 0.0 {
        let mut ts = 0.0;
        while ts < engine.ts_end() {
            song.beats.push(engine.ts_time(ts)?);
            ts += engine.ticks_per_beat();
        }
    }
    Ok(())
}
