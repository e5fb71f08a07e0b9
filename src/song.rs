//! Unified in-memory song representation shared by all chart formats.

use crate::parser::tempo::TempoSnapshot;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How much of a song has been parsed so far.
///
/// Only ever advances forward: `Empty` → `Header` → `Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LoadStatus {
    #[default]
    Empty,
    Header,
    Full,
}

/// Depth of parse requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDepth {
    /// Metadata only; fast path for library scanning.
    Header,
    /// Metadata plus full note data.
    Full,
}

/// Kind of a vocal note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteType {
    #[default]
    Normal,
    /// Scores double.
    Golden,
    /// Sung freely, pitch not judged.
    Freestyle,
    /// Pitch glide from the previous note.
    Slide,
    /// Silent gap between sentences.
    Sleep,
}

impl NoteType {
    /// Score weight of a note of this kind, per second sung.
    pub fn score_multiplier(self) -> f64 {
        match self {
            NoteType::Normal | NoteType::Freestyle | NoteType::Slide => 1.0,
            NoteType::Golden => 2.0,
            NoteType::Sleep => 0.0,
        }
    }
}

/// One vocal note, immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Start time in absolute seconds.
    pub begin: f64,
    /// End time in absolute seconds, `begin <= end`.
    pub end: f64,
    /// Pitch as a MIDI-style note number.
    pub pitch: i32,
    /// Pitch of the preceding note, for slide detection.
    pub pitch_prev: i32,
    pub syllable: String,
    pub kind: NoteType,
}

impl Note {
    pub fn duration(&self) -> f64 {
        self.end - self.begin
    }

    /// Maximum score attainable on this note.
    pub fn max_score(&self) -> f64 {
        self.kind.score_multiplier() * self.duration()
    }

    /// Rest note spanning `begin..end`.
    pub fn sleep(begin: f64, end: f64) -> Self {
        Note {
            begin,
            end,
            pitch: 0,
            pitch_prev: 0,
            syllable: String::new(),
            kind: NoteType::Sleep,
        }
    }
}

/// A named lyric/pitch part of a song.
#[derive(Debug, Clone, PartialEq)]
pub struct VocalTrack {
    pub name: String,
    /// Notes ordered by non-decreasing start time.
    pub notes: Vec<Note>,
    /// Lowest pitch present, `i32::MAX` until a pitched note is added.
    pub note_min: i32,
    /// Highest pitch present, `i32::MIN` until a pitched note is added.
    pub note_max: i32,
    /// Start of the first note, 0.0 if empty.
    pub begin_time: f64,
    /// End of the last note, 0.0 if empty.
    pub end_time: f64,
    /// Reciprocal of the summed maximum note scores; `None` for a track
    /// with nothing scorable.
    pub score_factor: Option<f64>,
}

impl VocalTrack {
    pub fn new(name: impl Into<String>) -> Self {
        VocalTrack {
            name: name.into(),
            notes: Vec::new(),
            note_min: i32::MAX,
            note_max: i32::MIN,
            begin_time: 0.0,
            end_time: 0.0,
            score_factor: None,
        }
    }

    /// Append a note, folding its pitch into the track range.
    ///
    /// Sleep notes carry no meaningful pitch and do not affect the range.
    pub fn push_note(&mut self, note: Note) {
        if note.kind != NoteType::Sleep {
            self.note_min = self.note_min.min(note.pitch);
            self.note_max = self.note_max.max(note.pitch);
        }
        self.notes.push(note);
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Ordered map of vocal tracks, keyed by track name.
///
/// The ordering gives every track-iteration step (notably the "Together"
/// merge) a deterministic name-lexical order.
pub type VocalTracks = BTreeMap<String, VocalTrack>;

/// A song record, populated in place by the parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Song {
    /// Directory containing the chart file.
    pub path: PathBuf,
    /// Chart file name inside `path`.
    pub filename: String,
    pub load_status: LoadStatus,
    /// Format detected on first parse; reused when resuming to a full load.
    pub format: Option<crate::parser::sniffer::ChartFormat>,
    /// Tempo engine seed recorded by the header pass, consumed on resume.
    pub tempo_seed: Option<TempoSnapshot>,

    pub title: String,
    pub artist: String,
    pub genre: String,
    pub edition: String,
    pub creator: String,
    pub language: String,

    /// Cover image file name, empty if none exists.
    pub cover: String,
    /// Background image file name, empty if none exists.
    pub background: String,
    /// Video file name, empty if none exists.
    pub video: String,
    /// Audio file name as declared in the header.
    pub music: String,
    /// Video playback offset in seconds.
    pub video_gap: f64,
    /// Initial seek position in seconds.
    pub start: f64,
    /// Preview start in seconds; `None` until the header pass applies the
    /// declared value or a format default.
    pub preview_start: Option<f64>,

    pub vocal_tracks: VocalTracks,
    /// Beat grid timestamps in absolute seconds.
    pub beats: Vec<f64>,
}

impl Song {
    /// Song located at `path`/`filename`, nothing parsed yet.
    pub fn new(path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Song {
            path: path.into(),
            filename: filename.into(),
            ..Song::default()
        }
    }

    /// Full path of the chart file, used as the song identity in errors.
    pub fn chart_path(&self) -> PathBuf {
        self.path.join(&self.filename)
    }

    /// Discard note data while keeping parsed metadata.
    ///
    /// Used after a header-only pass of formats whose header cannot be read
    /// without transiently materializing notes.
    pub fn drop_notes(&mut self) {
        for track in self.vocal_tracks.values_mut() {
            track.notes.clear();
            track.notes.shrink_to_fit();
        }
        self.beats.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_status_orders_forward() {
        assert!(LoadStatus::Empty < LoadStatus::Header);
        assert!(LoadStatus::Header < LoadStatus::Full);
    }

    #[test]
    fn golden_notes_score_double() {
        let note = Note {
            begin: 1.0,
            end: 3.0,
            pitch: 12,
            pitch_prev: 10,
            syllable: "la".to_string(),
            kind: NoteType::Golden,
        };
        assert_eq!(note.max_score(), 4.0);
    }

    #[test]
    fn sleep_notes_do_not_score_or_affect_range() {
        let mut track = VocalTrack::new("P1");
        track.push_note(Note::sleep(0.0, 1.0));
        assert_eq!(track.note_min, i32::MAX);
        assert_eq!(track.note_max, i32::MIN);
        assert_eq!(track.notes[0].max_score(), 0.0);
    }

    #[test]
    fn push_note_tracks_pitch_range() {
        let mut track = VocalTrack::new("P1");
        for (pitch, kind) in [(5, NoteType::Normal), (-2, NoteType::Normal)] {
            track.push_note(Note {
                begin: 0.0,
                end: 1.0,
                pitch,
                pitch_prev: 0,
                syllable: "a".to_string(),
                kind,
            });
        }
        assert_eq!(track.note_min, -2);
        assert_eq!(track.note_max, 5);
    }
}
