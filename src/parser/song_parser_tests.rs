//! Cross-format parser tests driven by minimal in-memory fixtures.

use crate::error::ParseErrorKind;
use crate::fs::SongFs;
use crate::parser::song_parser::{SongParser, TOGETHER};
use crate::song::{LoadDepth, LoadStatus, NoteType, Song};
use std::io;
use std::path::Path;

struct FakeFs {
    files: Vec<String>,
}

impl FakeFs {
    fn empty() -> Self {
        FakeFs { files: Vec::new() }
    }
}

impl SongFs for FakeFs {
    fn exists(&self, path: &Path) -> bool {
        let name = path.file_name().unwrap().to_str().unwrap();
        self.files.iter().any(|f| f == name)
    }

    fn list_dir(&self, _dir: &Path) -> io::Result<Vec<String>> {
        Ok(self.files.clone())
    }
}

const TXT_DUET: &str = "\
#TITLE:Duet Song\n\
#ARTIST:Unit\n\
#GENRE:Test\n\
#BPM:120\n\
#GAP:0\n\
P1\n\
: 0 8 5 Hel\n\
: 8 8 7 lo\n\
P2\n\
: 0 4 9 Yo\n\
E\n";

const INI_BAND: &str = "\
[song]\n\
name = Band Song\n\
artist = Unit\n\
genre = Rock\n";

const XML_MELODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MELODY Tempo="120" Resolution="Semiquaver" Genre="Pop">
  <SENTENCE>
    <NOTE MidiNote="60" Duration="4" Lyric="la"/>
    <NOTE MidiNote="62" Duration="4" Lyric="la"/>
  </SENTENCE>
</MELODY>
"#;

const SM_CHART: &str = "\
#TITLE:Step Song;\n\
#ARTIST:Unit;\n\
#OFFSET:0.000;\n\
#BPMS:0.000=120.000;\n\
#NOTES:\n\
     dance-single:\n\
     author:\n\
     Easy:\n\
     3:\n\
     0.1,0.2:\n\
1000\n\
0100\n\
0010\n\
0001\n\
;\n";

fn parse_new(data: &str, filename: &str, depth: LoadDepth) -> Song {
    let fs = FakeFs::empty();
    let mut song = Song::new("songs/Unit - Fixture", filename);
    SongParser::new(&fs)
        .parse(&mut song, data.as_bytes(), depth)
        .unwrap();
    song
}

#[test]
fn header_and_full_metadata_agree_for_all_formats() {
    let fixtures = [
        (TXT_DUET, "notes.txt"),
        (INI_BAND, "song.ini"),
        (XML_MELODY, "melody.xml"),
        (SM_CHART, "song.sm"),
    ];
    for (data, filename) in fixtures {
        let header = parse_new(data, filename, LoadDepth::Header);
        let full = parse_new(data, filename, LoadDepth::Full);
        assert_eq!(header.title, full.title, "{filename}");
        assert_eq!(header.artist, full.artist, "{filename}");
        assert_eq!(header.genre, full.genre, "{filename}");
        assert_eq!(header.preview_start, full.preview_start, "{filename}");
        assert_eq!(header.cover, full.cover, "{filename}");
        assert_eq!(header.format, full.format, "{filename}");
        assert_eq!(header.load_status, LoadStatus::Header, "{filename}");
        assert_eq!(full.load_status, LoadStatus::Full, "{filename}");
    }
}

#[test]
fn resuming_a_header_load_matches_a_direct_full_load() {
    for (data, filename) in [
        (TXT_DUET, "notes.txt"),
        (XML_MELODY, "melody.xml"),
        (SM_CHART, "song.sm"),
    ] {
        let fs = FakeFs::empty();
        let parser = SongParser::new(&fs);
        let mut resumed = Song::new("songs/Unit - Fixture", filename);
        parser
            .parse(&mut resumed, data.as_bytes(), LoadDepth::Header)
            .unwrap();
        parser
            .parse(&mut resumed, data.as_bytes(), LoadDepth::Full)
            .unwrap();
        let direct = parse_new(data, filename, LoadDepth::Full);
        assert_eq!(resumed, direct, "{filename}");
        assert_eq!(resumed.load_status, LoadStatus::Full, "{filename}");
    }
}

#[test]
fn full_parse_is_idempotent_once_loaded() {
    let fs = FakeFs::empty();
    let parser = SongParser::new(&fs);
    let mut song = Song::new("songs/Unit - Fixture", "notes.txt");
    parser
        .parse(&mut song, TXT_DUET.as_bytes(), LoadDepth::Full)
        .unwrap();
    let loaded = song.clone();
    parser
        .parse(&mut song, TXT_DUET.as_bytes(), LoadDepth::Full)
        .unwrap();
    assert_eq!(song, loaded);
}

#[test]
fn duet_gets_a_together_track() {
    let song = parse_new(TXT_DUET, "notes.txt", LoadDepth::Full);
    assert_eq!(song.vocal_tracks.len(), 3);
    let together = &song.vocal_tracks[TOGETHER];
    // P2's opener starts with P1's and loses the tie; P1's second note
    // starts exactly at the emitted note's end and stays eligible
    assert_eq!(together.notes.len(), 2);
    assert_eq!(together.notes[0].pitch, song.vocal_tracks["P1"].notes[0].pitch);
    assert_eq!(together.notes[1].begin, song.vocal_tracks["P1"].notes[1].begin);
}

#[test]
fn solo_formats_get_no_together_track() {
    let song = parse_new(XML_MELODY, "melody.xml", LoadDepth::Full);
    assert!(!song.vocal_tracks.contains_key(TOGETHER));
}

#[test]
fn sm_header_load_drops_transient_notes() {
    let song = parse_new(SM_CHART, "song.sm", LoadDepth::Header);
    assert_eq!(song.title, "Step Song");
    assert!(song.beats.is_empty());
    for track in song.vocal_tracks.values() {
        assert!(track.notes.is_empty());
    }
}

#[test]
fn preview_defaults_depend_on_format() {
    let band = parse_new(INI_BAND, "song.ini", LoadDepth::Header);
    assert_eq!(band.preview_start, Some(5.0));
    let solo = parse_new(TXT_DUET, "notes.txt", LoadDepth::Header);
    assert_eq!(solo.preview_start, Some(30.0));
}

#[test]
fn declared_preview_beats_the_default() {
    let data = TXT_DUET.replace("#GAP:0\n", "#GAP:0\n#PREVIEWSTART:12.5\n");
    let song = parse_new(&data, "notes.txt", LoadDepth::Header);
    assert_eq!(song.preview_start, Some(12.5));
}

#[test]
fn assets_are_guessed_from_the_song_directory() {
    let fs = FakeFs {
        files: vec!["cover.png".to_string(), "clip.mp4".to_string()],
    };
    let mut song = Song::new("songs/Unit - Fixture", "notes.txt");
    SongParser::new(&fs)
        .parse(&mut song, TXT_DUET.as_bytes(), LoadDepth::Header)
        .unwrap();
    assert_eq!(song.cover, "cover.png");
    assert_eq!(song.video, "clip.mp4");
}

#[test]
fn undersized_buffer_is_rejected_as_not_a_chart() {
    let fs = FakeFs::empty();
    let mut song = Song::new("songs/x", "tiny.txt");
    let err = SongParser::new(&fs)
        .parse(&mut song, b"#BPM:", LoadDepth::Header)
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::WrongSize);
    assert!(err.is_not_a_chart());
}

#[test]
fn unrecognized_content_is_rejected_after_all_probes() {
    let fs = FakeFs::empty();
    let mut song = Song::new("songs/x", "noise.bin");
    let err = SongParser::new(&fs)
        .parse(&mut song, b"RIFF....WAVEfmt data", LoadDepth::Header)
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::WrongHeader);
    assert!(err.is_not_a_chart());
}

#[test]
fn failed_parse_leaves_the_song_untouched() {
    let fs = FakeFs::empty();
    let mut song = Song::new("songs/x", "notes.txt");
    let broken = "#TITLE:X\n#BPM:0\n: 0 1 1 a\nE\n";
    let err = SongParser::new(&fs)
        .parse(&mut song, broken.as_bytes(), LoadDepth::Full)
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::InvalidTempo("0".to_string()));
    assert_eq!(song.load_status, LoadStatus::Empty);
    assert!(song.vocal_tracks.is_empty());
    assert!(song.title.is_empty());
}

#[test]
fn error_carries_the_song_identity() {
    let fs = FakeFs::empty();
    let mut song = Song::new("songs/x", "noise.bin");
    let err = SongParser::new(&fs)
        .parse(&mut song, b"garbage garbage", LoadDepth::Header)
        .unwrap_err();
    assert!(err.song.ends_with("noise.bin"));
    assert_eq!(err.line, 1);
}

#[test]
fn xml_notes_survive_the_full_pipeline() {
    let song = parse_new(XML_MELODY, "melody.xml", LoadDepth::Full);
    let track = &song.vocal_tracks["P1"];
    assert_eq!(track.notes.len(), 2);
    assert!(track.notes.iter().all(|n| n.kind == NoteType::Normal));
    // 120 BPM semiquavers: 0.125 s per tick, two 4-tick notes
    assert_eq!(track.begin_time, 0.0);
    assert_eq!(track.end_time, 1.0);
    assert!(track.score_factor.is_some());
    assert!(!song.beats.is_empty());
}

#[test]
fn beat_grid_is_monotonic() {
    for (data, filename) in [(TXT_DUET, "notes.txt"), (SM_CHART, "song.sm")] {
        let song = parse_new(data, filename, LoadDepth::Full);
        assert!(
            song.beats.windows(2).all(|w| w[0] <= w[1]),
            "{filename}: beat grid must never go backwards"
        );
    }
}
