//! Vocalis - unified parser for legacy music-game chart files
//!
//! This library provides:
//! - Content-based detection of UltraStar TXT, SingStar XML, Frets on Fire
//!   INI and StepMania SM charts (file extensions are never trusted)
//! - A two-pass loading protocol: cheap header-only parses for library
//!   scanning, resumable to a full note parse later
//! - One unified song model: vocal tracks, a variable-tempo clock, a derived
//!   "Together" ensemble track and a song-wide beat grid
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use vocalis::{load_song, LoadDepth};
//!
//! let song = load_song(Path::new("songs/Some Artist - Song/notes.txt"), LoadDepth::Full).unwrap();
//! println!("{} - {}", song.artist, song.title);
//! for (name, track) in &song.vocal_tracks {
//!     println!("  {name}: {} notes", track.notes.len());
//! }
//! ```

pub mod error;
pub mod fs;
pub mod parser;
pub mod song;

// Re-export main types for convenience
pub use error::{ParseErrorKind, SongParserError};
pub use fs::{NativeFs, SongFs};
pub use parser::sniffer::ChartFormat;
pub use parser::song_parser::{load_song, SongParser, TOGETHER};
pub use parser::tempo::{TempoEngine, TempoSnapshot};
pub use song::{LoadDepth, LoadStatus, Note, NoteType, Song, VocalTrack};
