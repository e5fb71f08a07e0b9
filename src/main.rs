use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use vocalis::{load_song, LoadDepth, Song, SongParserError};

fn main() {
    let result = main_result();
    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            // use Display instead of Debug for user friendly error messages
            log::error!("{err}");
            1
        }
    });
}

fn main_result() -> Result<(), SongParserError> {
    // setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("vocalis=info"))
        .init();

    let args = CliArgs::parse();
    let depth = if args.full {
        LoadDepth::Full
    } else {
        LoadDepth::Header
    };

    let mut summaries = Vec::new();
    if args.path.is_dir() {
        scan_directory(&args.path, depth, &mut summaries);
    } else {
        summaries.push(SongSummary::from(&load_song(&args.path, depth)?));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries).unwrap());
    } else {
        for summary in &summaries {
            summary.print();
        }
        println!("{} song(s)", summaries.len());
    }
    Ok(())
}

/// Try every file under `dir`; non-chart files are skipped quietly, broken
/// charts are reported but do not stop the scan.
fn scan_directory(dir: &Path, depth: LoadDepth, summaries: &mut Vec<SongSummary>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("cannot read {}: {err}", dir.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_directory(&path, depth, summaries);
        } else {
            match load_song(&path, depth) {
                Ok(song) => summaries.push(SongSummary::from(&song)),
                Err(err) if err.is_not_a_chart() => {
                    log::debug!("skipping {}", path.display());
                }
                Err(err) => log::warn!("{err}"),
            }
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArgs {
    /// Chart file, or a directory to scan recursively.
    path: PathBuf,
    /// Parse note data too instead of only the headers.
    #[arg(long, default_value_t = false)]
    full: bool,
    /// Print machine-readable JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct SongSummary {
    file: String,
    format: Option<String>,
    title: String,
    artist: String,
    genre: String,
    preview_start: Option<f64>,
    cover: String,
    video: String,
    tracks: Vec<TrackSummary>,
}

#[derive(Debug, Serialize)]
struct TrackSummary {
    name: String,
    notes: usize,
    begin: f64,
    end: f64,
}

impl From<&Song> for SongSummary {
    fn from(song: &Song) -> Self {
        SongSummary {
            file: song.chart_path().display().to_string(),
            format: song.format.map(|f| f.name().to_string()),
            title: song.title.clone(),
            artist: song.artist.clone(),
            genre: song.genre.clone(),
            preview_start: song.preview_start,
            cover: song.cover.clone(),
            video: song.video.clone(),
            tracks: song
                .vocal_tracks
                .values()
                .map(|track| TrackSummary {
                    name: track.name.clone(),
                    notes: track.notes.len(),
                    begin: track.begin_time,
                    end: track.end_time,
                })
                .collect(),
        }
    }
}

impl SongSummary {
    fn print(&self) {
        let format = self.format.as_deref().unwrap_or("?");
        println!("[{format}] {} - {}  ({})", self.artist, self.title, self.file);
        for track in &self.tracks {
            println!(
                "    {}: {} notes, {:.1}s..{:.1}s",
                track.name, track.notes, track.begin, track.end
            );
        }
    }
}
