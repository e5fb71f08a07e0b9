//! Tempo timeline and score-position to wall-clock conversion.
//!
//! Every supported format reduces to "BPM changes on a position timeline":
//! positions come in format-native ticks (UltraStar quarter-beats, SingStar
//! resolution ticks, StepMania beats) and are converted to absolute seconds
//! by integrating across the tempo breakpoints recorded so far.

use crate::error::{ParseError, ParseErrorKind};
use serde::{Deserialize, Serialize};

/// A tempo change: from position `ts` onward, play at `bpm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub ts: f64,
    pub bpm: f64,
    /// Absolute seconds at `ts`, cached when the breakpoint is appended.
    begin: f64,
}

/// The part of the engine state a header pass must persist so that a
/// header-loaded song can later resume to a full parse with an identically
/// seeded clock.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TempoSnapshot {
    /// Single declared tempo for formats without per-note tempo changes.
    pub bpm: Option<f64>,
    /// Seconds added to every converted position (GAP / negated SM offset).
    pub offset: f64,
    pub ticks_per_beat: f64,
}

/// Stateful position-to-time converter, one private instance per parse.
#[derive(Debug, Clone)]
pub struct TempoEngine {
    bpms: Vec<Breakpoint>,
    /// Seconds at position 0.
    offset: f64,
    /// Format-native ticks per musical beat.
    ticks_per_beat: f64,
    /// Constant tempo declared by the header, if any; re-seeds the table on
    /// reset.
    global_bpm: Option<f64>,
    /// Position of the most recently placed note, for ordering checks.
    pub prev_ts: f64,
    /// Time of the most recently placed note.
    pub prev_time: f64,
    /// Highest position seen; upper bound of the beat grid.
    ts_end: f64,
}

impl TempoEngine {
    pub fn new(ticks_per_beat: f64) -> Self {
        TempoEngine {
            bpms: Vec::new(),
            offset: 0.0,
            ticks_per_beat,
            global_bpm: None,
            prev_ts: f64::NEG_INFINITY,
            prev_time: f64::NEG_INFINITY,
            ts_end: 0.0,
        }
    }

    pub fn from_snapshot(snapshot: &TempoSnapshot) -> Self {
        let mut engine = TempoEngine::new(if snapshot.ticks_per_beat > 0.0 {
            snapshot.ticks_per_beat
        } else {
            1.0
        });
        engine.offset = snapshot.offset;
        engine.global_bpm = snapshot.bpm;
        engine
    }

    pub fn snapshot(&self) -> TempoSnapshot {
        TempoSnapshot {
            bpm: self.global_bpm,
            offset: self.offset,
            ticks_per_beat: self.ticks_per_beat,
        }
    }

    /// Record the single header-declared tempo. Also seeds breakpoint 0.
    pub fn set_global_bpm(&mut self, bpm: f64) -> Result<(), ParseError> {
        self.global_bpm = Some(bpm);
        if self.bpms.is_empty() {
            self.add_bpm(0.0, bpm)?;
        }
        Ok(())
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    pub fn set_ticks_per_beat(&mut self, ticks_per_beat: f64) {
        self.ticks_per_beat = ticks_per_beat;
    }

    pub fn ticks_per_beat(&self) -> f64 {
        self.ticks_per_beat
    }

    pub fn ts_end(&self) -> f64 {
        self.ts_end
    }

    /// Extend the beat-grid bound to cover `ts`.
    pub fn mark_end(&mut self, ts: f64) {
        if ts > self.ts_end {
            self.ts_end = ts;
        }
    }

    /// Append a tempo breakpoint.
    ///
    /// Positions must be non-decreasing; a breakpoint at the exact position
    /// of the previous one replaces it.
    pub fn add_bpm(&mut self, ts: f64, bpm: f64) -> Result<(), ParseError> {
        if !(bpm > 0.0 && bpm.is_finite()) {
            return Err(ParseErrorKind::InvalidTempo(bpm.to_string()).into());
        }
        if let Some(last) = self.bpms.last() {
            if ts < last.ts {
                return Err(ParseErrorKind::NonMonotonicTempo.into());
            }
            if ts == last.ts {
                self.bpms.pop();
            }
        }
        let begin = match self.bpms.last() {
            Some(prev) => prev.begin + self.interval_seconds(prev, ts),
            None => 0.0,
        };
        self.bpms.push(Breakpoint { ts, bpm, begin });
        Ok(())
    }

    /// Seconds elapsed between `from.ts` and `to_ts` at `from`'s tempo.
    fn interval_seconds(&self, from: &Breakpoint, to_ts: f64) -> f64 {
        (to_ts - from.ts) / self.ticks_per_beat / from.bpm * 60.0
    }

    /// Convert a score position to absolute seconds.
    pub fn ts_time(&self, ts: f64) -> Result<f64, ParseError> {
        let first = self
            .bpms
            .first()
            .ok_or_else(|| ParseError::no_line(ParseErrorKind::MissingTempo))?;
        // positions before the first breakpoint extrapolate at its tempo
        let active = self
            .bpms
            .iter()
            .rev()
            .find(|bp| bp.ts <= ts)
            .unwrap_or(first);
        Ok(self.offset + active.begin + self.interval_seconds(active, ts))
    }

    /// Clear the timeline and cursors for a fresh note-parsing pass,
    /// re-seeding position 0 with the header-declared tempo if one exists.
    pub fn reset_note_parsing_state(&mut self) {
        self.bpms.clear();
        self.prev_ts = f64::NEG_INFINITY;
        self.prev_time = f64::NEG_INFINITY;
        self.ts_end = 0.0;
        if let Some(bpm) = self.global_bpm {
            // the seed tempo already passed validation once
            let _ = self.add_bpm(0.0, bpm);
        }
    }

    pub fn has_tempo(&self) -> bool {
        !self.bpms.is_empty()
    }
}
