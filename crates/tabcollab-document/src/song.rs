//! In-memory tablature: tracks of strings, measures of fixed-size beat grids.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    BeatRef, Caret, Document, DocumentError, GuitarString, Note, NoteDuration, Result,
    TrackNumber, UndoableEdit,
};

/// Standard guitar tuning, string 1 (high E) to string 6 (low E).
pub const STANDARD_TUNING: [u8; 6] = [64, 59, 55, 50, 45, 40];

/// Positions per measure when none is given.
pub const DEFAULT_POSITIONS_PER_MEASURE: u32 = 4;

const DEFAULT_VELOCITY: u8 = 95;

/// Most recent view refreshes kept for inspection.
pub const REFRESH_HISTORY: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct Beat {
    pub duration: NoteDuration,
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Measure {
    pub beats: BTreeMap<u32, Beat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub number: TrackNumber,
    pub name: String,
    pub strings: Vec<GuitarString>,
    pub measures: Vec<Measure>,
}

impl Track {
    /// A track tuned to `tuning`, strings numbered from 1 in the given order.
    pub fn tuned(number: TrackNumber, name: impl Into<String>, tuning: &[u8]) -> Self {
        Self {
            number,
            name: name.into(),
            strings: tuning
                .iter()
                .enumerate()
                .map(|(i, pitch)| GuitarString {
                    number: i as u32 + 1,
                    open_pitch: *pitch,
                })
                .collect(),
            measures: Vec::new(),
        }
    }
}

/// Plain in-memory document. Used by the CLI and by tests in place of a
/// live editor.
#[derive(Debug, Clone, Serialize)]
pub struct TabDocument {
    tracks: Vec<Track>,
    measure_count: u32,
    positions_per_measure: u32,
    caret: Caret,
    playing: bool,
    transport_steps: u64,
    history: Vec<UndoableEdit>,
    dirty: bool,
    refreshed: Vec<u32>,
}

impl TabDocument {
    /// Build a document from `tracks`, each given `measures` empty measures.
    /// The caret starts on the first track, measure 1, position 0.
    pub fn new(mut tracks: Vec<Track>, measures: u32, positions_per_measure: u32) -> Self {
        let measures = measures.max(1);
        for track in &mut tracks {
            track.measures = vec![Measure::default(); measures as usize];
        }
        let first = tracks.first().map(|t| t.number).unwrap_or(1);
        Self {
            tracks,
            measure_count: measures,
            positions_per_measure: positions_per_measure.max(1),
            caret: Caret {
                track: first,
                measure: 1,
                position: 0,
                duration: NoteDuration::default(),
                velocity: DEFAULT_VELOCITY,
            },
            playing: false,
            transport_steps: 0,
            history: Vec::new(),
            dirty: false,
            refreshed: Vec::new(),
        }
    }

    /// `track_count` standard-tuned six-string tracks numbered from 1.
    pub fn standard(track_count: u32, measures: u32) -> Self {
        let tracks = (1..=track_count)
            .map(|n| Track::tuned(n, format!("Guitar {n}"), &STANDARD_TUNING))
            .collect();
        Self::new(tracks, measures, DEFAULT_POSITIONS_PER_MEASURE)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn positions_per_measure(&self) -> u32 {
        self.positions_per_measure
    }

    pub fn notes_at(&self, at: BeatRef) -> Vec<Note> {
        self.beat(at)
            .map(|beat| beat.notes.clone())
            .unwrap_or_default()
    }

    pub fn beat(&self, at: BeatRef) -> Option<&Beat> {
        self.track(at.track)
            .ok()?
            .measures
            .get(at.measure.checked_sub(1)? as usize)?
            .beats
            .get(&at.position)
    }

    /// Place the caret directly. Used to restore a saved cursor.
    pub fn set_caret(&mut self, caret: Caret) -> Result<()> {
        self.track(caret.track)?;
        self.check_position(caret.measure, caret.position)?;
        self.caret = caret;
        Ok(())
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn transport_steps(&self) -> u64 {
        self.transport_steps
    }

    pub fn history(&self) -> &[UndoableEdit] {
        &self.history
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// The last `REFRESH_HISTORY` measures the view was asked to redraw,
    /// oldest first.
    pub fn refreshed_measures(&self) -> &[u32] {
        &self.refreshed
    }

    pub fn note_count(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|t| t.measures.iter())
            .flat_map(|m| m.beats.values())
            .map(|b| b.notes.len())
            .sum()
    }

    fn track(&self, number: TrackNumber) -> Result<&Track> {
        self.tracks
            .iter()
            .find(|t| t.number == number)
            .ok_or(DocumentError::NoSuchTrack(number))
    }

    fn track_mut(&mut self, number: TrackNumber) -> Result<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.number == number)
            .ok_or(DocumentError::NoSuchTrack(number))
    }

    fn check_position(&self, measure: u32, position: u32) -> Result<()> {
        if measure == 0 || measure > self.measure_count {
            return Err(DocumentError::NoSuchMeasure(measure));
        }
        if position >= self.positions_per_measure {
            return Err(DocumentError::PositionOutOfRange { measure, position });
        }
        Ok(())
    }
}

impl Document for TabDocument {
    fn first_track(&self) -> Option<TrackNumber> {
        self.tracks.first().map(|t| t.number)
    }

    fn select_track(&mut self, track: TrackNumber) -> Result<()> {
        self.track(track)?;
        self.caret.track = track;
        Ok(())
    }

    fn caret(&self) -> Caret {
        self.caret
    }

    fn strings(&self, track: TrackNumber) -> Result<Vec<GuitarString>> {
        Ok(self.track(track)?.strings.clone())
    }

    fn caret_notes(&self) -> Vec<Note> {
        self.notes_at(self.caret.beat())
    }

    fn add_note(&mut self, at: BeatRef, note: Note, duration: NoteDuration) -> Result<()> {
        self.check_position(at.measure, at.position)?;
        let track = self.track_mut(at.track)?;
        if !track.strings.iter().any(|s| s.number == note.string) {
            return Err(DocumentError::NoSuchString {
                track: at.track,
                string: note.string,
            });
        }

        let beat = track.measures[(at.measure - 1) as usize]
            .beats
            .entry(at.position)
            .or_insert_with(|| Beat {
                duration,
                notes: Vec::new(),
            });
        if beat.notes.iter().any(|n| n.string == note.string) {
            return Err(DocumentError::StringOccupied {
                measure: at.measure,
                position: at.position,
                string: note.string,
            });
        }
        beat.duration = duration;
        beat.notes.push(note);
        Ok(())
    }

    fn move_right(&mut self) -> bool {
        if self.caret.position + 1 < self.positions_per_measure {
            self.caret.position += 1;
            true
        } else if self.caret.measure < self.measure_count {
            self.caret.measure += 1;
            self.caret.position = 0;
            true
        } else {
            false
        }
    }

    fn measure_count(&self) -> u32 {
        self.measure_count
    }

    fn add_measure(&mut self, number: u32) -> Result<()> {
        if number != self.measure_count + 1 {
            return Err(DocumentError::MeasureOutOfOrder {
                requested: number,
                count: self.measure_count,
            });
        }
        for track in &mut self.tracks {
            track.measures.push(Measure::default());
        }
        self.measure_count = number;
        tracing::debug!(measure = number, "document: measure appended");
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn transport_next(&mut self) {
        self.transport_steps += 1;
    }

    fn record_edit(&mut self, edit: UndoableEdit) {
        self.history.push(edit);
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn refresh_view(&mut self, measure: u32) {
        if self.refreshed.len() == REFRESH_HISTORY {
            self.refreshed.remove(0);
        }
        self.refreshed.push(measure);
    }
}
