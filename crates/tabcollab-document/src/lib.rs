//! tabcollab Document -- the document-command API the collaboration core
//! mutates, plus an in-memory tablature model implementing it.
//!
//! The editor proper (rendering, undo stack, file handling) lives elsewhere.
//! The core only needs: read the caret and the strings of a track, insert a
//! note, move the caret, append a measure, record an undoable edit, mark the
//! file dirty and ask for a view refresh.

pub mod song;

pub use song::{TabDocument, Track};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("no track {0}")]
    NoSuchTrack(TrackNumber),
    #[error("no measure {0}")]
    NoSuchMeasure(u32),
    #[error("position {position} outside measure {measure}")]
    PositionOutOfRange { measure: u32, position: u32 },
    #[error("string {string} already holds a note at measure {measure} position {position}")]
    StringOccupied {
        measure: u32,
        position: u32,
        string: u32,
    },
    #[error("track {track} has no string {string}")]
    NoSuchString { track: TrackNumber, string: u32 },
    #[error("measure {requested} cannot follow {count} existing measures")]
    MeasureOutOfOrder { requested: u32, count: u32 },
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Track numbers start at 1.
pub type TrackNumber = u32;

/// One string of a track. `number` starts at 1 (highest-pitched string).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuitarString {
    pub number: u32,
    /// MIDI pitch of the open string.
    pub open_pitch: u8,
}

/// Rhythmic value: 1 = whole, 4 = quarter, 16 = sixteenth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDuration {
    pub value: u8,
    pub dotted: bool,
}

impl Default for NoteDuration {
    fn default() -> Self {
        Self {
            value: 4,
            dotted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub fret: u8,
    pub string: u32,
    pub velocity: u8,
    /// Login of the collaborator who played the note.
    pub user: String,
}

/// A beat address: track, measure (from 1) and position inside the measure
/// (from 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatRef {
    pub track: TrackNumber,
    pub measure: u32,
    pub position: u32,
}

/// The edit cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caret {
    pub track: TrackNumber,
    pub measure: u32,
    pub position: u32,
    pub duration: NoteDuration,
    pub velocity: u8,
}

impl Caret {
    pub fn beat(&self) -> BeatRef {
        BeatRef {
            track: self.track,
            measure: self.measure,
            position: self.position,
        }
    }
}

/// One unit for the external undo/redo collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UndoableEdit {
    NoteInserted { at: BeatRef, note: Note },
    MeasureAdded { number: u32 },
}

/// Document-command API.
///
/// Implementations are not internally synchronised; callers share a
/// document behind one mutex and hold it for a whole remote edit.
pub trait Document: Send {
    /// Number of the first track, if the song has any.
    fn first_track(&self) -> Option<TrackNumber>;
    /// Move the caret to `track`, keeping measure and position.
    fn select_track(&mut self, track: TrackNumber) -> Result<()>;
    fn caret(&self) -> Caret;
    /// Strings of `track` in string-number order.
    fn strings(&self, track: TrackNumber) -> Result<Vec<GuitarString>>;
    /// Notes currently on the beat under the caret.
    fn caret_notes(&self) -> Vec<Note>;
    fn add_note(&mut self, at: BeatRef, note: Note, duration: NoteDuration) -> Result<()>;
    /// Move the caret one position right. False at the song's last position.
    fn move_right(&mut self) -> bool;
    fn measure_count(&self) -> u32;
    /// Append measure `number` to every track. Must be `measure_count() + 1`.
    fn add_measure(&mut self, number: u32) -> Result<()>;
    fn is_playing(&self) -> bool;
    /// Ask the playback transport for the next position.
    fn transport_next(&mut self);
    fn record_edit(&mut self, edit: UndoableEdit);
    fn mark_dirty(&mut self);
    fn refresh_view(&mut self, measure: u32);
}
