//! Remote event applier -- replays inbound records onto the document.
//!
//! `PlayNote` is the only kind that edits the document: pick the player's
//! track, put the note on the first free string that can reach the pitch,
//! then advance the caret (appending a measure at the end of the song).
//! Session and chat notifications go to a `NotificationHandler`.

use std::sync::Arc;

use tabcollab_document::{
    BeatRef, Document, DocumentError, Note, TrackNumber, UndoableEdit,
};
use tabcollab_protocol::{EventKind, Record};

use crate::identity::{self, Color};
use crate::notes;

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("{kind} record has no field {index}")]
    MissingField { kind: String, index: usize },
    #[error("unknown note {0:?}")]
    UnknownNote(String),
    #[error("no free string reaches pitch {pitch} on track {track}")]
    NoEligibleString { pitch: u8, track: TrackNumber },
    #[error("document has no tracks")]
    NoTracks,
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}

/// How the caret moved after an insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorAdvance {
    /// Playback is running; the transport stepped instead.
    Transport,
    MovedRight,
    /// The caret was at the end; this measure was appended.
    MeasureAdded(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteInsertion {
    pub user: String,
    pub pitch: u8,
    pub color: Option<Color>,
    pub at: BeatRef,
    pub string: u32,
    pub fret: u8,
    pub advance: CursorAdvance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    NoteInserted(NoteInsertion),
    /// Forwarded to the notification handler.
    Notified(&'static str),
    Ignored,
}

/// Extension points for the notifications the core does not act on.
/// Every method defaults to a debug log.
pub trait NotificationHandler: Send + Sync {
    fn initial_model(&self, record: &Record) {
        tracing::debug!(sessions = ?record.fields, "applier: initial model");
    }

    fn chat(&self, record: &Record) {
        tracing::debug!(text = record.field(0).unwrap_or_default(), "applier: chat message");
    }

    fn session_started(&self, record: &Record) {
        tracing::debug!(who = record.field(0).unwrap_or_default(), "applier: user joined session");
    }

    fn session_ended(&self, record: &Record) {
        tracing::debug!(who = record.field(0).unwrap_or_default(), "applier: user left session");
    }

    fn remove_element(&self, record: &Record) {
        tracing::debug!(fields = ?record.fields, "applier: remove element");
    }

    fn selection(&self, tool: &str, record: &Record) {
        tracing::debug!(tool, fields = ?record.fields, "applier: tool selection");
    }
}

/// Handler that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl NotificationHandler for LoggingHandler {}

#[derive(Clone)]
pub struct RemoteEventApplier {
    handler: Arc<dyn NotificationHandler>,
}

impl Default for RemoteEventApplier {
    fn default() -> Self {
        Self::new(Arc::new(LoggingHandler))
    }
}

impl RemoteEventApplier {
    pub fn new(handler: Arc<dyn NotificationHandler>) -> Self {
        Self { handler }
    }

    /// Whether applying `record` touches the document (and so needs the
    /// document lock).
    pub fn needs_document(record: &Record) -> bool {
        record.event_kind() == EventKind::PlayNote
    }

    /// Apply one inbound record.
    pub fn apply(&self, doc: &mut dyn Document, record: &Record) -> Result<Applied, ApplyError> {
        match record.event_kind() {
            EventKind::PlayNote => {
                let note = required(record, 0)?;
                let user = required(record, 2)?;
                self.play_note(doc, note, user).map(Applied::NoteInserted)
            }
            _ => Ok(self.notify(record)),
        }
    }

    /// Route a notification-only record to the handler.
    pub fn notify(&self, record: &Record) -> Applied {
        match record.event_kind() {
            EventKind::InitialModel => self.handler.initial_model(record),
            EventKind::Chat => self.handler.chat(record),
            EventKind::SessionStarted => self.handler.session_started(record),
            EventKind::SessionEnded => self.handler.session_ended(record),
            EventKind::RemoveElement => self.handler.remove_element(record),
            EventKind::Selection(tool) => self.handler.selection(tool, record),
            other => {
                tracing::debug!(kind = %record.kind, class = other.name(), "applier: ignored");
                return Applied::Ignored;
            }
        }
        Applied::Notified(record.event_kind().name())
    }

    /// Insert the note `note_name` played by `user` and advance the caret.
    pub fn play_note(
        &self,
        doc: &mut dyn Document,
        note_name: &str,
        user: &str,
    ) -> Result<NoteInsertion, ApplyError> {
        let pitch =
            notes::pitch_for(note_name).ok_or_else(|| ApplyError::UnknownNote(note_name.into()))?;
        let first = doc.first_track().ok_or(ApplyError::NoTracks)?;
        let offset = identity::track_offset_for(user).unwrap_or_else(|| {
            tracing::debug!(user, "applier: unmapped identity, using first track");
            0
        });
        let track = first + offset;

        let (at, string, fret) = insert_note(doc, pitch, track, user)?;
        let advance = advance_cursor(doc)?;

        Ok(NoteInsertion {
            user: user.to_string(),
            pitch,
            color: identity::color_for(user),
            at,
            string,
            fret,
            advance,
        })
    }
}

fn required<'r>(record: &'r Record, index: usize) -> Result<&'r str, ApplyError> {
    record.field(index).ok_or_else(|| ApplyError::MissingField {
        kind: record.kind.clone(),
        index,
    })
}

/// Put `pitch` on the first string of `track` that is free at the caret and
/// whose open pitch is not above it. Records one undoable edit.
pub fn insert_note(
    doc: &mut dyn Document,
    pitch: u8,
    track: TrackNumber,
    user: &str,
) -> Result<(BeatRef, u32, u8), ApplyError> {
    doc.select_track(track)?;
    let caret = doc.caret();
    let taken: Vec<u32> = doc.caret_notes().iter().map(|n| n.string).collect();

    let target = doc
        .strings(track)?
        .into_iter()
        .find(|s| s.open_pitch <= pitch && !taken.contains(&s.number))
        .ok_or(ApplyError::NoEligibleString { pitch, track })?;

    let fret = pitch - target.open_pitch;
    let note = Note {
        fret,
        string: target.number,
        velocity: caret.velocity,
        user: user.to_string(),
    };
    let at = caret.beat();

    doc.add_note(at, note.clone(), caret.duration)?;
    doc.record_edit(UndoableEdit::NoteInserted { at, note });
    doc.mark_dirty();
    doc.refresh_view(caret.measure);

    Ok((at, target.number, fret))
}

/// Step the caret once. At the very end of the song a new measure is
/// appended as its own undoable edit.
pub fn advance_cursor(doc: &mut dyn Document) -> Result<CursorAdvance, ApplyError> {
    if doc.is_playing() {
        doc.transport_next();
        return Ok(CursorAdvance::Transport);
    }
    if doc.move_right() {
        return Ok(CursorAdvance::MovedRight);
    }

    let number = doc.measure_count() + 1;
    doc.add_measure(number)?;
    doc.record_edit(UndoableEdit::MeasureAdded { number });
    doc.refresh_view(number);
    if !doc.move_right() {
        tracing::warn!(measure = number, "applier: caret did not enter new measure");
    }
    doc.mark_dirty();
    Ok(CursorAdvance::MeasureAdded(number))
}
