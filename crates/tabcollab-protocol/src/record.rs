//! Wire records and event kinds.
//!
//! A record is an event kind plus an ordered list of string fields. On the
//! wire the kind always comes first: `PlayNote;C1.WAV;piano;Carol`.

use std::fmt;

use crate::{ProtocolError, SEPARATOR};

/// Characters that can never appear inside a kind or a field.
const RESERVED: [char; 4] = [SEPARATOR, '\n', '\r', '\0'];

/// Event kind literals observed on the wire.
pub mod kind {
    pub const PLAY_NOTE: &str = "PlayNote";
    pub const INITIAL_MODEL: &str = "PROT_atualiza_modelo_cliente_inicial";
    pub const CHAT: &str = "PROT_chat_msg";
    pub const SESSION_STARTED: &str = "PROT_inicio_sessao";
    pub const SESSION_ENDED: &str = "PROT_fim_sessao";
    pub const REMOVE_ELEMENT: &str = "PROT_remove_elemento";
    pub const SELECTION_PREFIX: &str = "SEL_";
    pub const SESSION_LIST: &str = "PROT_lista_sessoes";
    pub const NEW_SESSION: &str = "PROT_nova_sessao";
    pub const JOIN_SESSION: &str = "PROT_sessao_existente";
    pub const ERROR_PREFIX: &str = "ERRO";

    // Handshake kinds accepted by the server.
    pub const TUXGUITAR: &str = "TUXGUITAR";
    pub const ARGO: &str = "ARGO";
    pub const GEF: &str = "GEF";
}

/// One event: kind tag plus ordered fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: String,
    pub fields: Vec<String>,
}

impl Record {
    pub fn new<K, I, S>(kind: K, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Field at `index`, if present.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn event_kind(&self) -> EventKind<'_> {
        EventKind::classify(&self.kind)
    }

    /// Check that the record can be written without ambiguity.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.kind.is_empty() {
            return Err(ProtocolError::EmptyKind);
        }
        check_reserved(&self.kind, "kind")?;
        for (i, field) in self.fields.iter().enumerate() {
            check_reserved(field, &format!("field {i}"))?;
        }
        Ok(())
    }

    /// Encode to the record text, without terminator.
    pub fn to_wire(&self) -> Result<String, ProtocolError> {
        self.validate()?;
        let mut out = self.kind.clone();
        for field in &self.fields {
            out.push(SEPARATOR);
            out.push_str(field);
        }
        Ok(out)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)?;
        for field in &self.fields {
            write!(f, "{SEPARATOR}{field}")?;
        }
        Ok(())
    }
}

fn check_reserved(text: &str, part: &str) -> Result<(), ProtocolError> {
    match text.chars().find(|c| RESERVED.contains(c)) {
        Some(ch) => Err(ProtocolError::ReservedCharacter {
            ch,
            part: part.to_string(),
        }),
        None => Ok(()),
    }
}

/// Encode `fields` under `kind` as `kind;field1;...;fieldN`.
pub fn encode<S: AsRef<str>>(fields: &[S], kind: &str) -> Result<String, ProtocolError> {
    Record::new(kind, fields.iter().map(|f| f.as_ref())).to_wire()
}

/// Decode one raw frame. Trailing NUL padding and line endings are ignored.
pub fn decode(raw: &[u8]) -> Result<Record, ProtocolError> {
    let end = raw
        .iter()
        .rposition(|b| !matches!(b, b'\0' | b'\r' | b'\n'))
        .map(|i| i + 1)
        .unwrap_or(0);
    if end == 0 {
        return Err(ProtocolError::EmptyFrame);
    }

    let text = std::str::from_utf8(&raw[..end])?;
    let mut parts = text.split(SEPARATOR);
    let kind = parts.next().unwrap_or_default();
    if kind.is_empty() {
        return Err(ProtocolError::EmptyKind);
    }

    Ok(Record {
        kind: kind.to_string(),
        fields: parts.map(str::to_string).collect(),
    })
}

/// Classified event kind. Matching is by prefix, so `ERRO_LOGIN` is an
/// error and `PlayNoteV2` is a note play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind<'a> {
    PlayNote,
    InitialModel,
    Chat,
    SessionStarted,
    SessionEnded,
    RemoveElement,
    /// `SEL_<tool>`; carries the tool name.
    Selection(&'a str),
    SessionList,
    NewSession,
    JoinSession,
    Error,
    Handshake,
    Other(&'a str),
}

impl<'a> EventKind<'a> {
    pub fn classify(raw: &'a str) -> Self {
        if raw.starts_with(kind::PLAY_NOTE) {
            EventKind::PlayNote
        } else if raw.starts_with(kind::INITIAL_MODEL) {
            EventKind::InitialModel
        } else if raw.starts_with(kind::CHAT) {
            EventKind::Chat
        } else if raw.starts_with(kind::SESSION_STARTED) {
            EventKind::SessionStarted
        } else if raw.starts_with(kind::SESSION_ENDED) {
            EventKind::SessionEnded
        } else if raw.starts_with(kind::REMOVE_ELEMENT) {
            EventKind::RemoveElement
        } else if let Some(tool) = raw.strip_prefix(kind::SELECTION_PREFIX) {
            EventKind::Selection(tool)
        } else if raw.starts_with(kind::SESSION_LIST) {
            EventKind::SessionList
        } else if raw.starts_with(kind::NEW_SESSION) {
            EventKind::NewSession
        } else if raw.starts_with(kind::JOIN_SESSION) {
            EventKind::JoinSession
        } else if raw.starts_with(kind::ERROR_PREFIX) {
            EventKind::Error
        } else if raw == kind::TUXGUITAR || raw == kind::ARGO || raw == kind::GEF {
            EventKind::Handshake
        } else {
            EventKind::Other(raw)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PlayNote => "play_note",
            EventKind::InitialModel => "initial_model",
            EventKind::Chat => "chat",
            EventKind::SessionStarted => "session_started",
            EventKind::SessionEnded => "session_ended",
            EventKind::RemoveElement => "remove_element",
            EventKind::Selection(_) => "selection",
            EventKind::SessionList => "session_list",
            EventKind::NewSession => "new_session",
            EventKind::JoinSession => "join_session",
            EventKind::Error => "error",
            EventKind::Handshake => "handshake",
            EventKind::Other(_) => "other",
        }
    }
}
