//! Session state machine.
//!
//! Disconnected -> Connecting -> AwaitingAuth -> Connected -> Disconnected.
//! Any state may fall back to Disconnected; every other move is checked.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::identity::{self, Color};
use crate::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingAuth,
    Connected,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingAuth => "awaiting_auth",
            SessionState::Connected => "connected",
        }
    }

    /// Whether a link to the server is open (authenticated or not).
    pub fn has_link(&self) -> bool {
        matches!(self, SessionState::AwaitingAuth | SessionState::Connected)
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, next),
            (_, Disconnected)
                | (Disconnected, Connecting)
                | (Connecting, AwaitingAuth)
                | (AwaitingAuth, Connected)
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    pub state: SessionState,
    pub login: Option<String>,
    #[serde(skip)]
    credential: Option<String>,
    /// Color assigned to our own login.
    pub color: Option<Color>,
    /// Our track offset relative to the first track.
    pub track_offset: Option<u32>,
    /// Color of the collaborator whose edit was applied last.
    pub current_color: Option<Color>,
    pub known_sessions: Vec<String>,
}

impl Session {
    pub fn transition(&mut self, next: SessionState) -> Result<(), ClientError> {
        if !self.state.can_transition_to(next) {
            return Err(ClientError::InvalidTransition {
                from: self.state.name(),
                to: next.name(),
            });
        }
        tracing::debug!(from = self.state.name(), to = next.name(), "session: transition");
        self.state = next;
        Ok(())
    }

    /// Handshake accepted: record credentials and assign identity.
    pub fn establish(
        &mut self,
        login: &str,
        credential: &str,
        sessions: Option<Vec<String>>,
    ) -> Result<(), ClientError> {
        self.transition(SessionState::Connected)?;
        self.login = Some(login.to_string());
        self.credential = Some(credential.to_string());
        self.color = identity::color_for(login);
        self.track_offset = identity::track_offset_for(login);
        self.current_color = self.color;
        if let Some(sessions) = sessions {
            self.known_sessions = sessions;
        }
        Ok(())
    }

    /// Back to Disconnected. Login and known sessions survive for display.
    pub fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.credential = None;
        self.color = None;
        self.track_offset = None;
        self.current_color = None;
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

/// Shared handle to one session, cloned into the sender and receiver tasks.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle(Arc<RwLock<Session>>);

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.0.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.0.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> SessionState {
        self.read().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn transition(&self, next: SessionState) -> Result<(), ClientError> {
        self.write().transition(next)
    }

    /// One-way drop to Disconnected. Returns false if already there.
    pub fn mark_disconnected(&self, reason: &str) -> bool {
        let mut session = self.write();
        if session.state == SessionState::Disconnected {
            return false;
        }
        tracing::info!(from = session.state.name(), reason, "session: disconnected");
        session.reset();
        true
    }

    pub fn set_current_color(&self, color: Option<Color>) {
        self.write().current_color = color;
    }

    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }
}
