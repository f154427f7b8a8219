//! Error types for the session layer.

use playfield_types::{GameId, PlayerId, SessionId};

use crate::session::SessionState;

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session does not exist (or has already been released).
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// Every participant slot is taken.
    #[error("session {0} is full")]
    SessionFull(SessionId),

    /// The player is already signed up for a session of this game.
    #[error("player {player} is already signed up for '{game}'")]
    AlreadyJoined { player: PlayerId, game: GameId },

    /// The session is no longer accepting sign-ups.
    #[error("session {session} is not joinable ({state})")]
    NotJoinable {
        session: SessionId,
        state: SessionState,
    },

    /// The player is not a participant of this session.
    #[error("player {0} is not part of session {1}")]
    NotJoined(PlayerId, SessionId),

    /// The session is in a state that doesn't allow this operation.
    #[error("invalid session state for this operation: {0}")]
    InvalidState(String),
}
