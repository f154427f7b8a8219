//! Session records and their lifecycle state machine.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use playfield_registry::GameDescriptor;
use playfield_settings::Configuration;
use playfield_types::{PlayerId, SessionId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The lifecycle state of a session.
///
/// - **Signup**: the session exists and is collecting players. The
///   configuration has not been fixed yet, so an interactive
///   customization flow can still run (and be cancelled) here.
/// - **Active**: the game is running under an immutable configuration.
/// - **Finished**: the game completed — a winner was reported, or the
///   session emptied mid-game.
/// - **Aborted**: the session never started — everyone left during
///   sign-up, or it was terminated by policy.
///
/// Finished and Aborted are terminal; the record is released once
/// post-completion bookkeeping is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Signup,
    Active,
    Finished,
    Aborted,
}

impl SessionState {
    /// Returns `true` if the session is accepting new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Signup)
    }

    /// Returns `true` if the session is running a game.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Signup, Self::Active)
                | (Self::Signup, Self::Aborted)
                | (Self::Active, Self::Finished)
                | (Self::Active, Self::Aborted)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signup => write!(f, "Signup"),
            Self::Active => write!(f, "Active"),
            Self::Finished => write!(f, "Finished"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionOrigin
// ---------------------------------------------------------------------------

/// How the session came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Created by a player invoking the game's command; anyone may join
    /// during sign-up.
    Open,

    /// Created by a challenge targeting specific players; starts
    /// immediately once the targets are in.
    Challenge { challenger: PlayerId },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One running (or pending) instance of a registered game.
///
/// The descriptor is an `Arc` snapshot taken at creation: removing the
/// game from the registry while this session runs does not affect it.
/// All mutation goes through the `SessionManager`; everything here is
/// read-only accessors.
#[derive(Debug)]
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) descriptor: Arc<GameDescriptor>,
    pub(crate) players: HashSet<PlayerId>,
    pub(crate) ready: HashSet<PlayerId>,
    pub(crate) state: SessionState,
    pub(crate) configuration: Option<Configuration>,
    pub(crate) origin: SessionOrigin,
    pub(crate) customizer: Option<PlayerId>,
    pub(crate) winner: Option<PlayerId>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn descriptor(&self) -> &Arc<GameDescriptor> {
        &self.descriptor
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn origin(&self) -> SessionOrigin {
        self.origin
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().copied()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.descriptor.maximum_players()
    }

    /// Whether the sign-up quorum has been met.
    pub fn has_quorum(&self) -> bool {
        self.players.len() >= self.descriptor.minimum_players()
    }

    /// The configuration this session runs under. `None` until the
    /// session becomes Active; immutable afterwards.
    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    /// The player who asked to customize the settings, if any. The
    /// interactive flow runs with them when the session starts.
    pub fn customizer(&self) -> Option<PlayerId> {
        self.customizer
    }

    /// The reported winner, recorded when the session finishes.
    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }
}
