//! Seams through which the orchestration core reaches the host server.
//!
//! The core never touches world state, chat or persistence directly; the
//! integrating server hands it implementations of these traits at
//! construction time.

use crate::PlayerId;

/// Tunable parameters owned by the host server's settings system.
///
/// Keys are slash-separated paths ("games/signup_expiration_sec").
/// A missing key means the caller falls back to its built-in default.
pub trait ServiceSettings: Send + Sync {
    fn get_value(&self, key: &str) -> Option<i64>;
}

/// Sink for player-visible and cross-surface notifications.
pub trait Announcer: Send + Sync {
    /// Broadcasts a message to everyone on the server.
    fn announce(&self, message: &str);

    /// Sends a message to a single player.
    fn tell(&self, player: PlayerId, message: &str);

    /// Mirrors an event to an external echo channel (IRC bridge,
    /// activity feed). Tags are short kebab-case event names.
    fn echo(&self, tag: &str, payload: &str);
}

/// Minimal view of a live player, as resolved by the host server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
}

/// Resolves player identifiers to live participants.
///
/// Returns `None` for players who are not currently connected; callers
/// treat that as "target unavailable" rather than an error.
pub trait PlayerDirectory: Send + Sync {
    fn get_by_id(&self, id: PlayerId) -> Option<PlayerInfo>;
}
