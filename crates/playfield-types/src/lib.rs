//! Shared identity types and host-server seams for Playfield.
//!
//! Everything in here is consumed by every other Playfield crate: the
//! newtype identities that flow through the registry and session layers,
//! and the narrow traits through which the orchestration core talks to
//! the surrounding game server (announcements, player lookup, tunable
//! settings).

mod host;
mod types;

pub use host::{Announcer, PlayerDirectory, PlayerInfo, ServiceSettings};
pub use types::{GameId, PlayerId, SessionId};
