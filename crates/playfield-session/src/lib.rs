//! Session lifecycle management for Playfield.
//!
//! A [`Session`] is one running (or pending) instance of a registered
//! game: its participants, its lifecycle state and, once started, its
//! resolved configuration. The [`SessionManager`] owns every session
//! record, enforces player-count bounds and the one-session-per-game
//! enrollment rule, and drives the state machine:
//!
//! ```text
//! Signup ──(quorum + start condition)──→ Active ──(completion)──→ Finished
//!    │                                      │
//!    └──(emptied / terminated)──→ Aborted ←─┘ (terminated)
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::{LeaveTransition, SessionManager};
pub use session::{Session, SessionOrigin, SessionState};
