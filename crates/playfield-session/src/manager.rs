//! The session manager: creates, tracks and tears down game instances.
//!
//! # Concurrency note
//!
//! `SessionManager` is not thread-safe by itself — plain `HashMap`s,
//! no interior locking. It is owned by the facade and accessed under a
//! single lock, so every check-then-act sequence in here (capacity
//! check + insert, state check + transition) is atomic as long as the
//! caller doesn't hold the manager across a suspension point.

use std::collections::HashMap;
use std::sync::Arc;

use playfield_registry::GameDescriptor;
use playfield_settings::Configuration;
use playfield_types::{GameId, PlayerId, SessionId};

use crate::error::SessionError;
use crate::session::{Session, SessionOrigin, SessionState};

/// What happened to a session when a player left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveTransition {
    /// The session continues with its remaining players.
    Left,

    /// The sign-up emptied out; the session was aborted.
    Aborted,

    /// The last player left a running game; it finished with no winner.
    Finished,
}

/// Owns every session record and enforces the lifecycle invariants.
#[derive(Default)]
pub struct SessionManager {
    /// All live sessions, keyed by session ID.
    sessions: HashMap<SessionId, Session>,

    /// Maps (game, player) to the session the player is signed up for.
    /// A player is in at most ONE session per game; sessions of
    /// different games may overlap freely.
    enrollments: HashMap<(GameId, PlayerId), SessionId>,

    /// Per-manager ID counter (no ambient global state).
    next_id: u64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new session in the Signup state from a descriptor
    /// snapshot. Joining, starting and finishing are separate steps.
    pub fn create_session(
        &mut self,
        descriptor: Arc<GameDescriptor>,
        origin: SessionOrigin,
    ) -> SessionId {
        self.next_id += 1;
        let id = SessionId(self.next_id);

        self.sessions.insert(
            id,
            Session {
                id,
                descriptor: Arc::clone(&descriptor),
                players: Default::default(),
                ready: Default::default(),
                state: SessionState::Signup,
                configuration: None,
                origin,
                customizer: None,
                winner: None,
            },
        );

        tracing::info!(session = %id, game = %descriptor.identity(), "session created");
        id
    }

    /// Signs `player` up for the session.
    ///
    /// The capacity and enrollment checks happen in the same call as the
    /// mutation: two joins racing for one remaining slot cannot both
    /// succeed.
    pub fn join(&mut self, id: SessionId, player: PlayerId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        if !session.state.is_joinable() {
            return Err(SessionError::NotJoinable {
                session: id,
                state: session.state,
            });
        }
        if session.players.len() >= session.descriptor.maximum_players() {
            return Err(SessionError::SessionFull(id));
        }

        let game = session.descriptor.identity().clone();
        if self.enrollments.contains_key(&(game.clone(), player)) {
            return Err(SessionError::AlreadyJoined { player, game });
        }

        session.players.insert(player);
        self.enrollments.insert((game, player), id);

        tracing::info!(
            session = %id,
            %player,
            players = self.sessions[&id].player_count(),
            "player joined"
        );
        Ok(())
    }

    /// Removes `player` from the session.
    ///
    /// Emptying a Signup session aborts it; emptying an Active session
    /// finishes it with no winner. The returned transition tells the
    /// caller which of those happened, if any.
    pub fn leave(
        &mut self,
        id: SessionId,
        player: PlayerId,
    ) -> Result<LeaveTransition, SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        if !session.players.remove(&player) {
            return Err(SessionError::NotJoined(player, id));
        }
        session.ready.remove(&player);
        if session.customizer == Some(player) {
            session.customizer = None;
        }
        let game = session.descriptor.identity().clone();
        self.enrollments.remove(&(game, player));

        tracing::info!(
            session = %id,
            %player,
            players = session.players.len(),
            "player left"
        );

        if !session.players.is_empty() {
            return Ok(LeaveTransition::Left);
        }

        match session.state {
            SessionState::Signup => {
                session.state = SessionState::Aborted;
                tracing::info!(session = %id, "sign-up emptied, session aborted");
                Ok(LeaveTransition::Aborted)
            }
            SessionState::Active => {
                session.state = SessionState::Finished;
                tracing::info!(session = %id, "all players gone, session finished");
                Ok(LeaveTransition::Finished)
            }
            SessionState::Finished | SessionState::Aborted => Ok(LeaveTransition::Left),
        }
    }

    /// Marks `player` as ready to start.
    ///
    /// Returns `true` when every signed-up player is ready and the
    /// quorum is met — the all-ready start condition.
    pub fn mark_ready(&mut self, id: SessionId, player: PlayerId) -> Result<bool, SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        if session.state != SessionState::Signup {
            return Err(SessionError::InvalidState(format!(
                "session {id} is {} and cannot collect readiness",
                session.state
            )));
        }
        if !session.players.contains(&player) {
            return Err(SessionError::NotJoined(player, id));
        }

        session.ready.insert(player);
        Ok(session.has_quorum() && session.ready.len() == session.players.len())
    }

    /// Records that `player` wants to customize the settings before the
    /// session starts. Cleared again if the interactive flow is
    /// cancelled, so a later start falls back to the defaults.
    pub fn request_customization(
        &mut self,
        id: SessionId,
        player: PlayerId,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        if session.state != SessionState::Signup {
            return Err(SessionError::InvalidState(format!(
                "session {id} is {} and can no longer be customized",
                session.state
            )));
        }
        if !session.players.contains(&player) {
            return Err(SessionError::NotJoined(player, id));
        }

        session.customizer = Some(player);
        Ok(())
    }

    /// Drops the pending customization request, if any.
    pub fn clear_customization(&mut self, id: SessionId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;
        session.customizer = None;
        Ok(())
    }

    /// Transitions Signup → Active, fixing the configuration.
    ///
    /// Requires the quorum to be met. The configuration is stored
    /// exactly once here and is immutable for the rest of the session's
    /// life.
    pub fn activate(
        &mut self,
        id: SessionId,
        configuration: Configuration,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        if session.state != SessionState::Signup {
            return Err(SessionError::InvalidState(format!(
                "session {id} is {} and cannot start",
                session.state
            )));
        }
        if !session.has_quorum() {
            return Err(SessionError::InvalidState(format!(
                "session {id} has {} of {} required players",
                session.players.len(),
                session.descriptor.minimum_players()
            )));
        }

        session.configuration = Some(configuration);
        session.state = SessionState::Active;

        tracing::info!(
            session = %id,
            game = %session.descriptor.identity(),
            players = session.players.len(),
            "session active"
        );
        Ok(())
    }

    /// Transitions Active → Finished with the reported winner.
    pub fn finish(
        &mut self,
        id: SessionId,
        winner: Option<PlayerId>,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        if session.state != SessionState::Active {
            return Err(SessionError::InvalidState(format!(
                "session {id} is {} and cannot finish",
                session.state
            )));
        }

        session.state = SessionState::Finished;
        session.winner = winner;

        tracing::info!(session = %id, winner = ?winner, "session finished");
        Ok(())
    }

    /// Terminates a non-terminal session (the force-removal policy path).
    pub fn abort(&mut self, id: SessionId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        if session.state.is_terminal() {
            return Err(SessionError::InvalidState(format!(
                "session {id} is already {}",
                session.state
            )));
        }

        session.state = SessionState::Aborted;
        tracing::info!(session = %id, "session aborted");
        Ok(())
    }

    /// Removes a terminal session's record, dropping its enrollments.
    ///
    /// Called once post-completion bookkeeping (result reporting,
    /// announcements) is done.
    pub fn release(&mut self, id: SessionId) -> Result<Session, SessionError> {
        let terminal = self
            .sessions
            .get(&id)
            .ok_or(SessionError::NotFound(id))?
            .state
            .is_terminal();
        if !terminal {
            let state = self.sessions[&id].state;
            return Err(SessionError::InvalidState(format!(
                "session {id} is {state} and cannot be released"
            )));
        }

        self.enrollments.retain(|_, session| *session != id);
        let session = self.sessions.remove(&id).expect("checked above");
        tracing::debug!(session = %id, "session released");
        Ok(session)
    }

    /// Terminates and releases every session of one game.
    ///
    /// This is the "stop in-progress games immediately" removal policy;
    /// it is an explicit caller decision, never implied by deregistering
    /// the game.
    pub fn stop_all_for(&mut self, identity: &GameId) -> Vec<SessionId> {
        let ids: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|session| session.descriptor.identity() == identity)
            .map(|session| session.id)
            .collect();

        for id in &ids {
            if !self.sessions[id].state.is_terminal() {
                let _ = self.abort(*id);
            }
            let _ = self.release(*id);
        }

        if !ids.is_empty() {
            tracing::info!(game = %identity, count = ids.len(), "sessions stopped");
        }
        ids
    }

    /// Looks up a session by ID.
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Finds the open sign-up session for a game, if one exists.
    ///
    /// Prefers the oldest session so concurrent sign-ups funnel into
    /// the same instance.
    pub fn find_open(&self, identity: &GameId) -> Option<SessionId> {
        self.sessions
            .values()
            .filter(|session| {
                session.descriptor.identity() == identity
                    && session.state.is_joinable()
                    && !session.is_full()
            })
            .map(|session| session.id)
            .min_by_key(|id| id.0)
    }

    /// The session `player` is signed up for in `identity`'s game.
    pub fn session_for(&self, identity: &GameId, player: PlayerId) -> Option<SessionId> {
        self.enrollments.get(&(identity.clone(), player)).copied()
    }

    /// All live sessions created from `identity`'s descriptor.
    pub fn sessions_for<'a>(
        &'a self,
        identity: &'a GameId,
    ) -> impl Iterator<Item = &'a Session> {
        self.sessions
            .values()
            .filter(move |session| session.descriptor.identity() == identity)
    }

    /// Returns the number of live session records (any state).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionManager`, covering the full state machine:
    //!   Signup → Active → Finished (or Aborted) → released

    use playfield_registry::DescriptorOptions;

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn descriptor(identity: &str, minimum: usize, maximum: usize) -> Arc<GameDescriptor> {
        Arc::new(
            GameDescriptor::new(
                DescriptorOptions::new(identity, format!("The {identity} game"))
                    .with_players(minimum, maximum),
            )
            .unwrap(),
        )
    }

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    /// A Signup session for a 1-4 player game with the given players in.
    fn signup_session(mgr: &mut SessionManager, players: &[u64]) -> SessionId {
        let id = mgr.create_session(descriptor("race", 1, 4), SessionOrigin::Open);
        for player in players {
            mgr.join(id, pid(*player)).unwrap();
        }
        id
    }

    // =====================================================================
    // create_session() / join()
    // =====================================================================

    #[test]
    fn test_create_session_starts_in_signup() {
        let mut mgr = SessionManager::new();
        let id = mgr.create_session(descriptor("race", 1, 4), SessionOrigin::Open);

        let session = mgr.get(id).unwrap();
        assert_eq!(session.state(), SessionState::Signup);
        assert_eq!(session.player_count(), 0);
        assert!(session.configuration().is_none());
    }

    #[test]
    fn test_create_session_ids_are_unique() {
        let mut mgr = SessionManager::new();
        let a = mgr.create_session(descriptor("race", 1, 4), SessionOrigin::Open);
        let b = mgr.create_session(descriptor("race", 1, 4), SessionOrigin::Open);
        assert_ne!(a, b);
    }

    #[test]
    fn test_join_fifth_player_fails_with_session_full() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1, 2, 3, 4]);

        let result = mgr.join(id, pid(5));

        assert!(matches!(result, Err(SessionError::SessionFull(s)) if s == id));
        assert_eq!(mgr.get(id).unwrap().player_count(), 4);
    }

    #[test]
    fn test_join_same_game_twice_fails_with_already_joined() {
        let mut mgr = SessionManager::new();
        let first = signup_session(&mut mgr, &[1]);
        let second = mgr.create_session(descriptor("race", 1, 4), SessionOrigin::Open);

        // Same session or a sibling session of the same game: both refused.
        assert!(matches!(
            mgr.join(first, pid(1)),
            Err(SessionError::AlreadyJoined { .. })
        ));
        assert!(matches!(
            mgr.join(second, pid(1)),
            Err(SessionError::AlreadyJoined { .. })
        ));
    }

    #[test]
    fn test_join_different_games_is_permitted() {
        let mut mgr = SessionManager::new();
        let race = mgr.create_session(descriptor("race", 1, 4), SessionOrigin::Open);
        let derby = mgr.create_session(descriptor("derby", 1, 4), SessionOrigin::Open);

        mgr.join(race, pid(1)).unwrap();
        mgr.join(derby, pid(1)).unwrap();

        assert_eq!(mgr.session_for(&GameId::from("race"), pid(1)), Some(race));
        assert_eq!(mgr.session_for(&GameId::from("derby"), pid(1)), Some(derby));
    }

    #[test]
    fn test_join_active_session_fails_with_not_joinable() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1]);
        mgr.activate(id, Configuration::default()).unwrap();

        let result = mgr.join(id, pid(2));

        assert!(matches!(
            result,
            Err(SessionError::NotJoinable { state: SessionState::Active, .. })
        ));
    }

    #[test]
    fn test_join_unknown_session_fails_with_not_found() {
        let mut mgr = SessionManager::new();
        assert!(matches!(
            mgr.join(SessionId(99), pid(1)),
            Err(SessionError::NotFound(_))
        ));
    }

    // =====================================================================
    // leave()
    // =====================================================================

    #[test]
    fn test_leave_keeps_session_alive_while_others_remain() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1, 2]);

        let transition = mgr.leave(id, pid(1)).unwrap();

        assert_eq!(transition, LeaveTransition::Left);
        assert_eq!(mgr.get(id).unwrap().state(), SessionState::Signup);
        assert_eq!(mgr.session_for(&GameId::from("race"), pid(1)), None);
    }

    #[test]
    fn test_leave_emptying_signup_aborts_never_finishes() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1]);

        let transition = mgr.leave(id, pid(1)).unwrap();

        assert_eq!(transition, LeaveTransition::Aborted);
        assert_eq!(mgr.get(id).unwrap().state(), SessionState::Aborted);
    }

    #[test]
    fn test_leave_emptying_active_finishes_without_winner() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1]);
        mgr.activate(id, Configuration::default()).unwrap();

        let transition = mgr.leave(id, pid(1)).unwrap();

        assert_eq!(transition, LeaveTransition::Finished);
        let session = mgr.get(id).unwrap();
        assert_eq!(session.state(), SessionState::Finished);
        assert_eq!(session.winner(), None);
    }

    #[test]
    fn test_leave_non_participant_fails_with_not_joined() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1]);

        assert!(matches!(
            mgr.leave(id, pid(9)),
            Err(SessionError::NotJoined(p, s)) if p == pid(9) && s == id
        ));
    }

    // =====================================================================
    // mark_ready() / activate()
    // =====================================================================

    #[test]
    fn test_mark_ready_reports_all_ready_at_quorum() {
        let mut mgr = SessionManager::new();
        let id = mgr.create_session(descriptor("derby", 2, 4), SessionOrigin::Open);
        mgr.join(id, pid(1)).unwrap();
        mgr.join(id, pid(2)).unwrap();

        assert!(!mgr.mark_ready(id, pid(1)).unwrap());
        assert!(mgr.mark_ready(id, pid(2)).unwrap());
    }

    #[test]
    fn test_mark_ready_below_quorum_is_not_all_ready() {
        let mut mgr = SessionManager::new();
        let id = mgr.create_session(descriptor("derby", 2, 4), SessionOrigin::Open);
        mgr.join(id, pid(1)).unwrap();

        // The sole player is ready, but the quorum of two is not met.
        assert!(!mgr.mark_ready(id, pid(1)).unwrap());
    }

    #[test]
    fn test_activate_fixes_configuration() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1]);

        mgr.activate(id, Configuration::default()).unwrap();

        let session = mgr.get(id).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.configuration().is_some());
    }

    #[test]
    fn test_activate_below_quorum_fails() {
        let mut mgr = SessionManager::new();
        let id = mgr.create_session(descriptor("derby", 2, 4), SessionOrigin::Open);
        mgr.join(id, pid(1)).unwrap();

        let result = mgr.activate(id, Configuration::default());

        assert!(matches!(result, Err(SessionError::InvalidState(_))));
        assert_eq!(mgr.get(id).unwrap().state(), SessionState::Signup);
    }

    #[test]
    fn test_activate_twice_fails() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1]);
        mgr.activate(id, Configuration::default()).unwrap();

        assert!(matches!(
            mgr.activate(id, Configuration::default()),
            Err(SessionError::InvalidState(_))
        ));
    }

    // =====================================================================
    // finish() / abort() / release()
    // =====================================================================

    #[test]
    fn test_finish_records_winner() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1, 2]);
        mgr.activate(id, Configuration::default()).unwrap();

        mgr.finish(id, Some(pid(2))).unwrap();

        let session = mgr.get(id).unwrap();
        assert_eq!(session.state(), SessionState::Finished);
        assert_eq!(session.winner(), Some(pid(2)));
    }

    #[test]
    fn test_finish_requires_active_state() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1]);

        assert!(matches!(
            mgr.finish(id, None),
            Err(SessionError::InvalidState(_))
        ));
    }

    #[test]
    fn test_abort_terminal_session_fails() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1]);
        mgr.abort(id).unwrap();

        assert!(matches!(mgr.abort(id), Err(SessionError::InvalidState(_))));
    }

    #[test]
    fn test_release_requires_terminal_state() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1]);

        assert!(matches!(
            mgr.release(id),
            Err(SessionError::InvalidState(_))
        ));

        mgr.abort(id).unwrap();
        let session = mgr.release(id).unwrap();
        assert_eq!(session.id(), id);
        assert!(mgr.get(id).is_none());
    }

    #[test]
    fn test_release_frees_enrollments() {
        let mut mgr = SessionManager::new();
        let id = signup_session(&mut mgr, &[1]);
        mgr.activate(id, Configuration::default()).unwrap();
        mgr.finish(id, Some(pid(1))).unwrap();
        mgr.release(id).unwrap();

        // The player can sign up for the same game again.
        let next = signup_session(&mut mgr, &[1]);
        assert_eq!(mgr.get(next).unwrap().player_count(), 1);
    }

    // =====================================================================
    // stop_all_for() / find_open() / session_for()
    // =====================================================================

    #[test]
    fn test_stop_all_for_terminates_and_releases() {
        let mut mgr = SessionManager::new();
        let signup = signup_session(&mut mgr, &[1]);
        let active = signup_session(&mut mgr, &[2]);
        mgr.activate(active, Configuration::default()).unwrap();
        let other = mgr.create_session(descriptor("derby", 1, 4), SessionOrigin::Open);

        let stopped = mgr.stop_all_for(&GameId::from("race"));

        assert_eq!(stopped.len(), 2);
        assert!(stopped.contains(&signup));
        assert!(stopped.contains(&active));
        assert!(mgr.get(signup).is_none());
        assert!(mgr.get(active).is_none());
        assert!(mgr.get(other).is_some(), "other games are untouched");
    }

    #[test]
    fn test_find_open_prefers_oldest_signup() {
        let mut mgr = SessionManager::new();
        let first = signup_session(&mut mgr, &[1]);
        let _second = signup_session(&mut mgr, &[2]);

        assert_eq!(mgr.find_open(&GameId::from("race")), Some(first));
    }

    #[test]
    fn test_find_open_skips_full_and_active_sessions() {
        let mut mgr = SessionManager::new();
        let full = signup_session(&mut mgr, &[1, 2, 3, 4]);
        let active = signup_session(&mut mgr, &[5]);
        mgr.activate(active, Configuration::default()).unwrap();

        assert_eq!(mgr.find_open(&GameId::from("race")), None);
        assert_eq!(mgr.get(full).unwrap().player_count(), 4);
    }

    #[test]
    fn test_session_for_unknown_player_is_none() {
        let mgr = SessionManager::new();
        assert_eq!(mgr.session_for(&GameId::from("race"), pid(1)), None);
    }
}
