//! Player command dispatch: sign up, ready up, leave, cancel.
//!
//! Every runtime failure in here is converted into a player-directed
//! message at this boundary — nothing player-facing propagates as an
//! error. Each dialog or timer wait releases the state lock, and the
//! state is re-validated from scratch after every such suspension: the
//! game may have been removed, the session released, or players gone by
//! the time the wait ends.

use std::sync::Arc;
use std::time::Duration;

use playfield_registry::GameDescriptor;
use playfield_session::{LeaveTransition, SessionOrigin, SessionState};
use playfield_settings::{DialogService, Resolution};
use playfield_types::{PlayerId, SessionId};

use crate::error::PlayfieldError;
use crate::service::{CoreState, Games};

/// Service setting controlling the sign-up window, in seconds.
const SIGNUP_EXPIRATION_KEY: &str = "games/signup_expiration_sec";
const DEFAULT_SIGNUP_EXPIRATION_SECS: i64 = 20;

/// What a dispatched command ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A new sign-up was opened and the player signed up.
    SessionCreated(SessionId),

    /// The player joined an existing sign-up.
    Joined(SessionId),

    /// The session went Active.
    Started(SessionId),

    /// Readiness recorded; waiting for the remaining players.
    ReadyRecorded(SessionId),

    /// The player left their session.
    Left(SessionId),

    /// A pending customization flow was cancelled.
    FlowCancelled,

    /// The session stays in sign-up (cancelled customization, lost
    /// quorum during a dialog, failed settings resolution).
    SignupContinues(SessionId),

    /// The command does not resolve to an available game.
    Unavailable,

    /// The request was refused; the player was told why.
    Rejected,
}

/// Whether `attempt_start` may abandon a below-quorum sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuorumPolicy {
    /// Leave the sign-up open (the start condition simply hasn't fired).
    Keep,

    /// Abort and release the session (the sign-up window expired).
    AbortBelowQuorum,
}

enum CommandAction {
    Start { customize: bool },
    Ready,
    Leave,
    Cancel,
}

struct CommandInvocation {
    command: String,
    action: CommandAction,
}

impl CommandInvocation {
    /// Parses "<command> [custom|ready|leave|cancel]". Anything after an
    /// unknown sub-command is game-specific and treated as a plain start.
    fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split_whitespace();
        let command = parts.next()?.trim_start_matches('/');
        if command.is_empty() {
            return None;
        }
        let action = match parts.next() {
            Some("custom") => CommandAction::Start { customize: true },
            Some("ready") => CommandAction::Ready,
            Some("leave") => CommandAction::Leave,
            Some("cancel") => CommandAction::Cancel,
            _ => CommandAction::Start { customize: false },
        };
        Some(Self {
            command: command.to_owned(),
            action,
        })
    }
}

/// Resolves a command string to the descriptor that currently owns it.
fn resolve_game(state: &CoreState, command: &str) -> Option<Arc<GameDescriptor>> {
    state
        .router
        .resolve(command)
        .and_then(|identity| state.registry.get(identity))
}

/// Deferred work decided under the lock, executed after it's released.
enum Followup {
    None,
    StartNow(SessionId),
    ArmCountdown(SessionId),
}

impl<D: DialogService> Games<D> {
    /// Dispatches one player-issued game command.
    pub async fn handle_command(&self, player: PlayerId, input: &str) -> CommandOutcome {
        let Some(invocation) = CommandInvocation::parse(input) else {
            return CommandOutcome::Unavailable;
        };

        match invocation.action {
            CommandAction::Cancel => self.cancel_pending(player),
            CommandAction::Leave => self.leave_game(player, &invocation.command).await,
            CommandAction::Ready => self.ready_up(player, &invocation.command).await,
            CommandAction::Start { customize } => {
                self.start_or_join(player, &invocation.command, customize).await
            }
        }
    }

    /// Creates a session that challenges specific players and starts it
    /// immediately — the challenge-style start condition.
    pub async fn challenge(
        &self,
        challenger: PlayerId,
        command: &str,
        targets: &[PlayerId],
    ) -> CommandOutcome {
        let mut participants = vec![challenger];
        for target in targets {
            match self.inner.directory.get_by_id(*target) {
                Some(info) => participants.push(info.id),
                None => {
                    self.inner.announce.tell(
                        challenger,
                        &format!("Player {target} is not available for a challenge."),
                    );
                    return CommandOutcome::Rejected;
                }
            }
        }

        let session = {
            let mut state = self.inner.state.lock().await;
            let Some(descriptor) = resolve_game(&state, command) else {
                self.tell_unavailable(challenger, command);
                return CommandOutcome::Unavailable;
            };

            let session = state
                .sessions
                .create_session(Arc::clone(&descriptor), SessionOrigin::Challenge { challenger });

            for participant in &participants {
                if let Err(error) = state.sessions.join(session, *participant) {
                    let _ = state.sessions.abort(session);
                    let _ = state.sessions.release(session);
                    self.inner.announce.tell(challenger, &error.to_string());
                    return CommandOutcome::Rejected;
                }
            }

            self.inner.announce.announce(&format!(
                "{} has challenged {} other player(s) to {}!",
                self.player_name(challenger),
                targets.len(),
                descriptor.name()
            ));
            session
        };

        self.attempt_start(session, QuorumPolicy::AbortBelowQuorum)
            .await
    }

    /// Completion signal from a concrete game implementation.
    ///
    /// Finishes the session, reports the result and releases the record.
    pub async fn report_finished(
        &self,
        session: SessionId,
        winner: Option<PlayerId>,
    ) -> Result<(), PlayfieldError> {
        let mut state = self.inner.state.lock().await;
        state.sessions.finish(session, winner)?;
        self.finalize_finished(&mut state, session);
        Ok(())
    }

    // -- dispatch arms -----------------------------------------------------

    fn cancel_pending(&self, player: PlayerId) -> CommandOutcome {
        if self.inner.engine.cancel(player) {
            self.inner
                .announce
                .tell(player, "Your pending customization has been cancelled.");
            CommandOutcome::FlowCancelled
        } else {
            self.inner
                .announce
                .tell(player, "You have nothing to cancel right now.");
            CommandOutcome::Rejected
        }
    }

    async fn start_or_join(
        &self,
        player: PlayerId,
        command: &str,
        customize: bool,
    ) -> CommandOutcome {
        let (outcome, followup) = {
            let mut state = self.inner.state.lock().await;
            let Some(descriptor) = resolve_game(&state, command) else {
                self.tell_unavailable(player, command);
                return CommandOutcome::Unavailable;
            };
            let identity = descriptor.identity().clone();

            if state.sessions.session_for(&identity, player).is_some() {
                self.inner.announce.tell(
                    player,
                    &format!("You have already signed up for {}.", descriptor.name()),
                );
                return CommandOutcome::Rejected;
            }

            if let Some(session) = state.sessions.find_open(&identity) {
                if let Err(error) = state.sessions.join(session, player) {
                    self.inner.announce.tell(player, &error.to_string());
                    return CommandOutcome::Rejected;
                }
                if customize {
                    let _ = state.sessions.request_customization(session, player);
                }

                let record = state.sessions.get(session).expect("just joined");
                let full = record.is_full();
                self.inner.announce.announce(&format!(
                    "{} has signed up for {} ({}/{}).",
                    self.player_name(player),
                    descriptor.name(),
                    record.player_count(),
                    descriptor.maximum_players()
                ));

                if full {
                    // Filling the last slot fires the start condition.
                    (CommandOutcome::Joined(session), Followup::StartNow(session))
                } else {
                    (CommandOutcome::Joined(session), Followup::None)
                }
            } else {
                let session = state
                    .sessions
                    .create_session(Arc::clone(&descriptor), SessionOrigin::Open);
                state.sessions.join(session, player).expect("fresh session");
                if customize {
                    let _ = state.sessions.request_customization(session, player);
                }

                self.inner.announce.announce(&format!(
                    "{} has opened sign-up for {}! Use '/{}' to join.",
                    self.player_name(player),
                    descriptor.name(),
                    command
                ));

                let full = state.sessions.get(session).expect("fresh session").is_full();
                if full {
                    // Single-slot games start the moment they're created.
                    (CommandOutcome::SessionCreated(session), Followup::StartNow(session))
                } else {
                    (
                        CommandOutcome::SessionCreated(session),
                        Followup::ArmCountdown(session),
                    )
                }
            }
        };

        match followup {
            Followup::StartNow(session) => self.attempt_start(session, QuorumPolicy::Keep).await,
            Followup::ArmCountdown(session) => {
                self.arm_signup_countdown(session);
                outcome
            }
            Followup::None => outcome,
        }
    }

    async fn ready_up(&self, player: PlayerId, command: &str) -> CommandOutcome {
        let (session, all_ready) = {
            let mut state = self.inner.state.lock().await;
            let Some(descriptor) = resolve_game(&state, command) else {
                self.tell_unavailable(player, command);
                return CommandOutcome::Unavailable;
            };

            let Some(session) = state
                .sessions
                .session_for(descriptor.identity(), player)
            else {
                self.inner.announce.tell(
                    player,
                    &format!("You have not signed up for {}.", descriptor.name()),
                );
                return CommandOutcome::Rejected;
            };

            match state.sessions.mark_ready(session, player) {
                Ok(all_ready) => (session, all_ready),
                Err(error) => {
                    self.inner.announce.tell(player, &error.to_string());
                    return CommandOutcome::Rejected;
                }
            }
        };

        if all_ready {
            self.attempt_start(session, QuorumPolicy::Keep).await
        } else {
            self.inner
                .announce
                .tell(player, "You are ready — waiting for the other players.");
            CommandOutcome::ReadyRecorded(session)
        }
    }

    async fn leave_game(&self, player: PlayerId, command: &str) -> CommandOutcome {
        let mut state = self.inner.state.lock().await;
        let Some(descriptor) = resolve_game(&state, command) else {
            self.tell_unavailable(player, command);
            return CommandOutcome::Unavailable;
        };

        let Some(session) = state
            .sessions
            .session_for(descriptor.identity(), player)
        else {
            self.inner.announce.tell(
                player,
                &format!("You have not signed up for {}.", descriptor.name()),
            );
            return CommandOutcome::Rejected;
        };

        match state.sessions.leave(session, player) {
            Ok(LeaveTransition::Left) => {
                self.inner
                    .announce
                    .tell(player, &format!("You have left {}.", descriptor.name()));
                CommandOutcome::Left(session)
            }
            Ok(LeaveTransition::Aborted) => {
                let _ = state.sessions.release(session);
                self.inner.announce.announce(&format!(
                    "Sign-up for {} has been closed.",
                    descriptor.name()
                ));
                CommandOutcome::Left(session)
            }
            Ok(LeaveTransition::Finished) => {
                self.finalize_finished(&mut state, session);
                CommandOutcome::Left(session)
            }
            Err(error) => {
                self.inner.announce.tell(player, &error.to_string());
                CommandOutcome::Rejected
            }
        }
    }

    // -- session start pipeline --------------------------------------------

    /// Tries to move a sign-up session to Active.
    ///
    /// Resolves the configuration first — interactively when a player
    /// asked for customization, from the defaults otherwise — and then
    /// re-validates the session before activating, because the dialog
    /// wait is a suspension point and the world may have moved on.
    async fn attempt_start(&self, session: SessionId, policy: QuorumPolicy) -> CommandOutcome {
        // Phase 1: validate under the lock, snapshot what the dialog
        // phase needs.
        let (descriptor, customizer) = {
            let mut state = self.inner.state.lock().await;
            let Some(record) = state.sessions.get(session) else {
                return CommandOutcome::Unavailable;
            };
            if record.state() != SessionState::Signup {
                return CommandOutcome::Unavailable;
            }

            if !record.has_quorum() {
                match policy {
                    QuorumPolicy::Keep => return CommandOutcome::SignupContinues(session),
                    QuorumPolicy::AbortBelowQuorum => {
                        let name = record.descriptor().name().to_owned();
                        let players: Vec<PlayerId> = record.players().collect();
                        let _ = state.sessions.abort(session);
                        let _ = state.sessions.release(session);
                        for player in players {
                            self.inner.announce.tell(
                                player,
                                &format!("Not enough players signed up for {name}."),
                            );
                        }
                        return CommandOutcome::Rejected;
                    }
                }
            }

            (Arc::clone(record.descriptor()), record.customizer())
        };

        // Phase 2: resolve the configuration. The interactive path
        // suspends on the customizer's dialogs.
        let configuration = match customizer {
            Some(initiator) => {
                match self
                    .inner
                    .engine
                    .resolve_interactive(descriptor.settings(), initiator)
                    .await
                {
                    Ok(Resolution::Resolved(configuration)) => configuration,
                    Ok(Resolution::Cancelled) => {
                        // Back to sign-up, defaults next time around.
                        {
                            let mut state = self.inner.state.lock().await;
                            let _ = state.sessions.clear_customization(session);
                        }
                        self.inner.announce.tell(
                            initiator,
                            "Customization cancelled — the sign-up stays open.",
                        );
                        self.arm_signup_countdown(session);
                        return CommandOutcome::SignupContinues(session);
                    }
                    Err(error) => {
                        tracing::warn!(%session, %error, "interactive customization failed");
                        self.inner
                            .announce
                            .tell(initiator, "The game cannot start right now.");
                        self.arm_signup_countdown(session);
                        return CommandOutcome::SignupContinues(session);
                    }
                }
            }
            None => match self.inner.engine.resolve_defaults(descriptor.settings()) {
                Ok(configuration) => configuration,
                Err(error) => {
                    tracing::warn!(%session, %error, "settings resolution failed");
                    let state = self.inner.state.lock().await;
                    if let Some(record) = state.sessions.get(session) {
                        for player in record.players() {
                            self.inner
                                .announce
                                .tell(player, "The game cannot start right now.");
                        }
                    }
                    return CommandOutcome::SignupContinues(session);
                }
            },
        };

        // Phase 3: re-validate after the suspension, then activate.
        let mut state = self.inner.state.lock().await;
        let Some(record) = state.sessions.get(session) else {
            return CommandOutcome::Unavailable;
        };
        if record.state() != SessionState::Signup {
            return CommandOutcome::Unavailable;
        }

        match state.sessions.activate(session, configuration) {
            Ok(()) => {
                let record = state.sessions.get(session).expect("just activated");
                let descriptor = record.descriptor();
                self.inner.announce.announce(&format!(
                    "{} is starting with {} player(s)!{}",
                    descriptor.name(),
                    record.player_count(),
                    descriptor
                        .goal()
                        .map(|goal| format!(" Goal: {goal}"))
                        .unwrap_or_default()
                ));
                self.inner.announce.echo(
                    "game-started",
                    &format!("{} {}", descriptor.identity(), record.player_count()),
                );
                CommandOutcome::Started(session)
            }
            Err(error) => {
                // Players left during the dialog and the quorum is gone.
                tracing::debug!(%session, %error, "activation failed after customization");
                CommandOutcome::SignupContinues(session)
            }
        }
    }

    /// Starts the sign-up expiration timer for a freshly opened session.
    ///
    /// When it fires, the session is started if the quorum has been met
    /// and abandoned otherwise. The timer deliberately holds no state —
    /// `attempt_start` re-validates everything, so a stale timer for a
    /// long-gone session is harmless.
    fn arm_signup_countdown(&self, session: SessionId) {
        let delay = self
            .inner
            .settings
            .get_value(SIGNUP_EXPIRATION_KEY)
            .unwrap_or(DEFAULT_SIGNUP_EXPIRATION_SECS)
            .max(0) as u64;

        let games = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay)).await;
            let _ = games
                .attempt_start(session, QuorumPolicy::AbortBelowQuorum)
                .await;
        });
    }

    // -- helpers -----------------------------------------------------------

    fn tell_unavailable(&self, player: PlayerId, command: &str) {
        self.inner.announce.tell(
            player,
            &format!("The '/{command}' game is no longer available."),
        );
    }

    /// Reports and releases a Finished session. Callers must have
    /// transitioned it to Finished already.
    pub(crate) fn finalize_finished(&self, state: &mut CoreState, session: SessionId) {
        let Ok(record) = state.sessions.release(session) else {
            return;
        };
        let descriptor = record.descriptor();

        match record.winner() {
            Some(winner) => {
                let winner_name = self.player_name(winner);
                self.inner
                    .announce
                    .announce(&format!("{} has won {}!", winner_name, descriptor.name()));
                self.inner.announce.echo(
                    "game-finished",
                    &format!("{} {}", descriptor.identity(), winner_name),
                );
            }
            None => {
                self.inner.announce.announce(&format!(
                    "{} has finished without a winner.",
                    descriptor.name()
                ));
                self.inner
                    .announce
                    .echo("game-finished", descriptor.identity().as_str());
            }
        }
    }
}
