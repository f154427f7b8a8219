//! Integration tests for the Games service using mock host collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use playfield::prelude::*;
use playfield::RemovalPolicy;
use playfield_settings::DialogError;

// =========================================================================
// Mock collaborators
// =========================================================================

/// Records everything sent through the announcement seam.
#[derive(Default)]
struct RecordingAnnouncer {
    broadcasts: Mutex<Vec<String>>,
    tells: Mutex<Vec<(PlayerId, String)>>,
    echoes: Mutex<Vec<(String, String)>>,
}

impl RecordingAnnouncer {
    fn broadcast_containing(&self, needle: &str) -> bool {
        self.broadcasts
            .lock()
            .unwrap()
            .iter()
            .any(|message| message.contains(needle))
    }

    fn told_containing(&self, player: PlayerId, needle: &str) -> bool {
        self.tells
            .lock()
            .unwrap()
            .iter()
            .any(|(recipient, message)| *recipient == player && message.contains(needle))
    }

    fn echoed(&self, tag: &str) -> bool {
        self.echoes
            .lock()
            .unwrap()
            .iter()
            .any(|(echo_tag, _)| echo_tag == tag)
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(&self, message: &str) {
        self.broadcasts.lock().unwrap().push(message.to_owned());
    }

    fn tell(&self, player: PlayerId, message: &str) {
        self.tells
            .lock()
            .unwrap()
            .push((player, message.to_owned()));
    }

    fn echo(&self, tag: &str, payload: &str) {
        self.echoes
            .lock()
            .unwrap()
            .push((tag.to_owned(), payload.to_owned()));
    }
}

/// A fixed roster of connected players.
struct StaticDirectory {
    players: HashMap<PlayerId, String>,
}

impl StaticDirectory {
    fn with_players(count: u64) -> Self {
        Self {
            players: (1..=count)
                .map(|id| (PlayerId(id), format!("Player{id}")))
                .collect(),
        }
    }
}

impl PlayerDirectory for StaticDirectory {
    fn get_by_id(&self, id: PlayerId) -> Option<PlayerInfo> {
        self.players.get(&id).map(|name| PlayerInfo {
            id,
            name: name.clone(),
        })
    }
}

/// Settings map; anything absent falls back to the caller's default.
struct MapSettings {
    values: HashMap<String, i64>,
}

impl MapSettings {
    fn new(values: &[(&str, i64)]) -> Self {
        Self {
            values: values
                .iter()
                .map(|(key, value)| ((*key).to_owned(), *value))
                .collect(),
        }
    }
}

impl ServiceSettings for MapSettings {
    fn get_value(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }
}

/// Replays a script of dialog responses, dismissing once exhausted.
#[derive(Default)]
struct ScriptedDialog {
    responses: Mutex<VecDeque<DialogResponse>>,
}

impl ScriptedDialog {
    fn new(responses: Vec<DialogResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

impl DialogService for ScriptedDialog {
    async fn prompt(
        &self,
        _player: PlayerId,
        _request: DialogRequest,
    ) -> Result<DialogResponse, DialogError> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DialogResponse::Dismissed))
    }
}

/// Replays a script, then never answers — parks a flow mid-dialog.
struct HangingDialog {
    responses: Mutex<VecDeque<DialogResponse>>,
}

impl HangingDialog {
    fn new(responses: Vec<DialogResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

impl DialogService for HangingDialog {
    async fn prompt(
        &self,
        _player: PlayerId,
        _request: DialogRequest,
    ) -> Result<DialogResponse, DialogError> {
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => Ok(response),
            None => std::future::pending().await,
        }
    }
}

// =========================================================================
// Helpers
// =========================================================================

struct Harness<D: DialogService> {
    games: Games<D>,
    announcer: Arc<RecordingAnnouncer>,
}

/// A service with a long sign-up window, so countdowns never interfere
/// with a test unless the test asks for them.
fn harness<D: DialogService>(dialogs: D) -> Harness<D> {
    harness_with_expiration(dialogs, 3600)
}

fn harness_with_expiration<D: DialogService>(dialogs: D, expiration_secs: i64) -> Harness<D> {
    let announcer = Arc::new(RecordingAnnouncer::default());
    let games = Games::new(
        dialogs,
        Arc::clone(&announcer) as Arc<dyn Announcer>,
        Arc::new(StaticDirectory::with_players(8)),
        Arc::new(MapSettings::new(&[(
            "games/signup_expiration_sec",
            expiration_secs,
        )])),
    );
    Harness { games, announcer }
}

fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

fn race_options(minimum: usize, maximum: usize) -> DescriptorOptions {
    DescriptorOptions::new("race", "Race")
        .with_command("race")
        .with_goal("Complete the track in the shortest possible time.")
        .with_players(minimum, maximum)
}

async fn register_race<D: DialogService>(harness: &Harness<D>, minimum: usize, maximum: usize) {
    harness
        .games
        .register_game(race_options(minimum, maximum))
        .await
        .unwrap();
}

// =========================================================================
// Registration and command lifecycle
// =========================================================================

#[tokio::test]
async fn test_register_makes_command_invokable() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;

    let outcome = h.games.handle_command(pid(1), "race").await;

    assert!(matches!(outcome, CommandOutcome::SessionCreated(_)));
    assert!(h.announcer.broadcast_containing("opened sign-up for Race"));
}

#[tokio::test]
async fn test_register_duplicate_identity_fails_and_first_survives() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;

    let result = h
        .games
        .register_game(DescriptorOptions::new("race", "Race again").with_command("race2"))
        .await;

    assert!(matches!(
        result,
        Err(PlayfieldError::Registry(_))
    ));
    assert_eq!(h.games.games().await.len(), 1);
    assert!(matches!(
        h.games.handle_command(pid(1), "race").await,
        CommandOutcome::SessionCreated(_)
    ));
}

#[tokio::test]
async fn test_register_duplicate_command_keeps_first_binding() {
    let h = harness(ScriptedDialog::default());
    h.games
        .register_game(
            DescriptorOptions::new("game-a", "Game A")
                .with_command("firstgame")
                .with_players(2, 4),
        )
        .await
        .unwrap();

    let result = h
        .games
        .register_game(
            DescriptorOptions::new("game-b", "Game B")
                .with_command("firstgame")
                .with_players(2, 4),
        )
        .await;
    assert!(result.is_err());

    // Game A's binding is unaffected; Game B never made it in.
    let outcome = h.games.handle_command(pid(1), "firstgame").await;
    assert!(matches!(outcome, CommandOutcome::SessionCreated(_)));
    assert!(h.announcer.broadcast_containing("Game A"));
    assert!(h.games.game(&GameId::from("game-b")).await.is_none());
}

#[tokio::test]
async fn test_remove_game_makes_command_unavailable() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;

    h.games
        .remove_game(&GameId::from("race"), RemovalPolicy::KeepSessions)
        .await
        .unwrap();

    let outcome = h.games.handle_command(pid(1), "race").await;
    assert_eq!(outcome, CommandOutcome::Unavailable);
    assert!(h.announcer.told_containing(pid(1), "no longer available"));

    // Removing again fails, and lookups stay absent with no side effects.
    let result = h
        .games
        .remove_game(&GameId::from("race"), RemovalPolicy::KeepSessions)
        .await;
    assert!(matches!(result, Err(PlayfieldError::Registry(_))));
    assert!(h.games.game(&GameId::from("race")).await.is_none());
    assert!(h.games.game(&GameId::from("race")).await.is_none());
}

#[tokio::test]
async fn test_invalid_descriptor_is_rejected_loudly() {
    let h = harness(ScriptedDialog::default());

    let result = h
        .games
        .register_game(DescriptorOptions::new("race", "Race").with_players(3, 2))
        .await;

    assert!(matches!(result, Err(PlayfieldError::Descriptor(_))));
    assert!(h.games.games().await.is_empty());
}

// =========================================================================
// Sign-up and start conditions
// =========================================================================

#[tokio::test]
async fn test_second_player_joins_existing_signup() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 3, 4).await;

    let created = h.games.handle_command(pid(1), "race").await;
    let joined = h.games.handle_command(pid(2), "race").await;

    let CommandOutcome::SessionCreated(session) = created else {
        panic!("expected a new session, got {created:?}");
    };
    assert_eq!(joined, CommandOutcome::Joined(session));
    assert_eq!(h.games.session_players(session).await.len(), 2);
    assert_eq!(
        h.games.session_state(session).await,
        Some(SessionState::Signup)
    );
}

#[tokio::test]
async fn test_double_signup_is_rejected() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;

    h.games.handle_command(pid(1), "race").await;
    let outcome = h.games.handle_command(pid(1), "race").await;

    assert_eq!(outcome, CommandOutcome::Rejected);
    assert!(h.announcer.told_containing(pid(1), "already signed up"));
}

#[tokio::test]
async fn test_filling_last_slot_starts_the_game() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 2).await;

    let created = h.games.handle_command(pid(1), "race").await;
    let CommandOutcome::SessionCreated(session) = created else {
        panic!("expected a new session");
    };

    let outcome = h.games.handle_command(pid(2), "race").await;

    assert_eq!(outcome, CommandOutcome::Started(session));
    assert_eq!(
        h.games.session_state(session).await,
        Some(SessionState::Active)
    );
    assert!(h.announcer.broadcast_containing("Race is starting"));
    assert!(h.announcer.echoed("game-started"));
}

#[tokio::test]
async fn test_all_ready_starts_below_capacity() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;

    let CommandOutcome::SessionCreated(session) = h.games.handle_command(pid(1), "race").await
    else {
        panic!("expected a new session");
    };
    h.games.handle_command(pid(2), "race").await;

    assert_eq!(
        h.games.handle_command(pid(1), "race ready").await,
        CommandOutcome::ReadyRecorded(session)
    );
    assert_eq!(
        h.games.handle_command(pid(2), "race ready").await,
        CommandOutcome::Started(session)
    );
}

#[tokio::test]
async fn test_signup_expiration_aborts_below_quorum() {
    let h = harness_with_expiration(ScriptedDialog::default(), 0);
    register_race(&h, 2, 4).await;

    h.games.handle_command(pid(1), "race").await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(h.games.session_count().await, 0);
    assert!(h.announcer.told_containing(pid(1), "Not enough players"));
}

#[tokio::test]
async fn test_signup_expiration_starts_with_quorum() {
    let h = harness_with_expiration(ScriptedDialog::default(), 0);
    register_race(&h, 1, 4).await;

    let CommandOutcome::SessionCreated(session) = h.games.handle_command(pid(1), "race").await
    else {
        panic!("expected a new session");
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        h.games.session_state(session).await,
        Some(SessionState::Active)
    );
}

// =========================================================================
// Leaving
// =========================================================================

#[tokio::test]
async fn test_sole_player_leaving_signup_aborts_never_finishes() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;

    h.games.handle_command(pid(1), "race").await;
    let outcome = h.games.handle_command(pid(1), "race leave").await;

    assert!(matches!(outcome, CommandOutcome::Left(_)));
    assert_eq!(h.games.session_count().await, 0);
    assert!(h.announcer.broadcast_containing("Sign-up for Race has been closed"));
    assert!(!h.announcer.broadcast_containing("finished"));
}

#[tokio::test]
async fn test_last_player_leaving_active_game_finishes_without_winner() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 1, 1).await;

    // A 1/1 game starts the moment its creator signs up.
    let outcome = h.games.handle_command(pid(1), "race").await;
    let CommandOutcome::Started(session) = outcome else {
        panic!("expected an immediate start, got {outcome:?}");
    };

    h.games.handle_command(pid(1), "race leave").await;

    assert!(h
        .announcer
        .broadcast_containing("Race has finished without a winner"));
    assert!(h.announcer.echoed("game-finished"));
    assert_eq!(h.games.session_state(session).await, None, "record released");
}

#[tokio::test]
async fn test_leave_without_signup_is_rejected() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;

    let outcome = h.games.handle_command(pid(1), "race leave").await;

    assert_eq!(outcome, CommandOutcome::Rejected);
    assert!(h.announcer.told_containing(pid(1), "not signed up"));
}

// =========================================================================
// Completion reporting
// =========================================================================

#[tokio::test]
async fn test_report_finished_announces_winner_and_releases() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 2).await;

    h.games.handle_command(pid(1), "race").await;
    let CommandOutcome::Started(session) = h.games.handle_command(pid(2), "race").await else {
        panic!("expected the game to start");
    };

    h.games.report_finished(session, Some(pid(2))).await.unwrap();

    assert!(h.announcer.broadcast_containing("Player2 has won Race"));
    assert!(h.announcer.echoed("game-finished"));
    assert_eq!(h.games.session_count().await, 0);
}

#[tokio::test]
async fn test_report_finished_on_signup_session_fails() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;

    let CommandOutcome::SessionCreated(session) = h.games.handle_command(pid(1), "race").await
    else {
        panic!("expected a new session");
    };

    let result = h.games.report_finished(session, None).await;
    assert!(matches!(result, Err(PlayfieldError::Session(_))));
}

// =========================================================================
// Hot reload
// =========================================================================

#[tokio::test]
async fn test_removal_keeps_running_session_playable() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 2).await;

    h.games.handle_command(pid(1), "race").await;
    let CommandOutcome::Started(session) = h.games.handle_command(pid(2), "race").await else {
        panic!("expected the game to start");
    };

    h.games
        .remove_game(&GameId::from("race"), RemovalPolicy::KeepSessions)
        .await
        .unwrap();

    // The session runs on under its descriptor snapshot...
    assert_eq!(
        h.games.session_state(session).await,
        Some(SessionState::Active)
    );
    // ...while the command is gone for everyone else.
    assert_eq!(
        h.games.handle_command(pid(3), "race").await,
        CommandOutcome::Unavailable
    );

    // Re-registering the identity works, and the old session still
    // completes normally.
    register_race(&h, 2, 2).await;
    h.games.report_finished(session, Some(pid(1))).await.unwrap();
    assert_eq!(h.games.session_count().await, 0);
}

#[tokio::test]
async fn test_removal_with_stop_policy_terminates_sessions() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 2).await;

    h.games.handle_command(pid(1), "race").await;
    h.games.handle_command(pid(2), "race").await;
    assert_eq!(h.games.session_count().await, 1);

    h.games
        .remove_game(&GameId::from("race"), RemovalPolicy::StopSessions)
        .await
        .unwrap();

    assert_eq!(h.games.session_count().await, 0);
    assert!(h.announcer.told_containing(pid(1), "has been stopped"));
    assert!(h.announcer.told_containing(pid(2), "has been stopped"));
}

// =========================================================================
// Customization
// =========================================================================

fn race_with_settings(minimum: usize, maximum: usize) -> DescriptorOptions {
    race_options(minimum, maximum)
        .with_setting(SettingDeclaration::new(
            "race/environment",
            "Environment",
            SettingKind::Environment,
            SettingValue::Environment(EnvironmentValue::default()),
        ))
        .with_setting(SettingDeclaration::new(
            "race/laps",
            "Laps",
            SettingKind::Number { min: 1, max: 10 },
            SettingValue::Number(3),
        ))
}

#[tokio::test]
async fn test_custom_start_resolves_settings_through_dialogs() {
    // Script: edit laps (menu item 1), enter 5, confirm (item 2).
    let h = harness(ScriptedDialog::new(vec![
        DialogResponse::Item(1),
        DialogResponse::Text("5".into()),
        DialogResponse::Item(2),
    ]));
    h.games
        .register_game(race_with_settings(2, 2))
        .await
        .unwrap();

    h.games.handle_command(pid(1), "race custom").await;
    let outcome = h.games.handle_command(pid(2), "race").await;

    assert!(matches!(outcome, CommandOutcome::Started(_)));
}

#[tokio::test]
async fn test_cancelling_customization_returns_session_to_signup() {
    // The customizer opens the environment editor and then the dialog
    // never answers — the flow parks holding a selection preview.
    let h = harness(HangingDialog::new(vec![DialogResponse::Item(0)]));
    h.games
        .register_game(race_with_settings(2, 2))
        .await
        .unwrap();

    let CommandOutcome::SessionCreated(session) =
        h.games.handle_command(pid(1), "race custom").await
    else {
        panic!("expected a new session");
    };

    let markers_before = h.games.transient_marker_count();
    let starter = tokio::spawn({
        let games = h.games.clone();
        async move { games.handle_command(pid(2), "race").await }
    });

    // Wait for the flow to reach the environment editor.
    while h.games.transient_marker_count() == markers_before {
        tokio::task::yield_now().await;
    }

    // The uniform cancel sub-command unwinds the flow.
    assert_eq!(
        h.games.handle_command(pid(1), "race cancel").await,
        CommandOutcome::FlowCancelled
    );

    let outcome = starter.await.unwrap();
    assert_eq!(outcome, CommandOutcome::SignupContinues(session));
    assert_eq!(
        h.games.session_state(session).await,
        Some(SessionState::Signup)
    );
    assert_eq!(
        h.games.transient_marker_count(),
        markers_before,
        "selection previews must be released"
    );
    assert!(h.games.customization_state(pid(1)).is_none());
}

#[tokio::test]
async fn test_cancel_with_nothing_pending_is_rejected() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;

    let outcome = h.games.handle_command(pid(1), "race cancel").await;

    assert_eq!(outcome, CommandOutcome::Rejected);
    assert!(h.announcer.told_containing(pid(1), "nothing to cancel"));
}

#[tokio::test]
async fn test_corrupt_setting_default_blocks_start() {
    let h = harness(ScriptedDialog::default());
    h.games
        .register_game(
            DescriptorOptions::new("derby", "Derby")
                .with_command("derby")
                .with_players(1, 1)
                .with_setting(SettingDeclaration::new(
                    "derby/arena",
                    "Arena",
                    SettingKind::Choice {
                        options: vec!["Stadium".into(), "Docks".into()],
                    },
                    SettingValue::Choice("Volcano".into()),
                )),
        )
        .await
        .unwrap();

    // A 1/1 game tries to start immediately; resolution fails on the
    // corrupt default and the session stays in sign-up.
    let outcome = h.games.handle_command(pid(1), "derby").await;

    let CommandOutcome::SignupContinues(session) = outcome else {
        panic!("expected the sign-up to continue, got {outcome:?}");
    };
    assert_eq!(
        h.games.session_state(session).await,
        Some(SessionState::Signup)
    );
    assert!(h.announcer.told_containing(pid(1), "cannot start"));
}

// =========================================================================
// Challenges
// =========================================================================

#[tokio::test]
async fn test_challenge_starts_immediately() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;

    let outcome = h.games.challenge(pid(1), "race", &[pid(2)]).await;

    let CommandOutcome::Started(session) = outcome else {
        panic!("expected an immediate start, got {outcome:?}");
    };
    let mut players = h.games.session_players(session).await;
    players.sort_by_key(|player| player.0);
    assert_eq!(players, vec![pid(1), pid(2)]);
    assert!(h.announcer.broadcast_containing("has challenged"));
}

#[tokio::test]
async fn test_challenge_with_offline_target_is_rejected() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;

    let outcome = h.games.challenge(pid(1), "race", &[pid(99)]).await;

    assert_eq!(outcome, CommandOutcome::Rejected);
    assert_eq!(h.games.session_count().await, 0);
    assert!(h.announcer.told_containing(pid(1), "not available"));
}

// =========================================================================
// Observers
// =========================================================================

#[tokio::test]
async fn test_registry_observers_see_register_and_remove() {
    let h = harness(ScriptedDialog::default());
    let events = Arc::new(Mutex::new(Vec::new()));

    h.games
        .subscribe_registry("watcher", {
            let events = Arc::clone(&events);
            Box::new(move |event| {
                let tag = match event {
                    RegistryEvent::Registered(d) => format!("+{}", d.identity()),
                    RegistryEvent::Removed(d) => format!("-{}", d.identity()),
                };
                events.lock().unwrap().push(tag);
                Ok(())
            })
        })
        .await;

    register_race(&h, 2, 4).await;
    h.games
        .remove_game(&GameId::from("race"), RemovalPolicy::KeepSessions)
        .await
        .unwrap();

    assert_eq!(*events.lock().unwrap(), vec!["+race", "-race"]);
}

#[tokio::test]
async fn test_reload_observer_reregisters_its_game() {
    let h = harness(ScriptedDialog::default());
    register_race(&h, 2, 4).await;
    h.games
        .remove_game(&GameId::from("race"), RemovalPolicy::KeepSessions)
        .await
        .unwrap();

    h.games.add_reload_observer("races-feature", {
        let games = h.games.clone();
        Box::new(move || {
            let games = games.clone();
            Box::pin(async move {
                games.register_game(race_options(2, 4)).await?;
                Ok(())
            })
        })
    });

    h.games.notify_reload().await;

    assert!(h.games.game(&GameId::from("race")).await.is_some());
    assert!(matches!(
        h.games.handle_command(pid(1), "race").await,
        CommandOutcome::SessionCreated(_)
    ));
}

#[tokio::test]
async fn test_removed_reload_observer_is_not_called() {
    let h = harness(ScriptedDialog::default());
    let calls = Arc::new(Mutex::new(0));

    h.games.add_reload_observer("feature", {
        let calls = Arc::clone(&calls);
        Box::new(move || {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                *calls.lock().unwrap() += 1;
                Ok(())
            })
        })
    });

    h.games.notify_reload().await;
    assert!(h.games.remove_reload_observer("feature"));
    h.games.notify_reload().await;

    assert_eq!(*calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_reload_observer_can_remove_itself_mid_fanout() {
    let h = harness(ScriptedDialog::default());
    let calls = Arc::new(Mutex::new(0));

    h.games.add_reload_observer("one-shot", {
        let games = h.games.clone();
        let calls = Arc::clone(&calls);
        Box::new(move || {
            let games = games.clone();
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                *calls.lock().unwrap() += 1;
                games.remove_reload_observer("one-shot");
                Ok(())
            })
        })
    });

    h.games.notify_reload().await;
    h.games.notify_reload().await;

    assert_eq!(*calls.lock().unwrap(), 1, "self-removal must stick");
}
