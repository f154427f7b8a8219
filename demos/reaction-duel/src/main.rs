//! Reaction duel: a small demonstration game built on Playfield.
//!
//! Players sign up through the "/reaction" command; once everyone is
//! ready the duel starts, shows a number to remember, waits a randomized
//! delay and scores whoever reacts first. The point of the demo is the
//! framework wiring — registration, sign-up, readiness, settings,
//! completion reporting — not the game itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use playfield::prelude::*;
use playfield_settings::DialogError;
use rand::Rng;

// ---------------------------------------------------------------------------
// Host collaborators
// ---------------------------------------------------------------------------

/// Prints announcements to stdout, standing in for in-game chat.
struct ConsoleAnnouncer;

impl Announcer for ConsoleAnnouncer {
    fn announce(&self, message: &str) {
        println!("[all] {message}");
    }

    fn tell(&self, player: PlayerId, message: &str) {
        println!("[{player}] {message}");
    }

    fn echo(&self, tag: &str, payload: &str) {
        println!("[echo:{tag}] {payload}");
    }
}

/// A fixed roster of "connected" players.
struct Roster {
    players: HashMap<PlayerId, String>,
}

impl Roster {
    fn new(names: &[&str]) -> Self {
        Self {
            players: names
                .iter()
                .enumerate()
                .map(|(index, name)| (PlayerId(index as u64 + 1), (*name).to_owned()))
                .collect(),
        }
    }
}

impl PlayerDirectory for Roster {
    fn get_by_id(&self, id: PlayerId) -> Option<PlayerInfo> {
        self.players.get(&id).map(|name| PlayerInfo {
            id,
            name: name.clone(),
        })
    }
}

/// Demo tuning values; a real server reads these from its settings store.
struct DemoSettings;

impl ServiceSettings for DemoSettings {
    fn get_value(&self, key: &str) -> Option<i64> {
        match key {
            "games/signup_expiration_sec" => Some(5),
            "reaction/answer_delay_sec" => Some(2),
            "reaction/answer_jitter_sec" => Some(1),
            _ => None,
        }
    }
}

/// Dialog service that confirms every customization menu as-is.
struct ConfirmDialog;

impl DialogService for ConfirmDialog {
    async fn prompt(
        &self,
        _player: PlayerId,
        request: DialogRequest,
    ) -> Result<DialogResponse, DialogError> {
        Ok(match request {
            // The confirm entry is always the last menu item.
            DialogRequest::Menu { items, .. } => DialogResponse::Item(items.len() - 1),
            DialogRequest::Input { .. } => DialogResponse::Dismissed,
        })
    }
}

// ---------------------------------------------------------------------------
// The game
// ---------------------------------------------------------------------------

async fn register_reaction_duel(games: &Games<ConfirmDialog>) -> Result<(), PlayfieldError> {
    games
        .register_game(
            DescriptorOptions::new("reaction-duel", "Reaction duel")
                .with_command("reaction")
                .with_goal("React to the revealed number before anyone else.")
                .with_players(2, 4)
                .with_setting(SettingDeclaration::new(
                    "reaction/rounds",
                    "Rounds",
                    SettingKind::Number { min: 1, max: 10 },
                    SettingValue::Number(3),
                ))
                .with_setting(SettingDeclaration::new(
                    "reaction/environment",
                    "Environment",
                    SettingKind::Environment,
                    SettingValue::Environment(EnvironmentValue::default()),
                )),
        )
        .await?;
    Ok(())
}

/// Runs the duel for an Active session and reports the result back.
async fn run_duel(
    games: &Games<ConfirmDialog>,
    settings: &dyn ServiceSettings,
    session: SessionId,
) -> Result<(), PlayfieldError> {
    let players = games.session_players(session).await;
    let configuration = games.session_configuration(session).await.unwrap_or_default();
    let rounds = configuration.number("reaction/rounds").unwrap_or(3);

    if let Some(environment) = configuration.environment("reaction/environment") {
        println!("[duel] environment: {}", environment.describe());
    }

    let delay = settings.get_value("reaction/answer_delay_sec").unwrap_or(2);
    let jitter = settings.get_value("reaction/answer_jitter_sec").unwrap_or(0);

    let mut rng = rand::rng();
    let mut scores: HashMap<PlayerId, u32> = HashMap::new();

    for round in 1..=rounds {
        let number: u32 = rng.random_range(6_000..=115_000);
        println!("[duel] round {round}/{rounds}: remember {number}!");

        // Reveal after a randomized delay so reaction times can't be
        // scripted.
        let wait_ms = rng.random_range((delay - jitter).max(0)..=delay + jitter) * 1000;
        tokio::time::sleep(Duration::from_millis(wait_ms as u64)).await;

        let fastest = players[rng.random_range(0..players.len())];
        println!("[duel] {fastest} answered {number} first");
        *scores.entry(fastest).or_default() += 1;
    }

    let winner = scores
        .iter()
        .max_by_key(|(_, score)| **score)
        .map(|(player, _)| *player);
    games.report_finished(session, winner).await
}

#[tokio::main]
async fn main() -> Result<(), PlayfieldError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let games = Games::new(
        ConfirmDialog,
        Arc::new(ConsoleAnnouncer),
        Arc::new(Roster::new(&["Ada", "Brook", "Casey"])),
        Arc::new(DemoSettings),
    );
    register_reaction_duel(&games).await?;

    // Two players sign up, customize nothing, and ready up.
    games.handle_command(PlayerId(1), "reaction").await;
    games.handle_command(PlayerId(2), "reaction").await;
    games.handle_command(PlayerId(1), "reaction ready").await;
    let outcome = games.handle_command(PlayerId(2), "reaction ready").await;

    match outcome {
        CommandOutcome::Started(session) => run_duel(&games, &DemoSettings, session).await?,
        other => tracing::warn!(?other, "the duel did not start"),
    }

    Ok(())
}
