//! # Playfield
//!
//! Minigame orchestration framework for multiplayer game servers.
//!
//! Features declare their game once — name, command, player bounds,
//! settings — and Playfield takes care of the rest: a player-facing
//! command per game, sign-up sessions with quorum and capacity
//! enforcement, per-session settings customization, and deterministic
//! cleanup no matter how a session ends. Games can be removed and
//! re-registered while sessions of the old registration are still
//! running ("hot reload"); those sessions play out under the descriptor
//! snapshot they were created with.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use playfield::prelude::*;
//!
//! # async fn example(games: Games<impl DialogService>) -> Result<(), PlayfieldError> {
//! games
//!     .register_game(
//!         DescriptorOptions::new("race", "Race")
//!             .with_command("race")
//!             .with_goal("Complete the track in the shortest possible time.")
//!             .with_players(1, 4),
//!     )
//!     .await?;
//!
//! // A player types "/race":
//! games.handle_command(PlayerId(7), "race").await;
//! # Ok(())
//! # }
//! ```

mod commands;
mod error;
mod service;

pub use commands::CommandOutcome;
pub use error::PlayfieldError;
pub use service::{Games, ReloadCallback, RemovalPolicy};

pub mod prelude {
    pub use playfield_registry::{
        CommandRouter, DescriptorOptions, GameDescriptor, GameRegistry, RegistryEvent,
    };
    pub use playfield_session::{SessionManager, SessionState};
    pub use playfield_settings::{
        Configuration, DialogRequest, DialogResponse, DialogService, EngineConfig,
        EnvironmentValue, SettingDeclaration, SettingKind, SettingValue,
    };
    pub use playfield_types::{
        Announcer, GameId, PlayerDirectory, PlayerId, PlayerInfo, ServiceSettings, SessionId,
    };

    pub use crate::{CommandOutcome, Games, PlayfieldError, RemovalPolicy};
}
