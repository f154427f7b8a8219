//! Immutable, validated descriptions of registrable games.

use std::collections::HashSet;

use playfield_settings::SettingDeclaration;
use playfield_types::GameId;
use serde::Serialize;

use crate::error::DescriptorError;

/// Caller-supplied options for registering a game.
///
/// This is the declarative surface a feature fills in once at startup;
/// [`GameDescriptor::new`] validates it into the immutable record the
/// registry keeps.
#[derive(Debug, Clone)]
pub struct DescriptorOptions {
    /// Stable handle for this game implementation.
    pub identity: GameId,

    /// Human readable game name ("Race", "Haystack").
    pub name: String,

    /// The dedicated player command, without the leading slash. Games
    /// without a command are reachable only through the catalog.
    pub command: Option<String>,

    /// One-line description of what winning takes.
    pub goal: Option<String>,

    /// Minimum number of signed-up players needed to start.
    pub minimum_players: usize,

    /// Maximum number of participants.
    pub maximum_players: usize,

    /// Entry price, in the host server's currency. Zero means free.
    pub price: u64,

    /// Configurable settings, in menu order.
    pub settings: Vec<SettingDeclaration>,
}

impl DescriptorOptions {
    /// Starts an options record with the required fields; everything
    /// else begins at its default (no command, no goal, free, solo-capable).
    pub fn new(identity: impl Into<GameId>, name: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            name: name.into(),
            command: None,
            goal: None,
            minimum_players: 1,
            maximum_players: 1,
            price: 0,
            settings: Vec::new(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    pub fn with_players(mut self, minimum: usize, maximum: usize) -> Self {
        self.minimum_players = minimum;
        self.maximum_players = maximum;
        self
    }

    pub fn with_price(mut self, price: u64) -> Self {
        self.price = price;
        self
    }

    pub fn with_setting(mut self, setting: SettingDeclaration) -> Self {
        self.settings.push(setting);
        self
    }
}

/// The immutable, validated record of one registered game.
///
/// Constructed exactly once at registration time and shared as
/// `Arc<GameDescriptor>` between the registry, the command layer and
/// every session created from it. Sessions keep their `Arc` snapshot, so
/// removing the descriptor from the registry never pulls it out from
/// under a running game.
#[derive(Debug, Serialize)]
pub struct GameDescriptor {
    identity: GameId,
    name: String,
    command: Option<String>,
    goal: Option<String>,
    minimum_players: usize,
    maximum_players: usize,
    price: u64,
    settings: Vec<SettingDeclaration>,
}

impl GameDescriptor {
    /// Validates `options` into a descriptor.
    pub fn new(options: DescriptorOptions) -> Result<Self, DescriptorError> {
        if options.name.trim().is_empty() {
            return Err(DescriptorError::EmptyName);
        }

        if let Some(command) = &options.command {
            if command.trim().is_empty() {
                return Err(DescriptorError::EmptyCommand);
            }
        }

        if options.minimum_players < 1 || options.minimum_players > options.maximum_players {
            return Err(DescriptorError::InvalidPlayerBounds {
                minimum: options.minimum_players,
                maximum: options.maximum_players,
            });
        }

        let mut seen = HashSet::new();
        for setting in &options.settings {
            if !seen.insert(setting.name()) {
                return Err(DescriptorError::DuplicateSetting(setting.name().to_owned()));
            }
        }

        Ok(Self {
            identity: options.identity,
            name: options.name,
            command: options.command,
            goal: options.goal,
            minimum_players: options.minimum_players,
            maximum_players: options.maximum_players,
            price: options.price,
            settings: options.settings,
        })
    }

    pub fn identity(&self) -> &GameId {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn goal(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    pub fn minimum_players(&self) -> usize {
        self.minimum_players
    }

    pub fn maximum_players(&self) -> usize {
        self.maximum_players
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn settings(&self) -> &[SettingDeclaration] {
        &self.settings
    }
}
