//! Error types for the registration layer.

use playfield_types::GameId;

/// Validation failures when constructing a [`crate::GameDescriptor`].
///
/// These indicate a programming error in the registering feature and are
/// expected to fail loudly during feature startup.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// The game name is empty (or whitespace only).
    #[error("game name must not be empty")]
    EmptyName,

    /// The declared command string is empty.
    #[error("game command must not be empty")]
    EmptyCommand,

    /// Player bounds must satisfy `1 <= minimum <= maximum`.
    #[error("invalid player bounds: minimum {minimum}, maximum {maximum}")]
    InvalidPlayerBounds { minimum: usize, maximum: usize },

    /// Two settings share the same name within one descriptor.
    #[error("duplicate setting name '{0}'")]
    DuplicateSetting(String),
}

/// Errors from [`crate::CommandRouter`] bindings.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The command string is already bound to a game.
    #[error("command '{command}' is already bound to {bound_to}")]
    Conflict { command: String, bound_to: GameId },

    /// There is no live binding for the command string.
    #[error("command '{0}' is not bound")]
    NotBound(String),
}

/// Errors from [`crate::GameRegistry`] mutations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The identity already has a live registration.
    #[error("game '{0}' is already registered")]
    DuplicateIdentity(GameId),

    /// The descriptor's command is bound to a different identity.
    #[error("command '{command}' is already in use by game '{bound_to}'")]
    DuplicateCommand { command: String, bound_to: GameId },

    /// No descriptor is registered under the identity.
    #[error("game '{0}' is not registered")]
    NotFound(GameId),

    /// The command router rejected a binding change.
    #[error(transparent)]
    Command(#[from] RouterError),
}
