//! Live command bindings for registered games.

use std::collections::HashMap;

use playfield_types::GameId;

use crate::error::RouterError;

/// Maintains exactly one live binding per registered command string.
///
/// The router never mutates registry state on its own: the registry
/// drives `bind`/`unbind` from inside its own mutations, so a command
/// either resolves to a live registration or does not exist. Dispatch
/// layers resolve through [`CommandRouter::resolve`] and then look the
/// descriptor up in the registry.
#[derive(Debug, Default)]
pub struct CommandRouter {
    bindings: HashMap<String, GameId>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `command` to `identity`.
    ///
    /// Fails with [`RouterError::Conflict`] when the string is already
    /// bound; callers check-and-bind inside a single registry mutation,
    /// so two registrations can never both observe the command as free.
    pub fn bind(
        &mut self,
        command: impl Into<String>,
        identity: GameId,
    ) -> Result<(), RouterError> {
        let command = command.into();
        if let Some(bound_to) = self.bindings.get(&command) {
            return Err(RouterError::Conflict {
                command,
                bound_to: bound_to.clone(),
            });
        }

        tracing::debug!(%command, game = %identity, "command bound");
        self.bindings.insert(command, identity);
        Ok(())
    }

    /// Removes the binding for `command`, returning its identity.
    ///
    /// Unbinding a command that is not bound is an error: the registry
    /// only ever unbinds commands of live registrations, so a miss here
    /// means the two tables diverged.
    pub fn unbind(&mut self, command: &str) -> Result<GameId, RouterError> {
        match self.bindings.remove(command) {
            Some(identity) => {
                tracing::debug!(%command, game = %identity, "command unbound");
                Ok(identity)
            }
            None => Err(RouterError::NotBound(command.to_owned())),
        }
    }

    /// Resolves a command string to the identity that owns it.
    pub fn resolve(&self, command: &str) -> Option<&GameId> {
        self.bindings.get(command)
    }

    pub fn is_bound(&self, command: &str) -> bool {
        self.bindings.contains_key(command)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// All live command strings, for catalog listings.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}
