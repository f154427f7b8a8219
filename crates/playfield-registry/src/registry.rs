//! The authoritative table of registered games.

use std::collections::HashMap;
use std::sync::Arc;

use playfield_types::GameId;

use crate::descriptor::GameDescriptor;
use crate::error::RegistryError;
use crate::router::CommandRouter;

/// A change to the set of registered games, delivered to observers.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Registered(Arc<GameDescriptor>),
    Removed(Arc<GameDescriptor>),
}

impl RegistryEvent {
    pub fn descriptor(&self) -> &Arc<GameDescriptor> {
        match self {
            Self::Registered(descriptor) | Self::Removed(descriptor) => descriptor,
        }
    }
}

/// Observer callback. Failures are logged per observer and never abort
/// the registry mutation that triggered the notification.
pub type RegistryObserver = Box<dyn FnMut(&RegistryEvent) -> anyhow::Result<()> + Send>;

/// Keeps track of every game available on the server.
///
/// Two mappings with two uniqueness invariants: exactly one descriptor
/// per identity, and every non-null command string owned by at most one
/// identity. Command bindings in the [`CommandRouter`] are mutated in the
/// same synchronous call as the table, so there is no window in which a
/// command exists without a backing descriptor.
#[derive(Default)]
pub struct GameRegistry {
    games: HashMap<GameId, Arc<GameDescriptor>>,
    commands: HashMap<String, GameId>,
    /// Observers in subscription order, keyed by owner for unsubscribe.
    observers: Vec<(String, RegistryObserver)>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `descriptor` and binds its command.
    ///
    /// Fails without side effects on a duplicate identity or a command
    /// already owned by another game. On success the command is
    /// immediately invokable and observers have been notified.
    pub fn register_game(
        &mut self,
        descriptor: GameDescriptor,
        router: &mut CommandRouter,
    ) -> Result<Arc<GameDescriptor>, RegistryError> {
        let identity = descriptor.identity().clone();
        if self.games.contains_key(&identity) {
            return Err(RegistryError::DuplicateIdentity(identity));
        }

        if let Some(command) = descriptor.command() {
            if let Some(bound_to) = self.commands.get(command) {
                return Err(RegistryError::DuplicateCommand {
                    command: command.to_owned(),
                    bound_to: bound_to.clone(),
                });
            }
            router.bind(command, identity.clone())?;
            self.commands.insert(command.to_owned(), identity.clone());
        }

        let descriptor = Arc::new(descriptor);
        self.games.insert(identity.clone(), Arc::clone(&descriptor));

        tracing::info!(
            game = %identity,
            name = descriptor.name(),
            command = descriptor.command().unwrap_or("<none>"),
            "game registered"
        );

        self.notify(&RegistryEvent::Registered(Arc::clone(&descriptor)));
        Ok(descriptor)
    }

    /// Removes the game registered under `identity` and unbinds its
    /// command in the same mutation.
    ///
    /// Sessions created from the descriptor keep their own `Arc`
    /// snapshot and are not touched; stopping them is a policy decision
    /// that belongs to the caller.
    pub fn remove_game(
        &mut self,
        identity: &GameId,
        router: &mut CommandRouter,
    ) -> Result<Arc<GameDescriptor>, RegistryError> {
        let descriptor = self
            .games
            .remove(identity)
            .ok_or_else(|| RegistryError::NotFound(identity.clone()))?;

        if let Some(command) = descriptor.command() {
            self.commands.remove(command);
            router.unbind(command)?;
        }

        tracing::info!(game = %identity, name = descriptor.name(), "game removed");

        self.notify(&RegistryEvent::Removed(Arc::clone(&descriptor)));
        Ok(descriptor)
    }

    /// Looks up a registered game by identity.
    pub fn get(&self, identity: &GameId) -> Option<Arc<GameDescriptor>> {
        self.games.get(identity).cloned()
    }

    /// Looks up a registered game by its command string.
    pub fn get_by_command(&self, command: &str) -> Option<Arc<GameDescriptor>> {
        self.commands
            .get(command)
            .and_then(|identity| self.games.get(identity))
            .cloned()
    }

    /// All live descriptors, for catalog listings.
    pub fn descriptors(&self) -> Vec<Arc<GameDescriptor>> {
        self.games.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Subscribes `callback` under `owner`. A later subscription under
    /// the same owner replaces the earlier one.
    pub fn subscribe(
        &mut self,
        owner: impl Into<String>,
        callback: RegistryObserver,
    ) {
        let owner = owner.into();
        self.unsubscribe(&owner);
        self.observers.push((owner, callback));
    }

    /// Drops the subscription registered under `owner`, if any.
    pub fn unsubscribe(&mut self, owner: &str) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(key, _)| key != owner);
        self.observers.len() != before
    }

    /// Best-effort fan-out in subscription order. The owner list is
    /// snapshotted first so the iteration stays sound no matter what the
    /// callbacks do to the subscription set.
    fn notify(&mut self, event: &RegistryEvent) {
        let owners: Vec<String> =
            self.observers.iter().map(|(owner, _)| owner.clone()).collect();

        for owner in owners {
            let Some((_, callback)) = self.observers.iter_mut().find(|(key, _)| *key == owner)
            else {
                continue;
            };
            if let Err(error) = callback(event) {
                tracing::warn!(%owner, %error, "registry observer failed");
            }
        }
    }
}
