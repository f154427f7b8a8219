//! The `Games` service: the entry point features register against.
//!
//! Ties the layers together: registry + command router + session
//! manager behind one lock, the customization engine beside them, and
//! the host-server seams injected at construction. The lock is the
//! atomicity unit — no method holds it across a suspension point.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use playfield_registry::{
    CommandRouter, DescriptorOptions, GameDescriptor, GameRegistry, RegistryObserver,
};
use playfield_session::{SessionManager, SessionState};
use playfield_settings::{CustomizationEngine, DialogService, EngineConfig, FlowState};
use playfield_types::{Announcer, GameId, PlayerDirectory, PlayerId, ServiceSettings, SessionId};
use tokio::sync::Mutex;

use crate::error::PlayfieldError;

/// What to do with live sessions when their game is removed.
///
/// Deregistering a game never terminates its sessions by itself —
/// sessions run under their own descriptor snapshot. Whether they should
/// be stopped anyway is the removing feature's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Let running sessions play out under the stale descriptor.
    KeepSessions,

    /// Terminate and release every session of the game immediately.
    StopSessions,
}

/// An async callback invoked when the service signals a reload.
///
/// Typically re-registers the owner's game through a cloned [`Games`]
/// handle.
pub type ReloadCallback =
    Box<dyn FnMut() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

/// Subscriber list with owner-keyed unsubscribe.
///
/// Fan-out drains the entries first so callbacks can re-enter the
/// service freely; subscription changes made mid-fan-out are folded back
/// in afterwards (adds take effect next reload, removals stick).
#[derive(Default)]
struct ReloadObservers {
    entries: Vec<(String, ReloadCallback)>,
    draining: bool,
    removed: HashSet<String>,
}

/// Registry, router and sessions, guarded together. Holding the lock
/// makes any sequence of calls across the three atomic.
pub(crate) struct CoreState {
    pub(crate) registry: GameRegistry,
    pub(crate) router: CommandRouter,
    pub(crate) sessions: SessionManager,
}

pub(crate) struct GamesInner<D: DialogService> {
    pub(crate) state: Mutex<CoreState>,
    pub(crate) engine: CustomizationEngine<D>,
    pub(crate) announce: Arc<dyn Announcer>,
    pub(crate) directory: Arc<dyn PlayerDirectory>,
    pub(crate) settings: Arc<dyn ServiceSettings>,
    reload: std::sync::Mutex<ReloadObservers>,
}

/// The minigame orchestration service.
///
/// Cheap to clone — a handle around shared state. Features keep a clone
/// for registration and result reporting; the host's command layer keeps
/// one for dispatch.
pub struct Games<D: DialogService> {
    pub(crate) inner: Arc<GamesInner<D>>,
}

impl<D: DialogService> Clone for Games<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: DialogService> Games<D> {
    pub fn new(
        dialogs: D,
        announce: Arc<dyn Announcer>,
        directory: Arc<dyn PlayerDirectory>,
        settings: Arc<dyn ServiceSettings>,
    ) -> Self {
        Self::with_engine_config(dialogs, EngineConfig::default(), announce, directory, settings)
    }

    pub fn with_engine_config(
        dialogs: D,
        engine_config: EngineConfig,
        announce: Arc<dyn Announcer>,
        directory: Arc<dyn PlayerDirectory>,
        settings: Arc<dyn ServiceSettings>,
    ) -> Self {
        Self {
            inner: Arc::new(GamesInner {
                state: Mutex::new(CoreState {
                    registry: GameRegistry::new(),
                    router: CommandRouter::new(),
                    sessions: SessionManager::new(),
                }),
                engine: CustomizationEngine::new(dialogs, engine_config),
                announce,
                directory,
                settings,
                reload: std::sync::Mutex::new(ReloadObservers::default()),
            }),
        }
    }

    // -- registration ------------------------------------------------------

    /// Validates `options` and registers the game, making its command
    /// immediately invokable.
    pub async fn register_game(
        &self,
        options: DescriptorOptions,
    ) -> Result<Arc<GameDescriptor>, PlayfieldError> {
        let descriptor = GameDescriptor::new(options)?;
        let mut state = self.inner.state.lock().await;
        let CoreState {
            registry, router, ..
        } = &mut *state;
        Ok(registry.register_game(descriptor, router)?)
    }

    /// Removes the game registered under `identity`.
    ///
    /// The table entry and the command binding go away atomically;
    /// `policy` decides what happens to sessions already running.
    pub async fn remove_game(
        &self,
        identity: &GameId,
        policy: RemovalPolicy,
    ) -> Result<(), PlayfieldError> {
        let mut state = self.inner.state.lock().await;
        {
            let CoreState {
                registry, router, ..
            } = &mut *state;
            registry.remove_game(identity, router)?;
        }

        if policy == RemovalPolicy::StopSessions {
            let affected: Vec<PlayerId> = state
                .sessions
                .sessions_for(identity)
                .flat_map(|session| session.players().collect::<Vec<_>>())
                .collect();
            state.sessions.stop_all_for(identity);
            for player in affected {
                self.inner
                    .announce
                    .tell(player, "The game you were in has been stopped.");
            }
        }
        Ok(())
    }

    // -- lookups -----------------------------------------------------------

    /// The descriptor registered under `identity`, if any.
    pub async fn game(&self, identity: &GameId) -> Option<Arc<GameDescriptor>> {
        self.inner.state.lock().await.registry.get(identity)
    }

    /// All registered games, for catalog listings.
    pub async fn games(&self) -> Vec<Arc<GameDescriptor>> {
        self.inner.state.lock().await.registry.descriptors()
    }

    /// Current state of a session, if its record is still live.
    pub async fn session_state(&self, session: SessionId) -> Option<SessionState> {
        self.inner
            .state
            .lock()
            .await
            .sessions
            .get(session)
            .map(|record| record.state())
    }

    /// Participants of a session, if its record is still live.
    pub async fn session_players(&self, session: SessionId) -> Vec<PlayerId> {
        self.inner
            .state
            .lock()
            .await
            .sessions
            .get(session)
            .map(|record| record.players().collect())
            .unwrap_or_default()
    }

    /// The configuration a session runs under. `None` until the session
    /// is Active; game implementations read their settings through this.
    pub async fn session_configuration(
        &self,
        session: SessionId,
    ) -> Option<playfield_settings::Configuration> {
        self.inner
            .state
            .lock()
            .await
            .sessions
            .get(session)
            .and_then(|record| record.configuration().cloned())
    }

    /// Number of live session records.
    pub async fn session_count(&self) -> usize {
        self.inner.state.lock().await.sessions.len()
    }

    /// State of a player's pending customization flow, if any.
    pub fn customization_state(&self, player: PlayerId) -> Option<FlowState> {
        self.inner.engine.flow_state(player)
    }

    /// Transient selection resources currently held by customization
    /// flows. Returns to its pre-flow value whenever a flow ends,
    /// cancelled or not.
    pub fn transient_marker_count(&self) -> usize {
        self.inner.engine.transient_marker_count()
    }

    // -- registry observers ------------------------------------------------

    /// Subscribes to register/remove notifications.
    pub async fn subscribe_registry(&self, owner: impl Into<String>, callback: RegistryObserver) {
        self.inner
            .state
            .lock()
            .await
            .registry
            .subscribe(owner, callback);
    }

    /// Drops a registry subscription by owner.
    pub async fn unsubscribe_registry(&self, owner: &str) -> bool {
        self.inner.state.lock().await.registry.unsubscribe(owner)
    }

    // -- reload observers --------------------------------------------------

    /// Subscribes `callback` under `owner`, replacing any earlier
    /// subscription for the same owner.
    pub fn add_reload_observer(&self, owner: impl Into<String>, callback: ReloadCallback) {
        let owner = owner.into();
        let mut reload = self.inner.reload.lock().unwrap();
        reload.entries.retain(|(key, _)| *key != owner);
        reload.removed.remove(&owner);
        reload.entries.push((owner, callback));
    }

    /// Drops the reload subscription registered under `owner`.
    pub fn remove_reload_observer(&self, owner: &str) -> bool {
        let mut reload = self.inner.reload.lock().unwrap();
        let before = reload.entries.len();
        reload.entries.retain(|(key, _)| key != owner);
        if reload.entries.len() != before {
            return true;
        }
        // Mid-fan-out the entry lives in the drained snapshot; record
        // the removal so it isn't resurrected afterwards.
        if reload.draining {
            reload.removed.insert(owner.to_owned());
            return true;
        }
        false
    }

    /// Tells every reload observer that the underlying capability has
    /// reloaded, in subscription order. Callbacks run outside any lock,
    /// so they can re-register games; their failures are logged and
    /// isolated.
    pub async fn notify_reload(&self) {
        let mut snapshot = {
            let mut reload = self.inner.reload.lock().unwrap();
            reload.draining = true;
            std::mem::take(&mut reload.entries)
        };

        for (owner, callback) in &mut snapshot {
            if let Err(error) = callback().await {
                tracing::warn!(owner = owner.as_str(), %error, "reload observer failed");
            }
        }

        let mut reload = self.inner.reload.lock().unwrap();
        reload.draining = false;
        let added = std::mem::take(&mut reload.entries);
        let removed = std::mem::take(&mut reload.removed);
        let retained: Vec<_> = snapshot
            .into_iter()
            .filter(|(owner, _)| !removed.contains(owner))
            .filter(|(owner, _)| !added.iter().any(|(key, _)| key == owner))
            .collect();
        reload.entries = retained.into_iter().chain(added).collect();
    }

    // -- shared helpers ----------------------------------------------------

    /// Resolves a player id to a display name, falling back to the id.
    pub(crate) fn player_name(&self, player: PlayerId) -> String {
        self.inner
            .directory
            .get_by_id(player)
            .map(|info| info.name)
            .unwrap_or_else(|| player.to_string())
    }
}
