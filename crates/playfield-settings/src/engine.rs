//! The customization engine: turns setting declarations into a concrete
//! per-session configuration.
//!
//! The synchronous path validates declaration defaults and is done. The
//! interactive path walks the starting player through a menu dialog and
//! can suspend for as long as the player takes to answer; while it is
//! suspended, the flow can be cancelled from the outside (the uniform
//! "cancel" sub-command) or expire through the response timeout. Both
//! roads lead to [`Resolution::Cancelled`] — cancellation is a flow
//! transition here, never an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use playfield_types::PlayerId;
use tokio::sync::Notify;

use crate::dialog::{DialogRequest, DialogResponse, DialogService};
use crate::error::{ConfigurationDataError, CustomizationError};
use crate::environment::{EnvironmentValue, Gravity, TimeOfDay, Weather};
use crate::setting::{Configuration, SettingDeclaration, SettingKind, SettingValue};

// ---------------------------------------------------------------------------
// Flow bookkeeping
// ---------------------------------------------------------------------------

/// Where an interactive flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Registered, no dialog shown yet.
    Pending,
    /// A dialog is on screen (or about to be).
    Selecting,
    /// The player confirmed; the configuration is being returned.
    Confirmed,
    /// The flow was cancelled, dismissed or timed out.
    Cancelled,
}

/// The outcome of an interactive resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(Configuration),
    Cancelled,
}

struct Flow {
    state: FlowState,
    cancel: Arc<Notify>,
}

/// Removes the player's flow entry on every exit path.
struct FlowGuard<'a> {
    flows: &'a Mutex<HashMap<PlayerId, Flow>>,
    player: PlayerId,
}

impl Drop for FlowGuard<'_> {
    fn drop(&mut self) {
        self.flows.lock().unwrap().remove(&self.player);
    }
}

/// A transient world resource (selection preview, marker) held while an
/// editor is open. Dropping it releases the resource, which keeps the
/// count accurate even when the flow unwinds through cancellation.
struct TransientMarker {
    counter: Arc<AtomicUsize>,
}

impl TransientMarker {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for TransientMarker {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long to wait for a single dialog response before treating
    /// the flow as cancelled.
    pub response_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(30),
        }
    }
}

/// What a dialog round produced, cancellation folded in.
enum Prompted {
    Response(DialogResponse),
    Cancelled,
}

/// What editing a single setting produced.
enum EditOutcome {
    Updated(SettingValue),
    Back,
    Cancelled,
}

/// What a catalog sub-menu produced.
enum Pick<T> {
    Picked(T),
    Back,
    Cancelled,
}

/// Resolves a game's setting declarations into a [`Configuration`].
pub struct CustomizationEngine<D: DialogService> {
    dialogs: D,
    config: EngineConfig,
    /// One entry per player with an interactive flow in progress.
    /// Locked briefly for updates, never across an await.
    flows: Mutex<HashMap<PlayerId, Flow>>,
    markers: Arc<AtomicUsize>,
}

impl<D: DialogService> CustomizationEngine<D> {
    pub fn new(dialogs: D, config: EngineConfig) -> Self {
        Self {
            dialogs,
            config,
            flows: Mutex::new(HashMap::new()),
            markers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Resolves every declaration to its default value.
    ///
    /// A default that does not satisfy its own kind (out-of-range
    /// number, choice not in the option list) is stored-data corruption:
    /// fatal, never coerced.
    pub fn resolve_defaults(
        &self,
        settings: &[SettingDeclaration],
    ) -> Result<Configuration, CustomizationError> {
        let mut configuration = Configuration::default();
        for declaration in settings {
            let default = declaration.default_value();
            if !default.matches(declaration.kind()) {
                return Err(ConfigurationDataError(format!(
                    "default for setting '{}' does not satisfy its kind",
                    declaration.name()
                ))
                .into());
            }
            configuration.insert(declaration.name(), default.clone());
        }
        Ok(configuration)
    }

    /// Walks `player` through the customization menu for `settings`.
    ///
    /// Suspends on every dialog; any state read before a suspension is
    /// re-derived from the flow's own working copy afterwards, and the
    /// caller is expected to re-validate its surrounding state once this
    /// returns.
    pub async fn resolve_interactive(
        &self,
        settings: &[SettingDeclaration],
        player: PlayerId,
    ) -> Result<Resolution, CustomizationError> {
        let cancel = self.register_flow(player)?;
        let _guard = FlowGuard {
            flows: &self.flows,
            player,
        };

        // Working copy, seeded from the defaults. Edits accumulate here
        // and only become a Configuration on confirm.
        let defaults = self.resolve_defaults(settings)?;
        let mut values: Vec<SettingValue> = settings
            .iter()
            .map(|decl| defaults.get(decl.name()).cloned().expect("just resolved"))
            .collect();

        loop {
            self.set_flow_state(player, FlowState::Selecting);

            let mut items: Vec<String> = settings
                .iter()
                .zip(&values)
                .map(|(decl, value)| format!("{}: {}", decl.label(), value.summary()))
                .collect();
            items.push("Start the game!".to_owned());

            let request = DialogRequest::Menu {
                title: "Customize the game".to_owned(),
                items,
            };

            let picked = match self.prompt(player, &cancel, request).await? {
                Prompted::Response(DialogResponse::Item(index)) => index,
                Prompted::Response(_) | Prompted::Cancelled => {
                    return self.cancelled(player);
                }
            };

            if picked == settings.len() {
                self.set_flow_state(player, FlowState::Confirmed);
                let mut configuration = Configuration::default();
                for (decl, value) in settings.iter().zip(values) {
                    configuration.insert(decl.name(), value);
                }
                tracing::debug!(%player, "customization confirmed");
                return Ok(Resolution::Resolved(configuration));
            }

            let Some(declaration) = settings.get(picked) else {
                continue;
            };

            match self.edit_setting(player, &cancel, declaration).await? {
                EditOutcome::Updated(value) => values[picked] = value,
                EditOutcome::Back => {}
                EditOutcome::Cancelled => return self.cancelled(player),
            }
        }
    }

    /// Cancels `player`'s interactive flow, if one is in progress.
    ///
    /// Returns whether there was a flow to cancel. The resolution future
    /// observes the cancellation at its next suspension point.
    pub fn cancel(&self, player: PlayerId) -> bool {
        let mut flows = self.flows.lock().unwrap();
        match flows.get_mut(&player) {
            Some(flow) => {
                flow.state = FlowState::Cancelled;
                flow.cancel.notify_one();
                tracing::debug!(%player, "customization flow cancelled");
                true
            }
            None => false,
        }
    }

    /// Current state of `player`'s flow, if one is in progress.
    pub fn flow_state(&self, player: PlayerId) -> Option<FlowState> {
        self.flows.lock().unwrap().get(&player).map(|f| f.state)
    }

    /// Number of transient selection resources currently allocated.
    pub fn transient_marker_count(&self) -> usize {
        self.markers.load(Ordering::Relaxed)
    }

    // -- internal ---------------------------------------------------------

    fn register_flow(&self, player: PlayerId) -> Result<Arc<Notify>, CustomizationError> {
        let mut flows = self.flows.lock().unwrap();
        if flows.contains_key(&player) {
            return Err(CustomizationError::FlowInProgress(player));
        }
        let cancel = Arc::new(Notify::new());
        flows.insert(
            player,
            Flow {
                state: FlowState::Pending,
                cancel: Arc::clone(&cancel),
            },
        );
        Ok(cancel)
    }

    fn set_flow_state(&self, player: PlayerId, state: FlowState) {
        if let Some(flow) = self.flows.lock().unwrap().get_mut(&player) {
            // A cancellation that has already been signalled wins over
            // whatever the resolution loop wanted to record.
            if flow.state != FlowState::Cancelled {
                flow.state = state;
            }
        }
    }

    fn cancelled(&self, player: PlayerId) -> Result<Resolution, CustomizationError> {
        self.set_flow_state(player, FlowState::Cancelled);
        Ok(Resolution::Cancelled)
    }

    /// One dialog round: response, external cancellation and the
    /// response timeout folded into a single outcome.
    async fn prompt(
        &self,
        player: PlayerId,
        cancel: &Notify,
        request: DialogRequest,
    ) -> Result<Prompted, CustomizationError> {
        tokio::select! {
            _ = cancel.notified() => Ok(Prompted::Cancelled),
            response = tokio::time::timeout(
                self.config.response_timeout,
                self.dialogs.prompt(player, request),
            ) => match response {
                Ok(Ok(response)) => Ok(Prompted::Response(response)),
                Ok(Err(error)) => Err(error.into()),
                Err(_elapsed) => {
                    tracing::debug!(%player, "customization dialog timed out");
                    Ok(Prompted::Cancelled)
                }
            },
        }
    }

    async fn edit_setting(
        &self,
        player: PlayerId,
        cancel: &Notify,
        declaration: &SettingDeclaration,
    ) -> Result<EditOutcome, CustomizationError> {
        match declaration.kind() {
            SettingKind::Number { min, max } => {
                self.edit_number(player, cancel, declaration, *min, *max).await
            }
            SettingKind::Choice { options } => {
                self.edit_choice(player, cancel, declaration, options).await
            }
            SettingKind::Environment => self.edit_environment(player, cancel).await,
        }
    }

    async fn edit_number(
        &self,
        player: PlayerId,
        cancel: &Notify,
        declaration: &SettingDeclaration,
        min: i64,
        max: i64,
    ) -> Result<EditOutcome, CustomizationError> {
        loop {
            let request = DialogRequest::Input {
                title: declaration.label().to_owned(),
                message: format!("Enter a value between {min} and {max}"),
            };
            match self.prompt(player, cancel, request).await? {
                Prompted::Response(DialogResponse::Text(text)) => {
                    match text.trim().parse::<i64>() {
                        Ok(value) if (min..=max).contains(&value) => {
                            return Ok(EditOutcome::Updated(SettingValue::Number(value)));
                        }
                        // Out of range or unparseable: ask again.
                        _ => continue,
                    }
                }
                Prompted::Response(DialogResponse::Dismissed) => return Ok(EditOutcome::Back),
                Prompted::Response(DialogResponse::Item(_)) => continue,
                Prompted::Cancelled => return Ok(EditOutcome::Cancelled),
            }
        }
    }

    async fn edit_choice(
        &self,
        player: PlayerId,
        cancel: &Notify,
        declaration: &SettingDeclaration,
        options: &[String],
    ) -> Result<EditOutcome, CustomizationError> {
        let request = DialogRequest::Menu {
            title: declaration.label().to_owned(),
            items: options.to_vec(),
        };
        match self.prompt(player, cancel, request).await? {
            Prompted::Response(DialogResponse::Item(index)) => match options.get(index) {
                Some(option) => Ok(EditOutcome::Updated(SettingValue::Choice(option.clone()))),
                None => Ok(EditOutcome::Back),
            },
            Prompted::Response(_) => Ok(EditOutcome::Back),
            Prompted::Cancelled => Ok(EditOutcome::Cancelled),
        }
    }

    /// Environment editor: three menus in sequence (time, weather,
    /// gravity). A selection preview is held for the duration and
    /// released when the editor closes, on every exit path.
    async fn edit_environment(
        &self,
        player: PlayerId,
        cancel: &Notify,
    ) -> Result<EditOutcome, CustomizationError> {
        let _preview = TransientMarker::acquire(&self.markers);

        let time = match self
            .pick_option(player, cancel, "Time of day", &TimeOfDay::ALL)
            .await?
        {
            Pick::Picked(time) => time,
            Pick::Back => return Ok(EditOutcome::Back),
            Pick::Cancelled => return Ok(EditOutcome::Cancelled),
        };
        let weather = match self
            .pick_option(player, cancel, "Weather", &Weather::ALL)
            .await?
        {
            Pick::Picked(weather) => weather,
            Pick::Back => return Ok(EditOutcome::Back),
            Pick::Cancelled => return Ok(EditOutcome::Cancelled),
        };
        let gravity = match self
            .pick_option(player, cancel, "Gravity", &Gravity::ALL)
            .await?
        {
            Pick::Picked(gravity) => gravity,
            Pick::Back => return Ok(EditOutcome::Back),
            Pick::Cancelled => return Ok(EditOutcome::Cancelled),
        };

        Ok(EditOutcome::Updated(SettingValue::Environment(
            EnvironmentValue {
                time,
                weather,
                gravity,
            },
        )))
    }

    /// Menu over a fixed option catalog.
    async fn pick_option<T: Copy + std::fmt::Display>(
        &self,
        player: PlayerId,
        cancel: &Notify,
        title: &str,
        options: &[T],
    ) -> Result<Pick<T>, CustomizationError> {
        let request = DialogRequest::Menu {
            title: title.to_owned(),
            items: options.iter().map(|o| o.to_string()).collect(),
        };
        match self.prompt(player, cancel, request).await? {
            Prompted::Response(DialogResponse::Item(index)) => Ok(options
                .get(index)
                .copied()
                .map_or(Pick::Back, Pick::Picked)),
            Prompted::Response(_) => Ok(Pick::Back),
            Prompted::Cancelled => Ok(Pick::Cancelled),
        }
    }
}
