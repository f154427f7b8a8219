//! Game settings and per-session customization for Playfield.
//!
//! Games declare their configurable options as an ordered list of typed
//! [`SettingDeclaration`]s. When a session is about to start, the
//! [`CustomizationEngine`] turns those declarations into a concrete
//! [`Configuration`] — either straight from the defaults, or by walking
//! the starting player through an interactive dialog flow that can be
//! cancelled at any point.
//!
//! # Key types
//!
//! - [`SettingDeclaration`] / [`SettingValue`] — the closed set of option kinds
//! - [`EnvironmentValue`] — the time × weather × gravity composite
//! - [`CustomizationEngine`] — resolves declarations into a configuration
//! - [`DialogService`] — the seam to the host server's dialog system
//! - [`Resolution`] — resolved configuration, or a cancelled flow

mod dialog;
mod engine;
mod environment;
mod error;
mod setting;

pub use dialog::{DialogError, DialogRequest, DialogResponse, DialogService};
pub use engine::{CustomizationEngine, EngineConfig, FlowState, Resolution};
pub use environment::{EnvironmentValue, Gravity, TimeOfDay, Weather};
pub use error::{ConfigurationDataError, CustomizationError};
pub use setting::{Configuration, SettingDeclaration, SettingKind, SettingValue};
