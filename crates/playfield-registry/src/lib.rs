//! Game registration for Playfield.
//!
//! Features describe their game once, declaratively, as a
//! [`GameDescriptor`]; the [`GameRegistry`] validates and indexes those
//! descriptors, keeps the player-facing command for each one alive
//! through the [`CommandRouter`], and tells its observers whenever the
//! set of registered games changes.
//!
//! # Key types
//!
//! - [`GameDescriptor`] / [`DescriptorOptions`] — one game's declarative metadata
//! - [`GameRegistry`] — the authoritative identity → descriptor table
//! - [`CommandRouter`] — live command string → identity bindings
//! - [`RegistryEvent`] — register/remove notifications for observers

mod descriptor;
mod error;
mod registry;
mod router;

pub use descriptor::{DescriptorOptions, GameDescriptor};
pub use error::{DescriptorError, RegistryError, RouterError};
pub use registry::{GameRegistry, RegistryEvent, RegistryObserver};
pub use router::CommandRouter;
