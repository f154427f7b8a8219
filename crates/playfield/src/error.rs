//! Unified error type for the Playfield framework.

use playfield_registry::{DescriptorError, RegistryError};
use playfield_session::SessionError;
use playfield_settings::CustomizationError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `playfield` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate. The
/// `#[from]` attribute on each variant auto-generates `From` impls, so
/// the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PlayfieldError {
    /// Descriptor validation failed (startup-time programming error).
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// A registry mutation failed (duplicate identity/command, unknown game).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A session operation failed (full, wrong state, not a participant).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Settings resolution failed (bad stored data, dialog transport).
    #[error(transparent)]
    Customization(#[from] CustomizationError),
}
