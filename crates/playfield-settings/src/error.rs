//! Error types for settings resolution.

use playfield_types::PlayerId;

use crate::dialog::DialogError;

/// Stored configuration data that cannot be interpreted.
///
/// Fatal to the resolution attempt that hit it; values are never
/// silently coerced into something valid.
#[derive(Debug, thiserror::Error)]
#[error("invalid stored configuration: {0}")]
pub struct ConfigurationDataError(pub String);

/// Errors from the customization engine.
#[derive(Debug, thiserror::Error)]
pub enum CustomizationError {
    /// Stored or declared data failed validation.
    #[error(transparent)]
    Data(#[from] ConfigurationDataError),

    /// The dialog transport failed mid-flow.
    #[error(transparent)]
    Dialog(#[from] DialogError),

    /// The player already has an interactive flow in progress.
    #[error("player {0} already has a customization flow in progress")]
    FlowInProgress(PlayerId),
}
