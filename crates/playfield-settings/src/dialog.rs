//! The seam to the host server's dialog system.

use std::future::Future;

use playfield_types::PlayerId;

/// A request for player input, rendered by the host server.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogRequest {
    /// A list dialog; the response is the index of the picked item.
    Menu { title: String, items: Vec<String> },

    /// A free-form text input dialog.
    Input { title: String, message: String },
}

/// The player's answer to a [`DialogRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum DialogResponse {
    /// The player picked item `n` of a menu.
    Item(usize),

    /// The player submitted text input.
    Text(String),

    /// The player closed the dialog without answering.
    Dismissed,
}

/// Errors from the dialog transport itself.
///
/// A dismissed dialog is a regular [`DialogResponse`], not an error;
/// these only cover the host being unable to show the dialog at all.
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    /// The player disconnected or the dialog surface is gone.
    #[error("dialog unavailable for {0}")]
    Unavailable(PlayerId),
}

/// Asynchronous prompt service provided by the host server.
///
/// `prompt` suspends until the player responds; the customization engine
/// wraps every call with its own response timeout and cancellation, so
/// implementations only need to deliver the eventual answer.
///
/// The returned future must be `Send` because session-start pipelines
/// run on spawned tasks; implementations can still be written as plain
/// `async fn prompt(...)`.
pub trait DialogService: Send + Sync + 'static {
    fn prompt(
        &self,
        player: PlayerId,
        request: DialogRequest,
    ) -> impl Future<Output = Result<DialogResponse, DialogError>> + Send;
}
