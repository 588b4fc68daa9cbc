//! Note reader error types.

use feedtap_browser::{BridgeError, CaptureError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoteError {
    /// No note detail is open.
    #[error("Note container not found: {0}")]
    ContainerMissing(String),

    #[error("Note element not found: {0}")]
    ElementMissing(String),

    #[error("Remote note query failed: {0}")]
    Remote(String),

    #[error("Malformed note data: {0}")]
    Decode(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub(crate) fn remote(e: BridgeError) -> NoteError {
    match e {
        BridgeError::Evaluate(message) => NoteError::Remote(message),
        other => NoteError::Bridge(other),
    }
}
