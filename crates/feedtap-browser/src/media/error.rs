//! Media capture error types.

use thiserror::Error;

use crate::bridge::BridgeError;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture controller script is not present in the page.
    #[error("Capture controller missing from page")]
    ControllerMissing,

    #[error("Video element not found: {0}")]
    ElementMissing(String),

    #[error("Malformed capture payload: {0}")]
    Decode(String),

    #[error("Remote capture call failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
