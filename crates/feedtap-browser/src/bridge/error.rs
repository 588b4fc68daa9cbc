//! Bridge error types.

use thiserror::Error;

use crate::cdp::CdpError;

/// Errors from the remote bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The bridge could not be wired up.
    #[error("Bridge setup failed: {0}")]
    Setup(String),

    /// A binding with this name is already registered in the context.
    #[error("Function already exposed: {0}")]
    AlreadyExposed(String),

    /// The evaluated script threw.
    #[error("Remote evaluation failed: {0}")]
    Evaluate(String),

    /// A selector matched nothing.
    #[error("Element not found: {0}")]
    ElementMissing(String),

    /// Navigation was rejected by the browser.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// A remote payload could not be decoded.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Transport failure.
    #[error(transparent)]
    Cdp(#[from] CdpError),
}
