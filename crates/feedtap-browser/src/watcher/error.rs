//! Watcher error types.

use thiserror::Error;

use crate::bridge::BridgeError;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Watcher already started")]
    AlreadyStarted,

    #[error("Watcher not started")]
    NotStarted,

    #[error("Observer not found: {0}")]
    NotFound(String),

    /// `FeedtapClassObserver` is not defined in the page.
    #[error("Observer primitive missing from page")]
    PrimitiveMissing,

    #[error("Remote observer call failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
