//! Feed engine error types.

use feedtap_browser::BridgeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed entry not found: {0}")]
    NotFound(i64),

    #[error("Feed container not found: {0}")]
    ContainerMissing(String),

    #[error("Remote feed query failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
