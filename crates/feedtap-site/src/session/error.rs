//! Session error types.

use feedtap_browser::{BridgeError, CaptureError, CdpError, WatcherError};
use feedtap_core::HubError;
use thiserror::Error;

use crate::channel::ChannelError;
use crate::feed::FeedError;
use crate::note::NoteError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Cdp(#[from] CdpError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Watcher(#[from] WatcherError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Note(#[from] NoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
