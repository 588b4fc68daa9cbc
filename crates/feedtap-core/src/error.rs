//! Hub error types.

use thiserror::Error;

/// Errors returned by [`crate::Hub`] registration calls.
///
/// Publishing never fails; only subscription management does.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// Topic name is empty or contains characters outside `[A-Za-z0-9:._-]`.
    #[error("Invalid topic name: {0:?}")]
    InvalidTopic(String),

    /// Subscribe was called outside of a Tokio runtime.
    #[error("No async runtime available to dispatch events")]
    NoRuntime,

    /// Unknown subscription id.
    #[error("Subscription not found: {0}")]
    NotFound(u64),
}
