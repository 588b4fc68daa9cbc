//! Outbound events for the embedding host.

use serde::Serialize;
use serde_json::Value;

/// Event name for a confirmed login; payload is the `UserInfo` object.
pub const USER_LOGGED_IN: &str = "user-logged-in";

/// Event name for failures; payload is an array of messages.
pub const ERRORS: &str = "errors";

/// Receives named events from a running session.
pub trait EventSink: Send + Sync {
    fn emit(&self, name: &str, payload: Value);
}

/// Sink that drops everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _name: &str, _payload: Value) {}
}

/// Feed entry as handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub index: i64,
    pub title: String,
    pub cover_image_url: String,
    pub username: String,
    pub avatar_url: String,
}

impl From<&crate::feed::FeedEntry> for FeedItem {
    fn from(entry: &crate::feed::FeedEntry) -> Self {
        Self {
            index: entry.index,
            title: entry.title.clone(),
            cover_image_url: entry.cover_url.clone(),
            username: entry.author.clone(),
            avatar_url: entry.avatar_url.clone(),
        }
    }
}
