//! Values the bridge publishes on the hub.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One invocation of an exposed function by remote code.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingCall {
    pub name: String,
    /// The JSON value the page passed, already parsed.
    pub payload: Value,
    pub execution_context_id: i64,
}

/// Document lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageEvent {
    Load { timestamp: f64 },
    DomContentLoaded { timestamp: f64 },
}

/// Metadata of a network response seen by the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub request_id: String,
    pub url: String,
    pub status: u16,
    pub mime_type: String,
    pub resource_type: String,
}

/// A remote callback that was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeFault {
    pub binding: String,
    pub message: String,
}
