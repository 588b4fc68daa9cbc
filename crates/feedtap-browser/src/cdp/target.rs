//! The seam between page-level logic and the CDP transport.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::error::CdpError;
use super::protocol::CdpEvent;

/// A single remote page that accepts CDP commands and emits CDP events.
///
/// [`super::PageSession`] is the production implementation; tests drive the
/// bridge with an in-memory fake instead.
#[async_trait]
pub trait RemoteTarget: Send + Sync {
    /// Send a command and wait for its result.
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError>;

    /// Hand over the event stream. Returns `None` once it has been taken.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<CdpEvent>>;
}
