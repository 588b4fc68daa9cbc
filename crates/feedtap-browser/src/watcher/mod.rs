//! DOM mutation watcher.
//!
//! Watches one CSS class through the injected `FeedtapClassObserver`
//! primitive and republishes appear/disappear notifications as
//! [`DomMutation`] events on [`topics::DOM_ADDED`] / [`topics::DOM_REMOVED`].
//!
//! ```text
//! Uninitialized --start--> Started --observe--> Observing --unobserve(last)--> Stopped
//!                                                   ^                              |
//!                                                   +----------observe-------------+
//! ```
//!
//! Remote observers do not survive navigation; the owner re-observes on
//! every `page:load`.

mod error;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use feedtap_core::topics;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::bridge::{Bridge, BridgeError};

pub use error::WatcherError;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

const OBSERVE: &str = r#"(className, binding) => {
    if (typeof window.FeedtapClassObserver === 'undefined') return null;
    const stamp = () => Date.now() + '_' + Math.random().toString(36).slice(2, 11);
    const id = 'observer_' + stamp();
    const observer = new window.FeedtapClassObserver({
        className,
        onAdd(el) {
            if (!el.id) el.id = 'observed-' + stamp();
            window[binding](JSON.stringify({ kind: 'added', id: el.id }));
        },
        onRemove(el) {
            window[binding](JSON.stringify({ kind: 'removed', id: el.id || 'unknown' }));
        },
    });
    observer.start();
    window.__feedtapObservers = window.__feedtapObservers || {};
    window.__feedtapObservers[id] = observer;
    return id;
}"#;

const UNOBSERVE: &str = r#"(id) => {
    const registry = window.__feedtapObservers;
    if (!registry || !registry[id]) return false;
    registry[id].destroy();
    delete registry[id];
    return true;
}"#;

const UNOBSERVE_ALL: &str = r#"() => {
    const registry = window.__feedtapObservers || {};
    for (const id of Object.keys(registry)) {
        registry[id].destroy();
        delete registry[id];
    }
    return true;
}"#;

const CHECK_STATE: &str = r#"(id) => !!(window.__feedtapObservers && window.__feedtapObservers[id])"#;

const LIST_ACTIVE: &str = r#"() => Object.keys(window.__feedtapObservers || {})"#;

/// Identifier of one remote observer instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObserverHandle(String);

impl ObserverHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a [`DomWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Uninitialized,
    Started,
    Observing,
    Stopped,
}

/// A watched element appeared or disappeared.
#[derive(Debug, Clone, PartialEq)]
pub struct DomMutation {
    /// Token of the watcher that saw it.
    pub token: u64,
    pub class_name: String,
    /// The element's `id`, assigned by the observer when it had none.
    pub element_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MutationKind {
    Added,
    Removed,
}

#[derive(Debug, Deserialize)]
struct MutationPayload {
    kind: MutationKind,
    id: String,
}

struct Inner {
    state: WatcherState,
    token: u64,
    class_name: String,
    handles: HashSet<ObserverHandle>,
}

/// Watches elements carrying one CSS class.
pub struct DomWatcher {
    bridge: Arc<Bridge>,
    inner: Mutex<Inner>,
}

impl DomWatcher {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            bridge,
            inner: Mutex::new(Inner {
                state: WatcherState::Uninitialized,
                token: 0,
                class_name: String::new(),
                handles: HashSet::new(),
            }),
        }
    }

    pub fn state(&self) -> WatcherState {
        self.inner.lock().state
    }

    /// Integer token issued by `start`, 0 before.
    pub fn token(&self) -> u64 {
        self.inner.lock().token
    }

    /// Name of the binding remote observers report through.
    pub fn binding_name(token: u64) -> String {
        format!("__feedtapDom{}", token)
    }

    /// Bind this watcher to `class_name` and expose its callback.
    pub async fn start(&self, class_name: &str) -> Result<(), WatcherError> {
        let token = {
            let mut inner = self.inner.lock();
            if inner.state != WatcherState::Uninitialized {
                return Err(WatcherError::AlreadyStarted);
            }
            let token = NEXT_TOKEN.fetch_add(1, Ordering::SeqCst);
            inner.state = WatcherState::Started;
            inner.token = token;
            inner.class_name = class_name.to_string();
            token
        };

        let hub = self.bridge.hub().clone();
        let class = class_name.to_string();
        let exposed = self
            .bridge
            .expose_function(&Self::binding_name(token), move |call| {
                let payload: MutationPayload = serde_json::from_value(call.payload)
                    .map_err(|e| BridgeError::Decode(format!("dom mutation: {}", e)))?;
                let topic = match payload.kind {
                    MutationKind::Added => topics::DOM_ADDED,
                    MutationKind::Removed => topics::DOM_REMOVED,
                };
                debug!(class = %class, element = %payload.id, topic, "dom mutation");
                hub.publish(
                    topic,
                    DomMutation {
                        token,
                        class_name: class.clone(),
                        element_id: payload.id,
                    },
                );
                Ok(())
            })
            .await;

        if let Err(e) = exposed {
            let mut inner = self.inner.lock();
            inner.state = WatcherState::Uninitialized;
            inner.token = 0;
            return Err(e.into());
        }

        info!(class = class_name, token, "dom watcher started");
        Ok(())
    }

    /// Create a remote observer over the whole document.
    pub async fn observe(&self) -> Result<ObserverHandle, WatcherError> {
        let (token, class_name) = {
            let inner = self.inner.lock();
            if inner.state == WatcherState::Uninitialized {
                return Err(WatcherError::NotStarted);
            }
            (inner.token, inner.class_name.clone())
        };

        let result = self
            .bridge
            .evaluate(OBSERVE, &[json!(class_name), json!(Self::binding_name(token))])
            .await
            .map_err(remote)?;

        let handle = match result {
            Value::String(id) => ObserverHandle(id),
            Value::Null => return Err(WatcherError::PrimitiveMissing),
            other => {
                return Err(WatcherError::Remote(format!(
                    "unexpected observer id: {}",
                    other
                )));
            }
        };

        let mut inner = self.inner.lock();
        inner.handles.insert(handle.clone());
        inner.state = WatcherState::Observing;
        debug!(observer = %handle, "observing");
        Ok(handle)
    }

    /// Destroy one remote observer.
    pub async fn unobserve(&self, handle: &ObserverHandle) -> Result<(), WatcherError> {
        self.require_known(handle)?;

        self.bridge
            .evaluate(UNOBSERVE, &[json!(handle.as_str())])
            .await
            .map_err(remote)?;

        let mut inner = self.inner.lock();
        inner.handles.remove(handle);
        if inner.handles.is_empty() && inner.state == WatcherState::Observing {
            inner.state = WatcherState::Stopped;
        }
        Ok(())
    }

    /// Destroy every remote observer, including ones this host no longer tracks.
    pub async fn unobserve_all(&self) -> Result<(), WatcherError> {
        self.bridge
            .evaluate(UNOBSERVE_ALL, &[])
            .await
            .map_err(remote)?;

        let mut inner = self.inner.lock();
        inner.handles.clear();
        if inner.state == WatcherState::Observing {
            inner.state = WatcherState::Stopped;
        }
        Ok(())
    }

    /// Whether the remote observer behind `handle` is still alive.
    pub async fn check_state(&self, handle: &ObserverHandle) -> Result<bool, WatcherError> {
        self.require_known(handle)?;

        let alive = self
            .bridge
            .evaluate(CHECK_STATE, &[json!(handle.as_str())])
            .await
            .map_err(remote)?;
        Ok(alive.as_bool().unwrap_or(false))
    }

    /// Observers currently registered in the page.
    pub async fn list_active(&self) -> Result<Vec<ObserverHandle>, WatcherError> {
        let ids = self
            .bridge
            .evaluate(LIST_ACTIVE, &[])
            .await
            .map_err(remote)?;
        let ids: Vec<String> = serde_json::from_value(ids)
            .map_err(|e| WatcherError::Remote(format!("observer list: {}", e)))?;
        Ok(ids.into_iter().map(ObserverHandle).collect())
    }

    fn require_known(&self, handle: &ObserverHandle) -> Result<(), WatcherError> {
        if self.inner.lock().handles.contains(handle) {
            Ok(())
        } else {
            Err(WatcherError::NotFound(handle.to_string()))
        }
    }
}

fn remote(e: BridgeError) -> WatcherError {
    match e {
        BridgeError::Evaluate(message) => WatcherError::Remote(message),
        other => WatcherError::Bridge(other),
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
