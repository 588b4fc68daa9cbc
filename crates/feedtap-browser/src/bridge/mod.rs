//! Host/remote callback bridge.
//!
//! The bridge owns one page. It exposes host functions to remote code
//! through `Runtime.addBinding`, injects scripts that run before page code on
//! every navigation, evaluates functions with JSON arguments, and turns the
//! page's CDP event stream into hub publications. Bindings survive
//! navigations, so each name is exposed once per bridge.
//!
//! Remote invocations arrive as messages on the session's event channel and
//! are handled on a single dispatch task; a handler that fails drops that one
//! invocation and reports it on [`topics::BRIDGE_ERROR`].

mod actions;
mod error;
mod events;

use std::collections::HashMap;
use std::sync::Arc;

use feedtap_core::{Hub, topics};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::cdp::{CdpEvent, ExceptionDetails, RemoteTarget};

pub use error::BridgeError;
pub use events::{BindingCall, BridgeFault, PageEvent, ResponseInfo};

/// Host function callable from the page.
pub type BindingHandler = Arc<dyn Fn(BindingCall) -> Result<(), BridgeError> + Send + Sync>;

type BindingTable = Arc<RwLock<HashMap<String, BindingHandler>>>;

/// Bridge between the host and one remote page.
pub struct Bridge {
    target: Arc<dyn RemoteTarget>,
    hub: Arc<Hub>,
    bindings: BindingTable,
    /// Serializes `evaluate` calls on this page.
    eval_lock: tokio::sync::Mutex<()>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    /// Take over `target`'s event stream and start dispatching it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(target: Arc<dyn RemoteTarget>, hub: Arc<Hub>) -> Result<Self, BridgeError> {
        let runtime = Handle::try_current()
            .map_err(|_| BridgeError::Setup("no async runtime".to_string()))?;
        let events = target
            .take_events()
            .ok_or_else(|| BridgeError::Setup("event stream already taken".to_string()))?;

        let bindings: BindingTable = Arc::new(RwLock::new(HashMap::new()));
        let task = runtime.spawn(dispatch_loop(events, bindings.clone(), hub.clone()));

        Ok(Self {
            target,
            hub,
            bindings,
            eval_lock: tokio::sync::Mutex::new(()),
            dispatch: Mutex::new(Some(task)),
        })
    }

    /// The hub this bridge publishes on.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// The underlying page.
    pub fn target(&self) -> &Arc<dyn RemoteTarget> {
        &self.target
    }

    /// Make `name` callable from the page as `window[name](jsonString)`.
    pub async fn expose_function<F>(&self, name: &str, handler: F) -> Result<(), BridgeError>
    where
        F: Fn(BindingCall) -> Result<(), BridgeError> + Send + Sync + 'static,
    {
        {
            let mut bindings = self.bindings.write();
            if bindings.contains_key(name) {
                return Err(BridgeError::AlreadyExposed(name.to_string()));
            }
            bindings.insert(name.to_string(), Arc::new(handler));
        }

        if let Err(e) = self
            .target
            .call("Runtime.addBinding", Some(json!({ "name": name })))
            .await
        {
            self.bindings.write().remove(name);
            return Err(e.into());
        }

        debug!(binding = name, "exposed function");
        Ok(())
    }

    /// Whether `name` has been exposed on this bridge.
    pub fn is_exposed(&self, name: &str) -> bool {
        self.bindings.read().contains_key(name)
    }

    /// Run `source` before any page script on every subsequent navigation.
    /// Returns the browser's identifier for the script.
    pub async fn inject_on_load(&self, source: &str) -> Result<String, BridgeError> {
        let result = self
            .target
            .call(
                "Page.addScriptToEvaluateOnNewDocument",
                Some(json!({ "source": source })),
            )
            .await?;

        let identifier = result["identifier"].as_str().unwrap_or_default().to_string();
        debug!(script = %identifier, bytes = source.len(), "injected on-load script");
        Ok(identifier)
    }

    /// Call the JS function expression `script` with `args` and return its
    /// JSON result. Promises are awaited; `undefined` becomes `null`.
    pub async fn evaluate(&self, script: &str, args: &[Value]) -> Result<Value, BridgeError> {
        let expression = format!("({}).apply(null, {})", script, Value::from(args.to_vec()));

        let _guard = self.eval_lock.lock().await;
        let result = self
            .target
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                    "userGesture": true,
                })),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = serde_json::from_value::<ExceptionDetails>(details.clone())
                .map(|d| d.message())
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BridgeError::Evaluate(message));
        }

        Ok(result["result"]
            .get("value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Stop dispatching remote events.
    pub fn shutdown(&self) {
        if let Some(task) = self.dispatch.lock().take() {
            task.abort();
            info!("bridge dispatch stopped");
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Some(task) = self.dispatch.get_mut().take() {
            task.abort();
        }
    }
}

async fn dispatch_loop(
    mut events: mpsc::UnboundedReceiver<CdpEvent>,
    bindings: BindingTable,
    hub: Arc<Hub>,
) {
    // Responses whose body is still loading, by request id.
    let mut in_flight: HashMap<String, ResponseInfo> = HashMap::new();

    while let Some(event) = events.recv().await {
        match event.method.as_str() {
            "Runtime.bindingCalled" => dispatch_binding(&event.params, &bindings, &hub),
            "Page.loadEventFired" => {
                let timestamp = event.params["timestamp"].as_f64().unwrap_or_default();
                hub.publish(topics::PAGE_LOAD, PageEvent::Load { timestamp });
            }
            "Page.domContentEventFired" => {
                let timestamp = event.params["timestamp"].as_f64().unwrap_or_default();
                hub.publish(
                    topics::PAGE_DOM_CONTENT_LOADED,
                    PageEvent::DomContentLoaded { timestamp },
                );
            }
            "Network.responseReceived" => match parse_response(&event.params) {
                Some(info) => {
                    in_flight.insert(info.request_id.clone(), info.clone());
                    hub.publish(topics::PAGE_RESPONSE, info);
                }
                None => trace!("response event without url"),
            },
            "Network.loadingFinished" => {
                let request_id = event.params["requestId"].as_str().unwrap_or_default();
                if let Some(info) = in_flight.remove(request_id) {
                    hub.publish(topics::PAGE_RESPONSE_FINISHED, info);
                }
            }
            "Network.loadingFailed" => {
                let request_id = event.params["requestId"].as_str().unwrap_or_default();
                if in_flight.remove(request_id).is_some() {
                    debug!(
                        request_id,
                        error = event.params["errorText"].as_str().unwrap_or_default(),
                        "response body failed to load"
                    );
                }
            }
            other => trace!(method = other, "ignored CDP event"),
        }
    }
    debug!("page event stream ended");
}

fn dispatch_binding(params: &Value, bindings: &BindingTable, hub: &Hub) {
    let name = params["name"].as_str().unwrap_or_default();

    // Clone the handler out so no lock is held while it runs.
    let handler = bindings.read().get(name).cloned();
    let Some(handler) = handler else {
        trace!(binding = name, "call for unknown binding");
        return;
    };

    let raw = params["payload"].as_str().unwrap_or_default();
    let outcome = serde_json::from_str::<Value>(raw)
        .map_err(|e| BridgeError::Decode(format!("payload is not JSON: {}", e)))
        .and_then(|payload| {
            handler(BindingCall {
                name: name.to_string(),
                payload,
                execution_context_id: params["executionContextId"].as_i64().unwrap_or_default(),
            })
        });

    if let Err(e) = outcome {
        warn!(binding = name, error = %e, "dropped remote callback");
        hub.publish(
            topics::BRIDGE_ERROR,
            BridgeFault {
                binding: name.to_string(),
                message: e.to_string(),
            },
        );
    }
}

fn parse_response(params: &Value) -> Option<ResponseInfo> {
    let response = &params["response"];
    Some(ResponseInfo {
        request_id: params["requestId"].as_str().unwrap_or_default().to_string(),
        url: response["url"].as_str()?.to_string(),
        status: response["status"].as_u64().unwrap_or_default() as u16,
        mime_type: response["mimeType"].as_str().unwrap_or_default().to_string(),
        resource_type: params["type"].as_str().unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
