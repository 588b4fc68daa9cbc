//! In-memory [`RemoteTarget`] for tests.
//!
//! Scripted replies are matched newest first: per CDP method, or for
//! `Runtime.evaluate` by a substring of the evaluated function.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::cdp::{CdpError, CdpEvent, RemoteTarget};

type Reply = Box<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

enum Rule {
    Method { method: String, result: Value },
    MethodError { method: String, message: String },
    Script { needle: String, reply: Reply },
}

/// Records every call and answers from scripted rules.
pub struct FakeTarget {
    calls: Mutex<Vec<(String, Value)>>,
    rules: Mutex<Vec<Rule>>,
    events_tx: mpsc::UnboundedSender<CdpEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<CdpEvent>>>,
}

impl FakeTarget {
    pub fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    /// Answer `method` with `result`.
    pub fn on_method(&self, method: &str, result: Value) {
        self.rules.lock().push(Rule::Method {
            method: method.to_string(),
            result,
        });
    }

    /// Fail `method` with a protocol error.
    pub fn fail_method(&self, method: &str, message: &str) {
        self.rules.lock().push(Rule::MethodError {
            method: method.to_string(),
            message: message.to_string(),
        });
    }

    /// Answer evaluations whose function contains `needle` with a fixed value.
    pub fn on_script(&self, needle: &str, value: Value) {
        self.on_script_fn(needle, move |_| Ok(value.clone()));
    }

    /// Answer evaluations whose function contains `needle` by calling `reply`
    /// with the call arguments. `Err` becomes a thrown exception.
    pub fn on_script_fn<F>(&self, needle: &str, reply: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.rules.lock().push(Rule::Script {
            needle: needle.to_string(),
            reply: Box::new(reply),
        });
    }

    /// Push a CDP event as if the browser had sent it.
    pub fn emit(&self, method: &str, params: Value) {
        let _ = self.events_tx.send(CdpEvent::new(method, params));
    }

    /// Simulate the page calling binding `name` with `payload`.
    pub fn call_binding(&self, name: &str, payload: &Value) {
        self.emit(
            "Runtime.bindingCalled",
            json!({
                "name": name,
                "payload": payload.to_string(),
                "executionContextId": 1,
            }),
        );
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    /// Params of every call to `method`.
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Evaluated expressions containing `needle`.
    pub fn evaluations_of(&self, needle: &str) -> Vec<String> {
        self.calls_to("Runtime.evaluate")
            .into_iter()
            .filter_map(|p| p["expression"].as_str().map(str::to_string))
            .filter(|e| e.contains(needle))
            .collect()
    }

    /// Arguments of an expression built by `Bridge::evaluate`.
    pub fn evaluate_args(expression: &str) -> Vec<Value> {
        expression
            .rfind(").apply(null, ")
            .and_then(|pos| {
                let rest = &expression[pos + ").apply(null, ".len()..];
                let json = rest.strip_suffix(')')?;
                serde_json::from_str::<Vec<Value>>(json).ok()
            })
            .unwrap_or_default()
    }

    fn answer(&self, method: &str, params: &Value) -> Result<Value, CdpError> {
        let rules = self.rules.lock();
        let expression = params["expression"].as_str().unwrap_or_default();

        for rule in rules.iter().rev() {
            match rule {
                Rule::Method { method: m, result } if m == method => return Ok(result.clone()),
                Rule::MethodError { method: m, message } if m == method => {
                    return Err(CdpError::Protocol {
                        code: -32000,
                        message: message.clone(),
                    });
                }
                Rule::Script { needle, reply }
                    if method == "Runtime.evaluate" && expression.contains(needle.as_str()) =>
                {
                    let args = Self::evaluate_args(expression);
                    return Ok(match reply(&args) {
                        Ok(value) => json!({ "result": { "type": "object", "value": value } }),
                        Err(message) => json!({
                            "result": { "type": "object" },
                            "exceptionDetails": {
                                "exceptionId": 1,
                                "text": "Uncaught",
                                "lineNumber": 0,
                                "columnNumber": 0,
                                "exception": { "type": "object", "description": message }
                            }
                        }),
                    });
                }
                _ => {}
            }
        }

        Ok(match method {
            "Runtime.evaluate" => json!({ "result": { "type": "undefined" } }),
            _ => json!({}),
        })
    }
}

#[async_trait]
impl RemoteTarget for FakeTarget {
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        let params = params.unwrap_or(Value::Null);
        self.calls.lock().push((method.to_string(), params.clone()));
        self.answer(method, &params)
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<CdpEvent>> {
        self.events_rx.lock().take()
    }
}
