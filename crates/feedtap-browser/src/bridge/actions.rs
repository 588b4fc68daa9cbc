//! Page-level commands built on [`Bridge::evaluate`] and raw CDP calls.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tracing::debug;

use super::{Bridge, BridgeError};
use crate::cdp::{Cookie, MouseButton, MouseEventType};
use crate::element::{ElementInfo, ElementRef};

const CLICK_POINT: &str = r#"(selector) => {
    const el = document.querySelector(selector);
    if (!el) return null;
    el.scrollIntoView({ block: 'center', inline: 'center' });
    const rect = el.getBoundingClientRect();
    return { x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 };
}"#;

const SCROLL_BY: &str = r#"(selector, distance) => window.__feedtapTool.smoothScrollTo(selector, distance)"#;

const ELEMENT_INFO: &str = r#"(selector) => window.__feedtapTool.getElementInfo(selector)"#;

const COUNT: &str = r#"(selector) => document.querySelectorAll(selector).length"#;

impl Bridge {
    /// Navigate the page to `url`.
    pub async fn navigate(&self, url: &str) -> Result<(), BridgeError> {
        let result = self
            .target
            .call("Page.navigate", Some(json!({ "url": url })))
            .await?;

        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(BridgeError::Navigation(error.to_string()));
        }

        debug!("Navigated to {}", url);
        Ok(())
    }

    /// Reload the current document.
    pub async fn reload(&self) -> Result<(), BridgeError> {
        self.target.call("Page.reload", None).await?;
        Ok(())
    }

    /// Fix the page viewport size.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<(), BridgeError> {
        self.target
            .call(
                "Emulation.setDeviceMetricsOverride",
                Some(json!({
                    "width": width,
                    "height": height,
                    "deviceScaleFactor": 1,
                    "mobile": false,
                })),
            )
            .await?;
        Ok(())
    }

    /// Body of a response. Chrome only has it once the response is
    /// published on `page:response:finished`.
    pub async fn get_response_body(&self, request_id: &str) -> Result<Vec<u8>, BridgeError> {
        let result = self
            .target
            .call(
                "Network.getResponseBody",
                Some(json!({ "requestId": request_id })),
            )
            .await?;

        let body = result["body"].as_str().unwrap_or_default();
        if result["base64Encoded"].as_bool().unwrap_or(false) {
            STANDARD
                .decode(body)
                .map_err(|e| BridgeError::Decode(format!("response body: {}", e)))
        } else {
            Ok(body.as_bytes().to_vec())
        }
    }

    /// Click the centre of `element` with real mouse events.
    pub async fn click(&self, element: &ElementRef) -> Result<(), BridgeError> {
        let point = self
            .evaluate(CLICK_POINT, &[json!(element.selector())])
            .await?;
        let (Some(x), Some(y)) = (point["x"].as_f64(), point["y"].as_f64()) else {
            return Err(BridgeError::ElementMissing(element.to_string()));
        };

        for kind in [MouseEventType::MousePressed, MouseEventType::MouseReleased] {
            self.target
                .call(
                    "Input.dispatchMouseEvent",
                    Some(json!({
                        "type": kind,
                        "x": x,
                        "y": y,
                        "button": MouseButton::Left,
                        "clickCount": 1,
                    })),
                )
                .await?;
        }

        debug!("Clicked {} at ({}, {})", element, x, y);
        Ok(())
    }

    /// Smoothly scroll the window by `distance` pixels, anchored on `element`.
    /// Returns once the animation has started.
    pub async fn scroll_by(&self, element: &ElementRef, distance: f64) -> Result<(), BridgeError> {
        let started = self
            .evaluate(SCROLL_BY, &[json!(element.selector()), json!(distance)])
            .await?;
        if started.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(BridgeError::ElementMissing(element.to_string()))
        }
    }

    /// Geometry of `element`, or `None` when it does not exist.
    pub async fn element_info(&self, element: &ElementRef) -> Result<Option<ElementInfo>, BridgeError> {
        let value = self
            .evaluate(ELEMENT_INFO, &[json!(element.selector())])
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| BridgeError::Decode(format!("element info: {}", e)))
    }

    /// Number of elements matching `element`'s selector.
    pub async fn count(&self, element: &ElementRef) -> Result<usize, BridgeError> {
        let value = self.evaluate(COUNT, &[json!(element.selector())]).await?;
        Ok(value.as_u64().unwrap_or_default() as usize)
    }

    /// Every cookie in the browser.
    pub async fn cookies(&self) -> Result<Vec<Cookie>, BridgeError> {
        let result = self.target.call("Network.getAllCookies", None).await?;
        serde_json::from_value(result["cookies"].clone())
            .map_err(|e| BridgeError::Decode(format!("cookies: {}", e)))
    }

    /// Install `cookies` into the browser.
    pub async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), BridgeError> {
        self.target
            .call("Network.setCookies", Some(json!({ "cookies": cookies })))
            .await?;
        Ok(())
    }
}
