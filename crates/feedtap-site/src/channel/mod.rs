//! Explore channel bar (recommended, fashion, food, ...).
//!
//! The bar renders after the feed, so `list` polls until it shows at least
//! one channel or the configured wait runs out.

use std::sync::Arc;
use std::time::Duration;

use feedtap_browser::element::REF_ATTRIBUTE;
use feedtap_browser::{Bridge, BridgeError, ElementRef};
use feedtap_config::ChannelSelectors;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const LIST: &str = r#"(sel, refAttribute) => {
    const container = document.querySelector(sel.container);
    if (!container) return null;
    return Array.from(container.querySelectorAll(sel.item)).map((el) => {
        let tag = el.getAttribute(refAttribute);
        if (!tag) {
            window.__feedtapChannelSeq = (window.__feedtapChannelSeq || 0) + 1;
            tag = 'channel-' + window.__feedtapChannelSeq;
            el.setAttribute(refAttribute, tag);
        }
        return { ref: tag, text: (el.textContent || '').trim(), className: el.getAttribute('class') || '' };
    });
}"#;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("No channels rendered in {0}")]
    NotLoaded(String),

    #[error("Channel not found: {0}")]
    NotFound(String),

    #[error("Remote channel query failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// One entry of the channel bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelEntry {
    pub text: String,
    /// Whether this is the channel currently shown.
    pub active: bool,
    #[serde(skip)]
    pub element: ElementRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChannel {
    #[serde(rename = "ref")]
    tag: String,
    text: String,
    class_name: String,
}

pub struct ChannelReader {
    bridge: Arc<Bridge>,
    selectors: ChannelSelectors,
    wait: Duration,
}

impl ChannelReader {
    pub fn new(bridge: Arc<Bridge>, selectors: ChannelSelectors, wait: Duration) -> Self {
        Self {
            bridge,
            selectors,
            wait,
        }
    }

    /// Channels in bar order. Fails with `NotLoaded` when none appear within
    /// the wait.
    pub async fn list(&self) -> Result<Vec<ChannelEntry>, ChannelError> {
        let sel = &self.selectors;
        let args = [
            json!({ "container": sel.container, "item": sel.item }),
            json!(REF_ATTRIBUTE),
        ];
        let deadline = Instant::now() + self.wait;

        loop {
            let value = self.bridge.evaluate(LIST, &args).await.map_err(remote)?;
            let raw: Vec<RawChannel> = match value {
                serde_json::Value::Null => Vec::new(),
                value => serde_json::from_value(value)
                    .map_err(|e| ChannelError::Remote(format!("channels: {}", e)))?,
            };

            if !raw.is_empty() {
                let channels: Vec<ChannelEntry> = raw
                    .into_iter()
                    .map(|c| ChannelEntry {
                        active: has_class(&c.class_name, &sel.active_class),
                        text: c.text,
                        element: ElementRef::tagged(&c.tag),
                    })
                    .collect();
                debug!(count = channels.len(), "channels listed");
                return Ok(channels);
            }
            if Instant::now() >= deadline {
                return Err(ChannelError::NotLoaded(format!(
                    "{} {}",
                    sel.container, sel.item
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Click the channel whose text is `name`.
    pub async fn select(&self, name: &str) -> Result<ChannelEntry, ChannelError> {
        let channel = self
            .list()
            .await?
            .into_iter()
            .find(|c| c.text == name)
            .ok_or_else(|| ChannelError::NotFound(name.to_string()))?;
        self.bridge.click(&channel.element).await.map_err(remote)?;
        info!(channel = name, "channel selected");
        Ok(channel)
    }
}

/// Whether the space-separated `class_name` list contains `class`.
pub fn has_class(class_name: &str, class: &str) -> bool {
    class_name.split_whitespace().any(|c| c == class)
}

fn remote(e: BridgeError) -> ChannelError {
    match e {
        BridgeError::Evaluate(message) => ChannelError::Remote(message),
        other => ChannelError::Bridge(other),
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
