//! Explore feed extraction and pagination.
//!
//! `scan` reads every section of the feed container in one evaluation and
//! keeps the ones that are on screen, complete and not seen before. The
//! engine remembers every index it has ever returned, so a section is
//! emitted at most once per session no matter how often the DOM re-renders
//! it.

mod error;

use std::collections::HashSet;
use std::sync::Arc;

use feedtap_browser::element::REF_ATTRIBUTE;
use feedtap_browser::{Bridge, BridgeError, ElementRef};
use feedtap_config::FeedSelectors;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

pub use error::FeedError;

// Stamps each section with a stable ref so later commands can find it again.
const SCAN: &str = r#"(sel, refAttribute) => {
    const container = document.querySelector(sel.container);
    if (!container) return null;
    const windowHeight = window.innerHeight || document.documentElement.clientHeight;
    const text = (root, s) => {
        const el = root && root.querySelector(s);
        return el ? (el.textContent || '').trim() : null;
    };
    const src = (root, s) => {
        const el = root && root.querySelector(s);
        return el ? el.getAttribute('src') : null;
    };
    return Array.from(container.querySelectorAll(sel.section)).map((section) => {
        let tag = section.getAttribute(refAttribute);
        if (!tag) {
            window.__feedtapRefSeq = (window.__feedtapRefSeq || 0) + 1;
            tag = 'feed-' + window.__feedtapRefSeq;
            section.setAttribute(refAttribute, tag);
        }
        const rect = section.getBoundingClientRect();
        const author = section.querySelector(sel.author);
        return {
            ref: tag,
            visible: rect.top < windowHeight && rect.bottom >= 0,
            index: section.getAttribute(sel.indexAttribute),
            cover: src(section, sel.cover),
            title: text(section, sel.title),
            author: author ? (author.textContent || '').trim() : null,
            avatar: src(author, sel.avatar),
            likes: text(section, sel.likes),
        };
    });
}"#;

/// One feed card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    /// The section's `data-index`; unique per session.
    pub index: i64,
    pub title: String,
    pub cover_url: String,
    pub author: String,
    pub avatar_url: String,
    /// Empty when the card shows no like counter.
    pub likes: String,
    pub element: ElementRef,
}

/// A section as the page reports it, before filtering.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSection {
    #[serde(rename = "ref")]
    pub tag: String,
    pub visible: bool,
    pub index: Option<String>,
    pub cover: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub avatar: Option<String>,
    pub likes: Option<String>,
}

#[derive(Default)]
struct FeedState {
    all_feeds: Vec<FeedEntry>,
    seen: HashSet<i64>,
    page_feeds: Vec<FeedEntry>,
}

/// Incremental reader over the explore feed.
pub struct FeedEngine {
    bridge: Arc<Bridge>,
    selectors: FeedSelectors,
    state: Mutex<FeedState>,
}

impl FeedEngine {
    pub fn new(bridge: Arc<Bridge>, selectors: FeedSelectors) -> Self {
        Self {
            bridge,
            selectors,
            state: Mutex::new(FeedState::default()),
        }
    }

    /// Read the sections currently on screen. Returns the new page, which
    /// also replaces the engine's current page.
    pub async fn scan(&self) -> Result<Vec<FeedEntry>, FeedError> {
        let sel = &self.selectors;
        let args = [
            json!({
                "container": sel.container,
                "section": sel.section,
                "indexAttribute": sel.index_attribute,
                "cover": sel.cover,
                "title": sel.title,
                "author": sel.author,
                "avatar": sel.avatar,
                "likes": sel.likes,
            }),
            json!(REF_ATTRIBUTE),
        ];

        let value = self.bridge.evaluate(SCAN, &args).await.map_err(remote)?;
        if value.is_null() {
            return Err(FeedError::ContainerMissing(sel.container.clone()));
        }
        let raw: Vec<RawSection> = serde_json::from_value(value)
            .map_err(|e| FeedError::Remote(format!("feed sections: {}", e)))?;
        let total = raw.len();

        let mut state = self.state.lock();
        let page = filter_sections(raw, &state.seen);
        state.seen.extend(page.iter().map(|f| f.index));
        state.all_feeds.extend(page.iter().cloned());
        state.page_feeds = page.clone();

        debug!(sections = total, new = page.len(), seen = state.seen.len(), "feed scanned");
        Ok(page)
    }

    /// Scroll the feed by one container height. Does nothing until a scan
    /// has returned at least one entry, and does not wait for new content.
    pub async fn next_page(&self) -> Result<(), FeedError> {
        if self.state.lock().all_feeds.is_empty() {
            debug!("next page skipped, nothing loaded yet");
            return Ok(());
        }

        let container = ElementRef::new(self.selectors.container.as_str());
        let info = self
            .bridge
            .element_info(&container)
            .await
            .map_err(remote)?
            .ok_or_else(|| FeedError::ContainerMissing(self.selectors.container.clone()))?;

        let distance = info.element.visible_height;
        self.bridge
            .scroll_by(&container, distance)
            .await
            .map_err(remote)?;
        debug!(distance, "feed scrolled");
        Ok(())
    }

    /// Entry `index` from the current page. Earlier pages are not searched.
    pub fn get_feed(&self, index: i64) -> Result<FeedEntry, FeedError> {
        self.state
            .lock()
            .page_feeds
            .iter()
            .find(|f| f.index == index)
            .cloned()
            .ok_or(FeedError::NotFound(index))
    }

    /// Click the feed's reload control and forget everything seen so far.
    /// The sets are cleared even when the click fails.
    pub async fn refresh_page(&self) -> Result<(), FeedError> {
        let reload = ElementRef::new(self.selectors.container.as_str()).child(&self.selectors.reload);
        let clicked = self.bridge.click(&reload).await;
        self.reset();

        clicked.map_err(remote)?;
        info!("feed refreshed");
        Ok(())
    }

    /// Forget every entry seen so far. Needed whenever the page starts a new
    /// index sequence, as after switching channels.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.page_feeds.clear();
        state.all_feeds.clear();
        state.seen.clear();
    }

    /// The current page.
    pub fn page_feeds(&self) -> Vec<FeedEntry> {
        self.state.lock().page_feeds.clone()
    }

    /// Every entry returned since the last refresh.
    pub fn all_feeds(&self) -> Vec<FeedEntry> {
        self.state.lock().all_feeds.clone()
    }
}

/// Keep visible, complete sections whose index is neither in `seen` nor
/// repeated earlier in `raw`. The first occurrence of an index wins.
pub fn filter_sections(raw: Vec<RawSection>, seen: &HashSet<i64>) -> Vec<FeedEntry> {
    let mut taken = HashSet::new();
    let mut page = Vec::new();

    for section in raw {
        if !section.visible {
            continue;
        }
        let Some(index) = section.index.as_deref().and_then(|i| i.trim().parse::<i64>().ok())
        else {
            continue;
        };
        if seen.contains(&index) || taken.contains(&index) {
            continue;
        }
        let (Some(cover_url), Some(title), Some(author), Some(avatar_url)) = (
            non_empty(section.cover),
            non_empty(section.title),
            non_empty(section.author),
            non_empty(section.avatar),
        ) else {
            continue;
        };

        taken.insert(index);
        page.push(FeedEntry {
            index,
            title,
            cover_url,
            author,
            avatar_url,
            likes: section.likes.unwrap_or_default(),
            element: ElementRef::tagged(&section.tag),
        });
    }

    page
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn remote(e: BridgeError) -> FeedError {
    match e {
        BridgeError::Evaluate(message) => FeedError::Remote(message),
        other => FeedError::Bridge(other),
    }
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
