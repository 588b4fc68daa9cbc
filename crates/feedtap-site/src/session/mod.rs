//! Session driver: one remote page running the target site.
//!
//! `start` prepares the page (viewport, saved storage state, injected
//! scripts, capture bindings, overlay watcher, identity watch) and then
//! navigates. Commands are issued one at a time by the host; events the
//! host cares about are forwarded through an [`EventSink`].

mod error;
mod sink;

use std::sync::Arc;
use std::time::Duration;

use feedtap_browser::bridge::{BridgeFault, PageEvent};
use feedtap_browser::media::{AudioBuffer, PlaybackState, VideoFrame};
use feedtap_browser::watcher::{DomMutation, ObserverHandle};
use feedtap_browser::{
    Bridge, CaptureSettings, CdpClient, DomWatcher, MediaCapture, RemoteTarget, scripts,
};
use feedtap_config::Config;
use feedtap_core::{Hub, SubscriptionId, topics};
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, trace, warn};

use crate::channel::{ChannelEntry, ChannelReader};
use crate::feed::FeedEngine;
use crate::identity::{IdentityWatch, UserInfo};
use crate::note::{NoteDetail, NoteReader, Video};
use crate::storage::StorageState;

pub use error::SessionError;
pub use sink::{ERRORS, EventSink, FeedItem, NullSink, USER_LOGGED_IN};

/// A prepared page plus the components driving it.
pub struct Session {
    bridge: Arc<Bridge>,
    capture: Arc<MediaCapture>,
    watcher: Arc<DomWatcher>,
    feed: FeedEngine,
    channels: ChannelReader,
    notes: NoteReader,
    identity: IdentityWatch,
    open_video: Arc<Mutex<Option<Video>>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    open_settle: Duration,
    // Keeps the browser connection alive when the session owns it.
    _client: Option<CdpClient>,
}

impl Session {
    /// Connect to the browser at `config.browser.endpoint`, open a fresh page
    /// and start a session on it.
    pub async fn connect(
        config: &Config,
        hub: Arc<Hub>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, SessionError> {
        let client = CdpClient::connect_with_timeout(
            &config.browser.endpoint,
            Duration::from_secs(config.browser.call_timeout_secs),
        )
        .await?;
        let page = client.new_page(None).await?;
        info!(target_id = page.target_id(), "page opened");

        let mut session = Self::start(config, hub, Arc::new(page), sink).await?;
        session._client = Some(client);
        Ok(session)
    }

    /// Prepare `target` and navigate it to the site.
    pub async fn start(
        config: &Config,
        hub: Arc<Hub>,
        target: Arc<dyn RemoteTarget>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, SessionError> {
        let bridge = Arc::new(Bridge::new(target, hub.clone())?);

        bridge
            .set_viewport(config.browser.viewport_width, config.browser.viewport_height)
            .await?;

        let state_path = config.storage.state_path();
        match StorageState::load(&state_path).await {
            Ok(Some(state)) => state.restore(&bridge).await?,
            Ok(None) => debug!(path = %state_path.display(), "no saved storage state"),
            Err(e) => warn!(path = %state_path.display(), error = %e, "ignoring unreadable storage state"),
        }

        for script in [scripts::STEALTH, scripts::TOOL, scripts::CLASS_OBSERVER] {
            bridge.inject_on_load(script).await?;
        }

        let capture = Arc::new(MediaCapture::new(
            bridge.clone(),
            CaptureSettings {
                block_size: config.capture.audio_block_size,
                energy_threshold: config.capture.energy_threshold,
                sample_rate: config.capture.sample_rate,
            },
        ));
        capture.install().await?;

        let watcher = Arc::new(DomWatcher::new(bridge.clone()));
        watcher.start(&config.site.overlay_class).await?;

        let open_video: Arc<Mutex<Option<Video>>> = Arc::new(Mutex::new(None));
        let subscriptions = subscribe_all(&hub, &watcher, &open_video, &sink)?;

        let identity =
            IdentityWatch::start(bridge.clone(), &config.site.identity_api, state_path)?;

        let session = Self {
            feed: FeedEngine::new(bridge.clone(), config.site.selectors.feed.clone()),
            channels: ChannelReader::new(
                bridge.clone(),
                config.site.selectors.channel.clone(),
                Duration::from_millis(config.site.channel_wait_ms),
            ),
            notes: NoteReader::new(
                bridge.clone(),
                capture.clone(),
                config.site.selectors.note.clone(),
            ),
            bridge,
            capture,
            watcher,
            identity,
            open_video,
            subscriptions: Mutex::new(subscriptions),
            open_settle: Duration::from_millis(config.site.open_settle_ms),
            _client: None,
        };

        session.bridge.navigate(&config.site.url).await?;
        info!(url = %config.site.url, "session started");
        Ok(session)
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    pub fn feed(&self) -> &FeedEngine {
        &self.feed
    }

    /// Scan the feed and return the new entries.
    pub async fn get_items(&self) -> Result<Vec<FeedItem>, SessionError> {
        let page = self.feed.scan().await?;
        Ok(page.iter().map(FeedItem::from).collect())
    }

    pub async fn next_page(&self) -> Result<(), SessionError> {
        Ok(self.feed.next_page().await?)
    }

    pub async fn refresh(&self) -> Result<(), SessionError> {
        Ok(self.feed.refresh_page().await?)
    }

    /// The explore channel bar.
    pub async fn channels(&self) -> Result<Vec<ChannelEntry>, SessionError> {
        Ok(self.channels.list().await?)
    }

    /// Switch the feed to channel `name`. The new channel numbers its
    /// entries from scratch, so everything seen so far is forgotten.
    pub async fn select_channel(&self, name: &str) -> Result<ChannelEntry, SessionError> {
        let channel = self.channels.select(name).await?;
        self.feed.reset();
        Ok(channel)
    }

    /// Open feed entry `index` and read the note. Video notes start capturing
    /// and report playback changes; the player is unmuted whenever it
    /// reports a change while muted. A video left open by the previous note
    /// is released first.
    pub async fn on_item_click(&self, index: i64) -> Result<NoteDetail, SessionError> {
        let entry = self.feed.get_feed(index)?;
        close_video(&self.open_video).await;
        self.bridge.click(&entry.element).await?;
        tokio::time::sleep(self.open_settle).await;

        let note = self.notes.read().await?;
        match note.video() {
            Some(video) => {
                video.start_capture().await?;
                video.watch_playback().await?;
                *self.open_video.lock() = Some(video.clone());
                info!(index, "video note opened");
            }
            None => info!(index, slides = note.slides().len(), "image note opened"),
        }
        Ok(note)
    }

    /// The video of the open note, while it is being captured.
    pub fn open_video(&self) -> Option<Video> {
        self.open_video.lock().clone()
    }

    /// Remote observers currently registered in the page.
    pub async fn observers(&self) -> Result<Vec<ObserverHandle>, SessionError> {
        Ok(self.watcher.list_active().await?)
    }

    /// Tear down captures and observers and stop listening. Failures are
    /// logged; the session is unusable afterwards either way.
    pub async fn shutdown(&self) {
        if let Err(e) = self.capture.destroy_all().await {
            warn!(error = %e, "failed to destroy captures");
        }
        if let Err(e) = self.watcher.unobserve_all().await {
            warn!(error = %e, "failed to remove observers");
        }
        self.open_video.lock().take();

        let hub = self.bridge.hub();
        for id in self.subscriptions.lock().drain(..) {
            let _ = hub.unsubscribe(id);
        }
        self.identity.stop();
        self.bridge.shutdown();
        info!("session shut down");
    }
}

fn subscribe_all(
    hub: &Hub,
    watcher: &Arc<DomWatcher>,
    open_video: &Arc<Mutex<Option<Video>>>,
    sink: &Arc<dyn EventSink>,
) -> Result<Vec<SubscriptionId>, SessionError> {
    let mut ids = Vec::new();

    // Remote observers die with the document.
    let w = watcher.clone();
    ids.push(hub.subscribe_typed::<PageEvent, _>(topics::PAGE_LOAD, move |_| {
        let watcher = w.clone();
        tokio::spawn(async move {
            if let Err(e) = watcher.unobserve_all().await {
                warn!(error = %e, "failed to clear observers after load");
            }
            match watcher.observe().await {
                Ok(handle) => debug!(observer = %handle, "overlay observer installed"),
                Err(e) => warn!(error = %e, "failed to observe overlay"),
            }
        });
    })?);

    ids.push(hub.subscribe_typed::<DomMutation, _>(topics::DOM_ADDED, |m| {
        info!(element = %m.element_id, "note overlay opened");
    })?);
    let video = open_video.clone();
    ids.push(hub.subscribe_typed::<DomMutation, _>(topics::DOM_REMOVED, move |m| {
        info!(element = %m.element_id, "note overlay closed");
        let video = video.clone();
        tokio::spawn(async move { close_video(&video).await });
    })?);

    let video = open_video.clone();
    ids.push(hub.subscribe_typed::<PlaybackState, _>(topics::MEDIA_VIDEO_STATE, move |state| {
        debug!(playing = state.playing, "playback changed");
        let Some(video) = video.lock().clone() else {
            return;
        };
        tokio::spawn(async move {
            match video.is_muted().await {
                Ok(true) => {
                    if let Err(e) = video.toggle_volume().await {
                        warn!(error = %e, "failed to unmute video");
                    }
                }
                Ok(false) => {}
                Err(e) => debug!(error = %e, "mute state unavailable"),
            }
        });
    })?);

    ids.push(hub.subscribe_typed::<AudioBuffer, _>(topics::MEDIA_VIDEO_AUDIO, |buffer| {
        trace!(frames = buffer.frame_count, ts = buffer.timestamp, "audio");
    })?);
    ids.push(hub.subscribe_typed::<VideoFrame, _>(topics::MEDIA_VIDEO_FRAME, |frame| {
        trace!(width = frame.width, height = frame.height, ts = frame.timestamp, "frame");
    })?);

    let s = sink.clone();
    ids.push(hub.subscribe_typed::<UserInfo, _>(topics::USER_LOGGED_IN, move |user| {
        match serde_json::to_value(user) {
            Ok(payload) => s.emit(USER_LOGGED_IN, payload),
            Err(e) => warn!(error = %e, "failed to encode user"),
        }
    })?);

    let s = sink.clone();
    ids.push(hub.subscribe_typed::<BridgeFault, _>(topics::BRIDGE_ERROR, move |fault| {
        s.emit(ERRORS, json!([format!("{}: {}", fault.binding, fault.message)]));
    })?);

    Ok(ids)
}

/// Stop capturing the open video, if any, and forget it.
async fn close_video(slot: &Mutex<Option<Video>>) {
    let Some(video) = slot.lock().take() else {
        return;
    };
    if let Err(e) = video.unwatch_playback().await {
        warn!(error = %e, "failed to unwatch playback");
    }
    if let Err(e) = video.destroy_capture().await {
        warn!(error = %e, "failed to destroy capture");
    }
    debug!(video = %video.element(), "video released");
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
