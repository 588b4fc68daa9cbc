//! Live media capture from `<video>` elements.
//!
//! The injected controller taps a video's audio graph in fixed-size blocks
//! and rasterizes each animation frame, pushing both back through bindings.
//! Payloads are base64 so they fit CDP's string-only binding channel. The
//! host decodes, validates and re-applies the energy gate, then publishes
//! [`AudioBuffer`] on [`topics::MEDIA_VIDEO_AUDIO`] and [`VideoFrame`] on
//! [`topics::MEDIA_VIDEO_FRAME`].
//!
//! Capture is cooperative: after `stop`, callbacks already in flight may
//! still arrive.

mod decode;
mod error;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use feedtap_core::topics;
use serde_json::{Value, json};
use tracing::{debug, info, trace};

use crate::bridge::{Bridge, BridgeError};
use crate::element::ElementRef;
use crate::scripts;

pub use decode::{
    AudioBuffer, PlaybackState, VideoFrame, decode_audio, decode_frame, decode_state,
    passes_energy_gate,
};
pub use error::CaptureError;

pub const AUDIO_BINDING: &str = "__feedtapOnAudio";
pub const FRAME_BINDING: &str = "__feedtapOnFrame";
pub const STATE_BINDING: &str = "__feedtapOnVideoState";

/// Capture tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    /// Samples per audio block; a power of two in 256..=16384.
    pub block_size: u32,
    /// Blocks at or below this channel-0 energy are dropped.
    pub energy_threshold: f32,
    pub sample_rate: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            block_size: 4096,
            energy_threshold: 0.001,
            sample_rate: 48000,
        }
    }
}

// Every per-element call resolves the controller and the element first and
// reports which one is missing.
const CALL_ON_VIDEO: &str = r#"(method, selector) => {
    const controller = window.__feedtapMedia;
    if (!controller) return { status: 'controller-missing' };
    const video = document.querySelector(selector);
    if (!video) return { status: 'element-missing' };
    return Promise.resolve(controller[method](video)).then((value) => ({ status: 'ok', value }));
}"#;

const CALL_ON_ALL: &str = r#"(method) => {
    const controller = window.__feedtapMedia;
    if (!controller) return { status: 'controller-missing' };
    controller[method]();
    return { status: 'ok', value: true };
}"#;

/// Handle to the page's capture controller.
pub struct MediaCapture {
    bridge: Arc<Bridge>,
    settings: CaptureSettings,
    installed: AtomicBool,
}

impl MediaCapture {
    pub fn new(bridge: Arc<Bridge>, settings: CaptureSettings) -> Self {
        Self {
            bridge,
            settings,
            installed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> CaptureSettings {
        self.settings
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// Expose the capture bindings and inject the controller for every
    /// subsequent navigation.
    pub async fn install(&self) -> Result<(), CaptureError> {
        let hub = self.bridge.hub().clone();
        let threshold = self.settings.energy_threshold;
        self.bridge
            .expose_function(AUDIO_BINDING, move |call| {
                match decode_audio(call.payload, threshold).map_err(decode_failed)? {
                    Some(buffer) => {
                        trace!(frames = buffer.frame_count, ts = buffer.timestamp, "audio block");
                        hub.publish(topics::MEDIA_VIDEO_AUDIO, buffer);
                    }
                    None => trace!("silent audio block dropped"),
                }
                Ok(())
            })
            .await?;

        let hub = self.bridge.hub().clone();
        self.bridge
            .expose_function(FRAME_BINDING, move |call| {
                let frame = decode_frame(call.payload).map_err(decode_failed)?;
                trace!(width = frame.width, height = frame.height, "video frame");
                hub.publish(topics::MEDIA_VIDEO_FRAME, frame);
                Ok(())
            })
            .await?;

        let hub = self.bridge.hub().clone();
        self.bridge
            .expose_function(STATE_BINDING, move |call| {
                let state = decode_state(call.payload).map_err(decode_failed)?;
                debug!(playing = state.playing, "playback state");
                hub.publish(topics::MEDIA_VIDEO_STATE, state);
                Ok(())
            })
            .await?;

        let script = scripts::media_capture(
            self.settings.block_size,
            self.settings.energy_threshold,
            self.settings.sample_rate,
        );
        self.bridge.inject_on_load(&script).await?;

        self.installed.store(true, Ordering::SeqCst);
        info!(
            block_size = self.settings.block_size,
            threshold = self.settings.energy_threshold,
            "media capture installed"
        );
        Ok(())
    }

    /// Begin capturing `video`. Starting an element that is already
    /// capturing does nothing.
    pub async fn start(&self, video: &ElementRef) -> Result<(), CaptureError> {
        let started = self.call_on_video("start", video, true).await?;
        if started.as_bool() == Some(true) {
            info!(video = %video, "capture started");
        } else {
            debug!(video = %video, "capture already running");
        }
        Ok(())
    }

    /// Stop capturing `video`, keeping its audio context suspended.
    pub async fn stop(&self, video: &ElementRef) -> Result<(), CaptureError> {
        self.call_on_video("stop", video, false).await?;
        Ok(())
    }

    /// Stop capturing `video` and close its audio context.
    pub async fn destroy(&self, video: &ElementRef) -> Result<(), CaptureError> {
        self.call_on_video("destroy", video, false).await?;
        Ok(())
    }

    pub async fn stop_all(&self) -> Result<(), CaptureError> {
        self.call_on_all("stopAll").await
    }

    pub async fn destroy_all(&self) -> Result<(), CaptureError> {
        self.call_on_all("destroyAll").await
    }

    pub async fn is_capturing(&self, video: &ElementRef) -> Result<bool, CaptureError> {
        let value = self.call_on_video("isCapturing", video, false).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Publish [`PlaybackState`] on every play/pause/buffering change of
    /// `video`. Listeners are attached at most once per element.
    pub async fn watch_playback(&self, video: &ElementRef) -> Result<(), CaptureError> {
        self.call_on_video("watchPlayback", video, true).await?;
        Ok(())
    }

    pub async fn unwatch_playback(&self, video: &ElementRef) -> Result<(), CaptureError> {
        self.call_on_video("unwatchPlayback", video, false).await?;
        Ok(())
    }

    /// Run a controller method on `video`. A missing element is an error only
    /// when `require_element` is set; otherwise the call is a no-op.
    async fn call_on_video(
        &self,
        method: &str,
        video: &ElementRef,
        require_element: bool,
    ) -> Result<Value, CaptureError> {
        let reply = self
            .bridge
            .evaluate(CALL_ON_VIDEO, &[json!(method), json!(video.selector())])
            .await
            .map_err(remote)?;

        match reply["status"].as_str() {
            Some("ok") => Ok(reply["value"].clone()),
            Some("controller-missing") => Err(CaptureError::ControllerMissing),
            Some("element-missing") if require_element => {
                Err(CaptureError::ElementMissing(video.to_string()))
            }
            Some("element-missing") => Ok(Value::Null),
            _ => Err(CaptureError::Remote(format!("unexpected reply: {}", reply))),
        }
    }

    async fn call_on_all(&self, method: &str) -> Result<(), CaptureError> {
        let reply = self
            .bridge
            .evaluate(CALL_ON_ALL, &[json!(method)])
            .await
            .map_err(remote)?;

        match reply["status"].as_str() {
            Some("ok") => Ok(()),
            Some("controller-missing") => Err(CaptureError::ControllerMissing),
            _ => Err(CaptureError::Remote(format!("unexpected reply: {}", reply))),
        }
    }
}

fn decode_failed(e: CaptureError) -> BridgeError {
    BridgeError::Decode(e.to_string())
}

fn remote(e: BridgeError) -> CaptureError {
    match e {
        BridgeError::Evaluate(message) => CaptureError::Remote(message),
        other => CaptureError::Bridge(other),
    }
}

#[cfg(test)]
#[path = "media_tests.rs"]
mod tests;
