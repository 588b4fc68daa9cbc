//! Video player inside an open note.

use std::sync::Arc;

use feedtap_browser::{Bridge, ElementRef, MediaCapture};
use serde_json::{Value, json};
use tracing::debug;

use super::error::{NoteError, remote};

const IS_PLAYING: &str =
    r#"(selector) => { const v = document.querySelector(selector); return v ? !v.paused && !v.ended && v.readyState > 2 : null; }"#;

const READY_STATE: &str =
    r#"(selector) => { const v = document.querySelector(selector); return v ? v.readyState : null; }"#;

/// `HTMLMediaElement.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    /// Unknown values read as `HaveNothing`.
    pub fn from_raw(value: u64) -> Self {
        match value {
            1 => Self::HaveMetadata,
            2 => Self::HaveCurrentData,
            3 => Self::HaveFutureData,
            4 => Self::HaveEnoughData,
            _ => Self::HaveNothing,
        }
    }
}

/// Handle to the note's player. Selectors are resolved on every call, so the
/// handle stays usable while the player re-renders.
#[derive(Clone)]
pub struct Video {
    bridge: Arc<Bridge>,
    capture: Arc<MediaCapture>,
    player: ElementRef,
    video: ElementRef,
    muted: ElementRef,
    volume_toggle: ElementRef,
}

impl std::fmt::Debug for Video {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Video")
            .field("player", &self.player)
            .field("video", &self.video)
            .finish_non_exhaustive()
    }
}

impl Video {
    pub(crate) fn new(
        bridge: Arc<Bridge>,
        capture: Arc<MediaCapture>,
        player: ElementRef,
        video: &str,
        muted: &str,
        volume_toggle: &str,
    ) -> Self {
        Self {
            video: player.child(video),
            muted: player.child(muted),
            volume_toggle: player.child(volume_toggle),
            bridge,
            capture,
            player,
        }
    }

    /// The `<video>` element.
    pub fn element(&self) -> &ElementRef {
        &self.video
    }

    pub fn player(&self) -> &ElementRef {
        &self.player
    }

    /// Playing means not paused, not ended and buffered past the current frame.
    pub async fn is_playing(&self) -> Result<bool, NoteError> {
        let value = self.query(IS_PLAYING).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Whether the player shows its muted indicator.
    pub async fn is_muted(&self) -> Result<bool, NoteError> {
        Ok(self.bridge.count(&self.muted).await.map_err(remote)? > 0)
    }

    /// Click the video. Returns whether it is playing afterwards.
    pub async fn toggle_play(&self) -> Result<bool, NoteError> {
        self.bridge.click(&self.video).await.map_err(remote)?;
        self.is_playing().await
    }

    /// Click the volume control. Returns whether it is muted afterwards.
    pub async fn toggle_volume(&self) -> Result<bool, NoteError> {
        self.bridge.click(&self.volume_toggle).await.map_err(remote)?;
        let muted = self.is_muted().await?;
        debug!(muted, "volume toggled");
        Ok(muted)
    }

    pub async fn ready_state(&self) -> Result<ReadyState, NoteError> {
        let value = self.query(READY_STATE).await?;
        Ok(ReadyState::from_raw(value.as_u64().unwrap_or_default()))
    }

    pub async fn start_capture(&self) -> Result<(), NoteError> {
        Ok(self.capture.start(&self.video).await?)
    }

    pub async fn stop_capture(&self) -> Result<(), NoteError> {
        Ok(self.capture.stop(&self.video).await?)
    }

    pub async fn destroy_capture(&self) -> Result<(), NoteError> {
        Ok(self.capture.destroy(&self.video).await?)
    }

    pub async fn is_capturing(&self) -> Result<bool, NoteError> {
        Ok(self.capture.is_capturing(&self.video).await?)
    }

    /// Publish playback changes on `media:video:state`.
    pub async fn watch_playback(&self) -> Result<(), NoteError> {
        Ok(self.capture.watch_playback(&self.video).await?)
    }

    pub async fn unwatch_playback(&self) -> Result<(), NoteError> {
        Ok(self.capture.unwatch_playback(&self.video).await?)
    }

    async fn query(&self, script: &str) -> Result<Value, NoteError> {
        let value = self
            .bridge
            .evaluate(script, &[json!(self.video.selector())])
            .await
            .map_err(remote)?;
        if value.is_null() {
            return Err(NoteError::ElementMissing(self.video.to_string()));
        }
        Ok(value)
    }
}
