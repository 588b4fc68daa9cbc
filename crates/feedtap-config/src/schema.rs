//! Configuration schema definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote browser connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Chrome remote debugging endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Upper bound for a single CDP round trip.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:9222".to_string()
}

fn default_viewport_width() -> u32 {
    1366
}

fn default_viewport_height() -> u32 {
    768
}

fn default_call_timeout() -> u64 {
    30
}

/// Target site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_url")]
    pub url: String,

    /// Substring identifying the identity API response.
    #[serde(default = "default_identity_api")]
    pub identity_api: String,

    /// Class of the note-detail overlay watched for open/close.
    #[serde(default = "default_overlay_class")]
    pub overlay_class: String,

    /// Delay between clicking a feed entry and reading the note.
    #[serde(default = "default_open_settle_ms")]
    pub open_settle_ms: u64,

    /// How long to wait for the channel bar to render.
    #[serde(default = "default_channel_wait_ms")]
    pub channel_wait_ms: u64,

    #[serde(default)]
    pub selectors: Selectors,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: default_site_url(),
            identity_api: default_identity_api(),
            overlay_class: default_overlay_class(),
            open_settle_ms: default_open_settle_ms(),
            channel_wait_ms: default_channel_wait_ms(),
            selectors: Selectors::default(),
        }
    }
}

fn default_site_url() -> String {
    "https://www.xiaohongshu.com".to_string()
}

fn default_identity_api() -> String {
    "v2/user/me".to_string()
}

fn default_overlay_class() -> String {
    "note-detail-mask".to_string()
}

fn default_open_settle_ms() -> u64 {
    1000
}

fn default_channel_wait_ms() -> u64 {
    3000
}

/// Every CSS selector the extraction code uses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selectors {
    #[serde(default)]
    pub feed: FeedSelectors,

    #[serde(default)]
    pub note: NoteSelectors,

    #[serde(default)]
    pub channel: ChannelSelectors,
}

/// Explore feed selectors. All but `container` are relative to their parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSelectors {
    pub container: String,
    pub section: String,
    pub index_attribute: String,
    pub cover: String,
    pub title: String,
    pub author: String,
    /// Relative to `author`.
    pub avatar: String,
    pub likes: String,
    pub reload: String,
}

impl Default for FeedSelectors {
    fn default() -> Self {
        Self {
            container: "#exploreFeeds".to_string(),
            section: "section".to_string(),
            index_attribute: "data-index".to_string(),
            cover: "a.cover img".to_string(),
            title: ".footer .title".to_string(),
            author: ".author-wrapper .author".to_string(),
            avatar: "img".to_string(),
            likes: ".like-wrapper .count".to_string(),
            reload: ".floating-btn-sets .reload".to_string(),
        }
    }
}

/// Explore channel bar. `item` is relative to `container`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSelectors {
    pub container: String,
    pub item: String,
    /// Class carried by the selected channel.
    pub active_class: String,
}

impl Default for ChannelSelectors {
    fn default() -> Self {
        Self {
            container: "#channel-container".to_string(),
            item: ".content-container .channel".to_string(),
            active_class: "active".to_string(),
        }
    }
}

/// Note detail selectors, relative to `container`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteSelectors {
    pub container: String,
    pub type_attribute: String,
    pub slides: String,
    pub player: String,
    /// Relative to `player`.
    pub video: String,
    /// Relative to `player`.
    pub muted: String,
    /// Relative to `player`.
    pub volume_toggle: String,
    pub author: String,
    pub follow: String,
    pub like: String,
    pub collect: String,
    pub title: String,
    pub desc: String,
    pub date: String,
    pub comment_count: String,
    pub comments: CommentSelectors,
}

impl Default for NoteSelectors {
    fn default() -> Self {
        Self {
            container: "#noteContainer".to_string(),
            type_attribute: "data-type".to_string(),
            slides: ".swiper-slide:not(.swiper-slide-duplicate)".to_string(),
            player: ".player-container".to_string(),
            video: "video".to_string(),
            muted: ".xgplayer-volume-muted".to_string(),
            volume_toggle: ".xgplayer-volume .xgplayer-icon".to_string(),
            author: ".interaction-container .author-container .author-wrapper .info .name"
                .to_string(),
            follow: ".interaction-container .author-container .author-wrapper .note-detail-follow-btn"
                .to_string(),
            like: ".engage-bar .like-lottie".to_string(),
            collect: ".engage-bar .collect-wrapper".to_string(),
            title: ".interaction-container .note-scroller .note-content .title".to_string(),
            desc: ".interaction-container .note-scroller .note-content .desc".to_string(),
            date: ".interaction-container .note-scroller .note-content .bottom-container .date"
                .to_string(),
            comment_count: ".interaction-container .note-scroller .comments-el .comments-container .total"
                .to_string(),
            comments: CommentSelectors::default(),
        }
    }
}

/// Comment tree selectors. `parent` is relative to the note container, the
/// rest to a single comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentSelectors {
    pub parent: String,
    pub sub: String,
    pub author: String,
    pub content: String,
    pub images: String,
    pub date: String,
    pub like: String,
    pub reply: String,
    pub show_more: String,
}

impl Default for CommentSelectors {
    fn default() -> Self {
        Self {
            parent: ".comments-el .comments-container .list-container .parent-comment".to_string(),
            sub: ".reply-container .list-container .comment-item-sub".to_string(),
            author: ".right .author-wrapper .author".to_string(),
            content: ".right .content".to_string(),
            images: ".right .comment-picture img".to_string(),
            date: ".right .info .date".to_string(),
            like: ".right .info .interactions .like-wrapper".to_string(),
            reply: ".right .info .interactions .reply".to_string(),
            show_more: ".reply-container .show-more".to_string(),
        }
    }
}

/// Live media capture tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Samples per audio block.
    #[serde(default = "default_audio_block_size")]
    pub audio_block_size: u32,

    /// Blocks whose channel-0 energy is at or below this are dropped.
    #[serde(default = "default_energy_threshold")]
    pub energy_threshold: f32,

    /// Requested audio graph sample rate.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            audio_block_size: default_audio_block_size(),
            energy_threshold: default_energy_threshold(),
            sample_rate: default_sample_rate(),
        }
    }
}

fn default_audio_block_size() -> u32 {
    4096
}

fn default_energy_threshold() -> f32 {
    0.001
}

fn default_sample_rate() -> u32 {
    48000
}

/// Where the browser storage state is persisted between sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Storage state file, defaulting to the user cache directory.
    pub fn state_path(&self) -> PathBuf {
        self.state_path.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("feedtap")
                .join("storage-state.json")
        })
    }
}

/// Log file output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            file_prefix: default_file_prefix(),
        }
    }
}

impl LoggingConfig {
    /// Log directory, defaulting to `~/.feedtap/logs`.
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".feedtap")
                .join("logs")
        })
    }
}

fn default_file_prefix() -> String {
    "feedtap.log".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
