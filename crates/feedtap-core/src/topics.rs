//! Canonical topic names.
//!
//! Payload types are fixed by convention per topic; the comment on each
//! constant names the type a subscriber should downcast to.

/// Decoded video frame (`feedtap_browser::media::VideoFrame`).
pub const MEDIA_VIDEO_FRAME: &str = "media:video:frame";
/// Decoded audio block (`feedtap_browser::media::AudioBuffer`).
pub const MEDIA_VIDEO_AUDIO: &str = "media:video:audio";
/// Playback change (`feedtap_browser::media::PlaybackState`).
pub const MEDIA_VIDEO_STATE: &str = "media:video:state";

/// Watched element appeared (`feedtap_browser::watcher::DomMutation`).
pub const DOM_ADDED: &str = "dom:added";
/// Watched element disappeared (`feedtap_browser::watcher::DomMutation`).
pub const DOM_REMOVED: &str = "dom:removed";

/// Page `load` event (`feedtap_browser::bridge::PageEvent`).
pub const PAGE_LOAD: &str = "page:load";
/// Page `DOMContentLoaded` event (`feedtap_browser::bridge::PageEvent`).
pub const PAGE_DOM_CONTENT_LOADED: &str = "page:domcontentloaded";
/// Network response metadata (`feedtap_browser::bridge::ResponseInfo`).
pub const PAGE_RESPONSE: &str = "page:response";
/// Response body fully received (`feedtap_browser::bridge::ResponseInfo`).
/// Only from this point can the body be fetched.
pub const PAGE_RESPONSE_FINISHED: &str = "page:response:finished";

/// A remote callback could not be handled (`feedtap_browser::bridge::BridgeFault`).
pub const BRIDGE_ERROR: &str = "bridge:error";

/// Identity API confirmed a login (`feedtap_site::identity::UserInfo`).
pub const USER_LOGGED_IN: &str = "user:logged-in";
