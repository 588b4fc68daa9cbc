//! Remote browser plumbing for feedtap.
//!
//! Talks to an already-running Chrome over the DevTools Protocol. Nothing is
//! launched from here.
//!
//! ```text
//! ┌─────────────────┐    WebSocket     ┌──────────────────┐
//! │  feedtap host   │ ◄──────────────► │   Chrome/Edge    │
//! │  (this crate)   │       CDP        │  (remote page)   │
//! └─────────────────┘                  └──────────────────┘
//! ```
//!
//! Start Chrome with remote debugging enabled:
//!
//! ```bash
//! google-chrome --remote-debugging-port=9222
//! ```
//!
//! ## Layers
//!
//! - [`cdp`] - WebSocket transport, page sessions and the [`RemoteTarget`] seam
//! - [`bridge`] - host functions callable from the page, on-load scripts,
//!   evaluation, and page events republished on the hub
//! - [`watcher`] - class-name watches on page elements
//! - [`media`] - audio and frame capture from `<video>` elements
//! - [`scripts`] - the JavaScript injected into the page

pub mod bridge;
pub mod cdp;
pub mod element;
pub mod media;
pub mod scripts;
pub mod watcher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bridge::{Bridge, BridgeError};
pub use cdp::{CdpClient, CdpError, PageSession, RemoteTarget};
pub use element::{ElementInfo, ElementRef};
pub use media::{CaptureError, CaptureSettings, MediaCapture};
pub use watcher::{DomWatcher, WatcherError};
