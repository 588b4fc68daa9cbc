//! Chrome DevTools Protocol (CDP) client.
//!
//! Connects to Chrome/Chromium over WebSocket and speaks the CDP JSON-RPC
//! protocol. The rest of the crate talks to a page only through the
//! [`RemoteTarget`] trait, which [`PageSession`] implements.
//!
//! ## Usage
//!
//! 1. Start Chrome with remote debugging:
//!    ```bash
//!    chrome --remote-debugging-port=9222
//!    ```
//!
//! 2. Connect and open a page:
//!    ```rust,ignore
//!    let client = CdpClient::connect("http://localhost:9222").await?;
//!    let page = client.new_page(None).await?;
//!    page.call("Page.navigate", Some(json!({"url": "https://example.com"}))).await?;
//!    ```

mod client;
mod error;
mod protocol;
mod session;
mod target;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::*;
pub use session::PageSession;
pub use target::RemoteTarget;
