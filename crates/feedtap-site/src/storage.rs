//! Browser storage state persisted between sessions.

use std::path::Path;

use chrono::{DateTime, Utc};
use feedtap_browser::cdp::Cookie;
use feedtap_browser::{Bridge, BridgeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed storage state: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Every cookie of the browser at `saved_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    pub cookies: Vec<Cookie>,
    pub saved_at: DateTime<Utc>,
}

impl StorageState {
    /// Snapshot the browser's cookies.
    pub async fn capture(bridge: &Bridge) -> Result<Self, StorageError> {
        Ok(Self {
            cookies: bridge.cookies().await?,
            saved_at: Utc::now(),
        })
    }

    /// Install the saved cookies into the browser.
    pub async fn restore(&self, bridge: &Bridge) -> Result<(), StorageError> {
        if self.cookies.is_empty() {
            return Ok(());
        }
        bridge.set_cookies(&self.cookies).await?;
        info!(cookies = self.cookies.len(), saved_at = %self.saved_at, "storage state restored");
        Ok(())
    }

    /// Write to `path`, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        debug!(path = %path.display(), cookies = self.cookies.len(), "storage state saved");
        Ok(())
    }

    /// Read from `path`. A missing file is `Ok(None)`.
    pub async fn load(path: &Path) -> Result<Option<Self>, StorageError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
