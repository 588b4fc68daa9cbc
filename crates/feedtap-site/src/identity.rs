//! Login detection from the site's identity API.
//!
//! The page calls the identity endpoint on every load. A successful reply
//! means the browser holds a logged-in session, so its storage state is
//! saved and the user is announced on [`topics::USER_LOGGED_IN`].
//!
//! Bodies are only fetched once the bridge reports the response finished
//! loading; before that Chrome has no data for the request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use feedtap_browser::bridge::ResponseInfo;
use feedtap_browser::{Bridge, BridgeError};
use feedtap_core::{HubError, SubscriptionId, topics};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::storage::{StorageError, StorageState};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Malformed identity response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// The logged-in user. The API omits fields freely, so all are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub red_id: Option<String>,
    pub nickname: Option<String>,
    pub desc: Option<String>,
    pub gender: Option<i64>,
    pub images: Option<String>,
    pub imageb: Option<String>,
    pub user_id: Option<String>,
    pub guest: Option<bool>,
}

/// Envelope of the identity API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiResponse {
    pub code: i64,
    pub success: bool,
    pub msg: String,
    pub data: UserInfo,
}

/// Watches `page:response:finished` for identity API replies.
pub struct IdentityWatch {
    bridge: Arc<Bridge>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl IdentityWatch {
    /// Subscribe for responses whose URL contains `api_marker`. Storage state
    /// is written to `state_path`.
    pub fn start(
        bridge: Arc<Bridge>,
        api_marker: &str,
        state_path: PathBuf,
    ) -> Result<Self, HubError> {
        let marker = api_marker.to_string();
        let handler_bridge = bridge.clone();
        let id = bridge
            .hub()
            .subscribe_typed::<ResponseInfo, _>(topics::PAGE_RESPONSE_FINISHED, move |response| {
                if !response.url.contains(&marker) {
                    return;
                }
                let bridge = handler_bridge.clone();
                let response = response.clone();
                let path = state_path.clone();
                tokio::spawn(async move {
                    match confirm_login(&bridge, &response, &path).await {
                        Ok(Some(user)) => {
                            info!(nickname = ?user.nickname, "user logged in");
                            bridge.hub().publish(topics::USER_LOGGED_IN, user);
                        }
                        Ok(None) => {}
                        Err(e) => warn!(url = %response.url, error = %e, "identity check failed"),
                    }
                });
            })?;

        debug!(marker = api_marker, "identity watch started");
        Ok(Self {
            bridge,
            subscription: Mutex::new(Some(id)),
        })
    }

    pub fn stop(&self) {
        if let Some(id) = self.subscription.lock().take() {
            let _ = self.bridge.hub().unsubscribe(id);
        }
    }
}

impl Drop for IdentityWatch {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Inspect one identity API response. Storage state is saved whenever the
/// API answers `code == 0`; the user is returned only when it also reports
/// success.
pub async fn confirm_login(
    bridge: &Bridge,
    response: &ResponseInfo,
    state_path: &Path,
) -> Result<Option<UserInfo>, IdentityError> {
    let body = bridge.get_response_body(&response.request_id).await?;
    let reply: ApiResponse = serde_json::from_slice(&body)?;

    if reply.code != 0 {
        debug!(code = reply.code, msg = %reply.msg, "identity api declined");
        return Ok(None);
    }

    StorageState::capture(bridge).await?.save(state_path).await?;

    if !reply.success {
        return Ok(None);
    }
    Ok(Some(reply.data))
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
