use std::time::Duration;

use feedtap_browser::cdp::Cookie;
use feedtap_browser::media::{AUDIO_BINDING, STATE_BINDING};
use feedtap_browser::testing::FakeTarget;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::mpsc;

use super::*;

const SCAN_NEEDLE: &str = "querySelectorAll(sel.section)";
const READ_NEEDLE: &str = "sel.typeAttribute";
const OBSERVE_NEEDLE: &str = "new window.FeedtapClassObserver";
const MEDIA_NEEDLE: &str = "controller[method](video)";

struct RecordingSink(mpsc::UnboundedSender<(String, Value)>);

impl EventSink for RecordingSink {
    fn emit(&self, name: &str, payload: Value) {
        let _ = self.0.send((name.to_string(), payload));
    }
}

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.site.open_settle_ms = 0;
    config.storage.state_path = Some(dir.path().join("state.json"));
    config
}

async fn start(fake: &Arc<FakeTarget>, config: &Config) -> (Session, mpsc::UnboundedReceiver<(String, Value)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Session::start(
        config,
        Arc::new(Hub::new()),
        fake.clone(),
        Arc::new(RecordingSink(tx)),
    )
    .await
    .unwrap();
    (session, rx)
}

async fn eventually(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

fn section(tag: &str, index: &str) -> Value {
    json!({
        "ref": tag,
        "visible": true,
        "index": index,
        "cover": "https://img.example/c.jpg",
        "title": format!("note {}", index),
        "author": "alice",
        "avatar": "https://img.example/a.jpg",
        "likes": "3",
    })
}

/// Page with one video card that opens when clicked.
fn script_video_page(fake: &FakeTarget) {
    fake.on_script(SCAN_NEEDLE, json!([section("feed-1", "5")]));
    fake.on_script("scrollIntoView", json!({"x": 10.0, "y": 10.0}));
    fake.on_script(READ_NEEDLE, json!({"type": "video", "slides": [], "comments": []}));
    fake.on_script(MEDIA_NEEDLE, json!({"status": "ok", "value": true}));
}

fn media_methods(fake: &FakeTarget) -> Vec<Value> {
    fake.evaluations_of(MEDIA_NEEDLE)
        .iter()
        .map(|e| FakeTarget::evaluate_args(e)[0].clone())
        .collect()
}

fn overlay_binding(fake: &FakeTarget) -> String {
    fake.calls_to("Runtime.addBinding")
        .into_iter()
        .filter_map(|p| p["name"].as_str().map(str::to_string))
        .find(|name| name.starts_with("__feedtapDom"))
        .unwrap()
}

#[tokio::test]
async fn test_start_prepares_page_before_navigating() {
    let fake = FakeTarget::new();
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (_session, _rx) = start(&fake, &config).await;

    let calls = fake.calls();
    assert_eq!(calls[0].0, "Emulation.setDeviceMetricsOverride");
    assert_eq!(calls[0].1["width"], 1366);
    assert_eq!(calls.last().unwrap().0, "Page.navigate");
    assert_eq!(calls.last().unwrap().1["url"], config.site.url);

    let injected = fake.calls_to("Page.addScriptToEvaluateOnNewDocument");
    assert_eq!(injected.len(), 4);
    assert!(injected[0]["source"].as_str().unwrap().contains("webdriver"));

    let bindings: Vec<String> = fake
        .calls_to("Runtime.addBinding")
        .into_iter()
        .filter_map(|p| p["name"].as_str().map(str::to_string))
        .collect();
    assert_eq!(bindings.len(), 4);
    assert!(bindings.iter().any(|b| b.starts_with("__feedtapDom")));
    assert!(fake.calls_to("Network.setCookies").is_empty());
}

#[tokio::test]
async fn test_start_restores_saved_state() {
    let fake = FakeTarget::new();
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    StorageState {
        cookies: vec![Cookie {
            name: "web_session".to_string(),
            value: "abc".to_string(),
            domain: ".example.com".to_string(),
            path: "/".to_string(),
            expires: -1.0,
            http_only: true,
            secure: true,
            same_site: None,
        }],
        saved_at: chrono::Utc::now(),
    }
    .save(&config.storage.state_path())
    .await
    .unwrap();

    let (_session, _rx) = start(&fake, &config).await;

    let set = fake.calls_to("Network.setCookies");
    assert_eq!(set.len(), 1);
    assert_eq!(set[0]["cookies"][0]["name"], "web_session");
}

#[tokio::test]
async fn test_start_fails_when_bindings_cannot_be_added() {
    let fake = FakeTarget::new();
    fake.fail_method("Runtime.addBinding", "target closed");
    let dir = TempDir::new().unwrap();

    let result = Session::start(
        &test_config(&dir),
        Arc::new(Hub::new()),
        fake.clone(),
        Arc::new(NullSink),
    )
    .await;

    assert!(matches!(result, Err(SessionError::Capture(_))));
    assert!(fake.calls_to("Page.navigate").is_empty());
}

#[tokio::test]
async fn test_page_load_reinstalls_observer() {
    let fake = FakeTarget::new();
    fake.on_script(OBSERVE_NEEDLE, json!("observer_1"));
    let dir = TempDir::new().unwrap();
    let (_session, _rx) = start(&fake, &test_config(&dir)).await;

    fake.emit("Page.loadEventFired", json!({"timestamp": 1.0}));

    eventually(|| !fake.evaluations_of(OBSERVE_NEEDLE).is_empty()).await;
    let args = FakeTarget::evaluate_args(&fake.evaluations_of(OBSERVE_NEEDLE)[0]);
    assert_eq!(args[0], "note-detail-mask");
    assert_eq!(fake.evaluations_of("Object.keys(registry)").len(), 1);
}

#[tokio::test]
async fn test_get_items_maps_feed_entries() {
    let fake = FakeTarget::new();
    fake.on_script(SCAN_NEEDLE, json!([section("feed-1", "5"), section("feed-2", "7")]));
    let dir = TempDir::new().unwrap();
    let (session, _rx) = start(&fake, &test_config(&dir)).await;

    let items = session.get_items().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(
        serde_json::to_value(&items[0]).unwrap(),
        json!({
            "index": 5,
            "title": "note 5",
            "coverImageUrl": "https://img.example/c.jpg",
            "username": "alice",
            "avatarUrl": "https://img.example/a.jpg",
        })
    );
}

#[tokio::test]
async fn test_select_channel_restarts_feed_dedup() {
    let fake = FakeTarget::new();
    fake.on_script(SCAN_NEEDLE, json!([section("feed-1", "0"), section("feed-2", "1")]));
    fake.on_script(
        "sel.item",
        json!([
            { "ref": "channel-1", "text": "recommend", "className": "channel active" },
            { "ref": "channel-2", "text": "food", "className": "channel" },
        ]),
    );
    fake.on_script("scrollIntoView", json!({"x": 10.0, "y": 10.0}));
    let dir = TempDir::new().unwrap();
    let (session, _rx) = start(&fake, &test_config(&dir)).await;

    assert_eq!(session.get_items().await.unwrap().len(), 2);
    assert!(session.get_items().await.unwrap().is_empty());

    let channels = session.channels().await.unwrap();
    assert!(channels[0].active);
    let food = session.select_channel("food").await.unwrap();
    assert!(!food.active);

    // Same indices again, now from the new channel.
    assert_eq!(session.get_items().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_on_item_click_unknown_index() {
    let fake = FakeTarget::new();
    let dir = TempDir::new().unwrap();
    let (session, _rx) = start(&fake, &test_config(&dir)).await;

    assert!(matches!(
        session.on_item_click(99).await,
        Err(SessionError::Feed(crate::feed::FeedError::NotFound(99)))
    ));
}

#[tokio::test]
async fn test_on_item_click_starts_video_capture() {
    let fake = FakeTarget::new();
    script_video_page(&fake);
    let dir = TempDir::new().unwrap();
    let (session, _rx) = start(&fake, &test_config(&dir)).await;

    session.get_items().await.unwrap();
    let note = session.on_item_click(5).await.unwrap();

    assert!(note.is_video());
    let clicked = FakeTarget::evaluate_args(&fake.evaluations_of("scrollIntoView")[0]);
    assert_eq!(clicked[0], json!("[data-feedtap-ref=\"feed-1\"]"));

    let methods: Vec<Value> = fake
        .evaluations_of(MEDIA_NEEDLE)
        .iter()
        .map(|e| FakeTarget::evaluate_args(e)[0].clone())
        .collect();
    assert_eq!(methods, vec![json!("start"), json!("watchPlayback")]);
}

#[tokio::test]
async fn test_overlay_close_releases_video() {
    let fake = FakeTarget::new();
    script_video_page(&fake);
    let dir = TempDir::new().unwrap();
    let (session, _rx) = start(&fake, &test_config(&dir)).await;
    session.get_items().await.unwrap();
    session.on_item_click(5).await.unwrap();
    assert!(session.open_video().is_some());

    fake.call_binding(&overlay_binding(&fake), &json!({"kind": "removed", "id": "mask-1"}));

    eventually(|| media_methods(&fake).len() == 4).await;
    assert_eq!(
        media_methods(&fake),
        vec![json!("start"), json!("watchPlayback"), json!("unwatchPlayback"), json!("destroy")]
    );
    assert!(session.open_video().is_none());
}

#[tokio::test]
async fn test_opening_next_note_releases_previous_video() {
    let fake = FakeTarget::new();
    script_video_page(&fake);
    let dir = TempDir::new().unwrap();
    let (session, _rx) = start(&fake, &test_config(&dir)).await;
    session.get_items().await.unwrap();

    session.on_item_click(5).await.unwrap();
    session.on_item_click(5).await.unwrap();

    assert_eq!(
        media_methods(&fake),
        vec![
            json!("start"),
            json!("watchPlayback"),
            json!("unwatchPlayback"),
            json!("destroy"),
            json!("start"),
            json!("watchPlayback"),
        ]
    );
    assert!(session.open_video().is_some());
}

#[tokio::test]
async fn test_playback_change_unmutes_open_video() {
    let fake = FakeTarget::new();
    script_video_page(&fake);
    fake.on_script("querySelectorAll(selector).length", json!(1));
    let dir = TempDir::new().unwrap();
    let (session, _rx) = start(&fake, &test_config(&dir)).await;
    session.get_items().await.unwrap();
    session.on_item_click(5).await.unwrap();

    fake.call_binding(STATE_BINDING, &json!({"playing": true}));

    let volume = "#noteContainer .player-container .xgplayer-volume .xgplayer-icon";
    eventually(|| {
        fake.evaluations_of("scrollIntoView")
            .iter()
            .any(|e| FakeTarget::evaluate_args(e)[0] == volume)
    })
    .await;
}

#[tokio::test]
async fn test_bridge_faults_reach_sink() {
    let fake = FakeTarget::new();
    let dir = TempDir::new().unwrap();
    let (_session, mut rx) = start(&fake, &test_config(&dir)).await;

    fake.call_binding(AUDIO_BINDING, &json!({"channels": 2}));

    let (name, payload) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(name, ERRORS);
    assert!(payload[0].as_str().unwrap().starts_with(AUDIO_BINDING));
}

#[tokio::test]
async fn test_login_reaches_sink() {
    let fake = FakeTarget::new();
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(&fake, &test_config(&dir)).await;

    session.bridge().hub().publish(
        topics::USER_LOGGED_IN,
        UserInfo {
            nickname: Some("alice".to_string()),
            ..UserInfo::default()
        },
    );

    let (name, payload) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(name, USER_LOGGED_IN);
    assert_eq!(payload["nickname"], "alice");
}

#[tokio::test]
async fn test_shutdown_tears_down() {
    let fake = FakeTarget::new();
    fake.on_script("controller[method]()", json!({"status": "ok", "value": true}));
    let dir = TempDir::new().unwrap();
    let (session, _rx) = start(&fake, &test_config(&dir)).await;
    let hub = session.bridge().hub().clone();
    assert!(hub.has_subscribers(topics::PAGE_LOAD));

    session.shutdown().await;

    assert!(!hub.has_subscribers(topics::PAGE_LOAD));
    assert!(!hub.has_subscribers(topics::PAGE_RESPONSE_FINISHED));
    let all = FakeTarget::evaluate_args(&fake.evaluations_of("controller[method]()")[0]);
    assert_eq!(all, vec![json!("destroyAll")]);
    assert_eq!(fake.evaluations_of("Object.keys(registry)").len(), 1);
}
