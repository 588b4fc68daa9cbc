use std::collections::HashSet;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use feedtap_core::Hub;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::*;
use crate::bridge::BridgeFault;
use crate::testing::FakeTarget;

const VIDEO_NEEDLE: &str = "controller[method](video)";

fn capture_with(fake: &Arc<FakeTarget>) -> (MediaCapture, Arc<Hub>) {
    let hub = Arc::new(Hub::new());
    let bridge = Arc::new(Bridge::new(fake.clone(), hub.clone()).unwrap());
    (MediaCapture::new(bridge, CaptureSettings::default()), hub)
}

/// Emulate the page controller for the selectors in `present`.
fn fake_controller(fake: &FakeTarget, present: &[&str]) {
    let present: HashSet<String> = present.iter().map(|s| s.to_string()).collect();
    let capturing = Arc::new(Mutex::new(HashSet::<String>::new()));
    fake.on_script_fn(VIDEO_NEEDLE, move |args| {
        let method = args[0].as_str().unwrap_or_default();
        let selector = args[1].as_str().unwrap_or_default().to_string();
        if !present.contains(&selector) {
            return Ok(json!({ "status": "element-missing" }));
        }
        let mut capturing = capturing.lock();
        let value = match method {
            "start" => capturing.insert(selector),
            "stop" | "destroy" => capturing.remove(&selector),
            "isCapturing" => capturing.contains(&selector),
            _ => true,
        };
        Ok(json!({ "status": "ok", "value": value }))
    });
}

fn audio_payload(samples: &[f32]) -> Value {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    json!({
        "sampleRate": 48000,
        "channels": 1,
        "frames": samples.len(),
        "data": STANDARD.encode(bytes),
        "ts": 1.5,
    })
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
}

#[tokio::test]
async fn test_install_exposes_bindings_and_injects_controller() {
    let fake = FakeTarget::new();
    let (capture, _hub) = capture_with(&fake);

    capture.install().await.unwrap();

    let names: Vec<_> = fake
        .calls_to("Runtime.addBinding")
        .into_iter()
        .filter_map(|p| p["name"].as_str().map(str::to_string))
        .collect();
    assert_eq!(names, vec![AUDIO_BINDING, FRAME_BINDING, STATE_BINDING]);

    let injected = fake.calls_to("Page.addScriptToEvaluateOnNewDocument");
    assert_eq!(injected.len(), 1);
    let source = injected[0]["source"].as_str().unwrap();
    assert!(source.contains("const BLOCK_SIZE = 4096;"));
    assert!(capture.is_installed());
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let fake = FakeTarget::new();
    fake_controller(&fake, &["#v"]);
    let (capture, _hub) = capture_with(&fake);
    let video = ElementRef::new("#v");

    capture.start(&video).await.unwrap();
    capture.start(&video).await.unwrap();
    assert!(capture.is_capturing(&video).await.unwrap());

    capture.stop(&video).await.unwrap();
    assert!(!capture.is_capturing(&video).await.unwrap());
}

#[tokio::test]
async fn test_start_missing_element() {
    let fake = FakeTarget::new();
    fake_controller(&fake, &[]);
    let (capture, _hub) = capture_with(&fake);

    let err = capture.start(&ElementRef::new("#gone")).await.unwrap_err();
    assert!(matches!(err, CaptureError::ElementMissing(ref s) if s == "#gone"));
}

#[tokio::test]
async fn test_stop_and_destroy_missing_element_are_noops() {
    let fake = FakeTarget::new();
    fake_controller(&fake, &[]);
    let (capture, _hub) = capture_with(&fake);
    let video = ElementRef::new("#gone");

    capture.stop(&video).await.unwrap();
    capture.destroy(&video).await.unwrap();
    assert!(!capture.is_capturing(&video).await.unwrap());
}

#[tokio::test]
async fn test_controller_missing() {
    let fake = FakeTarget::new();
    fake.on_script(VIDEO_NEEDLE, json!({ "status": "controller-missing" }));
    fake.on_script("controller[method]()", json!({ "status": "controller-missing" }));
    let (capture, _hub) = capture_with(&fake);

    assert!(matches!(
        capture.start(&ElementRef::new("#v")).await,
        Err(CaptureError::ControllerMissing)
    ));
    assert!(matches!(
        capture.stop_all().await,
        Err(CaptureError::ControllerMissing)
    ));
}

#[tokio::test]
async fn test_stop_all_and_destroy_all() {
    let fake = FakeTarget::new();
    fake.on_script("controller[method]()", json!({ "status": "ok", "value": true }));
    let (capture, _hub) = capture_with(&fake);

    capture.stop_all().await.unwrap();
    capture.destroy_all().await.unwrap();

    let methods: Vec<_> = fake
        .evaluations_of("controller[method]()")
        .iter()
        .flat_map(|e| FakeTarget::evaluate_args(e))
        .collect();
    assert_eq!(methods, vec![json!("stopAll"), json!("destroyAll")]);
}

#[tokio::test]
async fn test_remote_exception_maps_to_remote() {
    let fake = FakeTarget::new();
    fake.on_script_fn(VIDEO_NEEDLE, |_| Err("NotAllowedError: autoplay".to_string()));
    let (capture, _hub) = capture_with(&fake);

    let err = capture.start(&ElementRef::new("#v")).await.unwrap_err();
    assert!(matches!(err, CaptureError::Remote(ref m) if m.contains("autoplay")));
}

#[tokio::test]
async fn test_watch_playback_passes_selector() {
    let fake = FakeTarget::new();
    fake_controller(&fake, &["#note video"]);
    let (capture, _hub) = capture_with(&fake);
    let video = ElementRef::new("#note video");

    capture.watch_playback(&video).await.unwrap();
    capture.unwatch_playback(&video).await.unwrap();

    let calls: Vec<_> = fake
        .evaluations_of(VIDEO_NEEDLE)
        .iter()
        .map(|e| FakeTarget::evaluate_args(e))
        .collect();
    assert_eq!(
        calls,
        vec![
            vec![json!("watchPlayback"), json!("#note video")],
            vec![json!("unwatchPlayback"), json!("#note video")],
        ]
    );
}

#[tokio::test]
async fn test_audio_published_and_silence_dropped() {
    let fake = FakeTarget::new();
    let (capture, hub) = capture_with(&fake);
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.subscribe_typed::<AudioBuffer, _>(topics::MEDIA_VIDEO_AUDIO, move |b| {
        let _ = tx.send(b.clone());
    })
    .unwrap();
    capture.install().await.unwrap();

    fake.call_binding(AUDIO_BINDING, &audio_payload(&[0.0, 0.0, 0.0, 0.0]));
    fake.call_binding(AUDIO_BINDING, &audio_payload(&[0.25, -0.5, 0.0, 0.125]));

    let buffer = recv(&mut rx).await;
    assert_eq!(buffer.samples, vec![0.25, -0.5, 0.0, 0.125]);
    assert_eq!(buffer.frame_count, 4);
    assert_eq!(buffer.sample_rate, 48000);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_frame_and_state_published() {
    let fake = FakeTarget::new();
    let (capture, hub) = capture_with(&fake);
    let (frame_tx, mut frames) = mpsc::unbounded_channel();
    let (state_tx, mut states) = mpsc::unbounded_channel();
    hub.subscribe_typed::<VideoFrame, _>(topics::MEDIA_VIDEO_FRAME, move |f| {
        let _ = frame_tx.send(f.clone());
    })
    .unwrap();
    hub.subscribe_typed::<PlaybackState, _>(topics::MEDIA_VIDEO_STATE, move |s| {
        let _ = state_tx.send(*s);
    })
    .unwrap();
    capture.install().await.unwrap();

    let pixels = vec![255u8; 2 * 2 * 4];
    fake.call_binding(
        FRAME_BINDING,
        &json!({ "width": 2, "height": 2, "data": STANDARD.encode(&pixels), "ts": 0.04 }),
    );
    fake.call_binding(STATE_BINDING, &json!({ "playing": true }));

    let frame = recv(&mut frames).await;
    assert_eq!((frame.width, frame.height), (2, 2));
    assert_eq!(frame.pixels, pixels);
    assert_eq!(recv(&mut states).await, PlaybackState { playing: true });
}

#[tokio::test]
async fn test_malformed_frame_reports_fault() {
    let fake = FakeTarget::new();
    let (capture, hub) = capture_with(&fake);
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.subscribe_typed::<BridgeFault, _>(topics::BRIDGE_ERROR, move |f| {
        let _ = tx.send(f.clone());
    })
    .unwrap();
    capture.install().await.unwrap();

    // 2x2 RGBA needs 16 bytes.
    fake.call_binding(
        FRAME_BINDING,
        &json!({ "width": 2, "height": 2, "data": STANDARD.encode([0u8; 3]), "ts": 0.0 }),
    );

    let fault = recv(&mut rx).await;
    assert_eq!(fault.binding, FRAME_BINDING);
}
