use std::collections::BTreeSet;
use std::time::Duration;

use feedtap_core::Hub;
use tokio::sync::mpsc;

use super::*;
use crate::testing::FakeTarget;

/// Fake page keeping a remote observer registry like the injected script does.
fn page_with_registry() -> Arc<FakeTarget> {
    let fake = FakeTarget::new();
    let registry = Arc::new(Mutex::new(BTreeSet::<String>::new()));
    let next = Arc::new(AtomicU64::new(1));

    let r = registry.clone();
    fake.on_script_fn("new window.FeedtapClassObserver", move |_| {
        let id = format!("observer_{}", next.fetch_add(1, Ordering::SeqCst));
        r.lock().insert(id.clone());
        Ok(json!(id))
    });
    let r = registry.clone();
    fake.on_script_fn("registry[id].destroy()", move |args| {
        let id = args[0].as_str().unwrap_or_default().to_string();
        Ok(json!(r.lock().remove(&id)))
    });
    let r = registry.clone();
    fake.on_script_fn("for (const id of Object.keys(registry))", move |_| {
        r.lock().clear();
        Ok(json!(true))
    });
    let r = registry.clone();
    fake.on_script_fn("!!(window.__feedtapObservers", move |args| {
        Ok(json!(r.lock().contains(args[0].as_str().unwrap_or_default())))
    });
    let r = registry;
    fake.on_script_fn("Object.keys(window.__feedtapObservers || {})", move |_| {
        Ok(json!(r.lock().iter().cloned().collect::<Vec<_>>()))
    });
    fake
}

fn watcher_on(fake: &Arc<FakeTarget>) -> (DomWatcher, Arc<Hub>) {
    let hub = Arc::new(Hub::new());
    let bridge = Arc::new(Bridge::new(fake.clone(), hub.clone()).unwrap());
    (DomWatcher::new(bridge), hub)
}

#[tokio::test]
async fn test_lifecycle() {
    let fake = page_with_registry();
    let (watcher, _hub) = watcher_on(&fake);
    assert_eq!(watcher.state(), WatcherState::Uninitialized);

    watcher.start("note-detail-mask").await.unwrap();
    assert_eq!(watcher.state(), WatcherState::Started);
    let binding = DomWatcher::binding_name(watcher.token());
    assert_eq!(fake.calls_to("Runtime.addBinding"), vec![json!({"name": binding})]);

    let a = watcher.observe().await.unwrap();
    let b = watcher.observe().await.unwrap();
    assert_ne!(a, b);
    assert_eq!(watcher.state(), WatcherState::Observing);

    watcher.unobserve(&a).await.unwrap();
    assert_eq!(watcher.state(), WatcherState::Observing);
    watcher.unobserve(&b).await.unwrap();
    assert_eq!(watcher.state(), WatcherState::Stopped);

    watcher.observe().await.unwrap();
    assert_eq!(watcher.state(), WatcherState::Observing);
}

#[tokio::test]
async fn test_start_twice() {
    let fake = page_with_registry();
    let (watcher, _hub) = watcher_on(&fake);
    watcher.start("note-detail-mask").await.unwrap();
    assert!(matches!(
        watcher.start("other").await,
        Err(WatcherError::AlreadyStarted)
    ));
}

#[tokio::test]
async fn test_tokens_are_unique() {
    let fake = page_with_registry();
    let (first, _) = watcher_on(&fake);
    let other = page_with_registry();
    let (second, _) = watcher_on(&other);
    first.start("a").await.unwrap();
    second.start("a").await.unwrap();
    assert_ne!(first.token(), second.token());
}

#[tokio::test]
async fn test_observe_before_start() {
    let fake = page_with_registry();
    let (watcher, _hub) = watcher_on(&fake);
    assert!(matches!(watcher.observe().await, Err(WatcherError::NotStarted)));
}

#[tokio::test]
async fn test_observe_without_primitive() {
    let fake = FakeTarget::new();
    fake.on_script("new window.FeedtapClassObserver", Value::Null);
    let (watcher, _hub) = watcher_on(&fake);
    watcher.start("note-detail-mask").await.unwrap();

    assert!(matches!(
        watcher.observe().await,
        Err(WatcherError::PrimitiveMissing)
    ));
    assert_eq!(watcher.state(), WatcherState::Started);
}

#[tokio::test]
async fn test_observe_remote_error() {
    let fake = FakeTarget::new();
    fake.on_script_fn("new window.FeedtapClassObserver", |_| {
        Err("TypeError: document.body is null".to_string())
    });
    let (watcher, _hub) = watcher_on(&fake);
    watcher.start("note-detail-mask").await.unwrap();

    match watcher.observe().await {
        Err(WatcherError::Remote(message)) => assert!(message.contains("document.body")),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_handle_not_found_without_side_effects() {
    let fake = page_with_registry();
    let (watcher, _hub) = watcher_on(&fake);
    watcher.start("note-detail-mask").await.unwrap();
    let live = watcher.observe().await.unwrap();
    let before = fake.evaluations_of("registry[id].destroy()").len();

    let bogus = ObserverHandle::new("observer_missing");
    assert!(matches!(
        watcher.unobserve(&bogus).await,
        Err(WatcherError::NotFound(_))
    ));
    assert!(matches!(
        watcher.check_state(&bogus).await,
        Err(WatcherError::NotFound(_))
    ));

    assert_eq!(fake.evaluations_of("registry[id].destroy()").len(), before);
    assert!(watcher.check_state(&live).await.unwrap());
}

#[tokio::test]
async fn test_torn_down_handle_is_not_found() {
    let fake = page_with_registry();
    let (watcher, _hub) = watcher_on(&fake);
    watcher.start("note-detail-mask").await.unwrap();
    let handle = watcher.observe().await.unwrap();

    watcher.unobserve(&handle).await.unwrap();
    assert!(matches!(
        watcher.unobserve(&handle).await,
        Err(WatcherError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_unobserve_all_and_list_active() {
    let fake = page_with_registry();
    let (watcher, _hub) = watcher_on(&fake);
    watcher.start("note-detail-mask").await.unwrap();
    let a = watcher.observe().await.unwrap();
    let b = watcher.observe().await.unwrap();

    let mut active = watcher.list_active().await.unwrap();
    active.sort_by(|x, y| x.as_str().cmp(y.as_str()));
    assert_eq!(active, vec![a.clone(), b]);

    watcher.unobserve_all().await.unwrap();
    assert!(watcher.list_active().await.unwrap().is_empty());
    assert_eq!(watcher.state(), WatcherState::Stopped);
    assert!(matches!(
        watcher.check_state(&a).await,
        Err(WatcherError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_check_state_reflects_remote_truth() {
    let fake = page_with_registry();
    let (watcher, _hub) = watcher_on(&fake);
    watcher.start("note-detail-mask").await.unwrap();
    let handle = watcher.observe().await.unwrap();
    assert!(watcher.check_state(&handle).await.unwrap());

    // A navigation wipes the page registry while the host still tracks the handle.
    fake.on_script("!!(window.__feedtapObservers", json!(false));
    assert!(!watcher.check_state(&handle).await.unwrap());
}

#[tokio::test]
async fn test_mutations_published() {
    let fake = page_with_registry();
    let (watcher, hub) = watcher_on(&fake);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let tx2 = tx.clone();
    hub.subscribe_typed::<DomMutation, _>(topics::DOM_ADDED, move |m| {
        let _ = tx.send(("added", m.clone()));
    })
    .unwrap();
    hub.subscribe_typed::<DomMutation, _>(topics::DOM_REMOVED, move |m| {
        let _ = tx2.send(("removed", m.clone()));
    })
    .unwrap();

    watcher.start("note-detail-mask").await.unwrap();
    let binding = DomWatcher::binding_name(watcher.token());

    fake.call_binding(&binding, &json!({"kind": "added", "id": "observed-1"}));
    let (kind, m) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kind, "added");
    assert_eq!(m.class_name, "note-detail-mask");
    assert_eq!(m.element_id, "observed-1");
    assert_eq!(m.token, watcher.token());

    fake.call_binding(&binding, &json!({"kind": "removed", "id": "observed-1"}));
    let (kind, _) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kind, "removed");
}
