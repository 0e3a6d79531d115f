//! End-to-end pipeline scenarios against the scripted page double.

use std::sync::Arc;
use std::time::Duration;

use binding_center::{BindingCenterConfig, BindingEvent};
use page_bridge::{MediaNodeSpec, PlayerSpec, ScriptedPage};
use serde_json::json;
use vidlens::{MessageBridge, VidLens};
use vidlens_core_types::retry::RetryPolicy;
use vidlens_core_types::{BindingPhase, ControlCommand, CoreError};

fn fast_config() -> BindingCenterConfig {
    BindingCenterConfig {
        retry: RetryPolicy::immediate(3),
        ..BindingCenterConfig::default()
    }
}

fn lens(page: &ScriptedPage) -> Arc<VidLens> {
    Arc::new(VidLens::attach(Arc::new(page.clone()), fast_config()))
}

fn bridge(page: &ScriptedPage) -> MessageBridge {
    MessageBridge::new(lens(page))
}

#[tokio::test]
async fn sole_candidate_is_selected_even_when_hidden() {
    let page = ScriptedPage::new("https://watch.example");
    page.install_media_node(MediaNodeSpec::new().hidden().heading("Only one"));

    let response = bridge(&page).handle(json!({"type": "getCurrentVideo"})).await;
    assert_eq!(response["success"], json!(true));
    assert_eq!(response["videoData"]["title"], json!("Only one"));
}

#[tokio::test]
async fn playing_candidate_wins_among_equals() {
    let page = ScriptedPage::new("https://watch.example");
    page.install_media_node(MediaNodeSpec::new().rect(0.0, 0.0, 640.0, 360.0).src("a.mp4"));
    page.install_media_node(
        MediaNodeSpec::new()
            .rect(640.0, 0.0, 640.0, 360.0)
            .playing()
            .src("b.mp4"),
    );

    let response = bridge(&page).handle(json!({"type": "getCurrentVideo"})).await;
    assert_eq!(response["videoData"]["src"], json!("b.mp4"));
    assert_eq!(response["videoData"]["paused"], json!(false));
}

#[tokio::test]
async fn hidden_element_loses_to_visible_one() {
    let page = ScriptedPage::new("https://watch.example");
    page.install_media_node(MediaNodeSpec::new().hidden().src("hidden.mp4"));
    page.install_media_node(
        MediaNodeSpec::new()
            .rect(0.0, 0.0, 640.0, 360.0)
            .src("visible.mp4"),
    );

    let response = bridge(&page).handle(json!({"type": "getCurrentVideo"})).await;
    assert_eq!(response["videoData"]["src"], json!("visible.mp4"));
}

#[tokio::test]
async fn wrapped_framework_always_yields_a_capability() {
    let page = ScriptedPage::new("https://players.brightcove.net/99/index.html");
    let node = page.install_media_node(MediaNodeSpec::new().unreadable());
    let player = page.install_player(PlayerSpec::new().title("Framework feature").playing());
    page.attach_player_property(&node, "playerInstance", &player);

    let response = bridge(&page).handle(json!({"type": "getCurrentVideo"})).await;
    assert_eq!(response["success"], json!(true));
    assert_eq!(response["videoData"]["wrappedPlayer"], json!(true));
    assert_eq!(response["videoData"]["title"], json!("Framework feature"));

    // Even with no discoverable player object the element still binds, as a
    // virtual surface that reports but cannot control.
    let bare = ScriptedPage::new("https://players.brightcove.net/99/index.html");
    bare.install_media_node(MediaNodeSpec::new().unreadable());
    let response = bridge(&bare).handle(json!({"type": "getCurrentVideo"})).await;
    assert_eq!(response["success"], json!(true));
    assert_eq!(response["videoData"]["isVirtual"], json!(true));
}

#[tokio::test]
async fn negative_seek_is_rejected_without_adapter_calls() {
    let page = ScriptedPage::new("https://watch.example");
    let node = page.install_media_node(MediaNodeSpec::new());
    let bridge = bridge(&page);

    let response = bridge
        .handle(json!({"type": "controlVideo", "control": "seek", "time": -5.0}))
        .await;
    assert_eq!(response["success"], json!(false));
    assert_eq!(response["error"]["code"], json!("InvalidParameter"));
    assert_eq!(page.media_call_count(&node, "setCurrentTime"), 0);
}

#[tokio::test]
async fn throwing_play_falls_back_to_the_control_surface() {
    let page = ScriptedPage::new("https://watch.example");
    page.install_media_node(
        MediaNodeSpec::new()
            .throws_on("play")
            .control_selector(".vjs-big-play-button"),
    );
    let response = bridge(&page)
        .handle(json!({"type": "controlVideo", "control": "play"}))
        .await;
    assert_eq!(response["success"], json!(true));
    assert!(response["warning"]
        .as_str()
        .unwrap()
        .contains(".vjs-big-play-button"));

    // No matching control surface: the rejection is reported, with metadata.
    let bare = ScriptedPage::new("https://watch.example");
    bare.install_media_node(MediaNodeSpec::new().throws_on("play"));
    let response = bridge(&bare)
        .handle(json!({"type": "controlVideo", "control": "play"}))
        .await;
    assert_eq!(response["success"], json!(false));
    assert_eq!(response["error"]["code"], json!("ControlRejected"));
    assert!(response["videoData"].is_object());
}

#[tokio::test]
async fn set_rate_shows_up_in_the_next_snapshot() {
    let page = ScriptedPage::new("https://watch.example");
    page.install_media_node(MediaNodeSpec::new());
    let bridge = bridge(&page);

    let response = bridge
        .handle(json!({"type": "controlVideo", "control": "setRate", "rate": 1.5}))
        .await;
    assert_eq!(response["success"], json!(true));

    let response = bridge.handle(json!({"type": "getCurrentVideo"})).await;
    assert_eq!(response["videoData"]["playbackRate"], json!(1.5));
}

#[tokio::test]
async fn removal_walks_active_stale_resolving_and_never_serves_stale_data() {
    let page = ScriptedPage::new("https://watch.example");
    let node = page.install_media_node(MediaNodeSpec::new());
    let config = BindingCenterConfig {
        // Slow enough that the resolving window is observable.
        retry: RetryPolicy::new(3, Duration::from_millis(100)),
        ..BindingCenterConfig::default()
    };
    let lens = Arc::new(VidLens::attach(Arc::new(page.clone()), config));

    lens.current_video().await.unwrap();
    assert_eq!(lens.phase(), BindingPhase::Active);

    let mut events = lens.subscribe();
    page.remove_node(&node);

    // The observer marks the binding stale and starts re-resolution.
    let mut saw_stale = false;
    let mut saw_resolving = false;
    let deadline = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(BindingEvent::Stale { .. }) => saw_stale = true,
                Ok(BindingEvent::Resolving { .. }) => {
                    saw_resolving = true;
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    })
    .await;
    assert!(deadline.is_ok());
    assert!(saw_stale && saw_resolving);

    // The answer is NoVideoFound, not the dead binding. The retry budget may
    // already be exhausted here, so any non-active phase is acceptable.
    assert_ne!(lens.phase(), BindingPhase::Active);
    assert!(matches!(
        lens.current_video().await,
        Err(CoreError::NoVideoFound)
    ));

    // Once a new playable element appears, the slot re-binds wholesale.
    page.install_media_node(MediaNodeSpec::new().src("next.mp4"));
    let mut rebound = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if lens.phase() == BindingPhase::Active {
            rebound = true;
            break;
        }
    }
    assert!(rebound);
    let meta = lens.current_video().await.unwrap();
    assert_eq!(meta.src.as_deref(), Some("next.mp4"));
}
