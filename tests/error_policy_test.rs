//! Engine-reported stream errors: download failures are retried in place,
//! everything else ends the session.

mod common;

use abr_core::EventDetail;
use abr_engine::mock::EngineCall;
use abr_session::SessionState;
use assert_matches::assert_matches;
use common::{TestHarness, MANIFEST_URL};
use serde_json::json;

#[tokio::test]
async fn download_error_resumes_the_same_instance() {
    let mut h = TestHarness::ready().await;
    let instance = h.provider.instance_id();
    h.engine().clear_calls();

    h.emit("error", json!({"error": "download", "message": "segment 404"}));

    assert_eq!(h.provider.instance_id(), instance);
    assert_eq!(h.engine_calls(), vec![EngineCall::Play]);
    assert_eq!(h.provider.state(), SessionState::Attached);
    assert!(h.events_named("error").is_empty());
    assert_eq!(h.events_named("dash-error").len(), 1);
    assert_eq!(h.provider.qualities().len(), 2);
}

#[tokio::test]
async fn download_error_codes_are_retried() {
    let mut h = TestHarness::ready().await;
    h.engine().clear_calls();

    for code in [25, 27, 29] {
        h.emit("error", json!({"error": {"code": code, "message": "fragment loader"}}));
    }

    assert_eq!(h.engine_calls(), vec![EngineCall::Play; 3]);
    assert!(h.provider.instance_id().is_some());
}

#[tokio::test]
async fn other_errors_destroy_the_instance() {
    let mut h = TestHarness::ready().await;
    let engine = h.engine();

    h.emit("error", json!({"error": "manifestError", "message": "bad mpd"}));

    assert!(h.provider.instance_id().is_none());
    assert_eq!(h.provider.state(), SessionState::Error);
    assert!(engine.is_destroyed());
    assert_eq!(engine.listener_count(), 0);
    assert!(h.provider.qualities().is_empty());
    assert!(h.provider.audio_tracks().is_empty());

    let errors = h.events_named("error");
    assert_eq!(errors.len(), 1);
    assert_matches!(
        &errors[0].detail,
        EventDetail::Error { code: 3, kind, message } if kind == "fatal-stream" && message.contains("bad mpd")
    );
    assert_eq!(errors[0].trigger.as_ref().map(|t| t.name.as_str()), Some("dash-error"));
}

#[tokio::test]
async fn engine_error_code_is_surfaced() {
    let mut h = TestHarness::ready().await;

    h.emit("playbackError", json!({"error": {"code": 10, "message": "manifest loader"}}));

    let errors = h.events_named("error");
    assert_matches!(errors[0].detail, EventDetail::Error { code: 10, .. });
    assert_eq!(h.provider.state(), SessionState::Error);
}

#[tokio::test]
async fn error_without_detail_is_fatal() {
    let mut h = TestHarness::ready().await;

    h.emit("error", json!({}));

    assert_eq!(h.provider.state(), SessionState::Error);
    assert!(h.provider.instance_id().is_none());
    assert_eq!(h.events_named("error").len(), 1);
}

#[tokio::test]
async fn destroyed_engine_events_go_nowhere() {
    let mut h = TestHarness::ready().await;
    let engine = h.engine();
    h.emit("error", json!({"error": "mediasource"}));

    assert_eq!(engine.emit("streamInitialized", json!({})), 0);
    h.provider.drain();

    assert_eq!(h.events_named("dash-stream-initialized").len(), 1);
}

#[tokio::test]
async fn setup_after_fatal_error_recovers() {
    let mut h = TestHarness::ready().await;
    h.emit("error", json!({"error": "manifestError"}));
    assert_eq!(h.provider.state(), SessionState::Error);

    h.setup().await;

    assert_eq!(h.provider.state(), SessionState::Attached);
    assert_eq!(h.ctor.created().len(), 2);
    // The previous source is re-attached to the new instance.
    assert_matches!(
        h.engine_calls().as_slice(),
        [EngineCall::AttachSource { src }] if src.as_url() == Some(MANIFEST_URL)
    );

    h.emit("streamInitialized", json!({}));
    assert_eq!(h.provider.qualities().len(), 2);
    assert_eq!(h.events_named("can-play").len(), 2);
}
