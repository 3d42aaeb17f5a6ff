//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires a [`DashProvider`] to a recording
//! mock engine, script host and media element plus a player bus with a long
//! history. [`TestHarness::attached`] and [`TestHarness::ready`] advance the
//! session to the two states most tests start from.

#![allow(dead_code)]

use std::sync::Arc;

use abr_core::config::SessionConfig;
use abr_core::{MediaSrc, PlayerBus, PlayerEvent};
use abr_engine::mock::{audio_track, video_track, EngineCall, MockConstructor, MockEngine, MockMedia, MockScriptHost};
use abr_session::DashProvider;
use serde_json::{json, Value};

pub const MANIFEST_URL: &str = "https://cdn.example/live/manifest.mpd";

/// A 480p and a 1080p level, as the engine lists them.
pub fn two_level_engine() -> MockConstructor {
    MockConstructor::new()
        .with_video(video_track("avc1.64001f", &[(480, 800_000), (1080, 4_500_000)]))
        .with_audio(vec![audio_track(0, "audio-en", "en"), audio_track(1, "audio-de", "de")])
        .with_duration(120.0)
}

pub struct TestHarness {
    pub ctor: Arc<MockConstructor>,
    pub host: Arc<MockScriptHost>,
    pub media: Arc<MockMedia>,
    pub bus: Arc<PlayerBus>,
    pub provider: DashProvider,
}

impl TestHarness {
    /// Default configuration and the two-level engine.
    pub fn new() -> Self {
        Self::with(two_level_engine(), SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self::with(two_level_engine(), config)
    }

    pub fn with(ctor: MockConstructor, config: SessionConfig) -> Self {
        let ctor = Arc::new(ctor);
        let host = Arc::new(MockScriptHost::new().installing(&config.library.namespace, ctor.clone()));
        let media = Arc::new(MockMedia::new());
        let bus = Arc::new(PlayerBus::with_history(1024, 1024));
        let provider = DashProvider::new(media.clone(), host.clone(), bus.clone(), config);
        Self {
            ctor,
            host,
            media,
            bus,
            provider,
        }
    }

    /// Setup finished and an engine instance is attached.
    pub async fn attached() -> Self {
        let mut harness = Self::new();
        harness.setup().await;
        harness
    }

    /// Attached, a manifest loaded and the stream initialised.
    pub async fn ready() -> Self {
        let mut harness = Self::attached().await;
        harness.ready_up();
        harness
    }

    pub async fn setup(&mut self) {
        self.provider.setup();
        self.provider.pump().await;
    }

    /// Load the manifest and initialise the stream on the current instance.
    pub fn ready_up(&mut self) {
        assert!(self.provider.load_source(MediaSrc::url(MANIFEST_URL), None));
        self.emit("streamInitialized", json!({}));
    }

    /// The most recently created engine.
    pub fn engine(&self) -> Arc<MockEngine> {
        self.ctor.last_engine().expect("no engine created yet")
    }

    /// Fire a native event at the current engine and process it. Returns the
    /// number of listeners that received it.
    pub fn emit(&mut self, event_type: &str, payload: Value) -> usize {
        let delivered = self.engine().emit(event_type, payload);
        self.provider.drain();
        delivered
    }

    /// Names of every bus event so far, oldest first.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bus.recent_events(usize::MAX).into_iter().map(|e| e.name).collect();
        names.reverse();
        names
    }

    pub fn events_named(&self, name: &str) -> Vec<PlayerEvent> {
        self.bus.events_named(name)
    }

    /// Engine calls of the current engine, minus initialisation.
    pub fn engine_calls(&self) -> Vec<EngineCall> {
        self.engine()
            .calls()
            .into_iter()
            .filter(|c| !matches!(c, EngineCall::Initialize { .. }))
            .collect()
    }
}

/// The settings patch that toggles automatic video quality.
pub fn auto_patch(enabled: bool) -> Value {
    json!({"streaming": {"abr": {"autoSwitchBitrate": {"video": enabled}}}})
}
