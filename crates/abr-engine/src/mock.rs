//! Recording test doubles for the engine boundary.
//!
//! [`MockEngine`] records every call and lets a test fire native events at
//! its listeners. [`MockConstructor`] creates mock engines and keeps them
//! reachable. [`MockScriptHost`] stands in for script injection, and
//! [`MockMedia`] records writes to the media element.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use abr_core::config::merge_settings;
use abr_core::{Error, EventRef, MediaKind, MediaResource, Preload, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dash::DASH_EVENTS;
use crate::loader::ScriptHost;
use crate::traits::{
    BitrateInfo, EngineConstructor, ListenerId, MediaElement, NativeBitrate, NativeListener, NativeTrack,
    StreamingEngine,
};

/// A call received by a [`MockEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum EngineCall {
    Initialize { autoplay: bool },
    UpdateSettings { patch: Value },
    AttachSource { src: MediaResource },
    SetQualityFor { kind: MediaKind, index: usize, force_replace: bool },
    SetCurrentTrack { index: usize },
    Play,
    Destroy,
}

/// Settings a fresh dash.js instance reports.
pub fn default_settings() -> Value {
    json!({
        "streaming": {
            "abr": {"autoSwitchBitrate": {"video": true, "audio": true}},
            "buffer": {"fastSwitchEnabled": true}
        }
    })
}

/// A video track with one level per `(height, bandwidth)` pair.
pub fn video_track(codec: &str, levels: &[(u32, u64)]) -> NativeTrack {
    NativeTrack {
        index: 0,
        codec: Some(codec.to_string()),
        bitrate_list: levels
            .iter()
            .map(|&(height, bandwidth)| NativeBitrate {
                id: None,
                width: 0,
                height,
                bandwidth,
            })
            .collect(),
        ..Default::default()
    }
}

pub fn audio_track(index: usize, id: &str, lang: &str) -> NativeTrack {
    NativeTrack {
        index,
        id: Some(id.to_string()),
        lang: Some(lang.to_string()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// MockEngine
// ---------------------------------------------------------------------------

type Listener = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Default)]
struct EngineState {
    settings: Value,
    listeners: BTreeMap<u64, (String, Listener)>,
    calls: Vec<EngineCall>,
    video: Option<NativeTrack>,
    audio: Vec<NativeTrack>,
    bitrate_infos: Vec<BitrateInfo>,
    media: Option<Arc<dyn MediaElement>>,
    duration: f64,
}

/// Scriptable, recording [`StreamingEngine`].
pub struct MockEngine {
    state: Mutex<EngineState>,
    next_listener: AtomicU64,
    destroyed: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState {
                settings: default_settings(),
                duration: f64::NAN,
                ..Default::default()
            }),
            next_listener: AtomicU64::new(1),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn set_video_track(&self, track: NativeTrack) {
        self.state.lock().video = Some(track);
    }

    pub fn set_audio_tracks(&self, tracks: Vec<NativeTrack>) {
        self.state.lock().audio = tracks;
    }

    pub fn set_bitrate_infos(&self, infos: Vec<BitrateInfo>) {
        self.state.lock().bitrate_infos = infos;
    }

    pub fn set_duration(&self, duration: f64) {
        self.state.lock().duration = duration;
    }

    /// Fire a native event at every listener of `event_type`. Listeners are
    /// called without holding the engine lock.
    pub fn emit(&self, event_type: &str, payload: Value) -> usize {
        let listeners: Vec<Listener> = self
            .state
            .lock()
            .listeners
            .values()
            .filter(|(t, _)| t == event_type)
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in &listeners {
            listener(payload.clone());
        }
        listeners.len()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn is_subscribed(&self, event_type: &str) -> bool {
        self.state.lock().listeners.values().any(|(t, _)| t == event_type)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn media(&self) -> Option<Arc<dyn MediaElement>> {
        self.state.lock().media.clone()
    }

    fn record(&self, call: EngineCall) {
        self.state.lock().calls.push(call);
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingEngine for MockEngine {
    fn initialize(&self, media: Arc<dyn MediaElement>, autoplay: bool) {
        let mut state = self.state.lock();
        state.media = Some(media);
        state.calls.push(EngineCall::Initialize { autoplay });
    }

    fn update_settings(&self, patch: &Value) {
        let mut state = self.state.lock();
        merge_settings(&mut state.settings, patch);
        state.calls.push(EngineCall::UpdateSettings { patch: patch.clone() });
    }

    fn settings(&self) -> Value {
        self.state.lock().settings.clone()
    }

    fn on(&self, event_type: &str, listener: NativeListener) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .listeners
            .insert(id, (event_type.to_string(), Arc::from(listener)));
        ListenerId(id)
    }

    fn off(&self, id: ListenerId) {
        self.state.lock().listeners.remove(&id.0);
    }

    fn attach_source(&self, src: &MediaResource) {
        self.record(EngineCall::AttachSource { src: src.clone() });
    }

    fn tracks_for(&self, kind: MediaKind) -> Vec<NativeTrack> {
        let state = self.state.lock();
        match kind {
            MediaKind::Video => state.video.iter().cloned().collect(),
            MediaKind::Audio => state.audio.clone(),
            MediaKind::Text => Vec::new(),
        }
    }

    fn bitrate_info_list_for(&self, kind: MediaKind) -> Vec<BitrateInfo> {
        match kind {
            MediaKind::Video => self.state.lock().bitrate_infos.clone(),
            _ => Vec::new(),
        }
    }

    fn set_quality_for(&self, kind: MediaKind, index: usize, force_replace: bool) {
        self.record(EngineCall::SetQualityFor {
            kind,
            index,
            force_replace,
        });
    }

    fn set_current_track(&self, track: &NativeTrack) {
        self.record(EngineCall::SetCurrentTrack { index: track.index });
    }

    fn play(&self) {
        self.record(EngineCall::Play);
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.listeners.clear();
        state.media = None;
        state.calls.push(EngineCall::Destroy);
    }
}

// ---------------------------------------------------------------------------
// MockConstructor
// ---------------------------------------------------------------------------

/// Creates [`MockEngine`]s, optionally pre-loaded with tracks.
pub struct MockConstructor {
    supported: bool,
    events: Vec<String>,
    video: Option<NativeTrack>,
    audio: Vec<NativeTrack>,
    duration: f64,
    created: Mutex<Vec<Arc<MockEngine>>>,
}

impl MockConstructor {
    pub fn new() -> Self {
        Self {
            supported: true,
            events: DASH_EVENTS.iter().map(|s| s.to_string()).collect(),
            video: None,
            audio: Vec::new(),
            duration: f64::NAN,
            created: Mutex::new(Vec::new()),
        }
    }

    /// A constructor whose environment check fails.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn with_events(mut self, events: &[&str]) -> Self {
        self.events = events.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_video(mut self, track: NativeTrack) -> Self {
        self.video = Some(track);
        self
    }

    pub fn with_audio(mut self, tracks: Vec<NativeTrack>) -> Self {
        self.audio = tracks;
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn created(&self) -> Vec<Arc<MockEngine>> {
        self.created.lock().clone()
    }

    pub fn last_engine(&self) -> Option<Arc<MockEngine>> {
        self.created.lock().last().cloned()
    }
}

impl Default for MockConstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConstructor for MockConstructor {
    fn name(&self) -> &str {
        "mock-dash"
    }

    fn version(&self) -> Option<String> {
        Some("4.7.4".into())
    }

    fn supports_media_source(&self) -> bool {
        self.supported
    }

    fn events(&self) -> Vec<String> {
        self.events.clone()
    }

    fn create(&self) -> Arc<dyn StreamingEngine> {
        let engine = Arc::new(MockEngine::new());
        if let Some(video) = &self.video {
            engine.set_video_track(video.clone());
        }
        engine.set_audio_tracks(self.audio.clone());
        engine.set_duration(self.duration);
        self.created.lock().push(Arc::clone(&engine));
        engine
    }
}

// ---------------------------------------------------------------------------
// MockScriptHost
// ---------------------------------------------------------------------------

/// Script host whose injections succeed or fail on demand.
pub struct MockScriptHost {
    globals: Mutex<HashMap<String, Arc<dyn EngineConstructor>>>,
    /// Globals that appear only once an injection succeeds.
    installs: Mutex<HashMap<String, Arc<dyn EngineConstructor>>>,
    fail_next: AtomicUsize,
    delay: Option<Duration>,
    injections: Mutex<Vec<String>>,
}

impl MockScriptHost {
    pub fn new() -> Self {
        Self {
            globals: Mutex::new(HashMap::new()),
            installs: Mutex::new(HashMap::new()),
            fail_next: AtomicUsize::new(0),
            delay: None,
            injections: Mutex::new(Vec::new()),
        }
    }

    /// Injecting any script installs `ctor` under `namespace`.
    pub fn installing(self, namespace: &str, ctor: Arc<dyn EngineConstructor>) -> Self {
        self.installs.lock().insert(namespace.to_string(), ctor);
        self
    }

    /// Each injection waits `delay` before completing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` injections.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// URLs injected so far, in order.
    pub fn injections(&self) -> Vec<String> {
        self.injections.lock().clone()
    }
}

impl Default for MockScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptHost for MockScriptHost {
    async fn inject(&self, url: &str) -> Result<()> {
        self.injections.lock().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::engine_load(format!("failed to load script {url}")));
        }
        let installs = self.installs.lock().clone();
        self.globals.lock().extend(installs);
        Ok(())
    }

    fn lookup_global(&self, namespace: &str) -> Option<Arc<dyn EngineConstructor>> {
        self.globals.lock().get(namespace).cloned()
    }
}

// ---------------------------------------------------------------------------
// MockMedia
// ---------------------------------------------------------------------------

/// A write received by a [`MockMedia`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum MediaCall {
    SetCurrentTime { time: f64 },
    SetPreload { preload: Option<Preload> },
    DispatchEvent { name: String },
}

/// Recording [`MediaElement`].
pub struct MockMedia {
    current_time: Mutex<f64>,
    calls: Mutex<Vec<MediaCall>>,
}

impl MockMedia {
    pub fn new() -> Self {
        Self {
            current_time: Mutex::new(0.0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Move the playhead without recording a write.
    pub fn seek_silently(&self, time: f64) {
        *self.current_time.lock() = time;
    }
}

impl Default for MockMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaElement for MockMedia {
    fn current_time(&self) -> f64 {
        *self.current_time.lock()
    }

    fn set_current_time(&self, time: f64) {
        *self.current_time.lock() = time;
        self.calls.lock().push(MediaCall::SetCurrentTime { time });
    }

    fn set_preload(&self, preload: Option<Preload>) {
        self.calls.lock().push(MediaCall::SetPreload { preload });
    }

    fn dispatch_event(&self, name: &str, _trigger: Option<&EventRef>) {
        self.calls.lock().push(MediaCall::DispatchEvent { name: name.to_string() });
    }
}
