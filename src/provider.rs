//! The DASH provider facade handed to the surrounding player.
//!
//! [`DashProvider`] mediates every call into its [`SessionController`]; it
//! never returns load or playback failures to the caller. Those arrive as
//! `error` notifications on the player bus.

use std::sync::Arc;

use abr_core::config::SessionConfig;
use abr_core::events::names;
use abr_core::{EventDetail, InstanceId, MediaSrc, PlayerBus, Preload, Result, SwitchMode};
use abr_engine::{
    environment_supports_engine, matches_protocol, DashBinding, EngineBinding, EngineConstructor, EngineLibrary,
    EngineLoader, MediaElement, Protocol, ScriptHost, StreamingEngine,
};
use abr_tracks::{AudioTrack, AudioTrackList, CueCache, QualityChoice, QualityLevel, QualityList, SharedCueCache};
use serde_json::Value;
use tracing::warn;

use crate::controller::{Disposer, InstanceCallback, SessionController, SessionState};

/// Decides whether the DASH provider should claim a source.
#[derive(Debug)]
pub struct DashProviderLoader {
    supported: bool,
    protocol: Protocol,
}

impl DashProviderLoader {
    /// Use the process-wide environment check.
    pub fn new() -> Self {
        Self::with_support(environment_supports_engine())
    }

    pub fn with_support(supported: bool) -> Self {
        Self {
            supported,
            protocol: Protocol::dash(),
        }
    }

    pub fn supported(&self) -> bool {
        self.supported
    }

    /// Environment support and a DASH-looking source.
    pub fn can_play(&self, src: &MediaSrc) -> bool {
        self.supported && matches_protocol(&self.protocol, src)
    }
}

impl Default for DashProviderLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Session facade for DASH playback.
#[derive(Debug)]
pub struct DashProvider {
    controller: SessionController,
    library: EngineLibrary,
    cues: SharedCueCache,
}

impl DashProvider {
    /// Build a provider whose engine library, namespace and settings come
    /// from `config`.
    pub fn new(media: Arc<dyn MediaElement>, host: Arc<dyn ScriptHost>, bus: Arc<PlayerBus>, config: SessionConfig) -> Self {
        let binding: Arc<dyn EngineBinding> = Arc::new(DashBinding::new());
        let loader = Arc::new(EngineLoader::new(
            host,
            Arc::clone(&bus),
            binding.prefix(),
            config.library.namespace.clone(),
        ));
        Self::with_loader(binding, loader, media, bus, config)
    }

    /// Build a provider around an existing loader, sharing its script
    /// injections with other providers.
    pub fn with_loader(
        binding: Arc<dyn EngineBinding>,
        loader: Arc<EngineLoader>,
        media: Arc<dyn MediaElement>,
        bus: Arc<PlayerBus>,
        config: SessionConfig,
    ) -> Self {
        let library = EngineLibrary::Url(config.library.url.clone());
        let cues = CueCache::shared(config.cues.capacity);
        Self {
            controller: SessionController::new(binding, loader, media, bus, config),
            library,
            cues,
        }
    }

    /// Share `cues` with this provider instead of its own cache.
    pub fn with_cue_cache(mut self, cues: SharedCueCache) -> Self {
        self.cues = cues;
        self
    }

    /// Thumbnail and caption cues keyed by source URL.
    pub fn cue_cache(&self) -> &SharedCueCache {
        &self.cues
    }

    pub fn type_name(&self) -> &'static str {
        self.controller.binding().type_name()
    }

    pub fn can_live_sync(&self) -> bool {
        true
    }

    pub fn library(&self) -> &EngineLibrary {
        &self.library
    }

    /// Replace the engine library used by the next [`setup`](Self::setup).
    pub fn set_library(&mut self, library: impl Into<EngineLibrary>) {
        self.library = library.into();
    }

    /// Engine settings merged into the engine defaults at attach.
    pub fn config(&self) -> &Value {
        &self.controller.config().engine
    }

    pub fn set_config(&mut self, settings: Value) {
        let mut config = self.controller.config().clone();
        config.engine = settings;
        self.controller.set_config(config);
    }

    pub fn session_config(&self) -> &SessionConfig {
        self.controller.config()
    }

    pub fn set_session_config(&mut self, config: SessionConfig) {
        self.controller.set_config(config);
    }

    pub fn bus(&self) -> &Arc<PlayerBus> {
        self.controller.bus()
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn ctor(&self) -> Option<Arc<dyn EngineConstructor>> {
        self.controller.ctor()
    }

    /// Run `f` against the attached engine instance, if any. The engine
    /// cannot outlive the call.
    pub fn with_instance<R>(&self, f: impl FnOnce(&dyn StreamingEngine) -> R) -> Option<R> {
        self.controller.with_instance(f)
    }

    pub fn instance_id(&self) -> Option<InstanceId> {
        self.controller.instance_id()
    }

    pub fn current_src(&self) -> Option<&MediaSrc> {
        self.controller.current_src()
    }

    pub fn qualities(&self) -> &QualityList {
        self.controller.qualities()
    }

    pub fn audio_tracks(&self) -> &AudioTrackList {
        self.controller.audio_tracks()
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Begin engine resolution. A destroyed provider reports an `error`
    /// notification instead.
    pub fn setup(&mut self) {
        if let Err(err) = self.controller.setup(self.library.clone()) {
            warn!(error = %err, "setup rejected");
            self.controller
                .bus()
                .dispatch(names::ERROR, EventDetail::from(&err), None);
        }
    }

    /// Process queued engine events and loader outcomes, waiting for an
    /// in-flight load to finish.
    pub async fn pump(&mut self) -> usize {
        self.controller.pump().await
    }

    /// Process queued engine events without waiting.
    pub fn drain(&mut self) -> usize {
        self.controller.drain()
    }

    pub fn load_source(&mut self, src: MediaSrc, preload: Option<Preload>) -> bool {
        self.controller.load_source(src, preload)
    }

    pub fn on_instance<F>(&self, callback: F) -> Disposer
    where
        F: Fn(&dyn StreamingEngine) + Send + Sync + 'static,
    {
        let callback: InstanceCallback = Arc::new(callback);
        self.controller.on_instance(callback)
    }

    pub fn select_quality(&mut self, choice: QualityChoice) -> Result<()> {
        self.controller.select_quality(choice)
    }

    pub fn select_quality_level(&mut self, level: &QualityLevel) -> Result<()> {
        self.controller.select_quality_level(level)
    }

    pub fn select_audio_track(&mut self, index: usize) -> Result<()> {
        self.controller.select_audio_track(index)
    }

    pub fn select_audio(&mut self, track: &AudioTrack) -> Result<()> {
        self.controller.select_audio(track)
    }

    pub fn set_quality_switch(&mut self, mode: SwitchMode) {
        self.controller.set_quality_switch(mode);
    }

    pub fn destroy(&mut self) {
        self.controller.destroy();
    }
}
