//! The session controller.
//!
//! A [`SessionController`] owns one engine instance bound to one media
//! element, mirrors every native engine event onto the player bus, keeps the
//! quality and audio-track registries in step with the engine and applies the
//! error policy.
//!
//! Engine listeners and loader tasks never touch controller state directly.
//! They post [`Message`]s into the controller's inbox, and the owner drains
//! it with [`SessionController::pump`] or [`SessionController::drain`]. Every
//! message names the load attempt or engine instance it belongs to; messages
//! for anything that is no longer current are dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use abr_core::config::SessionConfig;
use abr_core::events::names;
use abr_core::{
    AttemptId, Error, EventDetail, EventRef, InstanceId, MediaKind, MediaSrc, PlayerBus, Preload, Result,
    SessionId, SwitchMode,
};
use abr_engine::{
    EngineBinding, EngineConstructor, EngineLibrary, EngineLoader, ListenerId, MediaElement, NativeEvent,
    NativeSignal, StreamFault, StreamingEngine,
};
use abr_tracks::audio::{audio_track_list, AUDIO_TRACKS};
use abr_tracks::quality::{quality_list, QUALITIES};
use abr_tracks::{AudioTrack, AudioTrackList, Cause, ChangeKind, QualityChoice, QualityLevel, QualityList, RegistryChange};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::policy::stream_error;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Unattached,
    LoadingEngine,
    Attached,
    Error,
    Detaching,
    Destroyed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unattached => "unattached",
            Self::LoadingEngine => "loading-engine",
            Self::Attached => "attached",
            Self::Error => "error",
            Self::Detaching => "detaching",
            Self::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

/// Inbox message.
enum Message {
    Native { instance: InstanceId, event: NativeEvent },
    Loaded {
        attempt: AttemptId,
        result: Result<Arc<dyn EngineConstructor>>,
    },
}

/// Callback run on every engine (re)attachment. The engine is only lent for
/// the duration of the call.
pub type InstanceCallback = Arc<dyn Fn(&dyn StreamingEngine) + Send + Sync>;

type CallbackMap = Arc<Mutex<BTreeMap<u64, InstanceCallback>>>;

/// Unregisters an instance callback.
pub struct Disposer {
    callbacks: CallbackMap,
    id: u64,
}

impl Disposer {
    /// Remove the callback. Returns `false` if it was already removed.
    pub fn dispose(&self) -> bool {
        self.callbacks.lock().remove(&self.id).is_some()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer").field("id", &self.id).finish()
    }
}

struct Instance {
    id: InstanceId,
    engine: Arc<dyn StreamingEngine>,
    listeners: Vec<ListenerId>,
}

/// What ended a wait in [`SessionController::pump`].
enum Woke {
    Message(Option<Message>),
    Joined(std::result::Result<(), JoinError>),
}

struct Attempt {
    id: AttemptId,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Attempt {
    fn cancel(self) {
        self.token.cancel();
        self.task.abort();
        debug!(attempt = %self.id, "load attempt cancelled");
    }
}

/// Owner of one engine instance, its media binding and both registries.
pub struct SessionController {
    session: SessionId,
    binding: Arc<dyn EngineBinding>,
    loader: Arc<EngineLoader>,
    bus: Arc<PlayerBus>,
    media: Arc<dyn MediaElement>,
    config: SessionConfig,
    state: SessionState,
    qualities: QualityList,
    audio_tracks: AudioTrackList,
    ctor: Option<Arc<dyn EngineConstructor>>,
    instance: Option<Instance>,
    attempt: Option<Attempt>,
    callbacks: CallbackMap,
    next_callback: AtomicU64,
    can_play: bool,
    current_src: Option<MediaSrc>,
    pending_src: Option<(MediaSrc, Option<Preload>)>,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl SessionController {
    pub fn new(
        binding: Arc<dyn EngineBinding>,
        loader: Arc<EngineLoader>,
        media: Arc<dyn MediaElement>,
        bus: Arc<PlayerBus>,
        config: SessionConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut qualities = quality_list();
        qualities.set_switch_mode(config.playback.quality_switch);
        let session = SessionId::new();
        debug!(session = %session, engine = binding.type_name(), "session created");
        Self {
            session,
            binding,
            loader,
            bus,
            media,
            config,
            state: SessionState::Unattached,
            qualities,
            audio_tracks: audio_track_list(),
            ctor: None,
            instance: None,
            attempt: None,
            callbacks: Arc::new(Mutex::new(BTreeMap::new())),
            next_callback: AtomicU64::new(1),
            can_play: false,
            current_src: None,
            pending_src: None,
            tx,
            rx,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn session_id(&self) -> SessionId {
        self.session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bus(&self) -> &Arc<PlayerBus> {
        &self.bus
    }

    pub fn binding(&self) -> &Arc<dyn EngineBinding> {
        &self.binding
    }

    pub fn media(&self) -> &Arc<dyn MediaElement> {
        &self.media
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the configuration. Engine settings apply at the next attach.
    pub fn set_config(&mut self, config: SessionConfig) {
        self.qualities.set_switch_mode(config.playback.quality_switch);
        self.config = config;
    }

    pub fn qualities(&self) -> &QualityList {
        &self.qualities
    }

    pub fn audio_tracks(&self) -> &AudioTrackList {
        &self.audio_tracks
    }

    fn engine(&self) -> Option<Arc<dyn StreamingEngine>> {
        self.instance.as_ref().map(|i| Arc::clone(&i.engine))
    }

    /// Run `f` against the attached engine instance, if any.
    pub fn with_instance<R>(&self, f: impl FnOnce(&dyn StreamingEngine) -> R) -> Option<R> {
        self.instance.as_ref().map(|i| f(i.engine.as_ref()))
    }

    pub fn instance_id(&self) -> Option<InstanceId> {
        self.instance.as_ref().map(|i| i.id)
    }

    /// The last resolved engine constructor.
    pub fn ctor(&self) -> Option<Arc<dyn EngineConstructor>> {
        self.ctor.clone()
    }

    pub fn current_src(&self) -> Option<&MediaSrc> {
        self.current_src.as_ref()
    }

    /// Whether the current stream has been announced as playable.
    pub fn can_play(&self) -> bool {
        self.can_play
    }

    /// Whether a load attempt is in flight.
    pub fn is_loading(&self) -> bool {
        self.attempt.is_some()
    }

    // -- lifecycle ----------------------------------------------------------

    /// Start resolving the engine and attach it once ready.
    ///
    /// A previous in-flight attempt is cancelled and an attached instance is
    /// torn down first. Must be called inside a Tokio runtime.
    pub fn setup(&mut self, library: EngineLibrary) -> Result<AttemptId> {
        if self.state == SessionState::Destroyed {
            return Err(Error::InvalidState("session has been destroyed".into()));
        }
        if let Some(previous) = self.attempt.take() {
            previous.cancel();
        }
        if self.instance.is_some() {
            self.detach_instance(None);
        }

        let id = AttemptId::new();
        let token = CancellationToken::new();
        let loader = Arc::clone(&self.loader);
        let tx = self.tx.clone();
        let child = token.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                result = loader.load(&library) => {
                    // The receiver only closes when the controller is gone.
                    let _ = tx.send(Message::Loaded { attempt: id, result });
                }
            }
        });

        info!(session = %self.session, attempt = %id, "engine setup started");
        self.attempt = Some(Attempt { id, token, task });
        self.state = SessionState::LoadingEngine;
        Ok(id)
    }

    /// Handle inbox messages until no load attempt is in flight, then drain
    /// whatever else is queued.
    ///
    /// A loader task that ends without posting its outcome (it panicked)
    /// fails the attempt instead of leaving the wait open.
    pub async fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(attempt) = self.attempt.as_mut() {
            let id = attempt.id;
            let woke = tokio::select! {
                biased;
                message = self.rx.recv() => Woke::Message(message),
                joined = &mut attempt.task => Woke::Joined(joined),
            };
            match woke {
                Woke::Message(Some(message)) => {
                    self.handle(message);
                    handled += 1;
                }
                Woke::Message(None) => break,
                Woke::Joined(joined) => {
                    handled += self.drain();
                    if self.attempt.as_ref().map(|a| a.id) == Some(id) {
                        self.attempt = None;
                        let reason = match joined {
                            Err(err) if err.is_panic() => "loader task panicked",
                            _ => "loader task ended without a result",
                        };
                        self.fail_load(Error::engine_load(reason));
                    }
                }
            }
        }
        handled + self.drain()
    }

    /// Handle every message already queued, without waiting.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::Loaded { attempt, result } => {
                if self.attempt.as_ref().map(|a| a.id) != Some(attempt) {
                    debug!(attempt = %attempt, "ignoring outcome of a superseded load attempt");
                    return;
                }
                self.attempt = None;
                match result {
                    Ok(ctor) => self.attach(ctor),
                    Err(err) => self.fail_load(err),
                }
            }
            Message::Native { instance, event } => {
                if self.instance_id() != Some(instance) {
                    debug!(event = %event.event_type, "ignoring event from a detached instance");
                    return;
                }
                self.handle_native(event);
            }
        }
    }

    fn fail_load(&mut self, err: Error) {
        warn!(session = %self.session, error = %err, "engine setup failed");
        self.state = SessionState::Error;
        self.bus.dispatch(names::ERROR, EventDetail::from(&err), None);
    }

    fn attach(&mut self, ctor: Arc<dyn EngineConstructor>) {
        let engine = ctor.create();
        let id = InstanceId::new();
        self.ctor = Some(Arc::clone(&ctor));

        engine.initialize(Arc::clone(&self.media), self.config.playback.autoplay);
        if self.config.engine.as_object().is_some_and(|o| !o.is_empty()) {
            engine.update_settings(&self.config.engine);
        }

        let mut event_types = ctor.events();
        for required in self.binding.required_events() {
            if !event_types.iter().any(|t| t == required) {
                event_types.push(required.to_string());
            }
        }
        let listeners = event_types
            .into_iter()
            .map(|event_type| {
                let tx = self.tx.clone();
                let subscribed = event_type.clone();
                engine.on(
                    &subscribed,
                    Box::new(move |payload| {
                        let event = NativeEvent::new(event_type.clone(), payload);
                        let _ = tx.send(Message::Native { instance: id, event });
                    }),
                )
            })
            .collect::<Vec<_>>();

        info!(
            session = %self.session,
            instance = %id,
            engine = ctor.name(),
            listeners = listeners.len(),
            "engine attached"
        );
        self.instance = Some(Instance {
            id,
            engine: Arc::clone(&engine),
            listeners,
        });
        self.state = SessionState::Attached;
        self.can_play = false;

        let callbacks: Vec<InstanceCallback> = self.callbacks.lock().values().cloned().collect();
        for callback in callbacks {
            callback(engine.as_ref());
        }

        let prefix = self.binding.prefix();
        self.bus
            .dispatch(format!("{prefix}-instance"), EventDetail::Instance(id), None);
        self.bus
            .dispatch(names::PROVIDER_SETUP, EventDetail::Instance(id), None);

        let queued = self
            .pending_src
            .take()
            .or_else(|| self.current_src.clone().map(|src| (src, None)));
        if let Some((src, preload)) = queued {
            self.load_source(src, preload);
        }
    }

    /// Attach `src` to the current engine instance.
    ///
    /// Returns `false` without effect when the resource is neither a URL nor
    /// a pre-parsed manifest of this protocol, or the session is destroyed.
    /// Before an instance exists the source is queued and attached once the
    /// engine is ready. Without an explicit `preload` the configured
    /// `playback.preload` hint is written.
    pub fn load_source(&mut self, src: MediaSrc, preload: Option<Preload>) -> bool {
        let attachable =
            src.src.as_url().is_some() || self.binding.protocol().is_parsed_manifest(&src.src);
        if !attachable || self.state == SessionState::Destroyed {
            debug!(src = %src.src, "source not attachable");
            return false;
        }

        let Some(instance) = &self.instance else {
            debug!(src = %src.src, "engine not ready; source queued");
            self.pending_src = Some((src, preload));
            return true;
        };

        self.media.set_preload(preload.or(Some(self.config.playback.preload)));
        instance.engine.attach_source(&src.src);
        info!(session = %self.session, src = %src.src, "source attached");
        self.current_src = Some(src);
        self.can_play = false;
        true
    }

    /// Register a callback run on every engine attachment, and immediately
    /// if an instance already exists.
    pub fn on_instance(&self, callback: InstanceCallback) -> Disposer {
        if let Some(instance) = &self.instance {
            callback(instance.engine.as_ref());
        }
        let id = self.next_callback.fetch_add(1, Ordering::Relaxed);
        self.callbacks.lock().insert(id, callback);
        Disposer {
            callbacks: Arc::clone(&self.callbacks),
            id,
        }
    }

    /// Tear everything down. Safe to call repeatedly; terminal.
    pub fn destroy(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        self.state = SessionState::Detaching;
        if let Some(attempt) = self.attempt.take() {
            attempt.cancel();
        }
        self.detach_instance(None);
        self.pending_src = None;
        self.state = SessionState::Destroyed;
        info!(session = %self.session, "session destroyed");
    }

    /// Unsubscribe, destroy the engine and clear both registries.
    fn detach_instance(&mut self, trigger: Option<EventRef>) {
        if let Some(instance) = self.instance.take() {
            for listener in instance.listeners {
                instance.engine.off(listener);
            }
            instance.engine.destroy();
            info!(session = %self.session, instance = %instance.id, "engine instance destroyed");
        }
        self.qualities.reset(Cause::engine(trigger.clone()));
        self.audio_tracks.reset(Cause::engine(trigger));
        self.can_play = false;
    }

    // -- native events ------------------------------------------------------

    fn handle_native(&mut self, event: NativeEvent) {
        let trigger = self.bus.dispatch(
            event.canonical_name(self.binding.prefix()),
            EventDetail::Json(event.payload.clone()),
            None,
        );

        match self.binding.classify(&event) {
            NativeSignal::StreamInitialized { duration } => self.on_stream_initialized(duration, trigger),
            NativeSignal::QualityRendered { index, duration } => {
                if !self.can_play {
                    self.on_stream_initialized(duration, trigger);
                } else if let Some(index) = index {
                    let position = self.binding.rendered_quality(index, &self.qualities);
                    self.engine_selects_quality(position, trigger);
                }
            }
            NativeSignal::QualityRequested { index: Some(index) } => {
                let position = self.instance.as_ref().and_then(|i| {
                    self.binding
                        .requested_quality(i.engine.as_ref(), index, &self.qualities)
                });
                self.engine_selects_quality(position, trigger);
            }
            NativeSignal::AudioSwitched { track_id: Some(id) } => {
                let position = self.audio_tracks.items().iter().position(|t| t.id == id);
                match position {
                    Some(position) => {
                        let _ = self
                            .audio_tracks
                            .select_index(position, Cause::engine(Some(trigger)));
                    }
                    None => debug!(track = %id, "engine switched to an unknown audio track"),
                }
            }
            NativeSignal::Error(fault) => self.on_error(&event, fault, trigger),
            NativeSignal::QualityRequested { index: None }
            | NativeSignal::AudioSwitched { track_id: None }
            | NativeSignal::Passthrough => {}
        }
    }

    fn engine_selects_quality(&mut self, position: Option<usize>, trigger: EventRef) {
        let Some(position) = position else {
            debug!("engine quality does not match any registry entry");
            return;
        };
        if let Ok(Some(change)) = self.qualities.select_index(position, Cause::engine(Some(trigger))) {
            self.forward(change);
        }
    }

    /// Populate both registries and announce the stream as playable.
    fn on_stream_initialized(&mut self, duration: Option<f64>, trigger: EventRef) {
        if self.can_play {
            return;
        }
        let Some(engine) = self.engine() else {
            return;
        };

        let levels = self.binding.quality_levels(engine.as_ref());
        let tracks = self.binding.audio_tracks(engine.as_ref());
        debug!(qualities = levels.len(), audio_tracks = tracks.len(), "stream initialized");

        self.audio_tracks
            .replace_all(tracks, None, Cause::engine(Some(trigger.clone())));
        self.qualities
            .replace_all(levels, None, Cause::engine(Some(trigger.clone())));
        let auto = self.binding.auto_quality(&engine.settings());
        if let Ok(Some(change)) = self.qualities.set_auto(auto, Cause::engine(Some(trigger.clone()))) {
            self.forward(change);
        }

        let duration = duration.unwrap_or_else(|| engine.duration());
        self.bus.dispatch(
            names::DURATION_CHANGE,
            EventDetail::Duration(duration),
            Some(trigger.clone()),
        );

        self.can_play = true;
        self.media.dispatch_event("canplay", Some(&trigger));
        self.bus.dispatch(names::CAN_PLAY, EventDetail::None, Some(trigger));
    }

    fn on_error(&mut self, event: &NativeEvent, fault: StreamFault, trigger: EventRef) {
        error!(
            session = %self.session,
            instance = ?self.instance_id(),
            media_time = self.media.current_time(),
            event_type = %event.event_type,
            data = %event.payload,
            src = ?self.current_src.as_ref().map(|s| s.src.to_string()),
            kind = %fault.kind,
            "engine error"
        );

        let err = stream_error(&fault);
        if !err.is_terminal() {
            warn!(session = %self.session, error = %err, "resuming playback");
            if let Some(engine) = self.engine() {
                engine.play();
            }
            return;
        }
        self.detach_instance(Some(trigger.clone()));
        self.state = SessionState::Error;
        self.bus
            .dispatch(names::ERROR, EventDetail::from(&err), Some(trigger));
    }

    // -- caller intents -----------------------------------------------------

    /// Caller selects a quality, or hands the choice back to the engine.
    ///
    /// A selection the registry does not contain is reported as
    /// [`Error::Selection`] and changes nothing.
    pub fn select_quality(&mut self, choice: QualityChoice) -> Result<()> {
        let change = match choice {
            QualityChoice::Auto => self.qualities.set_auto(true, Cause::caller()),
            QualityChoice::Index(index) => self.qualities.select_index(index, Cause::caller()),
        };
        self.apply_intent(change)
    }

    /// Caller selects a specific level.
    pub fn select_quality_level(&mut self, level: &QualityLevel) -> Result<()> {
        let change = self.qualities.select(level, Cause::caller());
        self.apply_intent(change)
    }

    /// Caller selects an audio track by registry position.
    pub fn select_audio_track(&mut self, index: usize) -> Result<()> {
        let change = self.audio_tracks.select_index(index, Cause::caller());
        self.apply_intent(change)
    }

    /// Caller selects a specific audio track.
    pub fn select_audio(&mut self, track: &AudioTrack) -> Result<()> {
        let change = self.audio_tracks.select(track, Cause::caller());
        self.apply_intent(change)
    }

    pub fn set_quality_switch(&mut self, mode: SwitchMode) {
        self.qualities.set_switch_mode(mode);
    }

    fn apply_intent(&mut self, change: Result<Option<RegistryChange>>) -> Result<()> {
        match change {
            Ok(Some(change)) => {
                self.forward(change);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                warn!(session = %self.session, error = %err, "selection rejected");
                Err(err)
            }
        }
    }

    /// Turn a caller-originated registry change into engine calls. Engine
    /// originated changes stop here.
    fn forward(&mut self, change: RegistryChange) {
        if !change.needs_forwarding() {
            return;
        }
        let Some(engine) = self.engine() else {
            debug!(list = change.list, "no engine attached; intent kept in the registry only");
            return;
        };

        match (change.list, change.kind) {
            (QUALITIES, ChangeKind::Auto { enabled }) => {
                engine.update_settings(&self.binding.auto_quality_patch(enabled));
            }
            (QUALITIES, ChangeKind::Selected { index, .. }) => {
                engine.update_settings(&self.binding.auto_quality_patch(false));
                let force_replace = self.qualities.switch_mode() == SwitchMode::Immediate;
                engine.set_quality_for(MediaKind::Video, index, force_replace);
                if self.config.quirks.nudge_current_time_on_quality_change {
                    let time = self.media.current_time();
                    self.media.set_current_time(time);
                }
            }
            (AUDIO_TRACKS, ChangeKind::Selected { index, .. }) => {
                let Some(id) = self.audio_tracks.get(index).map(|t| t.id.clone()) else {
                    return;
                };
                let native = engine
                    .tracks_for(MediaKind::Audio)
                    .into_iter()
                    .find(|t| t.index.to_string() == id);
                match native {
                    Some(track) => engine.set_current_track(&track),
                    None => warn!(track = %id, "audio track no longer known to the engine"),
                }
            }
            _ => {}
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &self.session)
            .field("state", &self.state)
            .field("instance", &self.instance_id())
            .field("qualities", &self.qualities)
            .field("audio_tracks", &self.audio_tracks)
            .field("can_play", &self.can_play)
            .finish()
    }
}
