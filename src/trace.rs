//! Scripted session replay.
//!
//! A [`Trace`] describes a mock engine (its tracks, its environment check,
//! whether the script fails to load) and a sequence of caller intents and
//! native engine events. [`replay`] runs it through a real
//! [`DashProvider`] and collects every bus event and engine call in order.

use std::path::Path;
use std::sync::Arc;

use abr_core::config::SessionConfig;
use abr_core::{Error, MediaSrc, PlayerBus, PlayerEvent, Preload, Result, SwitchMode};
use abr_engine::mock::{EngineCall, MediaCall, MockConstructor, MockMedia, MockScriptHost};
use abr_engine::{NativeTrack, ScriptHost};
use abr_tracks::QualityChoice;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::controller::SessionState;
use crate::provider::DashProvider;

/// The scripted engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceEngine {
    pub video: Option<NativeTrack>,
    pub audio: Vec<NativeTrack>,
    pub duration: Option<f64>,
    /// The engine's environment check fails.
    pub unsupported: bool,
    /// Number of script injections that fail before one succeeds.
    pub failed_loads: usize,
}

/// One replay step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceStep {
    Setup,
    LoadSource {
        src: MediaSrc,
        #[serde(default)]
        preload: Option<Preload>,
    },
    /// Fire a native event at the attached engine.
    Native {
        #[serde(rename = "type")]
        event_type: String,
        #[serde(default)]
        payload: Value,
    },
    SelectQuality { choice: QualityChoice },
    SelectAudioTrack { index: usize },
    SetQualitySwitch { mode: SwitchMode },
    Destroy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Trace {
    pub engine: TraceEngine,
    pub steps: Vec<TraceStep>,
}

impl Trace {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("trace parse error: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read trace {}: {e}", path.display())))?;
        Self::from_json(&contents)
    }
}

/// Everything observed during a replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub events: Vec<PlayerEvent>,
    pub engine_calls: Vec<EngineCall>,
    pub media_calls: Vec<MediaCall>,
    pub final_state: SessionState,
    pub qualities: usize,
    pub selected_quality: Option<usize>,
    pub auto_quality: bool,
}

/// Run `trace` against a mock engine.
pub async fn replay(trace: &Trace, config: SessionConfig) -> Result<ReplayReport> {
    let base = if trace.engine.unsupported {
        MockConstructor::unsupported()
    } else {
        MockConstructor::new()
    };
    let mut ctor = base.with_audio(trace.engine.audio.clone());
    if let Some(video) = &trace.engine.video {
        ctor = ctor.with_video(video.clone());
    }
    if let Some(duration) = trace.engine.duration {
        ctor = ctor.with_duration(duration);
    }
    let ctor = Arc::new(ctor);

    let host = MockScriptHost::new().installing(&config.library.namespace, ctor.clone());
    host.fail_next(trace.engine.failed_loads);
    let host: Arc<dyn ScriptHost> = Arc::new(host);

    let bus = Arc::new(PlayerBus::with_history(config.bus.capacity, config.bus.history));
    let mut rx = bus.subscribe();
    let media = Arc::new(MockMedia::new());
    let mut provider = DashProvider::new(media.clone(), host, Arc::clone(&bus), config);

    let mut events = Vec::new();
    for (i, step) in trace.steps.iter().enumerate() {
        debug!(step = i, ?step, "replay step");
        match step {
            TraceStep::Setup => {
                provider.setup();
                provider.pump().await;
            }
            TraceStep::LoadSource { src, preload } => {
                if !provider.load_source(src.clone(), *preload) {
                    warn!(step = i, "source ignored");
                }
            }
            TraceStep::Native { event_type, payload } => {
                match ctor.last_engine().filter(|e| !e.is_destroyed()) {
                    Some(engine) => {
                        engine.emit(event_type, payload.clone());
                    }
                    None => warn!(step = i, event = %event_type, "no live engine; event dropped"),
                }
                provider.drain();
            }
            TraceStep::SelectQuality { choice } => {
                if let Err(err) = provider.select_quality(*choice) {
                    warn!(step = i, error = %err, "quality selection rejected");
                }
            }
            TraceStep::SelectAudioTrack { index } => {
                if let Err(err) = provider.select_audio_track(*index) {
                    warn!(step = i, error = %err, "audio selection rejected");
                }
            }
            TraceStep::SetQualitySwitch { mode } => provider.set_quality_switch(*mode),
            TraceStep::Destroy => provider.destroy(),
        }
        collect(&mut rx, &mut events);
    }

    let engine_calls = ctor.created().iter().flat_map(|e| e.calls()).collect();
    let report = ReplayReport {
        events,
        engine_calls,
        media_calls: media.calls(),
        final_state: provider.state(),
        qualities: provider.qualities().len(),
        selected_quality: provider.qualities().selected_index(),
        auto_quality: provider.qualities().auto(),
    };
    Ok(report)
}

fn collect(rx: &mut broadcast::Receiver<PlayerEvent>, events: &mut Vec<PlayerEvent>) {
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(missed)) => warn!(missed, "replay fell behind the bus"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
