//! The boundary between a session and the wrapped streaming engine.
//!
//! Engines and media elements are driven through `&self`; implementations
//! use interior mutability so one handle can be shared between the session
//! controller and instance callbacks.

use std::fmt;
use std::sync::Arc;

use abr_core::{EventRef, MediaKind, MediaResource, Preload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handle returned by [`StreamingEngine::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// Callback receiving the raw payload of a native engine event.
pub type NativeListener = Box<dyn Fn(Value) + Send + Sync>;

/// One video representation as listed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeBitrate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Bits per second.
    #[serde(default)]
    pub bandwidth: u64,
}

/// One engine track (an adaptation set, in DASH terms).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTrack {
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub bitrate_list: Vec<NativeBitrate>,
}

/// Engine-side description of a selectable quality index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitrateInfo {
    pub quality_index: usize,
    #[serde(default)]
    pub bitrate: u64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// The media element an engine is bound to.
pub trait MediaElement: Send + Sync {
    fn current_time(&self) -> f64;

    fn set_current_time(&self, time: f64);

    /// Write the preload hint. `None` clears it.
    fn set_preload(&self, preload: Option<Preload>);

    /// Dispatch a DOM-style event on the element.
    fn dispatch_event(&self, name: &str, trigger: Option<&EventRef>);
}

/// A running engine instance.
pub trait StreamingEngine: Send + Sync {
    /// Bind the instance to a media element.
    fn initialize(&self, media: Arc<dyn MediaElement>, autoplay: bool);

    /// Deep-merge `patch` into the current settings.
    fn update_settings(&self, patch: &Value);

    /// Snapshot of the effective settings.
    fn settings(&self) -> Value;

    /// Subscribe to a native event type.
    fn on(&self, event_type: &str, listener: NativeListener) -> ListenerId;

    fn off(&self, id: ListenerId);

    fn attach_source(&self, src: &MediaResource);

    fn tracks_for(&self, kind: MediaKind) -> Vec<NativeTrack>;

    fn bitrate_info_list_for(&self, kind: MediaKind) -> Vec<BitrateInfo>;

    /// Pin the quality index for `kind`. With `force_replace` the buffer is
    /// flushed instead of switching at the next segment.
    fn set_quality_for(&self, kind: MediaKind, index: usize, force_replace: bool);

    fn set_current_track(&self, track: &NativeTrack);

    /// Resume or retry playback.
    fn play(&self);

    /// Stream duration in seconds, `NaN` when unknown.
    fn duration(&self) -> f64;

    fn destroy(&self);
}

/// A resolved engine library, able to create instances.
pub trait EngineConstructor: Send + Sync {
    /// Library name, e.g. `"dash.js"`.
    fn name(&self) -> &str;

    fn version(&self) -> Option<String>;

    /// The engine's own environment check.
    fn supports_media_source(&self) -> bool;

    /// Every native event type the engine may emit.
    fn events(&self) -> Vec<String>;

    fn create(&self) -> Arc<dyn StreamingEngine>;
}

impl fmt::Debug for dyn EngineConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConstructor")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}
