//! Engine-specific knowledge behind one trait.
//!
//! The session controller is engine-agnostic; everything it needs to know
//! about a concrete engine's vocabulary (event names, settings layout,
//! track shapes) lives in an [`EngineBinding`].

use abr_tracks::{AudioTrack, QualityLevel, QualityList};
use serde_json::Value;

use crate::capability::Protocol;
use crate::native::{NativeEvent, NativeSignal};
use crate::traits::StreamingEngine;

pub trait EngineBinding: Send + Sync + 'static {
    /// Prefix of every bus event this binding produces, e.g. `"dash"`.
    fn prefix(&self) -> &'static str;

    /// Provider type reported by the facade.
    fn type_name(&self) -> &'static str;

    /// Source recognition table.
    fn protocol(&self) -> &Protocol;

    /// Native event types that must be subscribed even when the engine's
    /// catalog omits them.
    fn required_events(&self) -> &'static [&'static str];

    /// Decide what a native event means to the controller.
    fn classify(&self, event: &NativeEvent) -> NativeSignal;

    /// Whether the engine is currently choosing the video quality.
    fn auto_quality(&self, settings: &Value) -> bool;

    /// Settings patch toggling engine-driven quality selection.
    fn auto_quality_patch(&self, enabled: bool) -> Value;

    /// Current video levels, in engine order.
    fn quality_levels(&self, engine: &dyn StreamingEngine) -> Vec<QualityLevel>;

    /// Current audio tracks, in engine order.
    fn audio_tracks(&self, engine: &dyn StreamingEngine) -> Vec<AudioTrack>;

    /// Registry position of an engine quality index from an ABR request.
    fn requested_quality(&self, engine: &dyn StreamingEngine, index: usize, qualities: &QualityList) -> Option<usize>;

    /// Registry position of an engine quality index that was rendered.
    fn rendered_quality(&self, index: usize, qualities: &QualityList) -> Option<usize> {
        (index < qualities.len()).then_some(index)
    }
}
