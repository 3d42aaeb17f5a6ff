//! abr-engine: everything that touches the wrapped streaming engine.
//!
//! - [`traits`] - the engine, constructor and media-element boundary
//! - [`naming`] - native event type to canonical event name
//! - [`native`] - the native event envelope and payload shims
//! - [`capability`] - protocol and environment predicates
//! - [`loader`] - engine library resolution with lifecycle events
//! - [`binding`] / [`dash`] - engine-specific knowledge behind one trait
//! - [`mock`] - recording test doubles

pub mod binding;
pub mod capability;
pub mod dash;
pub mod loader;
pub mod mock;
pub mod naming;
pub mod native;
pub mod traits;

pub use binding::EngineBinding;
pub use capability::{
    environment_supports_engine, install_platform_features, matches_protocol, PlatformFeatures, Protocol, StaticFeatures,
};
pub use dash::DashBinding;
pub use loader::{EngineLibrary, EngineLoader, ModuleExports, ScriptHost};
pub use naming::to_event_type;
pub use native::{NativeEvent, NativeSignal, StreamFault};
pub use traits::{
    BitrateInfo, EngineConstructor, ListenerId, MediaElement, NativeBitrate, NativeListener, NativeTrack,
    StreamingEngine,
};
