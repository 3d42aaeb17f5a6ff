//! abr-session - adaptive streaming session controller
//!
//! Binds a streaming engine to a media element and a player bus, keeps the
//! quality and audio-track registries in step with the engine and applies the
//! error policy. The library crate is what the CLI and the integration tests
//! drive.

pub mod controller;
pub mod policy;
pub mod provider;
pub mod trace;

pub use controller::{Disposer, InstanceCallback, SessionController, SessionState};
pub use policy::{classify, stream_error, Disposition};
pub use provider::{DashProvider, DashProviderLoader};
pub use trace::{replay, ReplayReport, Trace, TraceStep};
