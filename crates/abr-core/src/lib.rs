//! abr-core: shared types, IDs, errors, configuration, and the player bus.
//!
//! This crate is the foundational dependency for the other abr-* crates,
//! providing typed identifiers, a unified error type, media-source types,
//! session configuration, and the broadcast player event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use events::{EventDetail, EventRef, PlayerBus, PlayerEvent};
pub use ids::*;
pub use media::*;
