//! abr-tracks: the canonical track model of a streaming session.
//!
//! - [`registry`] - ordered single-select collections with origin-tagged changes
//! - [`quality`] - video quality levels
//! - [`audio`] - audio tracks
//! - [`cues`] - size-bounded LRU cache of cue lists shared between consumers

pub mod audio;
pub mod cues;
pub mod quality;
pub mod registry;

pub use audio::{audio_track_list, AudioTrack, AudioTrackList};
pub use cues::{Cue, CueCache, CueLookup, SharedCueCache};
pub use quality::{quality_list, QualityChoice, QualityLevel, QualityList};
pub use registry::{Cause, ChangeKind, ListItem, Origin, RegistryChange, TrackRegistry};
