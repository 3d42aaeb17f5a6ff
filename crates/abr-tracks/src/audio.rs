//! Audio tracks.

use serde::{Deserialize, Serialize};

use crate::registry::{ListItem, TrackRegistry};

/// Registry name used in change notifications and selection errors.
pub const AUDIO_TRACKS: &str = "audio-tracks";

/// One engine-reported audio track. The id is the engine's track index as
/// a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioTrack {
    pub id: String,
    pub label: String,
    pub language: String,
    /// Free-form role, e.g. `"main"`.
    pub kind: String,
}

impl AudioTrack {
    pub fn new(index: usize, label: impl Into<String>, language: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: index.to_string(),
            label: label.into(),
            language: language.into(),
            kind: kind.into(),
        }
    }
}

impl ListItem for AudioTrack {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Registry of audio tracks. No auto mode.
pub type AudioTrackList = TrackRegistry<AudioTrack>;

pub fn audio_track_list() -> AudioTrackList {
    TrackRegistry::new(AUDIO_TRACKS, false)
}
