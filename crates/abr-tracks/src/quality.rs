//! Video quality levels.

use serde::{Deserialize, Serialize};

use crate::registry::{ListItem, TrackRegistry};

/// Registry name used in change notifications and selection errors.
pub const QUALITIES: &str = "qualities";

/// One engine-reported video rendition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualityLevel {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    /// Bits per second, 0 when unknown.
    pub bitrate: u64,
}

impl QualityLevel {
    /// Build a level, deriving the id from the height when the engine did
    /// not report one.
    pub fn new(id: Option<String>, width: u32, height: u32, codec: impl Into<String>, bitrate: u64) -> Self {
        let id = id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("{height}p"));
        Self {
            id,
            width,
            height,
            codec: codec.into(),
            bitrate,
        }
    }
}

impl ListItem for QualityLevel {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Registry of video qualities. Supports auto mode.
pub type QualityList = TrackRegistry<QualityLevel>;

/// Create an empty quality registry.
pub fn quality_list() -> QualityList {
    TrackRegistry::new(QUALITIES, true)
}

impl TrackRegistry<QualityLevel> {
    /// Index of the first level with the given height.
    pub fn find_by_height(&self, height: u32) -> Option<usize> {
        self.items().iter().position(|q| q.height == height)
    }
}

/// A caller's quality intent: let the engine choose, or pin a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityChoice {
    Auto,
    Index(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Cause;

    #[test]
    fn id_falls_back_to_height() {
        let q = QualityLevel::new(None, 854, 480, "avc1.4d401e", 800_000);
        assert_eq!(q.id, "480p");
        let q = QualityLevel::new(Some(String::new()), 0, 720, "", 0);
        assert_eq!(q.id, "720p");
        let q = QualityLevel::new(Some("v5".into()), 0, 720, "", 0);
        assert_eq!(q.id, "v5");
    }

    #[test]
    fn find_by_height_prefers_first_seen() {
        let mut list = quality_list();
        list.replace_all(
            vec![
                QualityLevel::new(None, 0, 480, "", 800_000),
                QualityLevel::new(None, 0, 1080, "", 3_000_000),
                QualityLevel::new(None, 0, 1080, "", 6_000_000),
            ],
            None,
            Cause::engine(None),
        );
        assert_eq!(list.find_by_height(1080), Some(1));
        assert_eq!(list.find_by_height(360), None);
        assert_eq!(list.name(), QUALITIES);
    }

    #[test]
    fn choice_serde() {
        assert_eq!(serde_json::to_string(&QualityChoice::Auto).unwrap(), r#""auto""#);
        let c: QualityChoice = serde_json::from_str(r#"{"index":2}"#).unwrap();
        assert_eq!(c, QualityChoice::Index(2));
    }
}
