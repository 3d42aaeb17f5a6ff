//! Session configuration types.
//!
//! The top-level [`SessionConfig`] is deserialized from JSON and carries the
//! engine library location, engine settings, playback defaults and platform
//! quirks. Every section defaults sensibly so an empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::Result;
use crate::media::{Preload, SwitchMode};
use crate::Error;

/// Default CDN location of the DASH engine bundle.
pub const DEFAULT_LIBRARY_URL: &str = "https://cdn.jsdelivr.net/npm/dashjs@^4.7/dist/dash.all.min.js";

/// Global namespace the DASH engine bundle installs itself under.
pub const DEFAULT_NAMESPACE: &str = "dashjs";

/// Number of cue lists the shared cue cache retains.
pub const DEFAULT_CUE_CACHE_CAPACITY: usize = 30;

// ---------------------------------------------------------------------------
// Top-level SessionConfig
// ---------------------------------------------------------------------------

/// Root session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub library: LibraryConfig,
    /// Engine-specific settings, merged into the engine defaults at attach.
    #[serde(default = "empty_object")]
    pub engine: Value,
    pub playback: PlaybackConfig,
    pub bus: BusConfig,
    pub cues: CueConfig,
    pub quirks: QuirksConfig,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            library: LibraryConfig::default(),
            engine: empty_object(),
            playback: PlaybackConfig::default(),
            bus: BusConfig::default(),
            cues: CueConfig::default(),
            quirks: QuirksConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Deserialize a `SessionConfig` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        let mut cfg: Self = serde_json::from_str(json_str)
            .map_err(|e| Error::Config(format!("config parse error: {e}")))?;
        if cfg.engine.is_null() {
            cfg.engine = empty_object();
        }
        Ok(cfg)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Replace the quirks with the ones detected for `user_agent`.
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.quirks = QuirksConfig::from_user_agent(user_agent);
        self
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.library.url.trim().is_empty() {
            warnings.push("library.url is empty; setup() will fail to load the engine".into());
        }
        if self.library.namespace.trim().is_empty() {
            warnings.push("library.namespace is empty".into());
        }
        if !self.engine.is_object() {
            warnings.push("engine settings must be a JSON object; they will be ignored".into());
        }
        if self.bus.capacity == 0 {
            warnings.push("bus.capacity is 0; it will be raised to 1".into());
        }
        if self.cues.capacity == 0 {
            warnings.push("cues.capacity is 0; it will be raised to 1".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Where the engine library comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub url: String,
    pub namespace: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_LIBRARY_URL.into(),
            namespace: DEFAULT_NAMESPACE.into(),
        }
    }
}

/// Playback defaults applied when the engine is attached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub autoplay: bool,
    pub preload: Preload,
    pub quality_switch: SwitchMode,
}

/// Player bus sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub capacity: usize,
    pub history: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            history: crate::events::DEFAULT_HISTORY,
        }
    }
}

/// Shared cue cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    pub capacity: usize,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CUE_CACHE_CAPACITY,
        }
    }
}

/// Browser-engine workarounds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuirksConfig {
    /// Re-write `currentTime` after an explicit quality change. Chromium can
    /// stall on keyframes inserted before the playhead until it seeks.
    pub nudge_current_time_on_quality_change: bool,
}

impl QuirksConfig {
    /// Derive quirks from a user-agent string.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        let chromium = (ua.contains("chrome/") || ua.contains("crios/")) && !ua.contains("edg/");
        Self {
            nudge_current_time_on_quality_change: chromium,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings merge
// ---------------------------------------------------------------------------

/// Deep-merge `patch` into `base`.
///
/// Objects merge key by key; any other value in `patch` replaces the value in
/// `base`. A `null` in `patch` leaves the base value alone.
pub fn merge_settings(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_settings(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.library.url, DEFAULT_LIBRARY_URL);
        assert_eq!(cfg.library.namespace, "dashjs");
        assert_eq!(cfg.cues.capacity, 30);
        assert_eq!(cfg.playback.preload, Preload::Metadata);
        assert!(!cfg.quirks.nudge_current_time_on_quality_change);
    }

    #[test]
    fn default_config_no_warnings() {
        let cfg = SessionConfig::from_json("{}").unwrap();
        let warnings = cfg.validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{
            "playback": {"autoplay": true, "quality_switch": "immediate"},
            "engine": {"streaming": {"abr": {"autoSwitchBitrate": {"video": false}}}}
        }"#;
        let cfg = SessionConfig::from_json(json).unwrap();
        assert!(cfg.playback.autoplay);
        assert_eq!(cfg.playback.quality_switch, SwitchMode::Immediate);
        assert_eq!(cfg.engine["streaming"]["abr"]["autoSwitchBitrate"]["video"], json!(false));
    }

    #[test]
    fn invalid_json_is_config_error() {
        let err = SessionConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn non_object_engine_settings_warn() {
        let cfg = SessionConfig::from_json(r#"{"engine": [1, 2]}"#).unwrap();
        assert!(cfg.validate().iter().any(|w| w.contains("engine settings")));
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = SessionConfig::load_or_default(Some(Path::new("/nonexistent/session.json")));
        assert_eq!(cfg.bus.capacity, 256);
    }

    #[test]
    fn load_or_default_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"cues": {{"capacity": 5}}}}"#).unwrap();
        let cfg = SessionConfig::load_or_default(Some(file.path()));
        assert_eq!(cfg.cues.capacity, 5);
    }

    #[test]
    fn quirks_from_user_agent() {
        let chrome = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
        let edge = "Mozilla/5.0 AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36 Edg/120.0";
        let firefox = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
        assert!(QuirksConfig::from_user_agent(chrome).nudge_current_time_on_quality_change);
        assert!(!QuirksConfig::from_user_agent(edge).nudge_current_time_on_quality_change);
        assert!(!QuirksConfig::from_user_agent(firefox).nudge_current_time_on_quality_change);
    }

    #[test]
    fn user_agent_overrides_configured_quirks() {
        let mut cfg = SessionConfig::default();
        cfg.quirks.nudge_current_time_on_quality_change = true;

        let cfg = cfg.with_user_agent("Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0");
        assert!(!cfg.quirks.nudge_current_time_on_quality_change);

        let cfg = cfg.with_user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/126.0 Safari/537.36");
        assert!(cfg.quirks.nudge_current_time_on_quality_change);
    }

    #[test]
    fn merge_keeps_unrelated_defaults() {
        let mut base = json!({
            "streaming": {"abr": {"autoSwitchBitrate": {"video": true, "audio": true}}, "buffer": {"fastSwitchEnabled": true}}
        });
        merge_settings(&mut base, &json!({"streaming": {"abr": {"autoSwitchBitrate": {"video": false}}}}));
        assert_eq!(base["streaming"]["abr"]["autoSwitchBitrate"]["video"], json!(false));
        assert_eq!(base["streaming"]["abr"]["autoSwitchBitrate"]["audio"], json!(true));
        assert_eq!(base["streaming"]["buffer"]["fastSwitchEnabled"], json!(true));
    }

    #[test]
    fn merge_replaces_scalars_and_ignores_null() {
        let mut base = json!({"debug": {"logLevel": 3}, "list": [1]});
        merge_settings(&mut base, &json!({"debug": null, "list": [2, 3]}));
        assert_eq!(base["debug"]["logLevel"], json!(3));
        assert_eq!(base["list"], json!([2, 3]));
    }
}
