//! Capability gate: "does this source look like this protocol" and "can
//! this environment run the engine".
//!
//! Both predicates are total. Absent or malformed fields count as "no match".

use std::collections::HashSet;
use std::sync::{LazyLock, OnceLock};

use abr_core::{MediaResource, MediaSrc};
use regex::Regex;

static DASH_EXTENSIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(mpd)($|\?)").expect("static regex"));

static HLS_EXTENSIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(m3u8)($|\?)").expect("static regex"));

const DASH_TYPES: &[&str] = &[
    "application/dash+xml",
    "application/xml",
    "video/dash+xml",
    "video/xml",
    "video/dash",
];

const HLS_TYPES: &[&str] = &[
    "application/vnd.apple.mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
    "application/x-mpegurl",
    "video/x-mpegurl",
    "video/mpegurl",
    "application/mpegurl",
];

/// Recognition table for one streaming protocol.
#[derive(Debug)]
pub struct Protocol {
    /// Explicit provider tag, e.g. `"dash"`.
    pub provider: &'static str,
    mime_types: HashSet<&'static str>,
    extensions: &'static LazyLock<Regex>,
    /// Protocol tag of pre-parsed manifest objects, if this protocol has any.
    manifest_protocol: Option<&'static str>,
}

impl Protocol {
    pub fn dash() -> Self {
        Self {
            provider: "dash",
            mime_types: DASH_TYPES.iter().copied().collect(),
            extensions: &DASH_EXTENSIONS,
            manifest_protocol: Some("DASH"),
        }
    }

    pub fn hls() -> Self {
        Self {
            provider: "hls",
            mime_types: HLS_TYPES.iter().copied().collect(),
            extensions: &HLS_EXTENSIONS,
            manifest_protocol: None,
        }
    }

    pub fn has_mime_type(&self, mime_type: &str) -> bool {
        self.mime_types.contains(mime_type.trim().to_ascii_lowercase().as_str())
    }

    pub fn has_extension(&self, url: &str) -> bool {
        self.extensions.is_match(url)
    }

    /// Whether `resource` is a pre-parsed manifest of this protocol.
    pub fn is_parsed_manifest(&self, resource: &MediaResource) -> bool {
        self.manifest_protocol
            .is_some_and(|tag| resource.is_parsed_manifest(tag))
    }
}

/// Whether `src` belongs to `protocol`.
///
/// True on any of: matching provider tag, known MIME type, known extension
/// on a URL source, or a pre-parsed manifest tagged with the protocol.
pub fn matches_protocol(protocol: &Protocol, src: &MediaSrc) -> bool {
    if src.provider.as_deref() == Some(protocol.provider) {
        return true;
    }
    if protocol.is_parsed_manifest(&src.src) {
        return true;
    }
    if src.src.as_url().is_some_and(|url| protocol.has_extension(url)) {
        return true;
    }
    src.mime_type.as_deref().is_some_and(|t| protocol.has_mime_type(t))
}

// ---------------------------------------------------------------------------
// Environment support
// ---------------------------------------------------------------------------

/// Platform feature checks the engine depends on.
pub trait PlatformFeatures: Send + Sync {
    /// A Media Source Extensions implementation is present.
    fn media_source(&self) -> bool;
    /// Source buffers can append and remove.
    fn source_buffer(&self) -> bool;
    /// The baseline codec string is playable.
    fn type_supported(&self, codecs: &str) -> bool;
}

/// Codec string every engine-supported environment must accept.
pub const BASELINE_CODECS: &str = r#"video/mp4; codecs="avc1.42E01E,mp4a.40.2""#;

/// Fixed answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticFeatures {
    pub media_source: bool,
    pub source_buffer: bool,
    pub codecs: bool,
}

impl StaticFeatures {
    pub const SUPPORTED: Self = Self {
        media_source: true,
        source_buffer: true,
        codecs: true,
    };

    pub const UNSUPPORTED: Self = Self {
        media_source: false,
        source_buffer: false,
        codecs: false,
    };
}

impl Default for StaticFeatures {
    fn default() -> Self {
        Self::SUPPORTED
    }
}

impl PlatformFeatures for StaticFeatures {
    fn media_source(&self) -> bool {
        self.media_source
    }

    fn source_buffer(&self) -> bool {
        self.source_buffer
    }

    fn type_supported(&self, _codecs: &str) -> bool {
        self.codecs
    }
}

/// Evaluate every feature check once.
pub fn check_environment(features: &dyn PlatformFeatures) -> bool {
    features.media_source() && features.source_buffer() && features.type_supported(BASELINE_CODECS)
}

/// A support answer computed on first use and never recomputed.
pub struct SupportCache {
    features: Box<dyn PlatformFeatures>,
    cached: OnceLock<bool>,
}

impl SupportCache {
    pub fn new(features: impl PlatformFeatures + 'static) -> Self {
        Self {
            features: Box::new(features),
            cached: OnceLock::new(),
        }
    }

    pub fn get(&self) -> bool {
        *self.cached.get_or_init(|| {
            let supported = check_environment(self.features.as_ref());
            tracing::debug!(supported, "environment checked");
            supported
        })
    }
}

static ENVIRONMENT: OnceLock<SupportCache> = OnceLock::new();

/// Install the process-wide feature checks. Returns `false` if one was already
/// installed or the cached answer was already computed.
pub fn install_platform_features(features: impl PlatformFeatures + 'static) -> bool {
    ENVIRONMENT.set(SupportCache::new(features)).is_ok()
}

/// Process-wide, cached environment support. Falls back to
/// [`StaticFeatures::SUPPORTED`] when none were installed.
pub fn environment_supports_engine() -> bool {
    ENVIRONMENT
        .get_or_init(|| SupportCache::new(StaticFeatures::default()))
        .get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use abr_core::ParsedManifest;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn dash_by_extension() {
        let dash = Protocol::dash();
        assert!(matches_protocol(&dash, &MediaSrc::url("https://cdn/x/manifest.mpd")));
        assert!(matches_protocol(&dash, &MediaSrc::url("/live/MANIFEST.MPD?token=1")));
        assert!(!matches_protocol(&dash, &MediaSrc::url("/x.mpd.bak")));
        assert!(!matches_protocol(&dash, &MediaSrc::url("/index.m3u8")));
    }

    #[test]
    fn dash_by_type_provider_or_manifest() {
        let dash = Protocol::dash();
        assert!(matches_protocol(&dash, &MediaSrc::url("/stream").with_type("application/dash+xml")));
        assert!(matches_protocol(&dash, &MediaSrc::url("/stream").with_type("Video/DASH")));
        assert!(matches_protocol(&dash, &MediaSrc::url("/stream").with_provider("dash")));
        assert!(matches_protocol(
            &dash,
            &MediaSrc::manifest(ParsedManifest::new("DASH", json!({})))
        ));
        assert!(!matches_protocol(
            &dash,
            &MediaSrc::manifest(ParsedManifest::new("HLS", json!({})))
        ));
    }

    #[test]
    fn hls_table() {
        let hls = Protocol::hls();
        assert!(matches_protocol(&hls, &MediaSrc::url("/a/index.m3u8")));
        assert!(matches_protocol(&hls, &MediaSrc::url("/a").with_type("application/x-mpegurl")));
        assert!(!matches_protocol(&hls, &MediaSrc::manifest(ParsedManifest::new("DASH", json!({})))));
    }

    #[test]
    fn malformed_sources_never_match() {
        let dash = Protocol::dash();
        let opaque: MediaSrc = serde_json::from_value(json!({"src": {"stream": 1}})).unwrap();
        assert!(!matches_protocol(&dash, &opaque));
        assert!(!matches_protocol(&dash, &MediaSrc::url("").with_type("")));
    }

    struct CountingFeatures(Arc<AtomicUsize>);

    impl PlatformFeatures for CountingFeatures {
        fn media_source(&self) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
        fn source_buffer(&self) -> bool {
            true
        }
        fn type_supported(&self, codecs: &str) -> bool {
            codecs.contains("avc1")
        }
    }

    #[test]
    fn support_is_checked_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = SupportCache::new(CountingFeatures(Arc::clone(&calls)));
        assert!(cache.get());
        assert!(cache.get());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsupported_features() {
        assert!(!SupportCache::new(StaticFeatures::UNSUPPORTED).get());
        let no_buffer = StaticFeatures {
            source_buffer: false,
            ..StaticFeatures::SUPPORTED
        };
        assert!(!check_environment(&no_buffer));
    }
}
