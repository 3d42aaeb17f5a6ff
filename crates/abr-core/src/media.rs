//! Media-source types shared by the capability gate, the engine boundary and
//! the session facade.
//!
//! Unit enums serialize in lowercase and implement `Display` manually for a
//! consistent string representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// Kind of elementary stream an engine call refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Text,
}

impl MediaKind {
    /// Parse the engine's `mediaType` field. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "text" | "fragmentedText" => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Text => write!(f, "text"),
        }
    }
}

// ---------------------------------------------------------------------------
// Preload
// ---------------------------------------------------------------------------

/// Preload hint written to the media element before a source is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    None,
    #[default]
    Metadata,
    Auto,
}

impl fmt::Display for Preload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Metadata => write!(f, "metadata"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

// ---------------------------------------------------------------------------
// SwitchMode
// ---------------------------------------------------------------------------

/// How an explicit quality change is applied by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchMode {
    /// Finish the current segment before switching.
    #[default]
    Current,
    /// Flush the buffer and switch immediately.
    Immediate,
}

impl fmt::Display for SwitchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::Immediate => write!(f, "immediate"),
        }
    }
}

// ---------------------------------------------------------------------------
// MediaResource
// ---------------------------------------------------------------------------

/// A manifest that was parsed ahead of time and handed to the engine as an
/// object instead of a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedManifest {
    /// Protocol tag, e.g. `"DASH"`.
    pub protocol: String,
    /// Engine-specific manifest representation.
    #[serde(default)]
    pub manifest: Value,
}

impl ParsedManifest {
    pub fn new(protocol: impl Into<String>, manifest: Value) -> Self {
        Self {
            protocol: protocol.into(),
            manifest,
        }
    }
}

/// What a media source points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaResource {
    /// A URL (remote or blob).
    Url(String),
    /// A pre-parsed manifest object.
    Manifest(ParsedManifest),
    /// Anything else (media streams, blobs, unknown objects).
    Opaque(Value),
}

impl MediaResource {
    /// The URL, if this resource is a string.
    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            _ => None,
        }
    }

    /// The parsed manifest, if this resource is one.
    pub fn as_manifest(&self) -> Option<&ParsedManifest> {
        match self {
            Self::Manifest(manifest) => Some(manifest),
            _ => None,
        }
    }

    /// Whether this is a pre-parsed manifest tagged with `protocol`
    /// (case-insensitive).
    pub fn is_parsed_manifest(&self, protocol: &str) -> bool {
        self.as_manifest()
            .is_some_and(|m| m.protocol.eq_ignore_ascii_case(protocol))
    }
}

impl fmt::Display for MediaResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Manifest(m) => write!(f, "<parsed {} manifest>", m.protocol),
            Self::Opaque(_) => write!(f, "<opaque resource>"),
        }
    }
}

// ---------------------------------------------------------------------------
// MediaSrc
// ---------------------------------------------------------------------------

/// A media source as requested by the surrounding player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSrc {
    pub src: MediaResource,
    /// Declared MIME type, if any.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Explicit provider/protocol tag, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl MediaSrc {
    /// A URL source with no declared type.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            src: MediaResource::Url(url.into()),
            mime_type: None,
            provider: None,
        }
    }

    /// A pre-parsed manifest source.
    pub fn manifest(manifest: ParsedManifest) -> Self {
        Self {
            src: MediaResource::Manifest(manifest),
            mime_type: None,
            provider: None,
        }
    }

    /// Builder: set the declared MIME type.
    pub fn with_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Builder: set the explicit provider tag.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}
