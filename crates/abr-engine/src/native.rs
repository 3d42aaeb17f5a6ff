//! The native event envelope.
//!
//! A [`NativeEvent`] carries the engine's event type and its raw payload,
//! unmodified. Bindings classify envelopes into [`NativeSignal`]s; anything
//! they do not recognise is [`NativeSignal::Passthrough`] and is only
//! mirrored on the bus.
//!
//! The payload readers here are compatibility shims: engines have changed
//! payload shapes between major versions, so every reader accepts the shapes
//! seen in the wild and yields `None` for anything else.

use abr_core::MediaKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::naming::to_event_type;

/// Error codes the engine uses for segment/manifest download failures.
pub const DOWNLOAD_ERROR_CODES: std::ops::RangeInclusive<u64> = 25..=29;

/// Error kind of recoverable download failures.
pub const DOWNLOAD_KIND: &str = "download";

/// A native engine event, payload passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeEvent {
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl NativeEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Bus name of the mirrored event: `"{prefix}-{delimited type}"`.
    pub fn canonical_name(&self, prefix: &str) -> String {
        format!("{prefix}-{}", to_event_type(&self.event_type))
    }

    /// `mediaType` field.
    pub fn media_type(&self) -> Option<MediaKind> {
        self.payload.get("mediaType")?.as_str().and_then(MediaKind::parse)
    }

    /// Non-negative integer field, accepting numeric strings.
    pub fn index(&self, key: &str) -> Option<usize> {
        as_index(self.payload.get(key)?)
    }

    /// Finite numeric field.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.payload.get(key)?.as_f64().filter(|n| n.is_finite())
    }

    /// Active audio track id of a track-change payload.
    ///
    /// Tries the nested `newMediaInfo.index` shape first, then the flat `id`.
    pub fn active_track_id(&self) -> Option<String> {
        let nested = self
            .payload
            .get("newMediaInfo")
            .and_then(|info| info.get("index"))
            .and_then(as_index)
            .map(|i| i.to_string());
        nested.or_else(|| match self.payload.get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => n.as_u64().map(|n| n.to_string()),
            _ => None,
        })
    }

    /// Error carried by an error-event payload.
    pub fn fault(&self) -> StreamFault {
        StreamFault::from_payload(&self.event_type, &self.payload)
    }
}

fn as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// What a native event means to the session controller.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeSignal {
    /// A manifest finished loading and the stream is initialised.
    StreamInitialized { duration: Option<f64> },
    /// The engine asked for a new quality index (ABR decision).
    QualityRequested { index: Option<usize> },
    /// The engine rendered a quality index.
    QualityRendered { index: Option<usize>, duration: Option<f64> },
    /// The engine switched audio track.
    AudioSwitched { track_id: Option<String> },
    Error(StreamFault),
    /// No registry effect; mirrored only.
    Passthrough,
}

/// A stream error reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFault {
    pub kind: String,
    pub code: Option<u16>,
    pub message: String,
}

impl StreamFault {
    /// Read the `error` field of an error payload.
    ///
    /// Accepts a bare kind string (`{"error": "download"}`) or an error object
    /// (`{"error": {"code": 27, "message": "..."}}`); download codes in the
    /// object form map to the `download` kind. A missing or unreadable
    /// `error` yields kind `unknown`.
    pub fn from_payload(event_type: &str, payload: &Value) -> Self {
        let top_message = payload.get("message").and_then(Value::as_str);
        match payload.get("error") {
            Some(Value::String(kind)) if !kind.is_empty() => Self {
                kind: kind.clone(),
                code: None,
                message: top_message.unwrap_or(kind).to_string(),
            },
            Some(Value::Object(obj)) => {
                let raw_code = obj.get("code").and_then(Value::as_u64);
                let kind = match raw_code {
                    Some(code) if DOWNLOAD_ERROR_CODES.contains(&code) => DOWNLOAD_KIND.to_string(),
                    _ => obj
                        .get("type")
                        .or_else(|| obj.get("name"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| to_event_type(event_type)),
                };
                let message = obj
                    .get("message")
                    .and_then(Value::as_str)
                    .or(top_message)
                    .unwrap_or(event_type)
                    .to_string();
                Self {
                    kind,
                    code: raw_code.and_then(|c| u16::try_from(c).ok()),
                    message,
                }
            }
            _ => Self {
                kind: "unknown".into(),
                code: None,
                message: top_message
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{event_type} without error detail")),
            },
        }
    }

    pub fn is_download(&self) -> bool {
        self.kind == DOWNLOAD_KIND
    }
}
