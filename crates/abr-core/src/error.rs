//! Unified error type for streaming sessions.
//!
//! Every crate in the workspace reports failures through [`Error`]. Each
//! variant maps to a stable numeric code ([`Error::code`]) and a stable string
//! code ([`Error::kind`]) so that the session facade can surface errors as
//! bus notifications instead of returning them across its boundary.

use std::fmt;

/// Media error code used for "source not supported" conditions.
pub const MEDIA_ERR_SRC_NOT_SUPPORTED: u16 = 4;

/// Media error code used for decode/playback failures without an engine code.
pub const MEDIA_ERR_DECODE: u16 = 3;

/// Unified error type covering all failure modes of a streaming session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The engine script or module could not be resolved.
    #[error("Engine load error: {0}")]
    EngineLoad(String),

    /// The environment lacks a capability the engine requires.
    #[error("Engine unsupported: {0}")]
    EngineUnsupported(String),

    /// A requested quality or audio track is not present in its registry.
    #[error("Selection error [{list}]: {message}")]
    Selection {
        /// Which registry the selection targeted ("qualities", "audio-tracks").
        list: String,
        /// Human-readable description.
        message: String,
    },

    /// A download-class stream error the engine can recover from.
    #[error("Recoverable stream error [{kind}]: {message}")]
    RecoverableStream {
        /// Engine-reported error kind.
        kind: String,
        /// Human-readable description.
        message: String,
    },

    /// Any other stream error; the session ends.
    #[error("Fatal stream error [{kind}] ({code}): {message}")]
    FatalStream {
        /// Engine-reported error kind.
        kind: String,
        /// Engine-reported error code.
        code: u16,
        /// Human-readable description.
        message: String,
    },

    /// An operation was attempted in a state that does not allow it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration could not be parsed or is inconsistent.
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Stable numeric code for error notifications.
    pub fn code(&self) -> u16 {
        match self {
            Error::EngineLoad(_) => MEDIA_ERR_SRC_NOT_SUPPORTED,
            Error::EngineUnsupported(_) => MEDIA_ERR_SRC_NOT_SUPPORTED,
            Error::Selection { .. } => 0,
            Error::RecoverableStream { .. } => 0,
            Error::FatalStream { code, .. } => *code,
            Error::InvalidState(_) => 0,
            Error::Config(_) => 0,
        }
    }

    /// Stable string code for error notifications and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::EngineLoad(_) => "engine-load",
            Error::EngineUnsupported(_) => "engine-unsupported",
            Error::Selection { .. } => "selection",
            Error::RecoverableStream { .. } => "recoverable-stream",
            Error::FatalStream { .. } => "fatal-stream",
            Error::InvalidState(_) => "invalid-state",
            Error::Config(_) => "config",
        }
    }

    /// Whether the session can no longer continue after this error.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::EngineLoad(_) | Error::EngineUnsupported(_) | Error::FatalStream { .. }
        )
    }

    /// Convenience constructor for [`Error::EngineLoad`].
    pub fn engine_load(message: impl fmt::Display) -> Self {
        Error::EngineLoad(message.to_string())
    }

    /// Convenience constructor for [`Error::Selection`].
    pub fn selection(list: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Selection {
            list: list.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::RecoverableStream`].
    pub fn recoverable_stream(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RecoverableStream {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::FatalStream`].
    pub fn fatal_stream(kind: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Error::FatalStream {
            kind: kind.into(),
            code,
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
