//! Error policy for engine-reported stream errors.
//!
//! Classification is a pure function of the fault. The controller executes
//! the resulting [`Disposition`] afterwards, so classification can be tested
//! without an engine.

use abr_core::error::MEDIA_ERR_DECODE;
use abr_core::Error;
use abr_engine::StreamFault;

/// What the controller does about a stream error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The engine recovers by itself; resume playback and keep the instance.
    Retry,
    /// Destroy the instance and surface a terminal error.
    Fatal { code: u16, message: String },
}

/// Classify an engine-reported fault.
///
/// Only download failures are recoverable. Every other kind, including
/// unknown ones, is fatal; faults without an engine code report
/// [`MEDIA_ERR_DECODE`].
pub fn classify(fault: &StreamFault) -> Disposition {
    if fault.is_download() {
        return Disposition::Retry;
    }
    Disposition::Fatal {
        code: fault.code.unwrap_or(MEDIA_ERR_DECODE),
        message: fault.message.clone(),
    }
}

/// The typed error reported for a fault: recoverable for download failures,
/// fatal with the classified code otherwise.
pub fn stream_error(fault: &StreamFault) -> Error {
    match classify(fault) {
        Disposition::Retry => Error::recoverable_stream(fault.kind.clone(), fault.message.clone()),
        Disposition::Fatal { code, message } => Error::fatal_stream(fault.kind.clone(), code, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fault(payload: serde_json::Value) -> StreamFault {
        StreamFault::from_payload("error", &payload)
    }

    #[test]
    fn download_is_retried() {
        assert_eq!(classify(&fault(json!({"error": "download"}))), Disposition::Retry);
        assert_eq!(classify(&fault(json!({"error": {"code": 25}}))), Disposition::Retry);
    }

    #[test]
    fn everything_else_is_fatal() {
        assert_eq!(
            classify(&fault(json!({"error": "manifestError", "message": "bad mpd"}))),
            Disposition::Fatal { code: MEDIA_ERR_DECODE, message: "bad mpd".into() }
        );
        assert_eq!(
            classify(&fault(json!({"error": {"code": 10, "message": "manifest loader"}}))),
            Disposition::Fatal { code: 10, message: "manifest loader".into() }
        );
    }

    #[test]
    fn stream_error_follows_classification() {
        let retry = stream_error(&fault(json!({"error": "download", "message": "segment 404"})));
        assert_eq!(retry, Error::recoverable_stream("download", "segment 404"));
        assert!(!retry.is_terminal());

        let fatal = stream_error(&fault(json!({"error": {"code": 10, "message": "manifest loader"}})));
        assert_eq!(fatal.code(), 10);
        assert!(fatal.is_terminal());
    }

    #[test]
    fn missing_error_detail_is_fatal() {
        assert!(matches!(classify(&fault(json!({}))), Disposition::Fatal { .. }));
        assert!(matches!(classify(&fault(json!("not an object"))), Disposition::Fatal { .. }));
    }
}
