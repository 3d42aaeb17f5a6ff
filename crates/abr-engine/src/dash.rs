//! Binding for the dash.js engine.

use abr_core::MediaKind;
use abr_tracks::{AudioTrack, QualityLevel, QualityList};
use serde_json::{json, Value};

use crate::binding::EngineBinding;
use crate::capability::Protocol;
use crate::native::{NativeEvent, NativeSignal};
use crate::traits::StreamingEngine;

pub const STREAM_INITIALIZED: &str = "streamInitialized";
pub const QUALITY_CHANGE_REQUESTED: &str = "qualityChangeRequested";
pub const QUALITY_CHANGE_RENDERED: &str = "qualityChangeRendered";
pub const TRACK_CHANGE_RENDERED: &str = "trackChangeRendered";
pub const ERROR: &str = "error";
pub const PLAYBACK_ERROR: &str = "playbackError";

/// The `MediaPlayer.events` catalog of dash.js 4.x.
pub const DASH_EVENTS: &[&str] = &[
    "astInFuture",
    "bufferEmpty",
    "bufferLoaded",
    "bufferStateChanged",
    "bufferLevelUpdated",
    "canPlay",
    "canPlayThrough",
    "captionRendered",
    "captionContainerResize",
    "conformanceViolation",
    "dynamicToStatic",
    ERROR,
    "fragmentLoadingCompleted",
    "fragmentLoadingProgress",
    "fragmentLoadingStarted",
    "fragmentLoadingAbandoned",
    "logMessage",
    "manifestLoadingStarted",
    "manifestLoadingFinished",
    "manifestLoaded",
    "manifestValidityChanged",
    "metricsChanged",
    "metricChanged",
    "metricAdded",
    "metricUpdated",
    "periodSwitchStarted",
    "periodSwitchCompleted",
    PLAYBACK_ERROR,
    "playbackEnded",
    "playbackLoadedData",
    "playbackMetaDataLoaded",
    "playbackNotAllowed",
    "playbackPaused",
    "playbackPlaying",
    "playbackProgress",
    "playbackRateChanged",
    "playbackSeeked",
    "playbackSeeking",
    "playbackStalled",
    "playbackStarted",
    "playbackTimeUpdated",
    "playbackVolumeChanged",
    "playbackWaiting",
    QUALITY_CHANGE_REQUESTED,
    QUALITY_CHANGE_RENDERED,
    "representationSwitch",
    "streamActivated",
    "streamDeactivated",
    "streamInitializing",
    STREAM_INITIALIZED,
    "streamTeardownComplete",
    "streamUpdated",
    "textTrackAdded",
    "textTracksAdded",
    "throughputMeasurementStored",
    TRACK_CHANGE_RENDERED,
    "ttmlParsed",
    "ttmlToParse",
];

/// Binding for dash.js.
#[derive(Debug)]
pub struct DashBinding {
    protocol: Protocol,
}

impl DashBinding {
    pub fn new() -> Self {
        Self {
            protocol: Protocol::dash(),
        }
    }
}

impl Default for DashBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBinding for DashBinding {
    fn prefix(&self) -> &'static str {
        "dash"
    }

    fn type_name(&self) -> &'static str {
        "dash"
    }

    fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    fn required_events(&self) -> &'static [&'static str] {
        &[
            STREAM_INITIALIZED,
            QUALITY_CHANGE_REQUESTED,
            QUALITY_CHANGE_RENDERED,
            TRACK_CHANGE_RENDERED,
            ERROR,
            PLAYBACK_ERROR,
        ]
    }

    fn classify(&self, event: &NativeEvent) -> NativeSignal {
        let is_video = || matches!(event.media_type(), None | Some(MediaKind::Video));
        match event.event_type.as_str() {
            STREAM_INITIALIZED => NativeSignal::StreamInitialized {
                duration: event.number("duration"),
            },
            QUALITY_CHANGE_REQUESTED if is_video() => NativeSignal::QualityRequested {
                index: event.index("newQuality"),
            },
            QUALITY_CHANGE_RENDERED if is_video() => NativeSignal::QualityRendered {
                index: event.index("newQuality"),
                duration: event.number("duration"),
            },
            TRACK_CHANGE_RENDERED if event.media_type() == Some(MediaKind::Audio) => {
                NativeSignal::AudioSwitched {
                    track_id: event.active_track_id(),
                }
            }
            ERROR | PLAYBACK_ERROR => NativeSignal::Error(event.fault()),
            _ => NativeSignal::Passthrough,
        }
    }

    fn auto_quality(&self, settings: &Value) -> bool {
        settings
            .pointer("/streaming/abr/autoSwitchBitrate/video")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn auto_quality_patch(&self, enabled: bool) -> Value {
        json!({"streaming": {"abr": {"autoSwitchBitrate": {"video": enabled}}}})
    }

    fn quality_levels(&self, engine: &dyn StreamingEngine) -> Vec<QualityLevel> {
        let Some(track) = engine.tracks_for(MediaKind::Video).into_iter().next() else {
            return Vec::new();
        };
        let codec = track.codec.unwrap_or_default();
        track
            .bitrate_list
            .into_iter()
            .map(|level| QualityLevel::new(level.id, level.width, level.height, codec.clone(), level.bandwidth))
            .collect()
    }

    fn audio_tracks(&self, engine: &dyn StreamingEngine) -> Vec<AudioTrack> {
        engine
            .tracks_for(MediaKind::Audio)
            .into_iter()
            .map(|t| AudioTrack::new(t.index, t.id.unwrap_or_default(), t.lang.unwrap_or_default(), "main"))
            .collect()
    }

    /// ABR requests carry an engine quality index, which is the registry
    /// position because levels are registered in `bitrateList` order. An
    /// index past the registry end is resolved through the bitrate info
    /// list's height instead.
    fn requested_quality(&self, engine: &dyn StreamingEngine, index: usize, qualities: &QualityList) -> Option<usize> {
        if let Some(position) = self.rendered_quality(index, qualities) {
            return Some(position);
        }
        engine
            .bitrate_info_list_for(MediaKind::Video)
            .into_iter()
            .find(|info| info.quality_index == index)
            .map(|info| info.height)
            .filter(|&h| h > 0)
            .and_then(|height| qualities.find_by_height(height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{audio_track, video_track, MockEngine};
    use crate::traits::BitrateInfo;
    use abr_tracks::quality::quality_list;
    use abr_tracks::Cause;
    use assert_matches::assert_matches;

    fn ev(event_type: &str, payload: Value) -> NativeEvent {
        NativeEvent::new(event_type, payload)
    }

    #[test]
    fn classify_registry_events() {
        let b = DashBinding::new();
        assert_matches!(
            b.classify(&ev(STREAM_INITIALIZED, json!({"duration": 60.0}))),
            NativeSignal::StreamInitialized { duration: Some(d) } if d == 60.0
        );
        assert_matches!(
            b.classify(&ev(QUALITY_CHANGE_REQUESTED, json!({"mediaType": "video", "newQuality": 2}))),
            NativeSignal::QualityRequested { index: Some(2) }
        );
        assert_matches!(
            b.classify(&ev(QUALITY_CHANGE_RENDERED, json!({"mediaType": "audio", "newQuality": 0}))),
            NativeSignal::Passthrough
        );
        assert_matches!(
            b.classify(&ev(TRACK_CHANGE_RENDERED, json!({"mediaType": "audio", "newMediaInfo": {"index": 1}}))),
            NativeSignal::AudioSwitched { track_id: Some(id) } if id == "1"
        );
        assert_matches!(
            b.classify(&ev(TRACK_CHANGE_RENDERED, json!({"mediaType": "video"}))),
            NativeSignal::Passthrough
        );
        assert_matches!(b.classify(&ev("bufferEmpty", json!(null))), NativeSignal::Passthrough);
    }

    #[test]
    fn classify_errors() {
        let b = DashBinding::new();
        assert_matches!(
            b.classify(&ev(ERROR, json!({"error": "download"}))),
            NativeSignal::Error(fault) if fault.is_download()
        );
        assert_matches!(
            b.classify(&ev(PLAYBACK_ERROR, json!({"error": {"code": 3, "message": "decode"}}))),
            NativeSignal::Error(fault) if fault.code == Some(3)
        );
    }

    #[test]
    fn auto_quality_reads_nested_setting() {
        let b = DashBinding::new();
        assert!(b.auto_quality(&json!({"streaming": {"abr": {"autoSwitchBitrate": {"video": true}}}})));
        assert!(!b.auto_quality(&json!({"streaming": {}})));
        assert!(!b.auto_quality(&json!(null)));
        assert_eq!(
            b.auto_quality_patch(false),
            json!({"streaming": {"abr": {"autoSwitchBitrate": {"video": false}}}})
        );
    }

    #[test]
    fn levels_and_tracks_from_engine() {
        let engine = MockEngine::new();
        engine.set_video_track(video_track("avc1.64001f", &[(480, 800_000), (1080, 3_000_000)]));
        engine.set_audio_tracks(vec![audio_track(0, "eng", "en"), audio_track(1, "fra", "fr")]);

        let b = DashBinding::new();
        let levels = b.quality_levels(&engine);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].id, "480p");
        assert_eq!(levels[1].bitrate, 3_000_000);
        assert_eq!(levels[1].codec, "avc1.64001f");

        let tracks = b.audio_tracks(&engine);
        assert_eq!(tracks[1].id, "1");
        assert_eq!(tracks[1].language, "fr");
        assert_eq!(tracks[1].kind, "main");
    }

    #[test]
    fn no_video_track_means_no_levels() {
        let engine = MockEngine::new();
        assert!(DashBinding::new().quality_levels(&engine).is_empty());
    }

    #[test]
    fn requested_quality_prefers_index_then_height() {
        let engine = MockEngine::new();
        let mut qualities = quality_list();
        qualities.replace_all(
            vec![
                QualityLevel::new(None, 0, 480, "", 800_000),
                QualityLevel::new(None, 0, 1080, "", 3_000_000),
            ],
            None,
            Cause::engine(None),
        );
        let b = DashBinding::new();

        assert_eq!(b.requested_quality(&engine, 1, &qualities), Some(1));
        assert_eq!(b.requested_quality(&engine, 5, &qualities), None);

        engine.set_bitrate_infos(vec![
            BitrateInfo { quality_index: 0, height: 480, ..Default::default() },
            BitrateInfo { quality_index: 7, height: 1080, ..Default::default() },
        ]);
        assert_eq!(b.requested_quality(&engine, 0, &qualities), Some(0));
        assert_eq!(b.requested_quality(&engine, 7, &qualities), Some(1));
        assert_eq!(b.requested_quality(&engine, 9, &qualities), None);
    }

    #[test]
    fn requested_quality_distinguishes_levels_of_equal_height() {
        let engine = MockEngine::new();
        engine.set_bitrate_infos(vec![
            BitrateInfo { quality_index: 0, height: 1080, ..Default::default() },
            BitrateInfo { quality_index: 1, height: 1080, ..Default::default() },
        ]);
        let mut qualities = quality_list();
        qualities.replace_all(
            vec![
                QualityLevel::new(None, 1920, 1080, "", 3_000_000),
                QualityLevel::new(None, 1920, 1080, "", 6_000_000),
            ],
            None,
            Cause::engine(None),
        );

        let position = DashBinding::new().requested_quality(&engine, 1, &qualities);
        assert_eq!(position, Some(1));
        assert_eq!(qualities.get(1).map(|q| q.bitrate), Some(6_000_000));
    }
}
