//! Track and session snapshot records shared by the proxy, its collaborators
//! and its callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Media kind of one elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    /// Not yet determined.
    #[default]
    #[serde(rename = "none")]
    Invalid,
    Video,
    Audio,
    /// Reported by the puller but neither audio nor video.
    Unknown,
}

impl TrackType {
    /// Returns the track type as a string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TrackType::Invalid => "none",
            TrackType::Video => "video",
            TrackType::Audio => "audio",
            TrackType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video properties a puller may expose for a video track.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoAttributes {
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub fps: Option<f32>,
}

/// Audio properties a puller may expose for an audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioAttributes {
    pub sample_rate: Option<i32>,
    pub sample_bit: Option<i32>,
    pub channel_count: Option<i32>,
}

/// Track metadata as reported by a [`Puller`](crate::puller::Puller).
///
/// Anything the puller could not determine stays `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackInfo {
    pub track_type: TrackType,
    pub codec_name: String,
    /// Bits per second.
    pub bitrate: Option<i32>,
    pub video: Option<VideoAttributes>,
    pub audio: Option<AudioAttributes>,
}

impl TrackInfo {
    /// A video track with the given codec name and no further detail.
    pub fn video(codec_name: impl Into<String>) -> Self {
        Self {
            track_type: TrackType::Video,
            codec_name: codec_name.into(),
            ..Self::default()
        }
    }

    /// An audio track with the given codec name and no further detail.
    pub fn audio(codec_name: impl Into<String>) -> Self {
        Self {
            track_type: TrackType::Audio,
            codec_name: codec_name.into(),
            ..Self::default()
        }
    }
}

/// Per-track snapshot.
///
/// `-1` (or `-1.0`) means "not determined"; video fields are only set for
/// video tracks and audio fields only for audio tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub codec_type: TrackType,
    pub codec_name: String,
    pub bitrate: i32,
    pub audio_sample_rate: i32,
    pub audio_sample_bit: i32,
    pub audio_channel: i32,
    pub video_width: i32,
    pub video_height: i32,
    pub video_fps: f32,
}

impl Default for StreamInfo {
    fn default() -> Self {
        Self {
            codec_type: TrackType::Invalid,
            codec_name: "none".to_string(),
            bitrate: -1,
            audio_sample_rate: -1,
            audio_sample_bit: -1,
            audio_channel: -1,
            video_width: -1,
            video_height: -1,
            video_fps: -1.0,
        }
    }
}

impl From<&TrackInfo> for StreamInfo {
    fn from(track: &TrackInfo) -> Self {
        let mut info = StreamInfo {
            codec_type: track.track_type,
            codec_name: track.codec_name.clone(),
            bitrate: track.bitrate.unwrap_or(-1),
            ..StreamInfo::default()
        };

        match track.track_type {
            TrackType::Video => {
                if let Some(video) = &track.video {
                    info.video_width = video.width.unwrap_or(-1);
                    info.video_height = video.height.unwrap_or(-1);
                    info.video_fps = video.fps.unwrap_or(-1.0);
                }
            }
            TrackType::Audio => {
                if let Some(audio) = &track.audio {
                    info.audio_sample_rate = audio.sample_rate.unwrap_or(-1);
                    info.audio_sample_bit = audio.sample_bit.unwrap_or(-1);
                    info.audio_channel = audio.channel_count.unwrap_or(-1);
                }
            }
            TrackType::Invalid | TrackType::Unknown => {}
        }

        info
    }
}

/// Aggregate session snapshot.
///
/// Rebuilt on every successful connection and left untouched on disconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationInfo {
    /// One entry per track, in attachment order.
    pub stream_info: Vec<StreamInfo>,
    /// Ingest throughput in bytes per second, -1 until connected.
    pub byte_speed: i64,
    /// Milliseconds since the Unix epoch when the session started, 0 if never.
    pub start_time_stamp: u64,
}

impl Default for TranslationInfo {
    fn default() -> Self {
        Self {
            stream_info: Vec::new(),
            byte_speed: -1,
            start_time_stamp: 0,
        }
    }
}

impl TranslationInfo {
    /// Build a snapshot from the tracks of a freshly connected session.
    #[must_use]
    pub fn capture(tracks: &[TrackInfo], byte_speed: i64, start_time_stamp: u64) -> Self {
        Self {
            stream_info: tracks.iter().map(StreamInfo::from).collect(),
            byte_speed,
            start_time_stamp,
        }
    }
}

/// Identity of the republished stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MediaTuple {
    pub vhost: String,
    pub app: String,
    pub stream: String,
    /// Extra query-style parameters, passed through untouched.
    #[serde(default)]
    pub params: String,
}

impl MediaTuple {
    pub fn new(
        vhost: impl Into<String>,
        app: impl Into<String>,
        stream: impl Into<String>,
    ) -> Self {
        Self {
            vhost: vhost.into(),
            app: app.into(),
            stream: stream.into(),
            params: String::new(),
        }
    }
}

impl fmt::Display for MediaTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.vhost, self.app, self.stream)
    }
}

/// Republishing options handed to the sink unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolOption {
    pub enable_rtsp: bool,
    pub enable_rtmp: bool,
    pub enable_hls: bool,
    pub enable_ts: bool,
    pub enable_fmp4: bool,
    pub enable_mp4: bool,
    pub enable_audio: bool,
    pub add_mute_audio: bool,
    pub modify_stamp: bool,
    /// Let the sink close the stream when nobody is watching.
    pub auto_close: bool,
    /// How long the sink keeps the stream after upstream loss, in ms.
    pub continue_push_ms: u32,
}

impl Default for ProtocolOption {
    fn default() -> Self {
        Self {
            enable_rtsp: true,
            enable_rtmp: true,
            enable_hls: true,
            enable_ts: true,
            enable_fmp4: true,
            enable_mp4: false,
            enable_audio: true,
            add_mute_audio: true,
            modify_stamp: false,
            auto_close: false,
            continue_push_ms: 15_000,
        }
    }
}

/// Network endpoints of an upstream session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SockInfo {
    pub local_addr: SocketAddr,
    pub peer_addr: SocketAddr,
    pub identifier: String,
}

/// What kind of origin produced a sink's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginType {
    Unknown,
    PullProxy,
}

impl OriginType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            OriginType::Unknown => "unknown",
            OriginType::PullProxy => "pull_proxy",
        }
    }
}

/// Lifecycle state of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ProxyState {
    /// Before the first `play()`.
    Idle = 0,
    /// A connect attempt is outstanding.
    Connecting = 1,
    /// Connected, sink bound, uptime accumulating.
    Live = 2,
    /// Disconnected, waiting for the retry timer.
    Retrying = 3,
    /// Budget exhausted or actively closed.
    Stopped = 4,
}

impl ProxyState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProxyState::Idle => "idle",
            ProxyState::Connecting => "connecting",
            ProxyState::Live => "live",
            ProxyState::Retrying => "retrying",
            ProxyState::Stopped => "stopped",
        }
    }

    /// Decode the value stored in the stats atomic.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => ProxyState::Idle,
            1 => ProxyState::Connecting,
            2 => ProxyState::Live,
            3 => ProxyState::Retrying,
            _ => ProxyState::Stopped,
        }
    }
}

impl fmt::Display for ProxyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse status: `0` while live, `1` while trying to (re)connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LiveStatus {
    Live = 0,
    Connecting = 1,
}

impl LiveStatus {
    /// Numeric form exposed to management APIs.
    #[must_use]
    pub const fn code(&self) -> i32 {
        *self as i32
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        if value == 0 {
            LiveStatus::Live
        } else {
            LiveStatus::Connecting
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp
)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_info_default_sentinels() {
        let info = StreamInfo::default();
        assert_eq!(info.codec_type, TrackType::Invalid);
        assert_eq!(info.codec_name, "none");
        assert_eq!(info.bitrate, -1);
        assert_eq!(info.audio_sample_rate, -1);
        assert_eq!(info.audio_sample_bit, -1);
        assert_eq!(info.audio_channel, -1);
        assert_eq!(info.video_width, -1);
        assert_eq!(info.video_height, -1);
        assert_eq!(info.video_fps, -1.0);
    }

    #[test]
    fn test_stream_info_from_video_track() {
        let track = TrackInfo {
            track_type: TrackType::Video,
            codec_name: "H264".to_string(),
            bitrate: Some(2_000_000),
            video: Some(VideoAttributes {
                width: Some(1920),
                height: Some(1080),
                fps: Some(25.0),
            }),
            // Audio attributes on a video track are ignored.
            audio: Some(AudioAttributes {
                sample_rate: Some(48_000),
                sample_bit: Some(16),
                channel_count: Some(2),
            }),
        };

        let info = StreamInfo::from(&track);
        assert_eq!(info.codec_type, TrackType::Video);
        assert_eq!(info.codec_name, "H264");
        assert_eq!(info.bitrate, 2_000_000);
        assert_eq!(info.video_width, 1920);
        assert_eq!(info.video_height, 1080);
        assert_eq!(info.video_fps, 25.0);
        assert_eq!(info.audio_sample_rate, -1);
        assert_eq!(info.audio_channel, -1);
    }

    #[test]
    fn test_stream_info_from_audio_track_with_partial_detail() {
        let track = TrackInfo {
            audio: Some(AudioAttributes {
                sample_rate: Some(44_100),
                sample_bit: None,
                channel_count: Some(2),
            }),
            ..TrackInfo::audio("AAC")
        };

        let info = StreamInfo::from(&track);
        assert_eq!(info.codec_type, TrackType::Audio);
        assert_eq!(info.bitrate, -1);
        assert_eq!(info.audio_sample_rate, 44_100);
        assert_eq!(info.audio_sample_bit, -1);
        assert_eq!(info.audio_channel, 2);
        assert_eq!(info.video_width, -1);
    }

    #[test]
    fn test_translation_info_capture_keeps_track_order() {
        let tracks = vec![TrackInfo::video("H265"), TrackInfo::audio("OPUS")];
        let info = TranslationInfo::capture(&tracks, 125_000, 1_700_000_000_000);

        assert_eq!(info.stream_info.len(), 2);
        assert_eq!(info.stream_info[0].codec_name, "H265");
        assert_eq!(info.stream_info[1].codec_name, "OPUS");
        assert_eq!(info.byte_speed, 125_000);
        assert_eq!(info.start_time_stamp, 1_700_000_000_000);
    }

    #[test]
    fn test_translation_info_default() {
        let info = TranslationInfo::default();
        assert!(info.stream_info.is_empty());
        assert_eq!(info.byte_speed, -1);
        assert_eq!(info.start_time_stamp, 0);
    }

    #[test]
    fn test_media_tuple_display() {
        let tuple = MediaTuple::new("__defaultVhost__", "live", "camera1");
        assert_eq!(tuple.to_string(), "__defaultVhost__/live/camera1");
    }

    #[test]
    fn test_proxy_state_round_trip_through_u8() {
        for state in [
            ProxyState::Idle,
            ProxyState::Connecting,
            ProxyState::Live,
            ProxyState::Retrying,
            ProxyState::Stopped,
        ] {
            assert_eq!(ProxyState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_live_status_codes() {
        assert_eq!(LiveStatus::Live.code(), 0);
        assert_eq!(LiveStatus::Connecting.code(), 1);
        assert_eq!(LiveStatus::from_u8(0), LiveStatus::Live);
        assert_eq!(LiveStatus::from_u8(7), LiveStatus::Connecting);
    }

    #[test]
    fn test_track_type_serializes_lowercase() {
        let json = serde_json::to_string(&TrackType::Invalid).unwrap();
        assert_eq!(json, "\"none\"");
        let json = serde_json::to_string(&TrackType::Video).unwrap();
        assert_eq!(json, "\"video\"");
    }
}
