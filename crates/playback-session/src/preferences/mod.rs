//! Playback preferences and their persistence.
//!
//! Preferences are owned by an external [`PreferenceStore`]; sessions read a
//! fresh copy when they are created and whenever an update is applied, and
//! treat it as an immutable snapshot within one resolution pass.

mod store;

pub use store::{JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceError, PreferenceStore, storage_key};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which stream families a session may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayMode {
    /// DASH first, direct URLs as fallback.
    #[default]
    Auto,
    /// DASH only.
    Dash,
    /// Direct (progressive MP4) URLs only.
    Mp4,
}

impl PlayMode {
    pub fn allows_dash(self) -> bool {
        self != Self::Mp4
    }

    pub fn allows_direct(self) -> bool {
        self != Self::Dash
    }
}

/// Preferred video codec. `Auto` behaves like `Av1` when walking the ladder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoCodec {
    Auto,
    Av1,
    Hevc,
    #[default]
    Avc,
}

impl VideoCodec {
    /// Catalog codec id of this codec, `None` for `Auto`.
    pub fn codec_id(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Avc => Some(7),
            Self::Hevc => Some(12),
            Self::Av1 => Some(13),
        }
    }

    pub fn from_codec_id(codec_id: Option<u32>) -> Option<Self> {
        match codec_id? {
            7 => Some(Self::Avc),
            12 => Some(Self::Hevc),
            13 => Some(Self::Av1),
            _ => None,
        }
    }

    /// Codecs to try, in order, when this codec is preferred.
    pub fn ladder(self) -> &'static [VideoCodec] {
        match self {
            Self::Auto | Self::Av1 => &[Self::Av1, Self::Hevc, Self::Avc],
            Self::Hevc => &[Self::Hevc, Self::Avc],
            Self::Avc => &[Self::Avc],
        }
    }

    /// Codecs to fall back to after this codec failed to decode.
    pub fn decoder_fallbacks(self) -> &'static [VideoCodec] {
        match self {
            Self::Av1 => &[Self::Hevc, Self::Avc],
            Self::Hevc => &[Self::Avc],
            Self::Auto | Self::Avc => &[],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Av1 => "AV1",
            Self::Hevc => "HEVC/H.265",
            Self::Avc => "AVC/H.264",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Known quality ranks.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u32)]
pub enum Quality {
    Auto = 0,
    // 360P
    Q360P = 16,
    // 480P
    Q480P = 32,
    // 720P
    Q720P = 64,
    // 1080P
    Q1080P = 80,
    // 1080P+ (high bitrate)
    Q1080PPlus = 112,
    // 4K
    Q4K = 120,
}

impl Quality {
    pub fn rank(self) -> u32 {
        self as u32
    }

    pub fn from_rank(rank: u32) -> Option<Self> {
        match rank {
            0 => Some(Self::Auto),
            16 => Some(Self::Q360P),
            32 => Some(Self::Q480P),
            64 => Some(Self::Q720P),
            80 => Some(Self::Q1080P),
            112 => Some(Self::Q1080PPlus),
            120 => Some(Self::Q4K),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Q360P => "360P",
            Self::Q480P => "480P",
            Self::Q720P => "720P",
            Self::Q1080P => "1080P",
            Self::Q1080PPlus => "1080P+",
            Self::Q4K => "4K",
        }
    }
}

/// CDN host override policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CdnService {
    /// Use the hosts the catalog hands out.
    #[default]
    Auto,
    /// Rewrite candidates onto this host (`scheme://host[:port]` or bare host).
    Host(String),
}

impl CdnService {
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Host(host) if host.trim().is_empty() => None,
            Self::Host(host) => Some(host.as_str()),
        }
    }
}

/// Per-storage playback preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackPreferences {
    pub play_mode: PlayMode,
    /// Preferred quality rank; `0` means highest available.
    pub preferred_quality: u32,
    pub preferred_video_codec: VideoCodec,
    /// Preferred audio-quality id; `0` means best available.
    pub preferred_audio_id: u32,
    pub cdn_service: CdnService,
    pub allow_4k: bool,
    pub heartbeat_enabled: bool,
}

impl Default for PlaybackPreferences {
    fn default() -> Self {
        Self {
            play_mode: PlayMode::Auto,
            preferred_quality: Quality::Q720P.rank(),
            preferred_video_codec: VideoCodec::Avc,
            preferred_audio_id: 0,
            cdn_service: CdnService::Auto,
            allow_4k: false,
            heartbeat_enabled: true,
        }
    }
}

impl PlaybackPreferences {
    /// Preferred quality rank, or `None` for "highest available".
    pub fn quality_rank(&self) -> Option<u32> {
        (self.preferred_quality > 0).then_some(self.preferred_quality)
    }

    /// Preferred audio id, or `None` for "best available".
    pub fn audio_id(&self) -> Option<u32> {
        (self.preferred_audio_id > 0).then_some(self.preferred_audio_id)
    }

    /// Apply a partial update; unset fields keep their current value.
    pub fn merged(&self, update: &PreferenceUpdate) -> Self {
        Self {
            play_mode: update.play_mode.unwrap_or(self.play_mode),
            preferred_quality: update.quality.unwrap_or(self.preferred_quality),
            preferred_video_codec: update.video_codec.unwrap_or(self.preferred_video_codec),
            preferred_audio_id: update.audio_id.unwrap_or(self.preferred_audio_id),
            ..self.clone()
        }
    }
}

/// Partial preference change requested from the player UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceUpdate {
    pub play_mode: Option<PlayMode>,
    pub quality: Option<u32>,
    pub video_codec: Option<VideoCodec>,
    pub audio_id: Option<u32>,
}

impl PreferenceUpdate {
    pub fn is_empty(&self) -> bool {
        self.play_mode.is_none()
            && self.quality.is_none()
            && self.video_codec.is_none()
            && self.audio_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_ladders() {
        assert_eq!(
            VideoCodec::Auto.ladder(),
            &[VideoCodec::Av1, VideoCodec::Hevc, VideoCodec::Avc]
        );
        assert_eq!(VideoCodec::Av1.ladder(), VideoCodec::Auto.ladder());
        assert_eq!(VideoCodec::Hevc.ladder(), &[VideoCodec::Hevc, VideoCodec::Avc]);
        assert_eq!(VideoCodec::Avc.ladder(), &[VideoCodec::Avc]);
        assert!(VideoCodec::Avc.decoder_fallbacks().is_empty());
    }

    #[test]
    fn codec_ids_round_trip() {
        for codec in [VideoCodec::Av1, VideoCodec::Hevc, VideoCodec::Avc] {
            assert_eq!(VideoCodec::from_codec_id(codec.codec_id()), Some(codec));
        }
        assert_eq!(VideoCodec::from_codec_id(Some(99)), None);
        assert_eq!(VideoCodec::from_codec_id(None), None);
    }

    #[test]
    fn play_mode_gates() {
        assert!(PlayMode::Auto.allows_dash() && PlayMode::Auto.allows_direct());
        assert!(PlayMode::Dash.allows_dash() && !PlayMode::Dash.allows_direct());
        assert!(!PlayMode::Mp4.allows_dash() && PlayMode::Mp4.allows_direct());
    }

    #[test]
    fn merge_only_touches_set_fields() {
        let base = PlaybackPreferences {
            cdn_service: CdnService::Host("cdn.example.com".into()),
            ..Default::default()
        };
        let merged = base.merged(&PreferenceUpdate {
            video_codec: Some(VideoCodec::Hevc),
            quality: Some(0),
            ..Default::default()
        });
        assert_eq!(merged.preferred_video_codec, VideoCodec::Hevc);
        assert_eq!(merged.quality_rank(), None);
        assert_eq!(merged.play_mode, base.play_mode);
        assert_eq!(merged.cdn_service, base.cdn_service);
        assert!(PreferenceUpdate::default().is_empty());
    }

    #[test]
    fn cdn_service_host() {
        assert_eq!(CdnService::Auto.host(), None);
        assert_eq!(CdnService::Host(" ".into()).host(), None);
        assert_eq!(CdnService::Host("a.example.com".into()).host(), Some("a.example.com"));
    }

    #[test]
    fn quality_ranks() {
        assert_eq!(Quality::from_rank(80), Some(Quality::Q1080P));
        assert_eq!(Quality::Q4K.rank(), 120);
        assert_eq!(Quality::from_rank(81), None);
    }

    #[test]
    fn serializes_with_screaming_enum_names() {
        let json = serde_json::to_value(PlaybackPreferences::default()).unwrap();
        assert_eq!(json["play_mode"], "AUTO");
        assert_eq!(json["preferred_video_codec"], "AVC");
        assert_eq!(json["cdn_service"], "auto");
    }
}
