use serde::Serialize;

use crate::descriptor::{DashDescriptor, DashMedia};
use crate::preferences::{PlayMode, PlaybackPreferences, VideoCodec};

/// One offered audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioOption {
    pub id: u32,
    pub bandwidth: u64,
}

/// UI-facing view of a session's current selection.
///
/// Rebuilt from scratch every time a playable stream is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub play_mode: PlayMode,
    pub dash_available: bool,
    pub selected_quality: u32,
    pub selected_codec: VideoCodec,
    pub selected_audio_id: u32,
    /// Distinct quality ranks offered, ascending.
    pub qualities: Vec<u32>,
    /// Distinct known codecs offered, in descriptor order.
    pub video_codecs: Vec<VideoCodec>,
    pub audios: Vec<AudioOption>,
    pub last_position_ms: i64,
}

impl Snapshot {
    pub(crate) fn for_dash(
        preferences: &PlaybackPreferences,
        dash: &DashDescriptor,
        video: &DashMedia,
        audio: Option<&DashMedia>,
        audio_candidates: &[DashMedia],
        last_position_ms: i64,
    ) -> Self {
        let mut qualities: Vec<u32> = dash.video.iter().map(|m| m.id).collect();
        qualities.sort_unstable();
        qualities.dedup();

        let mut video_codecs: Vec<VideoCodec> = Vec::new();
        for codec in dash
            .video
            .iter()
            .filter_map(|m| VideoCodec::from_codec_id(m.codec_id))
        {
            if !video_codecs.contains(&codec) {
                video_codecs.push(codec);
            }
        }

        Self {
            play_mode: preferences.play_mode,
            dash_available: true,
            selected_quality: video.id,
            selected_codec: VideoCodec::from_codec_id(video.codec_id)
                .unwrap_or(preferences.preferred_video_codec),
            selected_audio_id: audio.map_or(preferences.preferred_audio_id, |a| a.id),
            qualities,
            video_codecs,
            audios: audio_candidates
                .iter()
                .map(|a| AudioOption {
                    id: a.id,
                    bandwidth: a.bandwidth,
                })
                .collect(),
            last_position_ms,
        }
    }

    /// Direct playback offers no axis to switch.
    pub(crate) fn for_direct(preferences: &PlaybackPreferences, last_position_ms: i64) -> Self {
        Self {
            play_mode: preferences.play_mode,
            dash_available: false,
            selected_quality: preferences.preferred_quality,
            selected_codec: preferences.preferred_video_codec,
            selected_audio_id: preferences.preferred_audio_id,
            qualities: Vec::new(),
            video_codecs: Vec::new(),
            audios: Vec::new(),
            last_position_ms,
        }
    }
}
