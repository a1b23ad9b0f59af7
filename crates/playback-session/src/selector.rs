//! Candidate selection for a stream descriptor.
//!
//! Selection is a pure function of `(descriptor, preferences)`:
//!
//! 1. Video: walk the codec ladder of the preferred codec and pick by quality
//!    within the first codec that has any representation. If no ladder codec
//!    is present, pick by quality over every representation.
//! 2. Quality: with no preferred rank, the highest-bandwidth representation;
//!    otherwise the exact rank, else the highest rank at or below the
//!    preference, else the highest rank overall.
//! 3. Audio: sorted by (bandwidth desc, id desc); the preferred id if present,
//!    else the top entry.
//! 4. Direct URLs: the first direct entry's primary and backup URLs, merged by
//!    [`crate::cdn::resolve_urls`].

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::cdn::resolve_urls;
use crate::descriptor::{DashDescriptor, DashMedia, StreamDescriptor};
use crate::preferences::{PlaybackPreferences, VideoCodec};

/// Result of running the selector over one descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Video representations grouped by codec, each sorted by
    /// (quality desc, bandwidth desc). Unknown codecs are grouped under
    /// [`VideoCodec::Auto`].
    pub videos_by_codec: HashMap<VideoCodec, Vec<DashMedia>>,
    /// Audio representations sorted by (bandwidth desc, id desc).
    pub audio_candidates: Vec<DashMedia>,
    pub video: Option<DashMedia>,
    pub audio: Option<DashMedia>,
    /// Ordered direct-URL candidates.
    pub direct_candidates: Vec<String>,
}

/// Selects representations and URLs according to one preference snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CandidateSelector<'a> {
    preferences: &'a PlaybackPreferences,
}

impl<'a> CandidateSelector<'a> {
    pub fn new(preferences: &'a PlaybackPreferences) -> Self {
        Self { preferences }
    }

    /// Run the full selection over `descriptor`.
    pub fn select(&self, descriptor: &StreamDescriptor) -> Selection {
        let dash = descriptor.dash.as_ref();

        let mut videos_by_codec: HashMap<VideoCodec, Vec<DashMedia>> = HashMap::new();
        if let Some(dash) = dash {
            for media in &dash.video {
                let codec = VideoCodec::from_codec_id(media.codec_id).unwrap_or(VideoCodec::Auto);
                videos_by_codec.entry(codec).or_default().push(media.clone());
            }
        }
        for group in videos_by_codec.values_mut() {
            group.sort_by(by_quality_desc);
        }

        let mut audio_candidates: Vec<DashMedia> =
            dash.map(|d| d.audio.clone()).unwrap_or_default();
        audio_candidates.sort_by(by_bandwidth_desc);

        let video = dash
            .filter(|d| !d.video.is_empty())
            .and_then(|d| self.select_video(&d.video))
            .cloned();
        let audio = self.select_audio(&audio_candidates).cloned();

        let direct_candidates = descriptor
            .direct
            .first()
            .map(|first| {
                resolve_urls(
                    &first.url,
                    &first.backup_urls,
                    self.preferences.cdn_service.host(),
                )
            })
            .unwrap_or_default();

        Selection {
            videos_by_codec,
            audio_candidates,
            video,
            audio,
            direct_candidates,
        }
    }

    /// Pick a video representation by codec ladder, then quality.
    pub fn select_video<'m>(&self, candidates: &'m [DashMedia]) -> Option<&'m DashMedia> {
        for codec in self.preferences.preferred_video_codec.ladder() {
            let group: Vec<&DashMedia> = candidates
                .iter()
                .filter(|media| media.codec_id.is_some() && media.codec_id == codec.codec_id())
                .collect();
            if group.is_empty() {
                continue;
            }
            return self.select_by_quality(&group);
        }

        let all: Vec<&DashMedia> = candidates.iter().collect();
        self.select_by_quality(&all)
    }

    /// Pick a representation by the preferred quality rank.
    pub fn select_by_quality<'m>(&self, candidates: &[&'m DashMedia]) -> Option<&'m DashMedia> {
        let Some(preferred) = self.preferences.quality_rank() else {
            return first_max_by_key(candidates.iter().copied(), |media| media.bandwidth);
        };

        if let Some(exact) = candidates.iter().copied().find(|media| media.id == preferred) {
            return Some(exact);
        }

        let lower_or_equal: Vec<&DashMedia> = candidates
            .iter()
            .copied()
            .filter(|media| media.id <= preferred)
            .collect();
        let pool = if lower_or_equal.is_empty() {
            candidates
        } else {
            lower_or_equal.as_slice()
        };
        first_max_by_key(pool.iter().copied(), |media| media.id)
    }

    /// Pick an audio representation from candidates already sorted by
    /// [`by_bandwidth_desc`].
    pub fn select_audio<'m>(&self, sorted: &'m [DashMedia]) -> Option<&'m DashMedia> {
        if let Some(preferred) = self.preferences.audio_id()
            && let Some(found) = sorted.iter().find(|media| media.id == preferred)
        {
            return Some(found);
        }
        sorted.first()
    }

    /// Switch the selected video to the next codec down the decoder fallback
    /// ladder. Returns `true` if a new video was selected.
    pub fn fallback_codec(&self, selection: &mut Selection) -> bool {
        let Some(current) = selection.video.as_ref() else {
            return false;
        };
        let Some(current_codec) = VideoCodec::from_codec_id(current.codec_id) else {
            return false;
        };

        for codec in current_codec.decoder_fallbacks() {
            let Some(group) = selection.videos_by_codec.get(codec).filter(|g| !g.is_empty()) else {
                continue;
            };
            let refs: Vec<&DashMedia> = group.iter().collect();
            let next = self.select_by_quality(&refs).cloned();
            let switched = next.is_some();
            selection.video = next;
            return switched;
        }
        false
    }

    /// Step the selected video down to the next lower quality of the same
    /// codec. Returns `true` if a lower quality exists.
    pub fn fallback_quality(selection: &mut Selection) -> bool {
        let Some(current) = selection.video.as_ref() else {
            return false;
        };
        let codec = VideoCodec::from_codec_id(current.codec_id).unwrap_or(VideoCodec::Auto);
        let Some(group) = selection.videos_by_codec.get(&codec) else {
            return false;
        };

        match group.iter().find(|media| media.id < current.id) {
            Some(next) => {
                selection.video = Some(next.clone());
                true
            }
            None => false,
        }
    }
}

/// Video representations for the manifest: the selected one first, then
/// same-codec siblings at or below the selected quality.
pub fn dash_video_representations(dash: &DashDescriptor, selected: &DashMedia) -> Vec<DashMedia> {
    let mut candidates: Vec<&DashMedia> = dash
        .video
        .iter()
        .filter(|media| !media.base_url.trim().is_empty())
        .collect();
    candidates.sort_by(|a, b| by_quality_desc(a, b));

    let codec_filtered: Vec<&DashMedia> = match selected.codec_id {
        None => candidates.clone(),
        Some(codec_id) => {
            let same: Vec<&DashMedia> = candidates
                .iter()
                .copied()
                .filter(|media| media.codec_id == Some(codec_id))
                .collect();
            if same.is_empty() { candidates.clone() } else { same }
        }
    };

    let quality_filtered: Vec<&DashMedia> = {
        let lower: Vec<&DashMedia> = codec_filtered
            .iter()
            .copied()
            .filter(|media| media.id <= selected.id)
            .collect();
        if lower.is_empty() { codec_filtered } else { lower }
    };

    std::iter::once(selected.clone())
        .chain(
            quality_filtered
                .into_iter()
                .filter(|media| *media != selected)
                .cloned(),
        )
        .collect()
}

/// Audio representations for the manifest: the selected one first, then
/// candidates with a known bandwidth no higher than the selected one.
pub fn dash_audio_representations(candidates: &[DashMedia], selected: Option<&DashMedia>) -> Vec<DashMedia> {
    let Some(selected) = selected else {
        return Vec::new();
    };
    if selected.bandwidth == 0 {
        return vec![selected.clone()];
    }

    let mut filtered: Vec<&DashMedia> = candidates
        .iter()
        .filter(|media| !media.base_url.trim().is_empty())
        .filter(|media| (1..=selected.bandwidth).contains(&media.bandwidth))
        .collect();
    filtered.sort_by(|a, b| by_bandwidth_desc(a, b));

    std::iter::once(selected.clone())
        .chain(filtered.into_iter().filter(|media| *media != selected).cloned())
        .collect()
}

/// Quality desc, then bandwidth desc.
pub fn by_quality_desc(a: &DashMedia, b: &DashMedia) -> Ordering {
    b.id.cmp(&a.id).then_with(|| b.bandwidth.cmp(&a.bandwidth))
}

/// Bandwidth desc, then id desc.
pub fn by_bandwidth_desc(a: &DashMedia, b: &DashMedia) -> Ordering {
    b.bandwidth.cmp(&a.bandwidth).then_with(|| b.id.cmp(&a.id))
}

/// Like `Iterator::max_by_key`, but the first maximum wins on ties.
fn first_max_by_key<'m, K: Ord>(
    items: impl Iterator<Item = &'m DashMedia>,
    key: impl Fn(&DashMedia) -> K,
) -> Option<&'m DashMedia> {
    items.fold(None, |best: Option<&'m DashMedia>, media| match best {
        Some(current) if key(media) <= key(current) => Some(current),
        _ => Some(media),
    })
}
