//! Stream descriptors returned by the catalog.
//!
//! A descriptor is replaced wholesale on every refresh and never mutated in
//! place. Field names follow the catalog's JSON so catalog implementations can
//! deserialize straight into these types.

use serde::{Deserialize, Serialize};

/// Available representations and URLs for one media item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamDescriptor {
    pub dash: Option<DashDescriptor>,
    #[serde(rename = "durl")]
    pub direct: Vec<DirectUrl>,
}

impl StreamDescriptor {
    pub fn dash(dash: DashDescriptor) -> Self {
        Self {
            dash: Some(dash),
            direct: Vec::new(),
        }
    }

    pub fn direct(direct: Vec<DirectUrl>) -> Self {
        Self { dash: None, direct }
    }

    /// True if a DASH video track or a first direct URL is present.
    pub fn is_playable(&self) -> bool {
        if self.dash.as_ref().is_some_and(|d| !d.video.is_empty()) {
            return true;
        }
        self.direct
            .first()
            .is_some_and(|first| !first.url.trim().is_empty())
    }
}

/// DASH structure of a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashDescriptor {
    /// Presentation duration in seconds.
    pub duration: u64,
    pub min_buffer_time: Option<f64>,
    pub video: Vec<DashMedia>,
    pub audio: Vec<DashMedia>,
}

/// One DASH representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashMedia {
    /// Quality rank for video, audio-quality id for audio.
    pub id: u32,
    #[serde(rename = "codecid")]
    pub codec_id: Option<u32>,
    pub base_url: String,
    #[serde(rename = "backup_url")]
    pub backup_urls: Vec<String>,
    /// Bits per second.
    pub bandwidth: u64,
    pub mime_type: Option<String>,
    pub codecs: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<String>,
    pub segment_base: Option<SegmentBase>,
}

impl DashMedia {
    /// Primary URL followed by backups.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.base_url.as_str()).chain(self.backup_urls.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentBase {
    pub initialization: Option<String>,
    pub index_range: Option<String>,
}

/// One direct (progressive) URL entry with its backups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectUrl {
    pub order: u32,
    /// Duration in milliseconds.
    pub length: u64,
    pub size: u64,
    pub url: String,
    #[serde(rename = "backup_url")]
    pub backup_urls: Vec<String>,
}

impl DirectUrl {
    pub fn new(url: impl Into<String>, backup_urls: Vec<String>) -> Self {
        Self {
            url: url.into(),
            backup_urls,
            ..Default::default()
        }
    }
}

/// One entry of a live room's play-URL list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivePlayUrl {
    pub url: String,
    #[serde(rename = "backup_url")]
    pub backup_urls: Vec<String>,
    pub order: u32,
}

impl LivePlayUrl {
    pub fn new(url: impl Into<String>, backup_urls: Vec<String>, order: u32) -> Self {
        Self {
            url: url.into(),
            backup_urls,
            order,
        }
    }
}
