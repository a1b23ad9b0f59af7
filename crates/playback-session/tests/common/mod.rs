//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use playback_session::catalog::{CatalogClient, CatalogError, DescriptorRequest};
use playback_session::clock::ManualClock;
use playback_session::descriptor::{DashDescriptor, DashMedia, DirectUrl, LivePlayUrl, StreamDescriptor};
use playback_session::keys::ItemRef;
use playback_session::manifest::{ManifestError, ManifestRequest, ManifestWriter};
use playback_session::preferences::{MemoryPreferenceStore, PlaybackPreferences, VideoCodec};
use playback_session::{SessionConfig, SessionContext};

pub const T0: i64 = 1_700_000_000_000;
pub const STORAGE_KEY: &str = "bilibili_storage:https://www.bilibili.com";

/// What the primary descriptor endpoint answers.
pub enum Primary {
    Descriptor(StreamDescriptor),
    Error(String),
}

pub struct FakeCatalog {
    primary: Mutex<Primary>,
    fallback: Mutex<Result<Option<StreamDescriptor>, String>>,
    pub fetches: AtomicUsize,
    pub fallback_fetches: AtomicUsize,
    pub pgc_sessions: Mutex<Vec<Option<String>>>,
    pub heartbeats: Mutex<Vec<(ItemRef, i64)>>,
    pub fail_heartbeats: AtomicBool,
    pub resolved_room_id: Mutex<u64>,
    pub resolve_calls: AtomicUsize,
    live_urls: Mutex<VecDeque<Vec<LivePlayUrl>>>,
    pub live_fetches: AtomicUsize,
    pub live_rooms_fetched: Mutex<Vec<u64>>,
}

impl FakeCatalog {
    pub fn new(descriptor: StreamDescriptor) -> Self {
        Self {
            primary: Mutex::new(Primary::Descriptor(descriptor)),
            fallback: Mutex::new(Ok(None)),
            fetches: AtomicUsize::new(0),
            fallback_fetches: AtomicUsize::new(0),
            pgc_sessions: Mutex::new(Vec::new()),
            heartbeats: Mutex::new(Vec::new()),
            fail_heartbeats: AtomicBool::new(false),
            resolved_room_id: Mutex::new(0),
            resolve_calls: AtomicUsize::new(0),
            live_urls: Mutex::new(VecDeque::new()),
            live_fetches: AtomicUsize::new(0),
            live_rooms_fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn set_primary(&self, primary: Primary) {
        *self.primary.lock() = primary;
    }

    pub fn set_fallback(&self, fallback: Result<Option<StreamDescriptor>, String>) {
        *self.fallback.lock() = fallback;
    }

    /// Queue live play-URL answers. The last one repeats.
    pub fn push_live_urls(&self, urls: Vec<LivePlayUrl>) {
        self.live_urls.lock().push_back(urls);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn heartbeat_values(&self) -> Vec<i64> {
        self.heartbeats.lock().iter().map(|(_, secs)| *secs).collect()
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn fetch_descriptor(&self, request: &DescriptorRequest<'_>) -> Result<StreamDescriptor, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pgc_sessions
            .lock()
            .push(request.pgc_session.map(str::to_string));
        match &*self.primary.lock() {
            Primary::Descriptor(descriptor) => Ok(descriptor.clone()),
            Primary::Error(message) => Err(CatalogError::Network(message.clone())),
        }
    }

    async fn fetch_descriptor_fallback(
        &self,
        _request: &DescriptorRequest<'_>,
    ) -> Result<Option<StreamDescriptor>, CatalogError> {
        self.fallback_fetches.fetch_add(1, Ordering::SeqCst);
        self.fallback.lock().clone().map_err(CatalogError::Other)
    }

    async fn report_heartbeat(&self, item: &ItemRef, played_seconds: i64) -> Result<(), CatalogError> {
        self.heartbeats.lock().push((item.clone(), played_seconds));
        if self.fail_heartbeats.load(Ordering::SeqCst) {
            return Err(CatalogError::Network("heartbeat rejected".to_string()));
        }
        Ok(())
    }

    async fn resolve_live_room(&self, _room_id: u64) -> Result<u64, CatalogError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.resolved_room_id.lock())
    }

    async fn fetch_live_play_urls(&self, room_id: u64) -> Result<Vec<LivePlayUrl>, CatalogError> {
        self.live_fetches.fetch_add(1, Ordering::SeqCst);
        self.live_rooms_fetched.lock().push(room_id);
        let mut queue = self.live_urls.lock();
        let urls = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(urls)
    }
}

/// One manifest the session asked to write.
#[derive(Debug, Clone)]
pub struct WrittenManifest {
    pub path: PathBuf,
    pub video: DashMedia,
    pub videos: Vec<DashMedia>,
    pub audio: Option<DashMedia>,
    pub audios: Vec<DashMedia>,
    pub cdn_host_override: Option<String>,
    pub blacklisted_hosts: Vec<String>,
}

#[derive(Default)]
pub struct RecordingManifestWriter {
    pub written: Mutex<Vec<WrittenManifest>>,
}

impl RecordingManifestWriter {
    pub fn last(&self) -> WrittenManifest {
        self.written
            .lock()
            .last()
            .cloned()
            .expect("no manifest written")
    }

    pub fn count(&self) -> usize {
        self.written.lock().len()
    }
}

#[async_trait]
impl ManifestWriter for RecordingManifestWriter {
    async fn write(&self, request: ManifestRequest<'_>) -> Result<(), ManifestError> {
        self.written.lock().push(WrittenManifest {
            path: request.path.to_path_buf(),
            video: request.video.clone(),
            videos: request.videos.to_vec(),
            audio: request.audio.cloned(),
            audios: request.audios.to_vec(),
            cdn_host_override: request.cdn_host_override.map(str::to_string),
            blacklisted_hosts: request.blacklisted_hosts,
        });
        Ok(())
    }
}

pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub writer: Arc<RecordingManifestWriter>,
    pub preferences: Arc<MemoryPreferenceStore>,
    pub clock: Arc<ManualClock>,
    pub ctx: SessionContext,
}

impl Harness {
    pub fn new(descriptor: StreamDescriptor, preferences: PlaybackPreferences) -> Self {
        playback_session::logging::try_init_for_tests();
        let catalog = Arc::new(FakeCatalog::new(descriptor));
        let writer = Arc::new(RecordingManifestWriter::default());
        let store = Arc::new(MemoryPreferenceStore::new());
        store.insert(STORAGE_KEY, preferences);
        let clock = Arc::new(ManualClock::new(T0));
        let config = SessionConfig {
            manifest_dir: PathBuf::from("/tmp/playback-session-tests"),
            ..Default::default()
        };
        let ctx = SessionContext::new(catalog.clone(), writer.clone(), store.clone(), config)
            .with_clock(clock.clone());
        Self {
            catalog,
            writer,
            preferences: store,
            clock,
            ctx,
        }
    }
}

pub fn video(id: u32, codec: VideoCodec, bandwidth: u64) -> DashMedia {
    DashMedia {
        id,
        codec_id: codec.codec_id(),
        base_url: format!("https://upos-a.example.com/{id}-{bandwidth}.m4s"),
        backup_urls: vec![format!("https://upos-b.example.com/{id}-{bandwidth}.m4s")],
        bandwidth,
        ..Default::default()
    }
}

pub fn audio(id: u32, bandwidth: u64) -> DashMedia {
    DashMedia {
        id,
        base_url: format!("https://upos-a.example.com/audio-{id}.m4s"),
        bandwidth,
        ..Default::default()
    }
}

pub fn dash(video: Vec<DashMedia>, audio: Vec<DashMedia>) -> StreamDescriptor {
    StreamDescriptor::dash(DashDescriptor {
        duration: 600,
        video,
        audio,
        ..Default::default()
    })
}

/// Direct descriptor whose first entry spans `hosts`, each URL carrying
/// `query` (may be empty).
pub fn direct(hosts: &[&str], query: &str) -> StreamDescriptor {
    let urls: Vec<String> = hosts
        .iter()
        .map(|host| direct_url(host, query))
        .collect();
    StreamDescriptor::direct(vec![DirectUrl::new(urls[0].clone(), urls[1..].to_vec())])
}

pub fn direct_url(host: &str, query: &str) -> String {
    if query.is_empty() {
        format!("https://{host}/video.mp4")
    } else {
        format!("https://{host}/video.mp4?{query}")
    }
}

pub fn live_url(host: &str) -> String {
    format!("https://{host}/live-bvc/stream.flv")
}
