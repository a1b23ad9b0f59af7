//! On-demand playback (archive parts and PGC episodes).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use md5::{Digest, Md5};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::failure::{FailureContext, RefreshReason};
use super::snapshot::Snapshot;
use super::{PlayableStream, SessionContext, rotate_candidates};
use crate::catalog::DescriptorRequest;
use crate::cdn::{CdnHealthTracker, host_of};
use crate::clock::ms_to_datetime;
use crate::descriptor::StreamDescriptor;
use crate::error::{PlaybackError, Result};
use crate::expiry::{earliest_expiry_ms, expires_within, parse_expiry_ms};
use crate::keys::{ItemRef, SessionKey};
use crate::manifest::ManifestRequest;
use crate::preferences::{PlaybackPreferences, PreferenceUpdate};
use crate::selector::{CandidateSelector, Selection, dash_audio_representations, dash_video_representations};

#[derive(Debug, Default)]
struct SessionState {
    preferences: PlaybackPreferences,
    descriptor: Option<StreamDescriptor>,
    selection: Selection,
    direct_index: usize,
    selected_expires_at_ms: Option<i64>,
    last_position_ms: i64,
}

impl SessionState {
    fn dash_active(&self) -> bool {
        self.descriptor.as_ref().is_some_and(|d| d.dash.is_some())
    }

    /// Re-run selection over the held descriptor.
    fn reselect(&mut self) {
        self.selection = match &self.descriptor {
            Some(descriptor) => CandidateSelector::new(&self.preferences).select(descriptor),
            None => Selection::default(),
        };
        self.direct_index = 0;
    }

    /// True if DASH will be used on the next build.
    fn will_build_dash(&self) -> bool {
        self.preferences.play_mode.allows_dash()
            && self
                .descriptor
                .as_ref()
                .and_then(|d| d.dash.as_ref())
                .is_some_and(|d| !d.video.is_empty())
            && self.selection.video.is_some()
    }
}

/// Resolution and recovery state for one on-demand item.
///
/// `prepare`, `recover` and `apply_preference_update` serialize on an internal
/// lock. [`snapshot`](Self::snapshot) and [`cdn_health`](Self::cdn_health)
/// never wait on it.
pub struct PlaybackSession {
    key: SessionKey,
    item: ItemRef,
    storage_key: String,
    ctx: SessionContext,
    cdn_health: Arc<CdnHealthTracker>,
    manifest_path: PathBuf,
    pgc_session: Option<String>,
    state: Mutex<SessionState>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl PlaybackSession {
    /// Create a session for `key`. Preferences are read from the store under
    /// `storage_key`.
    pub fn new(key: SessionKey, storage_key: impl Into<String>, ctx: SessionContext) -> Result<Self> {
        let item = ItemRef::parse(&key.unique_key)
            .ok_or_else(|| PlaybackError::InvalidKey(key.unique_key.clone()))?;
        match item {
            ItemRef::Archive { .. } | ItemRef::PgcEpisode { .. } => {}
            ItemRef::PgcSeason { .. } => {
                return Err(PlaybackError::UnsupportedItem(
                    "a PGC season is not playable, open one of its episodes".to_string(),
                ));
            }
            ItemRef::Live { .. } => {
                return Err(PlaybackError::UnsupportedItem(
                    "live rooms are played through LiveSession".to_string(),
                ));
            }
        }

        let storage_key = storage_key.into();
        let manifest_path = ctx.config.manifest_dir.join(format!(
            "bilibili_{}.mpd",
            hex::encode(Md5::digest(key.unique_key.as_bytes()))
        ));
        let pgc_session = matches!(item, ItemRef::PgcEpisode { .. })
            .then(|| uuid::Uuid::new_v4().to_string().replace('-', ""));
        let state = SessionState {
            preferences: ctx.preferences.read(&storage_key),
            ..Default::default()
        };

        Ok(Self {
            key,
            item,
            storage_key,
            cdn_health: ctx.new_cdn_tracker(),
            ctx,
            manifest_path,
            pgc_session,
            state: Mutex::new(state),
            snapshot: RwLock::new(None),
        })
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn item(&self) -> &ItemRef {
        &self.item
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// The session's CDN blacklist, for out-of-band failure callbacks.
    pub fn cdn_health(&self) -> Arc<CdnHealthTracker> {
        self.cdn_health.clone()
    }

    /// Last built selection, if any.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().clone()
    }

    /// Fetch a fresh descriptor and build a playable stream.
    pub async fn prepare(&self) -> Result<PlayableStream> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state.preferences = self.ctx.preferences.read(&self.storage_key);
        self.refresh(state).await?;
        self.build_playable(state).await
    }

    /// Produce a new playable stream after the player reported `failure` at
    /// `position_ms`.
    pub async fn recover(&self, failure: &FailureContext, position_ms: i64) -> Result<PlayableStream> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state.last_position_ms = position_ms;
        let purged = self.cdn_health.cleanup();
        if purged > 0 {
            debug!(unique_key = %self.key.unique_key, purged, "Purged expired CDN blacklist entries");
        }

        if failure.is_decoder_error() {
            let selector = CandidateSelector::new(&state.preferences);
            let from = state.selection.video.as_ref().map(|v| (v.id, v.codec_id));
            if selector.fallback_codec(&mut state.selection)
                || CandidateSelector::fallback_quality(&mut state.selection)
            {
                let to = state.selection.video.as_ref().map(|v| (v.id, v.codec_id));
                info!(
                    unique_key = %self.key.unique_key,
                    ?from,
                    ?to,
                    "Decoder failure, switching representation"
                );
                return self.build_playable(state).await;
            }
        }

        let expiring_soon = expires_within(
            state.selected_expires_at_ms,
            self.ctx.clock.now_ms(),
            self.ctx.expiry_margin_ms(),
        );
        let reason = failure.refresh_reason(expiring_soon, state.dash_active());

        if let Some(url) = failure.failing_url.as_known()
            && self.cdn_health.blacklist(url)
        {
            info!(
                unique_key = %self.key.unique_key,
                host = host_of(url).as_deref().unwrap_or_default(),
                "Blacklisted CDN host"
            );
        }

        if let Some(reason) = reason {
            return self.refresh_and_build(state, reason).await;
        }

        if state.will_build_dash() {
            return self.build_playable(state).await;
        }

        if state.preferences.play_mode.allows_direct()
            && let Some(url) = self.rotate_direct(state)
        {
            debug!(unique_key = %self.key.unique_key, url = %url, "Rotated direct candidate");
            self.publish(Snapshot::for_direct(&state.preferences, state.last_position_ms));
            return Ok(PlayableStream::Direct { url });
        }

        // Every candidate is blacklisted. The refreshed list is used as is,
        // starting from its first entry.
        self.refresh_and_build(state, RefreshReason::RotationExhausted)
            .await
    }

    /// Persist a preference change and rebuild with it.
    ///
    /// A held descriptor is reused, so switching quality, codec or audio
    /// track needs no catalog call.
    pub async fn apply_preference_update(
        &self,
        update: &PreferenceUpdate,
        position_ms: i64,
    ) -> Result<PlayableStream> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state.last_position_ms = position_ms;
        let updated = self.ctx.preferences.read(&self.storage_key).merged(update);
        self.ctx.preferences.write(&self.storage_key, &updated).await?;
        state.preferences = updated;

        if state.descriptor.is_some() {
            state.reselect();
        } else {
            self.refresh(state).await?;
        }
        self.build_playable(state).await
    }

    /// Report progress to the catalog unless heartbeats are disabled for this
    /// storage.
    pub async fn report_heartbeat(&self, played_seconds: i64) -> Result<()> {
        if !self.ctx.preferences.read(&self.storage_key).heartbeat_enabled {
            return Ok(());
        }
        self.ctx
            .catalog
            .report_heartbeat(&self.item, played_seconds)
            .await?;
        Ok(())
    }

    async fn refresh_and_build(&self, state: &mut SessionState, reason: RefreshReason) -> Result<PlayableStream> {
        info!(
            storage_id = self.key.storage_id,
            unique_key = %self.key.unique_key,
            reason = %reason,
            "Refreshing stream descriptor"
        );
        self.refresh(state).await?;
        self.build_playable(state).await
    }

    async fn refresh(&self, state: &mut SessionState) -> Result<()> {
        let descriptor = self.fetch_descriptor(&state.preferences).await?;
        state.descriptor = Some(descriptor);
        state.reselect();
        Ok(())
    }

    /// Primary fetch, then the fallback endpoint if the answer is unusable.
    async fn fetch_descriptor(&self, preferences: &PlaybackPreferences) -> Result<StreamDescriptor> {
        if let ItemRef::Archive { cid: None, .. } = self.item {
            return Err(PlaybackError::MissingCid);
        }

        let request = DescriptorRequest {
            item: &self.item,
            preferences,
            pgc_session: self.pgc_session.as_deref(),
        };

        let primary_error = match self.ctx.catalog.fetch_descriptor(&request).await {
            Ok(descriptor) if descriptor.is_playable() => return Ok(descriptor),
            Ok(_) => {
                debug!(unique_key = %self.key.unique_key, "Primary descriptor has no playable stream");
                None
            }
            Err(e) => {
                warn!(unique_key = %self.key.unique_key, error = %e, "Primary descriptor fetch failed");
                Some(e)
            }
        };

        match self.ctx.catalog.fetch_descriptor_fallback(&request).await {
            Ok(Some(descriptor)) if descriptor.is_playable() => {
                info!(unique_key = %self.key.unique_key, "Using fallback descriptor");
                Ok(descriptor)
            }
            Ok(_) => Err(primary_error.map_or(PlaybackError::NoPlayableStream, PlaybackError::from)),
            Err(e) => Err(e.into()),
        }
    }

    async fn build_playable(&self, state: &mut SessionState) -> Result<PlayableStream> {
        if state.will_build_dash()
            && let Some(dash) = state.descriptor.as_ref().and_then(|d| d.dash.as_ref())
            && let Some(video) = state.selection.video.as_ref()
        {
            let audio = state.selection.audio.as_ref();
            let expires_at_ms = earliest_expiry_ms(std::iter::once(video).chain(audio));
            let videos = dash_video_representations(dash, video);
            let audios = dash_audio_representations(&state.selection.audio_candidates, audio);

            self.ctx
                .manifest_writer
                .write(ManifestRequest {
                    path: &self.manifest_path,
                    dash,
                    video,
                    videos: &videos,
                    audio,
                    audios: &audios,
                    cdn_host_override: state.preferences.cdn_service.host(),
                    blacklisted_hosts: self.cdn_health.hosts(),
                })
                .await?;

            let snapshot = Snapshot::for_dash(
                &state.preferences,
                dash,
                video,
                audio,
                &state.selection.audio_candidates,
                state.last_position_ms,
            );
            debug!(
                unique_key = %self.key.unique_key,
                quality = video.id,
                codec = %snapshot.selected_codec,
                audio_id = snapshot.selected_audio_id,
                expires_at = ?expires_at_ms.and_then(ms_to_datetime),
                "Built DASH manifest"
            );
            state.selected_expires_at_ms = expires_at_ms;
            self.publish(snapshot);
            return Ok(PlayableStream::Manifest {
                path: self.manifest_path.clone(),
            });
        }

        if state.preferences.play_mode.allows_direct() {
            let candidates = &state.selection.direct_candidates;
            let index = state.direct_index.min(candidates.len().saturating_sub(1));
            if let Some(url) = candidates
                .get(index)
                .or_else(|| candidates.first())
                .filter(|url| !url.trim().is_empty())
                .cloned()
            {
                state.selected_expires_at_ms = parse_expiry_ms(&url);
                debug!(
                    unique_key = %self.key.unique_key,
                    index,
                    expires_at = ?state.selected_expires_at_ms.and_then(ms_to_datetime),
                    "Selected direct candidate"
                );
                self.publish(Snapshot::for_direct(&state.preferences, state.last_position_ms));
                return Ok(PlayableStream::Direct { url });
            }
        }

        Err(PlaybackError::NoPlayableStream)
    }

    fn rotate_direct(&self, state: &mut SessionState) -> Option<String> {
        let candidates = &state.selection.direct_candidates;
        let index = rotate_candidates(candidates, state.direct_index, &self.cdn_health)?;
        let url = candidates[index].clone();
        state.direct_index = index;
        state.selected_expires_at_ms = parse_expiry_ms(&url);
        Some(url)
    }

    fn publish(&self, snapshot: Snapshot) {
        *self.snapshot.write() = Some(Arc::new(snapshot));
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("key", &self.key)
            .field("item", &self.item)
            .field("storage_key", &self.storage_key)
            .field("manifest_path", &self.manifest_path)
            .finish_non_exhaustive()
    }
}
