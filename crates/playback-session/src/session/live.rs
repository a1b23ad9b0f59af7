//! Live-room playback: CDN rotation and refresh only.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::failure::FailureContext;
use super::{PlayableStream, SessionContext, rotate_candidates};
use crate::cdn::{CdnHealthTracker, dedup_urls, host_of};
use crate::descriptor::LivePlayUrl;
use crate::error::{PlaybackError, Result};
use crate::expiry::{expires_within, parse_expiry_ms};
use crate::keys::{ItemRef, SessionKey};

#[derive(Debug, Default)]
struct LiveState {
    resolved_room_id: Option<u64>,
    candidates: Vec<String>,
    selected: Option<usize>,
    selected_expires_at_ms: Option<i64>,
}

/// Resolution and recovery state for one live room.
pub struct LiveSession {
    key: SessionKey,
    room_id: u64,
    ctx: SessionContext,
    cdn_health: Arc<CdnHealthTracker>,
    state: Mutex<LiveState>,
}

impl LiveSession {
    pub fn new(key: SessionKey, ctx: SessionContext) -> Result<Self> {
        let room_id = match ItemRef::parse(&key.unique_key) {
            Some(ItemRef::Live { room_id }) => room_id,
            Some(other) => {
                return Err(PlaybackError::UnsupportedItem(format!(
                    "not a live room: {other:?}"
                )));
            }
            None => return Err(PlaybackError::InvalidKey(key.unique_key.clone())),
        };

        Ok(Self {
            key,
            room_id,
            cdn_health: ctx.new_cdn_tracker(),
            ctx,
            state: Mutex::new(LiveState::default()),
        })
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn room_id(&self) -> u64 {
        self.room_id
    }

    pub fn cdn_health(&self) -> Arc<CdnHealthTracker> {
        self.cdn_health.clone()
    }

    /// Fetch the play-URL list and pick the first usable candidate.
    pub async fn prepare(&self) -> Result<PlayableStream> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        self.refresh(state).await?;
        self.select_first(state)
    }

    pub async fn recover(&self, failure: &FailureContext) -> Result<PlayableStream> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        self.cdn_health.cleanup();
        if let Some(url) = failure.failing_url.as_known() {
            self.cdn_health.blacklist(url);
        }

        let expiring_soon = expires_within(
            state.selected_expires_at_ms,
            self.ctx.clock.now_ms(),
            self.ctx.expiry_margin_ms(),
        );
        if failure.http_status.is_link_gone() || expiring_soon {
            info!(
                room_id = self.room_id,
                status = ?failure.http_status.code(),
                expiring_soon,
                "Refreshing live play URLs"
            );
            self.refresh(state).await?;
            return self.select_first(state);
        }

        let Some(current) = state.selected else {
            return self.select_first(state);
        };
        match rotate_candidates(&state.candidates, current, &self.cdn_health) {
            Some(index) => {
                debug!(room_id = self.room_id, index, "Rotated live candidate");
                Ok(self.select(state, index))
            }
            None => {
                info!(room_id = self.room_id, "Live rotation exhausted, refreshing");
                self.refresh(state).await?;
                self.select_first(state)
            }
        }
    }

    async fn resolve_room_id(&self, state: &mut LiveState) -> Result<u64> {
        if let Some(resolved) = state.resolved_room_id {
            return Ok(resolved);
        }
        let resolved = self.ctx.catalog.resolve_live_room(self.room_id).await?;
        let resolved = if resolved > 0 { resolved } else { self.room_id };
        state.resolved_room_id = Some(resolved);
        Ok(resolved)
    }

    async fn refresh(&self, state: &mut LiveState) -> Result<()> {
        let room_id = self.resolve_room_id(state).await?;
        let play_urls = self.ctx.catalog.fetch_live_play_urls(room_id).await?;

        state.candidates = flatten_play_urls(play_urls);
        state.selected = None;
        state.selected_expires_at_ms = None;
        debug!(
            room_id,
            candidates = state.candidates.len(),
            "Fetched live play URLs"
        );

        if state.candidates.is_empty() {
            return Err(PlaybackError::NoPlayableStream);
        }
        Ok(())
    }

    /// First candidate whose host is not blacklisted, else the first one.
    fn select_first(&self, state: &mut LiveState) -> Result<PlayableStream> {
        if state.candidates.is_empty() {
            return Err(PlaybackError::NoPlayableStream);
        }
        let index = state
            .candidates
            .iter()
            .position(|url| host_of(url).is_some_and(|host| !self.cdn_health.is_blacklisted(&host)))
            .unwrap_or(0);
        Ok(self.select(state, index))
    }

    fn select(&self, state: &mut LiveState, index: usize) -> PlayableStream {
        let url = state.candidates[index].clone();
        state.selected = Some(index);
        state.selected_expires_at_ms = parse_expiry_ms(&url);
        PlayableStream::Direct { url }
    }
}

/// Order entries by (order, url), then flatten primaries and backups.
fn flatten_play_urls(mut play_urls: Vec<LivePlayUrl>) -> Vec<String> {
    play_urls.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.url.cmp(&b.url)));
    dedup_urls(play_urls.iter().flat_map(|entry| {
        std::iter::once(entry.url.as_str()).chain(entry.backup_urls.iter().map(String::as_str))
    }))
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("key", &self.key)
            .field("room_id", &self.room_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_in_order_without_duplicates() {
        let urls = flatten_play_urls(vec![
            LivePlayUrl::new("https://c.example.com/live.flv", vec![], 2),
            LivePlayUrl::new(
                "https://b.example.com/live.flv",
                vec!["https://a.example.com/live.flv".into(), " ".into()],
                1,
            ),
            LivePlayUrl::new("https://a.example.com/live.flv", vec![], 1),
        ]);
        assert_eq!(
            urls,
            vec![
                "https://a.example.com/live.flv",
                "https://b.example.com/live.flv",
                "https://c.example.com/live.flv",
            ]
        );
    }
}
