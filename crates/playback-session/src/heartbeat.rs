//! Throttled, best-effort playback progress reporting.
//!
//! Progress ticks are reported at most once per interval per key. A pause is
//! reported immediately, completion sends the "played to end" sentinel and
//! forgets the key. Sends run on spawned tasks and failures are only logged,
//! at most once per log interval per key.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::keys::SessionKey;
use crate::registry::SessionRegistry;
use crate::session::PlaybackSession;

/// Played-seconds value reported on completion.
pub const PLAYED_TO_END: i64 = -1;

/// Player state transitions relevant to reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Idle,
    Preparing,
    Prepared,
    Playing,
    Buffering,
    Paused,
    Completed,
    Error,
    /// Playback was abandoned before it started.
    StartAbort,
}

/// Per-key throttling timestamps (epoch ms).
#[derive(Debug)]
pub struct HeartbeatState {
    last_sent_at_ms: AtomicI64,
    last_failure_log_at_ms: AtomicI64,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self {
            last_sent_at_ms: AtomicI64::new(i64::MIN),
            last_failure_log_at_ms: AtomicI64::new(i64::MIN),
        }
    }
}

impl HeartbeatState {
    pub fn last_sent_at_ms(&self) -> Option<i64> {
        let value = self.last_sent_at_ms.load(Ordering::SeqCst);
        (value != i64::MIN).then_some(value)
    }

    /// Claim the right to send at `now_ms` if `interval_ms` has passed since
    /// the last send. The stamp is taken before sending.
    fn try_claim(&self, now_ms: i64, interval_ms: i64) -> bool {
        let last = self.last_sent_at_ms.load(Ordering::SeqCst);
        if now_ms.saturating_sub(last) < interval_ms {
            return false;
        }
        self.last_sent_at_ms
            .compare_exchange(last, now_ms, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn stamp(&self, now_ms: i64) {
        self.last_sent_at_ms.store(now_ms, Ordering::SeqCst);
    }

    fn should_log_failure(&self, now_ms: i64, interval_ms: i64) -> bool {
        let last = self.last_failure_log_at_ms.load(Ordering::SeqCst);
        if now_ms.saturating_sub(last) < interval_ms {
            return false;
        }
        self.last_failure_log_at_ms
            .compare_exchange(last, now_ms, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Heartbeat state keyed like the session registry.
#[derive(Debug, Default)]
pub struct HeartbeatLedger {
    states: DashMap<SessionKey, Arc<HeartbeatState>>,
}

impl HeartbeatLedger {
    pub fn get(&self, key: &SessionKey) -> Option<Arc<HeartbeatState>> {
        self.states.get(key).map(|entry| entry.value().clone())
    }

    fn get_or_create(&self, key: &SessionKey) -> Arc<HeartbeatState> {
        self.states.entry(key.clone()).or_default().value().clone()
    }

    pub fn remove(&self, key: &SessionKey) {
        self.states.remove(key);
    }

    pub fn clear_storage(&self, storage_id: i64) {
        self.states.retain(|key, _| key.storage_id != storage_id);
    }

    pub fn clear(&self) {
        self.states.clear();
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.states.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Reports progress for sessions found in a [`SessionRegistry`].
///
/// Methods that send spawn onto the runtime captured at construction (or set
/// with [`HeartbeatReporter::with_runtime`]) and return the task handle;
/// awaiting it is optional. Without a runtime, sends are dropped.
pub struct HeartbeatReporter {
    registry: Arc<SessionRegistry>,
    clock: Arc<dyn Clock>,
    runtime: Option<Handle>,
    interval_ms: i64,
    failure_log_interval_ms: i64,
}

impl HeartbeatReporter {
    pub fn new(registry: Arc<SessionRegistry>, clock: Arc<dyn Clock>, config: &SessionConfig) -> Self {
        Self {
            registry,
            clock,
            runtime: Handle::try_current().ok(),
            interval_ms: i64::try_from(config.heartbeat_interval_ms).unwrap_or(i64::MAX),
            failure_log_interval_ms: i64::try_from(config.heartbeat_failure_log_interval_ms)
                .unwrap_or(i64::MAX),
        }
    }

    /// Spawn sends onto `runtime`, so callbacks may arrive from any thread.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Periodic progress tick.
    pub fn on_progress(&self, key: &SessionKey, position_ms: i64, is_playing: bool) -> Option<JoinHandle<()>> {
        if !is_playing {
            return None;
        }
        let session = self.registry.get_playback(key)?;
        let played_seconds = played_seconds(position_ms)?;

        let state = self.ledger().get_or_create(key);
        if !state.try_claim(self.clock.now_ms(), self.interval_ms) {
            return None;
        }
        self.send(key, session, played_seconds, state)
    }

    pub fn on_play_state_changed(
        &self,
        key: &SessionKey,
        play_state: PlayState,
        position_ms: i64,
    ) -> Option<JoinHandle<()>> {
        match play_state {
            PlayState::Paused => {
                let session = self.registry.get_playback(key)?;
                let state = self.ledger().get_or_create(key);
                let played_seconds = played_seconds(position_ms)?;
                state.stamp(self.clock.now_ms());
                self.send(key, session, played_seconds, state)
            }
            PlayState::Completed => {
                let Some(session) = self.registry.get_playback(key) else {
                    self.ledger().remove(key);
                    return None;
                };
                let state = self.ledger().get_or_create(key);
                state.stamp(self.clock.now_ms());
                let handle = self.send(key, session, PLAYED_TO_END, state);
                self.ledger().remove(key);
                handle
            }
            PlayState::Idle | PlayState::StartAbort => {
                self.ledger().remove(key);
                None
            }
            _ => None,
        }
    }

    fn ledger(&self) -> &HeartbeatLedger {
        self.registry.heartbeat_ledger()
    }

    fn send(
        &self,
        key: &SessionKey,
        session: Arc<PlaybackSession>,
        played_seconds: i64,
        state: Arc<HeartbeatState>,
    ) -> Option<JoinHandle<()>> {
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            debug!(
                storage_id = key.storage_id,
                played_seconds,
                "No Tokio runtime, dropping heartbeat"
            );
            return None;
        };
        let key = key.clone();
        let clock = self.clock.clone();
        let failure_log_interval_ms = self.failure_log_interval_ms;

        Some(runtime.spawn(async move {
            match session.report_heartbeat(played_seconds).await {
                Ok(()) => {
                    debug!(storage_id = key.storage_id, played_seconds, "Heartbeat sent");
                }
                Err(e) => {
                    if state.should_log_failure(clock.now_ms(), failure_log_interval_ms) {
                        warn!(
                            storage_id = key.storage_id,
                            unique_key = %key.unique_key,
                            played_seconds,
                            error = %e,
                            "Heartbeat failed"
                        );
                    }
                }
            }
        }))
    }
}

impl std::fmt::Debug for HeartbeatReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatReporter")
            .field("interval_ms", &self.interval_ms)
            .field("failure_log_interval_ms", &self.failure_log_interval_ms)
            .finish_non_exhaustive()
    }
}

fn played_seconds(position_ms: i64) -> Option<i64> {
    let seconds = position_ms.max(0) / 1000;
    (seconds > 0).then_some(seconds)
}
