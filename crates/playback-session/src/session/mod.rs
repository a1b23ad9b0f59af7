//! Per-item playback sessions.

mod budget;
mod failure;
mod live;
mod snapshot;
mod vod;

pub use budget::RecoveryBudget;
pub use failure::{FailingUrl, FailureContext, FailureKind, HttpStatus, RefreshReason};
pub use live::LiveSession;
pub use snapshot::{AudioOption, Snapshot};
pub use vod::PlaybackSession;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::CatalogClient;
use crate::cdn::{CdnHealthTracker, host_of};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::manifest::ManifestWriter;
use crate::preferences::PreferenceStore;

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionContext {
    pub catalog: Arc<dyn CatalogClient>,
    pub manifest_writer: Arc<dyn ManifestWriter>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<SessionConfig>,
}

impl SessionContext {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        manifest_writer: Arc<dyn ManifestWriter>,
        preferences: Arc<dyn PreferenceStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            catalog,
            manifest_writer,
            preferences,
            clock: Arc::new(SystemClock),
            config: Arc::new(config),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn new_cdn_tracker(&self) -> Arc<CdnHealthTracker> {
        Arc::new(CdnHealthTracker::new(
            self.config.cdn_blacklist_ttl(),
            self.clock.clone(),
        ))
    }

    pub(crate) fn expiry_margin_ms(&self) -> i64 {
        i64::try_from(self.config.expiry_margin_ms).unwrap_or(i64::MAX)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What the player should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableStream {
    /// A DASH manifest written to local storage.
    Manifest { path: PathBuf },
    /// A direct media URL.
    Direct { url: String },
}

impl PlayableStream {
    pub fn is_manifest(&self) -> bool {
        matches!(self, Self::Manifest { .. })
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Direct { url } => Some(url),
            Self::Manifest { .. } => None,
        }
    }
}

impl fmt::Display for PlayableStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manifest { path } => write!(f, "{}", path.display()),
            Self::Direct { url } => f.write_str(url),
        }
    }
}

/// Next candidate after `start` whose host is not blacklisted, wrapping
/// around. Candidates without a parseable host are skipped. `start` itself is
/// checked last.
pub(crate) fn rotate_candidates(
    candidates: &[String],
    start: usize,
    health: &CdnHealthTracker,
) -> Option<usize> {
    let len = candidates.len();
    if len == 0 {
        return None;
    }
    let start = start.min(len - 1);
    (1..=len)
        .map(|offset| (start + offset) % len)
        .find(|&index| {
            host_of(&candidates[index]).is_some_and(|host| !health.is_blacklisted(&host))
        })
}
