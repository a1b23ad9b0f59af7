//! Catalog service boundary.
//!
//! The wire protocol lives outside this crate. Implementations are typically
//! reqwest + serde_json clients, so [`CatalogError`] converts from both.

use async_trait::async_trait;
use thiserror::Error;

use crate::descriptor::{LivePlayUrl, StreamDescriptor};
use crate::keys::ItemRef;
use crate::preferences::PlaybackPreferences;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-zero business code.
    #[error("catalog API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("failed to decode catalog response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl CatalogError {
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Network(_) => true,
            CatalogError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            CatalogError::Api { .. } | CatalogError::Decode(_) | CatalogError::Other(_) => false,
        }
    }
}

/// Inputs for one descriptor fetch.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorRequest<'a> {
    pub item: &'a ItemRef,
    pub preferences: &'a PlaybackPreferences,
    /// Per-session token sent with PGC requests.
    pub pgc_session: Option<&'a str>,
}

/// Remote catalog consumed by sessions and the heartbeat reporter.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch_descriptor(
        &self,
        request: &DescriptorRequest<'_>,
    ) -> Result<StreamDescriptor, CatalogError>;

    /// Secondary endpoint asked when the primary answer is unusable.
    /// `Ok(None)` means the catalog has no alternative.
    async fn fetch_descriptor_fallback(
        &self,
        request: &DescriptorRequest<'_>,
    ) -> Result<Option<StreamDescriptor>, CatalogError>;

    /// Report playback progress. `played_seconds == -1` means played to end.
    async fn report_heartbeat(&self, item: &ItemRef, played_seconds: i64) -> Result<(), CatalogError>;

    /// Resolve a public (possibly short) room id to the stable internal id.
    async fn resolve_live_room(&self, room_id: u64) -> Result<u64, CatalogError>;

    async fn fetch_live_play_urls(&self, room_id: u64) -> Result<Vec<LivePlayUrl>, CatalogError>;
}
